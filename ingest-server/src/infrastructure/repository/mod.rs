mod dedup_index;
mod file_handle;
mod upload_session;
