mod dedup_index;
mod file_handle;
mod upload_session;

#[rustfmt::skip]
pub use {
    dedup_index::DedupIndexRepo,
    file_handle::FileHandleRepo,
    upload_session::UploadSessionRepo,
};
