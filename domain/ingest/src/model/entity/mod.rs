mod dedup_entry;
mod file_handle;
mod upload_session;

#[rustfmt::skip]
pub use {
    dedup_entry::DedupEntry,
    file_handle::{FileUploadHandle, HandleStatus},
    upload_session::{SessionStatus, UploadSession},
};
