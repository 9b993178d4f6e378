mod external_drive_backend;
mod object_store_backend;

#[rustfmt::skip]
pub use {
    external_drive_backend::ExternalDriveBackendImpl,
    object_store_backend::ObjectStoreBackendImpl,
};
