use uuid::Uuid;

use super::ContentHash;

/// Naming information handed to a backend when writing a new object.
#[derive(Debug, Clone)]
pub struct ObjectWrite {
    /// Fresh id the backend may use as its object key.
    pub object_id: Uuid,
    pub original_filename: String,
    pub mime_type: String,
}

/// A finished physical write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Backend specific locator: a relative path, an object key or a remote id.
    pub locator: String,
    pub size_bytes: u64,
    /// Checksum computed by the backend itself, when it reports one.
    pub checksum: Option<ContentHash>,
}
