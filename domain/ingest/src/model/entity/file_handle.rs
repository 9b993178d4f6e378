use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::vo::{BackendKind, ContentHash, HashAlgorithm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HandleStatus {
    #[default]
    Completed,
}

/// Durable record of an ingested file, referenced by documents, attachments
/// and avatars.
///
/// Several handles may share one physical object when their contents are
/// byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadHandle {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Backend specific: relative path, object key or remote file id.
    pub locator: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content_hash: ContentHash,
    pub hash_algorithm: HashAlgorithm,
    pub storage_backend: BackendKind,
    pub status: HandleStatus,
    pub created_at: DateTime<Utc>,
}
