use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::vo::{BackendKind, ContentHash};

/// Maps `(content_hash, backend)` to the physical object holding that content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupEntry {
    pub content_hash: ContentHash,
    pub backend: BackendKind,
    /// Handle that first committed the content.
    pub handle_id: Uuid,
    pub locator: String,
    pub size_bytes: u64,
    /// Number of live handles pointing at `locator`.
    pub ref_count: u64,
    pub created_at: DateTime<Utc>,
}
