use serde::{Deserialize, Serialize};

use super::{BackendKind, ContentHash, Purpose};

/// Recognized upload metadata. Unknown fields are rejected rather than
/// silently carried along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UploadMeta {
    #[serde(default)]
    pub purpose: Purpose,
    pub original_filename: String,
    /// Size in bytes the client announces for the whole file.
    #[serde(default)]
    pub declared_size: u64,
    /// Preferred backend, honored when it is configured.
    #[serde(default)]
    pub backend_hint: Option<BackendKind>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl UploadMeta {
    pub fn new(original_filename: impl Into<String>, declared_size: u64) -> Self {
        Self {
            purpose: Purpose::default(),
            original_filename: original_filename.into(),
            declared_size,
            backend_hint: None,
            mime_type: None,
        }
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend_hint = Some(backend);
        self
    }
}

/// Metadata supplied when finalizing a chunked upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FinalizeMeta {
    /// Overrides the mime type given at initiate time.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Digest the client computed on its side, verified against ours.
    #[serde(default)]
    pub expected_hash: Option<ContentHash>,
}
