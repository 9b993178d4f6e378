use domain_ingest::model::vo::{BackendKind, SessionId, UploadMeta};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitiateRequest {
    pub total_chunks: u64,
    pub meta: UploadMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub session_id: SessionId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkQuery {
    /// Cross-checked against the session when given.
    pub total_chunks: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistenceQuery {
    pub backend: Option<BackendKind>,
}
