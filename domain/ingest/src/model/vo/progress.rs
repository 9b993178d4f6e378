use serde::Serialize;

use super::SessionId;
use crate::model::entity::SessionStatus;

/// Returned after every accepted chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: SessionId,
    pub received_count: u64,
    pub total_chunks: u64,
    pub status: SessionStatus,
}

/// What a reconnecting client still has to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptedStatus {
    pub session_id: SessionId,
    pub missing_chunk_indexes: Vec<u64>,
    pub received_count: u64,
    pub total_chunks: u64,
    pub status: SessionStatus,
}

/// Outcome of one expired session sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Live sessions that went idle and were expired.
    pub expired: usize,
    /// Terminal session records dropped.
    pub purged: usize,
    /// Staging directories without any session record.
    pub orphaned_staging: usize,
}
