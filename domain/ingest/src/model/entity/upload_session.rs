use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::vo::{BackendKind, Purpose, SessionId, SessionProgress, UploadMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Receiving,
    Assembling,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Failed
                | SessionStatus::Cancelled
                | SessionStatus::Expired
        )
    }

    /// Whether chunk writes are still accepted.
    pub fn accepts_chunks(self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Receiving)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Receiving => "receiving",
            SessionStatus::Assembling => "assembling",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// One client driven chunked upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub id: SessionId,
    /// Initiating user, the only non-admin allowed to act on the session.
    pub owner_id: Uuid,
    pub total_chunks: u64,
    /// Indexes received so far. Only ever grows.
    pub received_chunks: BTreeSet<u64>,
    pub declared_size: u64,
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub purpose: Purpose,
    /// Fixed at initiate time.
    pub target_backend: BackendKind,
    pub status: SessionStatus,
    /// Set once the session completed.
    pub handle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(
        id: SessionId,
        owner_id: Uuid,
        meta: UploadMeta,
        total_chunks: u64,
        target_backend: BackendKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            total_chunks,
            received_chunks: BTreeSet::new(),
            declared_size: meta.declared_size,
            original_filename: meta.original_filename,
            mime_type: meta.mime_type,
            purpose: meta.purpose,
            target_backend,
            status: SessionStatus::Pending,
            handle_id: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn received_count(&self) -> u64 {
        self.received_chunks.len() as u64
    }

    pub fn is_full(&self) -> bool {
        self.received_count() == self.total_chunks
    }

    pub fn missing_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks).filter(|i| !self.received_chunks.contains(i)).collect()
    }

    /// Records a staged chunk. Ignored unless the session still accepts chunks.
    ///
    /// Returns whether the mask changed.
    pub fn mark_received(&mut self, index: u64, now: DateTime<Utc>) -> bool {
        if !self.status.accepts_chunks() || index >= self.total_chunks {
            return false;
        }
        self.last_activity_at = now;
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Receiving;
        }
        self.received_chunks.insert(index)
    }

    /// Moves to `to` when the current status is one of `from`.
    pub fn transition(
        &mut self,
        from: &[SessionStatus],
        to: SessionStatus,
        handle_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> bool {
        if !from.contains(&self.status) {
            return false;
        }
        self.status = to;
        if handle_id.is_some() {
            self.handle_id = handle_id;
        }
        self.last_activity_at = now;
        true
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            session_id: self.id.clone(),
            received_count: self.received_count(),
            total_chunks: self.total_chunks,
            status: self.status,
        }
    }

    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity_at < cutoff
    }
}
