use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{
    entity::{SessionStatus, UploadSession},
    vo::SessionId,
};

/// Store of in-flight upload sessions.
///
/// Implementations live outside process memory (or at least outlive a single
/// request) so any worker can pick up any session. Every mutating method is
/// atomic with respect to concurrent callers on the same session.
#[async_trait]
pub trait UploadSessionRepo: Send + Sync {
    async fn insert(&self, session: &UploadSession) -> anyhow::Result<()>;

    async fn get(&self, id: &SessionId) -> anyhow::Result<Option<UploadSession>>;

    /// Adds `index` to the received mask if the session still accepts chunks.
    ///
    /// Returns the session as stored after the call, `None` if it doesn't exist.
    async fn mark_received(
        &self,
        id: &SessionId,
        index: u64,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<UploadSession>>;

    /// Conditional status change, only one concurrent caller can win it.
    ///
    /// Returns whether the transition was applied.
    async fn transition(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
        handle_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn delete(&self, id: &SessionId) -> anyhow::Result<()>;

    /// All sessions whose last activity is older than `cutoff`.
    async fn list_idle(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<UploadSession>>;
}
