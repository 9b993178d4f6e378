use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::exception::IngestResult;
use crate::model::vo::{Chunk, SessionId};
use crate::service::ByteStream;

/// # Chunk staging
///
/// Every chunk lands in a staging area regardless of the session's target
/// backend. Staged chunks belong to their session until it is finalized or
/// cancelled.
#[async_trait]
pub trait ChunkAssemblerService: Send + Sync {
    /// Stages one chunk atomically. Rewriting an index replaces it.
    async fn write(&self, chunk: Chunk) -> IngestResult<()>;

    /// Indexes that are durably staged.
    async fn staged_indexes(&self, session_id: &SessionId) -> IngestResult<BTreeSet<u64>>;

    /// Whether every index of the session is staged.
    async fn is_complete(&self, session_id: &SessionId) -> IngestResult<bool>;

    /// Staged chunks concatenated strictly by index.
    ///
    /// Errors with `MissingChunk` when an index isn't staged.
    async fn assemble_ordered(&self, session_id: &SessionId) -> IngestResult<ByteStream<'static>>;

    /// Removes every staged chunk of the session.
    async fn cleanup(&self, session_id: &SessionId) -> IngestResult<()>;

    /// Sessions that have something staged.
    async fn staged_sessions(&self) -> IngestResult<Vec<SessionId>>;
}
