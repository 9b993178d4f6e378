use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::exception::IngestResult;
use crate::model::{
    entity::FileUploadHandle,
    vo::{
        AccessUrl, Actor, BackendKind, Chunk, ContentHash, FinalizeMeta, HandleDeletion,
        InterruptedStatus, SessionId, SessionProgress, SweepReport, UploadMeta,
    },
};
use crate::service::ByteStream;

/// # File ingestion
///
/// Whole file uploads and the chunked upload lifecycle:
/// initiate, receive chunks, finalize (dedup check, commit), and the
/// resulting [`FileUploadHandle`].
#[async_trait]
pub trait IngestionService: Send + Sync {
    /// Single shot upload, hashed while streaming to the backend.
    async fn upload_whole(
        &self,
        actor: &Actor,
        meta: UploadMeta,
        content: ByteStream<'_>,
    ) -> IngestResult<FileUploadHandle>;

    /// Creates a pending session and returns its token.
    async fn initiate_chunked(
        &self,
        actor: &Actor,
        meta: UploadMeta,
        total_chunks: u64,
    ) -> IngestResult<SessionId>;

    async fn receive_chunk(&self, actor: &Actor, chunk: Chunk) -> IngestResult<SessionProgress>;

    /// Commits a complete session. Calling it again on a completed session
    /// returns the same handle.
    async fn finalize(
        &self,
        actor: &Actor,
        session_id: &SessionId,
        meta: FinalizeMeta,
    ) -> IngestResult<FileUploadHandle>;

    /// Missing chunk indexes, for resuming. Read only.
    async fn handle_interrupted(
        &self,
        actor: &Actor,
        session_id: &SessionId,
    ) -> IngestResult<InterruptedStatus>;

    /// Drops staged chunks and marks the session cancelled. No-op on a
    /// terminal session.
    async fn cancel(&self, actor: &Actor, session_id: &SessionId) -> IngestResult<()>;

    /// Already stored content, so a client can skip sending bytes. Advisory
    /// only, finalize re-checks.
    async fn check_exists(
        &self,
        hash: &ContentHash,
        backend: Option<BackendKind>,
    ) -> IngestResult<Option<FileUploadHandle>>;

    async fn get_handle(&self, handle_id: Uuid) -> IngestResult<FileUploadHandle>;

    async fn access_url(&self, handle_id: Uuid) -> IngestResult<AccessUrl>;

    /// Streams the stored bytes of a handle.
    async fn read_content(&self, handle_id: Uuid) -> IngestResult<ByteStream<'static>>;

    /// Re-reads the stored bytes and checks them against the recorded hash.
    async fn verify_handle(&self, handle_id: Uuid) -> IngestResult<()>;

    async fn delete_handle(&self, actor: &Actor, handle_id: Uuid) -> IngestResult<HandleDeletion>;

    /// Expires idle sessions and reclaims what they left behind.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> IngestResult<SweepReport>;
}
