use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::exception::IngestResult;
use crate::model::{
    entity::FileUploadHandle,
    vo::{AccessUrl, BackendKind, ObjectWrite, StoredObject},
};

/// Owned byte stream passed between staging, hashing and backends.
pub type ByteStream<'a> = Box<dyn AsyncRead + Unpin + Send + 'a>;

/// Durable home of finished artifacts.
///
/// Transient failures are retried inside the implementation with a bounded
/// backoff, what comes out is `BackendUnavailable`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Streams `content` into a new object.
    async fn write(&self, target: &ObjectWrite, content: &mut ByteStream<'_>)
        -> IngestResult<StoredObject>;

    /// Streams the object's bytes. Backends without byte access return
    /// `Unsupported`.
    async fn read(&self, locator: &str) -> IngestResult<ByteStream<'static>>;

    async fn delete(&self, locator: &str) -> IngestResult<()>;

    async fn issue_access_url(&self, handle: &FileUploadHandle) -> IngestResult<AccessUrl>;
}
