use async_trait::async_trait;

use crate::exception::IngestResult;
use crate::model::{
    entity::DedupEntry,
    vo::{BackendKind, ContentHash},
};

/// Outcome of registering freshly committed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The entry is new, its ref count is one.
    Registered(DedupEntry),
    /// Someone else registered the same content first. The existing entry's
    /// ref count was incremented on our behalf, our own object is redundant.
    AlreadyPresent(DedupEntry),
}

#[async_trait]
pub trait DedupIndexService: Send + Sync {
    /// Existing entry for the content, incrementing its ref count when found.
    async fn acquire(&self, hash: &ContentHash, backend: BackendKind)
        -> IngestResult<Option<DedupEntry>>;

    /// Existing entry for the content, read only.
    async fn lookup(&self, hash: &ContentHash, backend: BackendKind)
        -> IngestResult<Option<DedupEntry>>;

    async fn register(&self, entry: DedupEntry) -> IngestResult<Registration>;

    /// Drops one reference, returning the remaining count. `None` if unknown.
    async fn release(&self, hash: &ContentHash, backend: BackendKind)
        -> IngestResult<Option<u64>>;
}
