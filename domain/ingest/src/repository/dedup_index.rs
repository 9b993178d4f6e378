use async_trait::async_trait;

use crate::model::{
    entity::DedupEntry,
    vo::{BackendKind, ContentHash},
};

/// Key-value store keyed by `(hash, backend)` with reference counts.
#[async_trait]
pub trait DedupIndexRepo: Send + Sync {
    async fn get(&self, hash: &ContentHash, backend: BackendKind)
        -> anyhow::Result<Option<DedupEntry>>;

    /// Inserts unless an entry with the same key exists. This is the unique
    /// constraint closing the lookup-then-register race.
    ///
    /// Returns whether the entry was inserted.
    async fn insert_if_absent(&self, entry: &DedupEntry) -> anyhow::Result<bool>;

    /// Returns the new count, `None` when there is no such entry.
    async fn increment_ref(&self, hash: &ContentHash, backend: BackendKind)
        -> anyhow::Result<Option<u64>>;

    /// Returns the remaining count, `None` when there is no such entry.
    /// The entry is removed once the count reaches zero.
    async fn decrement_ref(&self, hash: &ContentHash, backend: BackendKind)
        -> anyhow::Result<Option<u64>>;
}
