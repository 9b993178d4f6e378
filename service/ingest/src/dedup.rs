use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use domain_ingest::{
    exception::IngestResult,
    model::{
        entity::DedupEntry,
        vo::{BackendKind, ContentHash},
    },
    repository::DedupIndexRepo,
    service::{DedupIndexService, Registration},
};
use typed_builder::TypedBuilder;

#[derive(TypedBuilder)]
pub struct DedupIndexServiceImpl {
    repo: Arc<dyn DedupIndexRepo>,
    /// Attempts when the entry vanishes between a failed insert and the
    /// increment that should follow it.
    #[builder(default = 5)]
    register_retries: usize,
}

#[async_trait]
impl DedupIndexService for DedupIndexServiceImpl {
    async fn acquire(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> IngestResult<Option<DedupEntry>> {
        let Some(mut entry) = self.repo.get(hash, backend).await? else {
            return Ok(None);
        };
        // The last reference may have been released in between.
        Ok(self.repo.increment_ref(hash, backend).await?.map(|ref_count| {
            entry.ref_count = ref_count;
            entry
        }))
    }

    async fn lookup(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> IngestResult<Option<DedupEntry>> {
        Ok(self.repo.get(hash, backend).await?)
    }

    async fn register(&self, entry: DedupEntry) -> IngestResult<Registration> {
        for _ in 0..self.register_retries {
            if self.repo.insert_if_absent(&entry).await? {
                return Ok(Registration::Registered(entry));
            }
            if let Some(existing) = self.acquire(&entry.content_hash, entry.backend).await? {
                return Ok(Registration::AlreadyPresent(existing));
            }
        }
        Err(anyhow!(
            "Failed to register content: {} on {} after {} retries.",
            entry.content_hash,
            entry.backend,
            self.register_retries
        )
        .into())
    }

    async fn release(&self, hash: &ContentHash, backend: BackendKind) -> IngestResult<Option<u64>> {
        Ok(self.repo.decrement_ref(hash, backend).await?)
    }
}
