//! In-process repositories, for single node deployments and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use crate::{
    model::{
        entity::{DedupEntry, FileUploadHandle, SessionStatus, UploadSession},
        vo::{BackendKind, ContentHash, SessionId},
    },
    repository::{DedupIndexRepo, FileHandleRepo, UploadSessionRepo},
};

#[derive(Default, Clone)]
pub struct MemoryRepo {
    sessions: Arc<DashMap<SessionId, UploadSession>>,
    handles: Arc<DashMap<Uuid, FileUploadHandle>>,
    dedup: Arc<DashMap<(ContentHash, BackendKind), DedupEntry>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadSessionRepo for MemoryRepo {
    async fn insert(&self, session: &UploadSession) -> anyhow::Result<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> anyhow::Result<Option<UploadSession>> {
        Ok(self.sessions.get(id).map(|el| el.clone()))
    }

    async fn mark_received(
        &self,
        id: &SessionId,
        index: u64,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<UploadSession>> {
        Ok(self.sessions.get_mut(id).map(|mut el| {
            el.mark_received(index, at);
            el.clone()
        }))
    }

    async fn transition(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
        handle_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        Ok(match self.sessions.get_mut(id) {
            Some(mut el) => el.transition(from, to, handle_id, at),
            None => false,
        })
    }

    async fn delete(&self, id: &SessionId) -> anyhow::Result<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn list_idle(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<UploadSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|el| el.is_idle_since(cutoff))
            .map(|el| el.clone())
            .collect())
    }
}

#[async_trait]
impl FileHandleRepo for MemoryRepo {
    async fn insert(&self, handle: &FileUploadHandle) -> anyhow::Result<()> {
        self.handles.insert(handle.id, handle.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>> {
        Ok(self.handles.get(&id).map(|el| el.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>> {
        Ok(self.handles.remove(&id).map(|(_, el)| el))
    }

    async fn find_by_content(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<FileUploadHandle>> {
        Ok(self
            .handles
            .iter()
            .find(|el| el.content_hash == *hash && el.storage_backend == backend)
            .map(|el| el.clone()))
    }
}

#[async_trait]
impl DedupIndexRepo for MemoryRepo {
    async fn get(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<DedupEntry>> {
        Ok(self.dedup.get(&(hash.clone(), backend)).map(|el| el.clone()))
    }

    async fn insert_if_absent(&self, entry: &DedupEntry) -> anyhow::Result<bool> {
        Ok(match self.dedup.entry((entry.content_hash.clone(), entry.backend)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(entry.clone());
                true
            }
        })
    }

    async fn increment_ref(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<u64>> {
        Ok(self.dedup.get_mut(&(hash.clone(), backend)).map(|mut el| {
            el.ref_count += 1;
            el.ref_count
        }))
    }

    async fn decrement_ref(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<u64>> {
        Ok(match self.dedup.entry((hash.clone(), backend)) {
            Entry::Occupied(mut o) => {
                let remaining = {
                    let el = o.get_mut();
                    el.ref_count = el.ref_count.saturating_sub(1);
                    el.ref_count
                };
                if remaining == 0 {
                    o.remove();
                }
                Some(remaining)
            }
            Entry::Vacant(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: &str) -> DedupEntry {
        DedupEntry {
            content_hash: ContentHash::new(hash),
            backend: BackendKind::Local,
            handle_id: Uuid::new_v4(),
            locator: "ab/cd".to_owned(),
            size_bytes: 3,
            ref_count: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_insert_loses() {
        let repo = MemoryRepo::new();
        assert!(repo.insert_if_absent(&entry("aa")).await.unwrap());
        assert!(!repo.insert_if_absent(&entry("AA")).await.unwrap());
    }

    #[tokio::test]
    async fn entry_removed_at_zero_refs() {
        let repo = MemoryRepo::new();
        let hash = ContentHash::new("bb");
        repo.insert_if_absent(&entry("bb")).await.unwrap();
        assert_eq!(repo.increment_ref(&hash, BackendKind::Local).await.unwrap(), Some(2));
        assert_eq!(repo.decrement_ref(&hash, BackendKind::Local).await.unwrap(), Some(1));
        assert_eq!(repo.decrement_ref(&hash, BackendKind::Local).await.unwrap(), Some(0));
        assert!(DedupIndexRepo::get(&repo, &hash, BackendKind::Local).await.unwrap().is_none());
        assert_eq!(repo.decrement_ref(&hash, BackendKind::Local).await.unwrap(), None);
    }
}
