use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use uuid::Uuid;

use crate::{
    model::{
        entity::{DedupEntry, FileUploadHandle, SessionStatus, UploadSession},
        vo::{BackendKind, ContentHash, SessionId},
    },
    repository::{DedupIndexRepo, FileHandleRepo, UploadSessionRepo},
};

mock! {
    pub UploadSessionRepo {}
    #[async_trait]
    impl UploadSessionRepo for UploadSessionRepo {
        async fn insert(&self, session: &UploadSession) -> anyhow::Result<()>;
        async fn get(&self, id: &SessionId) -> anyhow::Result<Option<UploadSession>>;
        async fn mark_received(
            &self,
            id: &SessionId,
            index: u64,
            at: DateTime<Utc>,
        ) -> anyhow::Result<Option<UploadSession>>;
        async fn transition(
            &self,
            id: &SessionId,
            from: &[SessionStatus],
            to: SessionStatus,
            handle_id: Option<Uuid>,
            at: DateTime<Utc>,
        ) -> anyhow::Result<bool>;
        async fn delete(&self, id: &SessionId) -> anyhow::Result<()>;
        async fn list_idle(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<UploadSession>>;
    }
}

mock! {
    pub FileHandleRepo {}
    #[async_trait]
    impl FileHandleRepo for FileHandleRepo {
        async fn insert(&self, handle: &FileUploadHandle) -> anyhow::Result<()>;
        async fn get(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>>;
        async fn delete(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>>;
        async fn find_by_content(
            &self,
            hash: &ContentHash,
            backend: BackendKind,
        ) -> anyhow::Result<Option<FileUploadHandle>>;
    }
}

mock! {
    pub DedupIndexRepo {}
    #[async_trait]
    impl DedupIndexRepo for DedupIndexRepo {
        async fn get(&self, hash: &ContentHash, backend: BackendKind)
            -> anyhow::Result<Option<DedupEntry>>;
        async fn insert_if_absent(&self, entry: &DedupEntry) -> anyhow::Result<bool>;
        async fn increment_ref(&self, hash: &ContentHash, backend: BackendKind)
            -> anyhow::Result<Option<u64>>;
        async fn decrement_ref(&self, hash: &ContentHash, backend: BackendKind)
            -> anyhow::Result<Option<u64>>;
    }
}
