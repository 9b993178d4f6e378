use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    entity::FileUploadHandle,
    vo::{BackendKind, ContentHash},
};

#[async_trait]
pub trait FileHandleRepo: Send + Sync {
    async fn insert(&self, handle: &FileUploadHandle) -> anyhow::Result<()>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>>;

    /// Removes the record, returning it if it existed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>>;

    /// Any live handle with the given content in the given backend.
    async fn find_by_content(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<FileUploadHandle>>;
}
