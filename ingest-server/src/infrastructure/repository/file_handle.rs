use async_trait::async_trait;
use domain_ingest::{
    model::{
        entity::FileUploadHandle,
        vo::{BackendKind, ContentHash},
    },
    repository::FileHandleRepo,
};
use redis::Cmd;
use uuid::Uuid;

use crate::infrastructure::database::RedisRepository;

fn handle_key(id: Uuid) -> String {
    format!("ingest_handle_{id}")
}

fn content_key(hash: &ContentHash, backend: BackendKind) -> String {
    format!("ingest_handle_content_{backend}_{hash}")
}

#[async_trait]
impl FileHandleRepo for RedisRepository {
    async fn insert(&self, handle: &FileUploadHandle) -> anyhow::Result<()> {
        self.client
            .query::<()>(&Cmd::set(handle_key(handle.id), serde_json::to_string(handle)?))
            .await?;
        self.client
            .query::<()>(&Cmd::sadd(
                content_key(&handle.content_hash, handle.storage_backend),
                handle.id.to_string(),
            ))
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>> {
        let raw: Option<String> = self.client.query(&Cmd::get(handle_key(id))).await?;
        Ok(match raw {
            Some(el) => Some(serde_json::from_str::<FileUploadHandle>(&el)?),
            None => None,
        })
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<FileUploadHandle>> {
        let Some(handle) = FileHandleRepo::get(self, id).await? else {
            return Ok(None);
        };
        // Only the caller that actually removed the key reports the handle.
        let removed: i64 = self.client.query(&Cmd::del(handle_key(id))).await?;
        self.client
            .query::<()>(&Cmd::srem(
                content_key(&handle.content_hash, handle.storage_backend),
                id.to_string(),
            ))
            .await?;
        Ok((removed > 0).then_some(handle))
    }

    async fn find_by_content(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<FileUploadHandle>> {
        let ids: Vec<String> = self.client.query(&Cmd::smembers(content_key(hash, backend))).await?;
        for id in ids {
            let Ok(id) = id.parse::<Uuid>() else {
                continue;
            };
            if let Some(handle) = FileHandleRepo::get(self, id).await? {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }
}
