use async_trait::async_trait;
use domain_ingest::{
    model::{
        entity::DedupEntry,
        vo::{BackendKind, ContentHash},
    },
    repository::DedupIndexRepo,
};
use redis::Cmd;

use crate::infrastructure::database::RedisRepository;

fn dedup_key(hash: &ContentHash, backend: BackendKind) -> String {
    format!("ingest_dedup_{backend}_{hash}")
}

fn dedup_lock_key(hash: &ContentHash, backend: BackendKind) -> String {
    format!("lock_dedup_{backend}_{hash}")
}

impl RedisRepository {
    async fn load_dedup(&self, key: &str) -> anyhow::Result<Option<DedupEntry>> {
        let raw: Option<String> = self.client.query(&Cmd::get(key)).await?;
        Ok(match raw {
            Some(el) => Some(serde_json::from_str::<DedupEntry>(&el)?),
            None => None,
        })
    }
}

#[async_trait]
impl DedupIndexRepo for RedisRepository {
    async fn get(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<DedupEntry>> {
        self.load_dedup(&dedup_key(hash, backend)).await
    }

    async fn insert_if_absent(&self, entry: &DedupEntry) -> anyhow::Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(dedup_key(&entry.content_hash, entry.backend))
            .arg(serde_json::to_string(entry)?)
            .arg("NX");
        let inserted: Option<String> = self.client.query(&cmd).await?;
        Ok(inserted.is_some())
    }

    async fn increment_ref(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<u64>> {
        let key = dedup_key(hash, backend);
        self.locked(&dedup_lock_key(hash, backend), || async {
            let Some(mut entry) = self.load_dedup(&key).await? else {
                return Ok(None);
            };
            entry.ref_count += 1;
            self.client.query::<()>(&Cmd::set(&key, serde_json::to_string(&entry)?)).await?;
            Ok(Some(entry.ref_count))
        })
        .await
    }

    async fn decrement_ref(
        &self,
        hash: &ContentHash,
        backend: BackendKind,
    ) -> anyhow::Result<Option<u64>> {
        let key = dedup_key(hash, backend);
        self.locked(&dedup_lock_key(hash, backend), || async {
            let Some(mut entry) = self.load_dedup(&key).await? else {
                return Ok(None);
            };
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count == 0 {
                self.client.query::<()>(&Cmd::del(&key)).await?;
            } else {
                self.client.query::<()>(&Cmd::set(&key, serde_json::to_string(&entry)?)).await?;
            }
            Ok(Some(entry.ref_count))
        })
        .await
    }
}
