use std::time::Duration;

use async_trait::async_trait;
use domain_ingest::{
    exception::{IngestException, IngestResult},
    model::{
        entity::FileUploadHandle,
        vo::{AccessUrl, BackendKind, ObjectWrite, StoredObject},
    },
    service::{ByteStream, StorageBackend},
};
use opendal::{layers::RetryLayer, services::S3, ErrorKind, Operator};
use tokio::io::AsyncReadExt;
use typed_builder::TypedBuilder;

use crate::infrastructure::config::ObjectStoreConfig;

/// Multipart uploads need every part but the last to be at least 5 MiB.
const PART_SIZE: usize = 8 * 1024 * 1024;

/// S3-compatible object storage. Clients download through presigned urls.
#[derive(TypedBuilder, Clone)]
pub struct ObjectStoreBackendImpl {
    operator: Operator,
    #[builder(default = Duration::from_secs(15 * 60))]
    presign_ttl: Duration,
}

impl ObjectStoreBackendImpl {
    pub fn from_config(config: &ObjectStoreConfig) -> anyhow::Result<Self> {
        let mut builder = S3::default();
        builder
            .endpoint(&config.endpoint)
            .root(&config.root)
            .bucket(&config.bucket)
            .region(&config.region)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key);
        let operator = Operator::new(builder)?
            .layer(RetryLayer::new().with_max_times(config.max_retries))
            .finish();
        Ok(Self::builder()
            .operator(operator)
            .presign_ttl(Duration::from_secs(config.presign_secs))
            .build())
    }

    fn map_err(&self, operation: &'static str, e: opendal::Error) -> IngestException {
        match e.kind() {
            ErrorKind::Unsupported => IngestException::Unsupported {
                backend: BackendKind::ObjectStore,
                operation,
            },
            _ => IngestException::BackendUnavailable {
                backend: BackendKind::ObjectStore,
                source: e.into(),
            },
        }
    }
}

/// Reads until `buf` holds `PART_SIZE` bytes or the stream ends.
async fn fill_part(content: &mut ByteStream<'_>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    buf.clear();
    let mut limited = (&mut *content).take(PART_SIZE as u64);
    limited.read_to_end(buf).await?;
    Ok(())
}

#[async_trait]
impl StorageBackend for ObjectStoreBackendImpl {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn write(
        &self,
        target: &ObjectWrite,
        content: &mut ByteStream<'_>,
    ) -> IngestResult<StoredObject> {
        let id = target.object_id.simple().to_string();
        let key = format!("{}/{id}", &id[..2]);

        let mut part = Vec::with_capacity(PART_SIZE);
        fill_part(content, &mut part).await?;
        let mut size = part.len() as u64;

        if part.len() < PART_SIZE {
            self.operator
                .write_with(&key, part)
                .content_type(&target.mime_type)
                .await
                .map_err(|e| self.map_err("write", e))?;
        } else {
            let mut writer = self
                .operator
                .writer_with(&key)
                .content_type(&target.mime_type)
                .await
                .map_err(|e| self.map_err("write", e))?;
            let written = async {
                while !part.is_empty() {
                    writer
                        .write(std::mem::take(&mut part))
                        .await
                        .map_err(|e| self.map_err("write", e))?;
                    fill_part(content, &mut part).await?;
                    size += part.len() as u64;
                }
                writer.close().await.map_err(|e| self.map_err("write", e))
            }
            .await;
            if let Err(e) = written {
                if let Err(abort) = writer.abort().await {
                    tracing::warn!(key, error = %abort, "Failed to abort multipart upload.");
                }
                return Err(e);
            }
        }

        Ok(StoredObject {
            locator: key,
            size_bytes: size,
            checksum: None,
        })
    }

    async fn read(&self, locator: &str) -> IngestResult<ByteStream<'static>> {
        let reader = self.operator.reader(locator).await.map_err(|e| self.map_err("read", e))?;
        Ok(Box::new(reader))
    }

    async fn delete(&self, locator: &str) -> IngestResult<()> {
        match self.operator.delete(locator).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(self.map_err("delete", e)),
            _ => Ok(()),
        }
    }

    async fn issue_access_url(&self, handle: &FileUploadHandle) -> IngestResult<AccessUrl> {
        let issued_at = chrono::Utc::now();
        let presigned = self
            .operator
            .presign_read(&handle.locator, self.presign_ttl)
            .await
            .map_err(|e| self.map_err("presign", e))?;
        let ttl = chrono::Duration::from_std(self.presign_ttl)
            .map_err(|e| IngestException::InternalError { source: e.into() })?;
        Ok(AccessUrl {
            url: presigned.uri().to_string(),
            expires_at: Some(issued_at + ttl),
        })
    }
}
