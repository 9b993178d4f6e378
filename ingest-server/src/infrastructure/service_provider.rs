use std::{sync::Arc, time::Duration};

use anyhow::bail;
use domain_ingest::{
    memory::MemoryRepo,
    repository::{DedupIndexRepo, FileHandleRepo, UploadSessionRepo},
    service::{IngestionService, StorageBackend},
};
use service_ingest::{
    Blake3ContentHasherImpl, DedupIndexServiceImpl, IngestionServiceImpl, LocalChunkAssemblerImpl,
    LocalStorageBackendImpl, StorageBackendRegistry,
};

use super::{
    config::{BackendsConfig, HostConfig, IngestConfig, StoreConfig},
    database::{RedisClient, RedisRepository},
    service::{ExternalDriveBackendImpl, ObjectStoreBackendImpl},
};
use crate::background_service::prelude::*;

struct Repositories {
    session: Arc<dyn UploadSessionRepo>,
    handle: Arc<dyn FileHandleRepo>,
    dedup: Arc<dyn DedupIndexRepo>,
}

impl Repositories {
    fn over<R>(repo: Arc<R>) -> Self
    where
        R: UploadSessionRepo + FileHandleRepo + DedupIndexRepo + 'static,
    {
        Self {
            session: repo.clone(),
            handle: repo.clone(),
            dedup: repo,
        }
    }
}

/// Everything the host needs, wired once at startup.
#[derive(Clone)]
pub struct ServiceProvider {
    pub config: IngestConfig,
    pub ingestion_service: Arc<dyn IngestionService>,
    pub background_services: Vec<Arc<dyn BackgroundService>>,
}

impl ServiceProvider {
    pub async fn from_config(config: IngestConfig) -> anyhow::Result<Self> {
        let repositories = match &config.store {
            StoreConfig::Memory => Repositories::over(Arc::new(MemoryRepo::new())),
            StoreConfig::Redis(redis) => Repositories::over(Arc::new(
                RedisRepository::builder()
                    .client(RedisClient::connect(&redis.urls).await?)
                    .lock_retries(redis.lock_retries)
                    .lock_retry_interval(Duration::from_millis(redis.lock_retry_interval_ms))
                    .lock_lease_ms(redis.lock_lease_ms)
                    .build(),
            )),
        };

        let content_hasher = Arc::new(Blake3ContentHasherImpl);
        let backends = build_backends(&config.backends, &config.host, content_hasher.clone())?;

        let ingestion_service: Arc<dyn IngestionService> = Arc::new(
            IngestionServiceImpl::builder()
                .session_repo(repositories.session.clone())
                .handle_repo(repositories.handle)
                .chunk_assembler(Arc::new(
                    LocalChunkAssemblerImpl::builder()
                        .base(config.upload.staging_dir.as_str())
                        .session_repo(repositories.session)
                        .build(),
                ))
                .content_hasher(content_hasher)
                .dedup_index(Arc::new(
                    DedupIndexServiceImpl::builder().repo(repositories.dedup).build(),
                ))
                .backends(Arc::new(backends))
                .max_chunk_size(config.upload.max_chunk_size)
                .session_ttl(config.upload.session_ttl())
                .finalize_timeout(config.upload.finalize_timeout())
                .build(),
        );

        let session_sweeper: Arc<dyn BackgroundService> = Arc::new(
            SessionSweeper::builder()
                .service(ingestion_service.clone())
                .interval(config.upload.sweep_interval())
                .build(),
        );

        Ok(Self {
            config,
            ingestion_service,
            background_services: vec![session_sweeper],
        })
    }
}

fn build_backends(
    config: &BackendsConfig,
    host: &HostConfig,
    content_hasher: Arc<Blake3ContentHasherImpl>,
) -> anyhow::Result<StorageBackendRegistry> {
    let local: Arc<dyn StorageBackend> = Arc::new(
        LocalStorageBackendImpl::builder()
            .root(config.local.root.as_str())
            .proxy_base_url(format!(
                "{}/file-ingest/handles",
                host.public_base_url.trim_end_matches('/')
            ))
            .content_hasher(content_hasher)
            .build(),
    );
    let mut backends = vec![local];
    if let Some(object_store) = &config.object_store {
        backends.push(Arc::new(ObjectStoreBackendImpl::from_config(object_store)?));
    }
    if let Some(external_drive) = &config.external_drive {
        backends.push(Arc::new(ExternalDriveBackendImpl::from_config(external_drive)?));
    }

    let registry = StorageBackendRegistry::builder()
        .backends(backends)
        .default_backend(config.default)
        .purpose_overrides(config.purpose_overrides.clone())
        .build();
    if !registry.is_configured(config.default) {
        bail!("Default storage backend: {} has no configuration section.", config.default);
    }
    for (purpose, kind) in &config.purpose_overrides {
        if !registry.is_configured(*kind) {
            bail!("Storage backend: {kind} for purpose {purpose:?} has no configuration section.");
        }
    }
    Ok(registry)
}
