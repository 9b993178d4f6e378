use std::{collections::HashMap, time::Duration};

use domain_ingest::model::vo::{BackendKind, Purpose};
use serde::Deserialize;

use super::telemetry::TelemetryConfig;

#[derive(Default, Clone, Deserialize, Debug)]
pub struct IngestConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
}

#[derive(Clone, Deserialize, Debug)]
pub struct HostConfig {
    #[serde(default = "HostConfig::default_address")]
    pub bind_address: String,
    #[serde(default = "HostConfig::default_port")]
    pub bind_port: u16,
    /// Externally visible base url, used to build proxy links of local files.
    #[serde(default = "HostConfig::default_public_base_url")]
    pub public_base_url: String,
    /// Upper bound of a whole file upload body.
    #[serde(default = "HostConfig::default_max_whole_size")]
    pub max_whole_size: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::default_address(),
            bind_port: Self::default_port(),
            public_base_url: Self::default_public_base_url(),
            max_whole_size: Self::default_max_whole_size(),
        }
    }
}

impl HostConfig {
    fn default_address() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        80
    }
    fn default_public_base_url() -> String {
        "http://localhost".to_string()
    }
    fn default_max_whole_size() -> u64 {
        32 * 1024 * 1024
    }
}

#[derive(Clone, Deserialize, Debug, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process local, only suitable for a single worker.
    #[default]
    Memory,
    Redis(RedisConfig),
}

#[derive(Clone, Deserialize, Debug)]
pub struct RedisConfig {
    #[serde(default = "RedisConfig::default_urls")]
    pub urls: Vec<String>,
    #[serde(default = "RedisConfig::default_lock_retries")]
    pub lock_retries: usize,
    #[serde(default = "RedisConfig::default_lock_retry_interval_ms")]
    pub lock_retry_interval_ms: u64,
    #[serde(default = "RedisConfig::default_lock_lease_ms")]
    pub lock_lease_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            urls: Self::default_urls(),
            lock_retries: Self::default_lock_retries(),
            lock_retry_interval_ms: Self::default_lock_retry_interval_ms(),
            lock_lease_ms: Self::default_lock_lease_ms(),
        }
    }
}

impl RedisConfig {
    fn default_urls() -> Vec<String> {
        vec!["localhost:6379".to_string()]
    }
    fn default_lock_retries() -> usize {
        50
    }
    fn default_lock_retry_interval_ms() -> u64 {
        20
    }
    fn default_lock_lease_ms() -> u64 {
        10_000
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct UploadConfig {
    /// Shared by every worker when running more than one.
    #[serde(default = "UploadConfig::default_staging_dir")]
    pub staging_dir: String,
    #[serde(default = "UploadConfig::default_max_chunk_size")]
    pub max_chunk_size: u64,
    #[serde(default = "UploadConfig::default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "UploadConfig::default_finalize_timeout_secs")]
    pub finalize_timeout_secs: u64,
    #[serde(default = "UploadConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            staging_dir: Self::default_staging_dir(),
            max_chunk_size: Self::default_max_chunk_size(),
            session_ttl_secs: Self::default_session_ttl_secs(),
            finalize_timeout_secs: Self::default_finalize_timeout_secs(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

impl UploadConfig {
    fn default_staging_dir() -> String {
        "data".to_string()
    }
    fn default_max_chunk_size() -> u64 {
        8 * 1024 * 1024
    }
    fn default_session_ttl_secs() -> u64 {
        24 * 60 * 60
    }
    fn default_finalize_timeout_secs() -> u64 {
        10 * 60
    }
    fn default_sweep_interval_secs() -> u64 {
        5 * 60
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct BackendsConfig {
    #[serde(default = "BackendsConfig::default_backend")]
    pub default: BackendKind,
    #[serde(default)]
    pub purpose_overrides: HashMap<Purpose, BackendKind>,
    #[serde(default)]
    pub local: LocalBackendConfig,
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
    #[serde(default)]
    pub external_drive: Option<ExternalDriveConfig>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            default: Self::default_backend(),
            purpose_overrides: Default::default(),
            local: Default::default(),
            object_store: None,
            external_drive: None,
        }
    }
}

impl BackendsConfig {
    fn default_backend() -> BackendKind {
        BackendKind::Local
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct LocalBackendConfig {
    #[serde(default = "LocalBackendConfig::default_root")]
    pub root: String,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
        }
    }
}

impl LocalBackendConfig {
    fn default_root() -> String {
        "data/objects".to_string()
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "ObjectStoreConfig::default_region")]
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Key prefix inside the bucket.
    #[serde(default = "ObjectStoreConfig::default_root")]
    pub root: String,
    #[serde(default = "ObjectStoreConfig::default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "ObjectStoreConfig::default_presign_secs")]
    pub presign_secs: u64,
}

impl ObjectStoreConfig {
    fn default_region() -> String {
        "us-east-1".to_string()
    }
    fn default_root() -> String {
        "file-ingest".to_string()
    }
    fn default_max_retries() -> usize {
        3
    }
    fn default_presign_secs() -> u64 {
        15 * 60
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct ExternalDriveConfig {
    /// Base of the provider's file api, e.g. `https://drive.example.com/api/v1`.
    pub api_base_url: String,
    /// Base of the provider's own view page, the remote id is appended.
    pub view_base_url: String,
    pub access_token: String,
    #[serde(default = "ExternalDriveConfig::default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "ExternalDriveConfig::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "ExternalDriveConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ExternalDriveConfig {
    fn default_max_retries() -> usize {
        3
    }
    fn default_retry_backoff_ms() -> u64 {
        500
    }
    fn default_request_timeout_secs() -> u64 {
        60
    }
}

/// `config.yaml`, any yaml given on the command line, then `INGEST__*`
/// environment variables.
pub fn build_config() -> anyhow::Result<config::Config> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = config::Config::builder().add_source(
        config::File::with_name("config")
            .required(false)
            .format(config::FileFormat::Yaml),
    );
    for arg in args {
        if arg.ends_with("yaml") || arg.ends_with("yml") {
            config = config.add_source(
                config::File::from(std::path::Path::new(arg.as_str()))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }
    }
    config = config.add_source(
        config::Environment::with_prefix("INGEST")
            .separator("__")
            .try_parsing(true)
            .list_separator(";")
            .with_list_parse_key("store.urls"),
    );
    Ok(config.build()?)
}
