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
use reqwest::{header::CONTENT_TYPE, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use typed_builder::TypedBuilder;

use crate::infrastructure::config::ExternalDriveConfig;

#[derive(Deserialize)]
struct RemoteFile {
    id: String,
}

/// A third-party hosted drive. Files are viewed on the provider's own page,
/// the raw bytes never come back through this service.
#[derive(TypedBuilder, Clone)]
pub struct ExternalDriveBackendImpl {
    client: reqwest::Client,
    #[builder(setter(into))]
    api_base_url: String,
    #[builder(setter(into))]
    view_base_url: String,
    #[builder(setter(into))]
    access_token: String,
    #[builder(default = 3)]
    max_retries: usize,
    #[builder(default = Duration::from_millis(500))]
    retry_backoff: Duration,
}

impl ExternalDriveBackendImpl {
    pub fn from_config(config: &ExternalDriveConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::builder()
            .client(client)
            .api_base_url(config.api_base_url.as_str())
            .view_base_url(config.view_base_url.as_str())
            .access_token(config.access_token.as_str())
            .max_retries(config.max_retries)
            .retry_backoff(Duration::from_millis(config.retry_backoff_ms))
            .build())
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base_url.trim_end_matches('/'))
    }

    /// Sends the request built by `build`, retrying connection failures,
    /// 429 and 5xx responses with a linear backoff.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> IngestResult<reqwest::Response> {
        let mut times = 0;
        loop {
            times += 1;
            let error = match build().bearer_auth(&self.access_token).send().await {
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    anyhow::anyhow!("External drive responded {}.", response.status())
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_builder() => {
                    return Err(IngestException::InternalError { source: e.into() })
                }
                Err(e) => e.into(),
            };
            if times > self.max_retries {
                return Err(IngestException::BackendUnavailable {
                    backend: BackendKind::ExternalDrive,
                    source: error,
                });
            }
            tracing::debug!(times, error = %error, "Retrying external drive request.");
            tokio::time::sleep(self.retry_backoff * times as u32).await;
        }
    }
}

fn rejected(e: reqwest::Error) -> IngestException {
    IngestException::BackendUnavailable {
        backend: BackendKind::ExternalDrive,
        source: e.into(),
    }
}

#[async_trait]
impl StorageBackend for ExternalDriveBackendImpl {
    fn kind(&self) -> BackendKind {
        BackendKind::ExternalDrive
    }

    async fn write(
        &self,
        target: &ObjectWrite,
        content: &mut ByteStream<'_>,
    ) -> IngestResult<StoredObject> {
        // Buffered so that a retried request can resend the body.
        let mut body = vec![];
        content.read_to_end(&mut body).await?;
        let url = self.files_url();
        let response = self
            .send_with_retry(|| {
                self.client
                    .request(Method::POST, &url)
                    .query(&[("name", target.original_filename.as_str())])
                    .header(CONTENT_TYPE, target.mime_type.as_str())
                    .body(body.clone())
            })
            .await?
            .error_for_status()
            .map_err(rejected)?;
        let remote: RemoteFile = response.json().await.map_err(rejected)?;
        Ok(StoredObject {
            locator: remote.id,
            size_bytes: body.len() as u64,
            checksum: None,
        })
    }

    async fn read(&self, _locator: &str) -> IngestResult<ByteStream<'static>> {
        Err(IngestException::Unsupported {
            backend: BackendKind::ExternalDrive,
            operation: "read",
        })
    }

    async fn delete(&self, locator: &str) -> IngestResult<()> {
        let url = format!("{}/{locator}", self.files_url());
        let response = self.send_with_retry(|| self.client.request(Method::DELETE, &url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status().map_err(rejected)?;
        Ok(())
    }

    async fn issue_access_url(&self, handle: &FileUploadHandle) -> IngestResult<AccessUrl> {
        Ok(AccessUrl {
            url: format!("{}/{}", self.view_base_url.trim_end_matches('/'), handle.locator),
            expires_at: None,
        })
    }
}
