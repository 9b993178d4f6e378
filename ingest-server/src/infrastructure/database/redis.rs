use std::time::Duration;

use anyhow::bail;
use redis::{aio::ConnectionManager, cluster_async::ClusterConnection, Cmd, FromRedisValue, Script};
use typed_builder::TypedBuilder;
use uuid::Uuid;

const RELEASE_LOCK: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

#[derive(Clone)]
pub enum RedisClient {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl RedisClient {
    /// One url connects to a single node, several to a cluster.
    pub async fn connect(urls: &[String]) -> anyhow::Result<Self> {
        let urls = urls
            .iter()
            .map(|url| {
                if url.starts_with("redis://") || url.starts_with("rediss://") {
                    url.to_owned()
                } else {
                    format!("redis://{url}")
                }
            })
            .collect::<Vec<_>>();
        Ok(match urls.as_slice() {
            [] => bail!("No redis url is configured."),
            [single] => RedisClient::Single(
                redis::Client::open(single.as_str())?.get_connection_manager().await?,
            ),
            many => RedisClient::Cluster(
                redis::cluster::ClusterClient::new(many.to_vec())?.get_async_connection().await?,
            ),
        })
    }

    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> redis::RedisResult<T> {
        match self {
            RedisClient::Single(c) => cmd.query_async(&mut c.clone()).await,
            RedisClient::Cluster(c) => cmd.query_async(&mut c.clone()).await,
        }
    }

    async fn eval<T: FromRedisValue>(
        &self,
        script: &Script,
        key: &str,
        arg: &str,
    ) -> redis::RedisResult<T> {
        let mut invocation = script.prepare_invoke();
        invocation.key(key).arg(arg);
        match self {
            RedisClient::Single(c) => invocation.invoke_async(&mut c.clone()).await,
            RedisClient::Cluster(c) => invocation.invoke_async(&mut c.clone()).await,
        }
    }
}

/// Every repository of the ingestion subsystem, kept in redis.
///
/// Read-modify-write updates of one record go through a short lived lock
/// (`SET NX PX`) so that any worker may serve any session.
#[derive(TypedBuilder, Clone)]
pub struct RedisRepository {
    pub client: RedisClient,
    #[builder(default = 50)]
    lock_retries: usize,
    #[builder(default = Duration::from_millis(20))]
    lock_retry_interval: Duration,
    #[builder(default = 10_000)]
    lock_lease_ms: u64,
}

impl RedisRepository {
    async fn acquire_lock(&self, key: &str) -> anyhow::Result<String> {
        let token = Uuid::new_v4().to_string();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(&token).arg("NX").arg("PX").arg(self.lock_lease_ms);
        for _ in 0..self.lock_retries {
            let acquired: Option<String> = self.client.query(&cmd).await?;
            if acquired.is_some() {
                return Ok(token);
            }
            tokio::time::sleep(self.lock_retry_interval).await;
        }
        bail!("Failed lock retry for key: {key}!")
    }

    async fn release_lock(&self, key: &str, token: &str) {
        let script = Script::new(RELEASE_LOCK);
        if let Err(e) = self.client.eval::<i64>(&script, key, token).await {
            // The lease expires by itself.
            tracing::warn!(key, error = %e, "Failed to release redis lock.");
        }
    }

    /// Runs `f` while holding the lock named `key`.
    pub async fn locked<T, F, Fut>(&self, key: &str, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let token = self.acquire_lock(key).await?;
        let result = f().await;
        self.release_lock(key, &token).await;
        result
    }
}
