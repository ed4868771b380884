use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Valkey/Redis-backed grant cache.
///
/// Keys are namespaced (`<namespace>:<key>`) so several deployments can share
/// one instance.
#[derive(Clone, Debug)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
    namespace: String,
}

impl ValkeyClient {
    // Create a client from a URL like `redis://localhost:6379` and check it answers.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let mut manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;
        tracing::debug!(%pong, "valkey reachable");

        Ok(Self {
            manager,
            namespace: namespace.into(),
        })
    }

    fn key(&self, raw: &str) -> String {
        format!("{}:{}", self.namespace, raw)
    }
}

fn command_error(e: redis::RedisError) -> CacheError {
    CacheError::BackendCommand(e.to_string())
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();

        redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(command_error)
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        // `SET key value NX EX <seconds>` answers `OK` when set and nil otherwise.
        let mut conn = self.manager.clone();
        let ttl_seconds: u64 = ttl.as_secs().max(1);

        let resp: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        Ok(resp.is_some())
    }

    async fn take_string(&self, key: &str) -> CacheResult<Option<String>> {
        // GETDEL needs Valkey / Redis 6.2+.
        let mut conn = self.manager.clone();

        redis::cmd("GETDEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(command_error)
    }
}
