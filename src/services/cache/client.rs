//! Short-lived grant storage used by the PAR and authorization-code services.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Kept independent from `AppError`; every caller in this crate treats them
/// as a server error and never as "entry missing".
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::InvalidValue(e.to_string())
    }
}

/// String-keyed store with per-entry expiry.
///
/// Used behind `Arc<dyn CacheClient>` so the backend can be picked at start-up.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    // Backend name for logs.
    fn backend_name(&self) -> &'static str;

    // Get a live UTF-8 value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set value if the key does not exist, with TTL.
    //
    // Returns:
    // - `Ok(true)`  if the key was set
    // - `Ok(false)` if a live entry already exists
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool>;

    // Atomically read and delete a live value. Of several concurrent callers
    // at most one sees `Some`.
    async fn take_string(&self, key: &str) -> CacheResult<Option<String>>;
}

/// Stores `value` as JSON under `key`, failing when the key is already taken.
pub async fn put_json<T: serde::Serialize + Sync>(
    cache: &dyn CacheClient,
    key: &str,
    value: &T,
    ttl: Duration,
) -> CacheResult<bool> {
    let raw = serde_json::to_string(value)?;
    cache.set_if_absent_with_ttl(key, &raw, ttl).await
}

pub async fn get_json<T: serde::de::DeserializeOwned>(
    cache: &dyn CacheClient,
    key: &str,
) -> CacheResult<Option<T>> {
    decode(cache.get_string(key).await?)
}

/// Single-use read: the entry is gone once this returns `Some`.
pub async fn take_json<T: serde::de::DeserializeOwned>(
    cache: &dyn CacheClient,
    key: &str,
) -> CacheResult<Option<T>> {
    decode(cache.take_string(key).await?)
}

fn decode<T: serde::de::DeserializeOwned>(raw: Option<String>) -> CacheResult<Option<T>> {
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}
