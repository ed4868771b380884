use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::cache::{CacheClient, CacheError, get_json, put_json};
use crate::services::handle;

const KEY_PREFIX: &str = "code";

/// Everything the token endpoint needs to redeem a code.
///
/// NOTE: only the hash of the code is used as the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodeGrant {
    pub client_id: String,
    pub subject_id: String,
    pub session_id: String,
    pub auth_time: DateTime<Utc>,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CodeStoreError {
    #[error("failed to generate authorization code")]
    Handle(#[from] getrandom::Error),
    #[error("authorization code collision")]
    Collision,
    #[error(transparent)]
    Store(#[from] CacheError),
}

pub struct AuthorizationCodeStore {
    cache: Arc<dyn CacheClient>,
    lifetime: Duration,
}

impl AuthorizationCodeStore {
    pub fn new(cache: Arc<dyn CacheClient>, lifetime_seconds: u64) -> Self {
        Self {
            cache,
            lifetime: Duration::from_secs(lifetime_seconds),
        }
    }

    /// Store the grant and return the opaque code handed to the client.
    pub async fn issue(&self, grant: &AuthorizationCodeGrant) -> Result<String, CodeStoreError> {
        let code = handle::generate()?;

        debug!(
            client_id = %grant.client_id,
            subject_id = %grant.subject_id,
            ttl_seconds = self.lifetime.as_secs(),
            "issuing authorization code"
        );

        if !put_json(self.cache.as_ref(), &Self::key(&code), grant, self.lifetime).await? {
            return Err(CodeStoreError::Collision);
        }
        Ok(code)
    }

    /// Look up a live code; redemption itself belongs to the token endpoint.
    pub async fn lookup(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCodeGrant>, CodeStoreError> {
        Ok(get_json(self.cache.as_ref(), &Self::key(code)).await?)
    }

    fn key(code: &str) -> String {
        format!("{KEY_PREFIX}:{}", handle::storage_key(code))
    }
}
