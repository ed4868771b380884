//! Pushed authorization requests (RFC 9126).
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::authorize::request::{AuthorizeParameters, ParameterError};
use crate::services::cache::{CacheClient, CacheError, get_json, put_json, take_json};
use crate::services::clients::ClientConfig;
use crate::services::handle;

pub const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";
const KEY_PREFIX: &str = "par";

#[derive(Debug, Error)]
pub enum ParError {
    #[error("invalid pushed parameters: {0:?}")]
    InvalidParameters(ParameterError),
    #[error("pushed request rejected: {0}")]
    Rejected(&'static str),
    #[error("pushed request lifetime of {0}s is out of range")]
    LifetimeOutOfRange(u64),
    #[error("failed to generate request handle")]
    Handle(#[from] getrandom::Error),
    #[error(transparent)]
    Store(#[from] CacheError),
}

/// What is kept between the PAR call and the front-channel redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedAuthorizationRequest {
    pub client_id: String,
    pub parameters: AuthorizeParameters,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedAuthorization {
    pub request_uri: String,
    pub expires_in: u64,
}

pub struct PushedAuthorizationService {
    cache: Arc<dyn CacheClient>,
    lifetime_seconds: u64,
    allow_unregistered_redirect_uris: bool,
}

impl std::fmt::Debug for PushedAuthorizationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushedAuthorizationService")
            .field("backend", &self.cache.backend_name())
            .field("lifetime_seconds", &self.lifetime_seconds)
            .finish()
    }
}

impl PushedAuthorizationService {
    pub fn new(
        cache: Arc<dyn CacheClient>,
        lifetime_seconds: u64,
        allow_unregistered_redirect_uris: bool,
    ) -> Self {
        Self {
            cache,
            lifetime_seconds,
            allow_unregistered_redirect_uris,
        }
    }

    pub fn allow_unregistered_redirect_uris(&self) -> bool {
        self.allow_unregistered_redirect_uris
    }

    /// Validate and store the parameters of an authenticated client.
    pub async fn push(
        &self,
        client: &ClientConfig,
        mut parameters: AuthorizeParameters,
    ) -> Result<PushedAuthorization, ParError> {
        parameters.client_id = client.client_id.clone();

        parameters
            .validate(client, true, self.allow_unregistered_redirect_uris)
            .map_err(ParError::InvalidParameters)?;

        let handle = handle::generate()?;
        let request_uri = format!("{REQUEST_URI_PREFIX}{handle}");
        let expires_at = i64::try_from(self.lifetime_seconds)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or(ParError::LifetimeOutOfRange(self.lifetime_seconds))?;

        let stored = PushedAuthorizationRequest {
            client_id: client.client_id.clone(),
            parameters,
            expires_at,
        };

        let inserted = put_json(
            self.cache.as_ref(),
            &Self::key(&handle),
            &stored,
            Duration::from_secs(self.lifetime_seconds),
        )
        .await?;
        if !inserted {
            // 256-bit handles; a collision means the store is misbehaving.
            warn!("pushed request handle collision");
            return Err(ParError::Rejected("request handle already in use"));
        }

        info!(
            client_id = %client.client_id,
            client_name = %client.client_name,
            expires_at = %expires_at,
            "pushed authorization request stored"
        );

        Ok(PushedAuthorization {
            request_uri,
            expires_in: self.lifetime_seconds,
        })
    }

    /// Look up a live pushed request that belongs to `client_id`.
    ///
    /// The request stays stored; use `redeem` once the flow is answered.
    pub async fn resolve(
        &self,
        client_id: &str,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParError> {
        let Some(handle) = request_uri.strip_prefix(REQUEST_URI_PREFIX) else {
            debug!("request_uri without the PAR prefix");
            return Ok(None);
        };

        let stored = get_json(self.cache.as_ref(), &Self::key(handle)).await?;
        Ok(Self::usable(stored, client_id, now))
    }

    /// Atomically remove the pushed request and return it.
    ///
    /// Concurrent callers race on one delete; only the winner gets `Some`.
    pub async fn redeem(
        &self,
        client_id: &str,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParError> {
        let Some(handle) = request_uri.strip_prefix(REQUEST_URI_PREFIX) else {
            return Ok(None);
        };

        let taken = take_json(self.cache.as_ref(), &Self::key(handle)).await?;
        Ok(Self::usable(taken, client_id, now))
    }

    fn usable(
        stored: Option<PushedAuthorizationRequest>,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Option<PushedAuthorizationRequest> {
        match stored {
            Some(req) if req.client_id != client_id => {
                warn!(
                    client_id = %client_id,
                    owner = %req.client_id,
                    "request_uri presented by a different client"
                );
                None
            }
            Some(req) if req.expires_at <= now => {
                debug!(expires_at = %req.expires_at, "pushed request expired");
                None
            }
            other => other,
        }
    }

    fn key(handle: &str) -> String {
        format!("{KEY_PREFIX}:{}", handle::storage_key(handle))
    }
}
