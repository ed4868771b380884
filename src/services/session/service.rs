use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::services::handle;
use crate::services::session::store::{ServerSideSession, SessionStore, SessionStoreError};
use crate::services::users::TestUser;

/// Cookie-to-session lifecycle: start, look up with sliding renewal, end and
/// periodic cleanup.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    lifetime: ChronoDuration,
    sliding: bool,
    cleanup_batch_size: i64,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("backend", &self.store.backend_name())
            .field("lifetime", &self.lifetime)
            .field("sliding", &self.sliding)
            .finish()
    }
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        lifetime_seconds: u64,
        sliding: bool,
        cleanup_batch_size: i64,
    ) -> Self {
        Self {
            store,
            lifetime: i64::try_from(lifetime_seconds)
                .ok()
                .and_then(ChronoDuration::try_seconds)
                .unwrap_or(ChronoDuration::MAX),
            sliding,
            cleanup_batch_size: cleanup_batch_size.max(1),
        }
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Starts a session for `user`. Returns the cookie value and the stored session.
    #[tracing::instrument(skip_all, fields(subject_id = %user.subject_id))]
    pub async fn start(
        &self,
        user: &TestUser,
        now: DateTime<Utc>,
    ) -> Result<(String, ServerSideSession), SessionStoreError> {
        let expires_at = self.expiry(now)?;
        let cookie = handle::generate()?;
        let session = ServerSideSession {
            key: handle::storage_key(&cookie),
            session_id: Uuid::new_v4(),
            subject_id: user.subject_id.clone(),
            display_name: user.display_name().to_string(),
            created_at: now,
            renewed_at: now,
            expires_at,
        };
        self.store.create(&session).await?;

        info!(session_id = %session.session_id, "session started");
        Ok((cookie, session))
    }

    /// Resolves the cookie to a live session.
    ///
    /// Expired sessions are removed on sight. With sliding expiration the
    /// session is extended once more than half of its lifetime has passed.
    pub async fn current(
        &self,
        cookie: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServerSideSession>, SessionStoreError> {
        let key = handle::storage_key(cookie);
        let Some(mut session) = self.store.get(&key).await? else {
            return Ok(None);
        };

        if session.is_expired(now) {
            debug!(session_id = %session.session_id, "session expired");
            self.store.delete(&key).await?;
            return Ok(None);
        }

        if self.sliding && now - session.renewed_at >= self.lifetime / 2 {
            let expires_at = self.expiry(now)?;
            if !self.store.renew(&key, now, expires_at).await? {
                return Ok(None);
            }
            debug!(session_id = %session.session_id, %expires_at, "session renewed");
            session.renewed_at = now;
            session.expires_at = expires_at;
        }

        Ok(Some(session))
    }

    fn expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SessionStoreError> {
        now.checked_add_signed(self.lifetime)
            .ok_or(SessionStoreError::ExpiryOutOfRange)
    }

    /// Removes the session behind `cookie`, returning it if it existed.
    pub async fn end(&self, cookie: &str) -> Result<Option<ServerSideSession>, SessionStoreError> {
        let key = handle::storage_key(cookie);
        let session = self.store.get(&key).await?;
        if session.is_some() {
            self.store.delete(&key).await?;
        }
        if let Some(s) = &session {
            info!(session_id = %s.session_id, subject_id = %s.subject_id, "session ended");
        }
        Ok(session)
    }

    /// Deletes every session expired at `now`, one batch at a time.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionStoreError> {
        let mut total = 0;
        loop {
            let removed = self.store.delete_expired(now, self.cleanup_batch_size).await?;
            total += removed;
            if removed < self.cleanup_batch_size as u64 {
                break;
            }
        }
        Ok(total)
    }

    /// Runs `sweep_expired` every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => match self.sweep_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "expired sessions removed"),
                        Err(e) => error!(error = %e, "session cleanup failed"),
                    },
                }
            }
            debug!("session sweeper stopped");
        })
    }
}
