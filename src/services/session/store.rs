use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::repos::error::RepoError;
use crate::repos::server_side_session_repo::ServerSideSessionRow;
use crate::services::authorize::context::Subject;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session repository failure")]
    Repo(#[from] RepoError),
    #[error("failed to generate session handle")]
    Handle(#[from] getrandom::Error),
    #[error("session expiry is out of range")]
    ExpiryOutOfRange,
}

/// One signed-in browser. `key` is the hash of the cookie value, never the
/// value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSideSession {
    pub key: String,
    pub session_id: Uuid,
    pub subject_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ServerSideSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn subject(&self) -> Subject {
        Subject::new(
            self.subject_id.clone(),
            self.created_at,
            self.session_id.to_string(),
        )
    }
}

impl From<ServerSideSessionRow> for ServerSideSession {
    fn from(row: ServerSideSessionRow) -> Self {
        Self {
            key: row.key,
            session_id: row.session_id,
            subject_id: row.subject_id,
            display_name: row.display_name,
            created_at: row.created_at,
            renewed_at: row.renewed_at,
            expires_at: row.expires_at,
        }
    }
}

impl From<&ServerSideSession> for ServerSideSessionRow {
    fn from(s: &ServerSideSession) -> Self {
        Self {
            key: s.key.clone(),
            session_id: s.session_id,
            subject_id: s.subject_id.clone(),
            display_name: s.display_name.clone(),
            created_at: s.created_at,
            renewed_at: s.renewed_at,
            expires_at: s.expires_at,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    async fn create(&self, session: &ServerSideSession) -> Result<(), SessionStoreError>;

    async fn get(&self, key: &str) -> Result<Option<ServerSideSession>, SessionStoreError>;

    /// Returns false when the session no longer exists.
    async fn renew(
        &self,
        key: &str,
        renewed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, SessionStoreError>;

    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError>;

    /// Deletes up to `batch_size` sessions expired at `now`; returns how many.
    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, SessionStoreError>;
}
