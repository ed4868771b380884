use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repos::server_side_session_repo::{ServerSideSessionRepo, ServerSideSessionRow};
use crate::services::session::store::{ServerSideSession, SessionStore, SessionStoreError};

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    repo: ServerSideSessionRepo,
}

impl PgSessionStore {
    pub fn new(repo: ServerSideSessionRepo) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, session: &ServerSideSession) -> Result<(), SessionStoreError> {
        self.repo.create(&ServerSideSessionRow::from(session)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ServerSideSession>, SessionStoreError> {
        Ok(self.repo.get_by_key(key).await?.map(ServerSideSession::from))
    }

    async fn renew(
        &self,
        key: &str,
        renewed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, SessionStoreError> {
        Ok(self.repo.renew(key, renewed_at, expires_at).await? > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError> {
        Ok(self.repo.delete(key).await? > 0)
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, SessionStoreError> {
        Ok(self.repo.delete_expired(now, batch_size).await?)
    }
}
