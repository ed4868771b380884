use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::services::session::store::{ServerSideSession, SessionStore, SessionStoreError};

/// Process-local session store used when no database is configured.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, ServerSideSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, session: &ServerSideSession) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ServerSideSession>, SessionStoreError> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn renew(
        &self,
        key: &str,
        renewed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(key) else {
            return Ok(false);
        };
        session.renewed_at = renewed_at;
        session.expires_at = expires_at;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.write().await.remove(key).is_some())
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, SessionStoreError> {
        let mut sessions = self.sessions.write().await;

        let mut expired: Vec<(DateTime<Utc>, String)> = sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| (s.expires_at, s.key.clone()))
            .collect();
        expired.sort();
        expired.truncate(usize::try_from(batch_size).unwrap_or(0));

        for (_, key) in &expired {
            sessions.remove(key);
        }
        Ok(expired.len() as u64)
    }
}
