/*
 * Responsibility
 * - SQLx access to the server_side_sessions table
 * - the caller decides what `now` is
 *
 * CREATE TABLE server_side_sessions (
 *     key          TEXT        PRIMARY KEY,
 *     session_id   UUID        NOT NULL,
 *     subject_id   TEXT        NOT NULL,
 *     display_name TEXT        NOT NULL,
 *     created_at   TIMESTAMPTZ NOT NULL,
 *     renewed_at   TIMESTAMPTZ NOT NULL,
 *     expires_at   TIMESTAMPTZ NOT NULL
 * );
 * CREATE INDEX server_side_sessions_expires_at ON server_side_sessions (expires_at);
 */
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoResult;

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct ServerSideSessionRow {
    pub key: String,
    pub session_id: Uuid,
    pub subject_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ServerSideSessionRepo {
    pool: PgPool,
}

impl ServerSideSessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, row: &ServerSideSessionRow) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO server_side_sessions
                (key, session_id, subject_id, display_name, created_at, renewed_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&row.key)
        .bind(row.session_id)
        .bind(&row.subject_id)
        .bind(&row.display_name)
        .bind(row.created_at)
        .bind(row.renewed_at)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_key(&self, key: &str) -> RepoResult<Option<ServerSideSessionRow>> {
        let row = sqlx::query_as::<_, ServerSideSessionRow>(
            r#"
            SELECT key, session_id, subject_id, display_name, created_at, renewed_at, expires_at
            FROM server_side_sessions
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // Sliding renewal.
    pub async fn renew(
        &self,
        key: &str,
        renewed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE server_side_sessions
            SET renewed_at = $2, expires_at = $3
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(renewed_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    pub async fn delete(&self, key: &str) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM server_side_sessions WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected())
    }

    // Removes at most `batch_size` expired rows, oldest first.
    pub async fn delete_expired(&self, now: DateTime<Utc>, batch_size: i64) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM server_side_sessions
            WHERE key IN (
                SELECT key
                FROM server_side_sessions
                WHERE expires_at <= $1
                ORDER BY expires_at
                LIMIT $2
            )
            "#,
        )
        .bind(now)
        .bind(batch_size)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}
