use chrono::{DateTime, Utc};
use modular_storage::SqlitePool;

use crate::error::Error;

pub struct TokenRepo {
    pool: SqlitePool,
}

impl Clone for TokenRepo {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// One allowlisted token.
#[derive(Debug, sqlx::FromRow)]
pub struct TokenEntry {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRepo {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip_all)]
    pub async fn create(&self, entry: &TokenEntry) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO TOKENS (token, username, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.token)
        .bind(&entry.username)
        .bind(entry.issued_at)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .map_err(Into::into)
        .map(|_| ())
    }

    /// Look up a live allowlist entry. Expired rows are treated as absent.
    #[tracing::instrument(skip_all)]
    pub async fn lookup_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenEntry>, Error> {
        sqlx::query_as("SELECT * FROM TOKENS WHERE token = ? AND expires_at > ?")
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip_all)]
    pub async fn remove(&self, token: &str) -> Result<bool, Error> {
        sqlx::query("DELETE FROM TOKENS WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected() == 1)
    }

    /// Revoke every token issued to a user. Used by logout-all paths:
    /// block, password change and rename.
    #[tracing::instrument(skip(self))]
    pub async fn remove_all(&self, username: &str) -> Result<u64, Error> {
        sqlx::query("DELETE FROM TOKENS WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected())
    }
}
