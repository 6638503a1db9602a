use modular_storage::SqlitePool;

use crate::error::Error;

use super::RawRecord;

pub struct UserRepo {
    pool: SqlitePool,
}

impl Clone for UserRepo {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl UserRepo {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, username: &str) -> Result<Option<RawRecord>, Error> {
        sqlx::query_as("SELECT body, hash FROM USERS WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<RawRecord>, Error> {
        sqlx::query_as("SELECT body, hash FROM USERS ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self, body, hash))]
    pub async fn create(&self, username: &str, body: &str, hash: &str) -> Result<(), Error> {
        sqlx::query("INSERT INTO USERS (username, body, hash) VALUES (?, ?, ?)")
            .bind(username)
            .bind(body)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|_| ())
    }

    #[tracing::instrument(skip(self, body, hash))]
    pub async fn update(&self, username: &str, body: &str, hash: &str) -> Result<bool, Error> {
        sqlx::query("UPDATE USERS SET body = ?, hash = ? WHERE username = ?")
            .bind(body)
            .bind(hash)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected() == 1)
    }

    /// Move a record to a new primary key, used by `change_username`.
    #[tracing::instrument(skip(self, body, hash))]
    pub async fn rename(
        &self,
        username: &str,
        new_username: &str,
        body: &str,
        hash: &str,
    ) -> Result<bool, Error> {
        sqlx::query("UPDATE USERS SET username = ?, body = ?, hash = ? WHERE username = ?")
            .bind(new_username)
            .bind(body)
            .bind(hash)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, username: &str) -> Result<bool, Error> {
        sqlx::query("DELETE FROM USERS WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::repos::tests::pool;

    use super::*;

    #[tokio::test]
    async fn crud() {
        let repo = UserRepo::new(pool().await);

        assert!(repo.lookup("alice").await.unwrap().is_none());
        repo.create("alice", r#"{"username":"alice"}"#, "h1")
            .await
            .unwrap();

        let record = repo.lookup("alice").await.unwrap().unwrap();
        assert_eq!(record.body, r#"{"username":"alice"}"#);
        assert_eq!(record.hash, "h1");

        // Duplicate usernames are rejected by the primary key.
        assert!(repo
            .create("alice", r#"{"username":"alice"}"#, "h1")
            .await
            .is_err());

        assert!(repo
            .update("alice", r#"{"username":"alice","groups":[]}"#, "h2")
            .await
            .unwrap());
        assert!(repo
            .rename("alice", "alice2", r#"{"username":"alice2"}"#, "h3")
            .await
            .unwrap());
        assert!(repo.lookup("alice").await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);

        assert!(repo.remove("alice2").await.unwrap());
        assert!(!repo.remove("alice2").await.unwrap());
    }
}
