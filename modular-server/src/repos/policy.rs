use modular_storage::SqlitePool;

use crate::error::Error;

use super::RawRecord;

pub struct PolicyRepo {
    pool: SqlitePool,
}

impl Clone for PolicyRepo {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl PolicyRepo {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, policy_name: &str) -> Result<Option<RawRecord>, Error> {
        sqlx::query_as("SELECT body, hash FROM POLICIES WHERE policy_name = ?")
            .bind(policy_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<RawRecord>, Error> {
        sqlx::query_as("SELECT body, hash FROM POLICIES ORDER BY policy_name")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self, body, hash))]
    pub async fn create(&self, policy_name: &str, body: &str, hash: &str) -> Result<(), Error> {
        sqlx::query("INSERT INTO POLICIES (policy_name, body, hash) VALUES (?, ?, ?)")
            .bind(policy_name)
            .bind(body)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|_| ())
    }

    #[tracing::instrument(skip(self, body, hash))]
    pub async fn update(&self, policy_name: &str, body: &str, hash: &str) -> Result<bool, Error> {
        sqlx::query("UPDATE POLICIES SET body = ?, hash = ? WHERE policy_name = ?")
            .bind(body)
            .bind(hash)
            .bind(policy_name)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, policy_name: &str) -> Result<bool, Error> {
        sqlx::query("DELETE FROM POLICIES WHERE policy_name = ?")
            .bind(policy_name)
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
        let repo = PolicyRepo::new(pool().await);

        repo.create("p1", r#"{"policy_name":"p1"}"#, "h1")
            .await
            .unwrap();
        assert!(repo.create("p1", "{}", "h1").await.is_err());
        assert_eq!(repo.list().await.unwrap().len(), 1);

        assert!(repo.update("p1", r#"{"policy_name":"p1","statements":[]}"#, "h2").await.unwrap());
        assert!(!repo.update("p2", "{}", "h1").await.unwrap());

        assert!(repo.remove("p1").await.unwrap());
        assert!(!repo.remove("p1").await.unwrap());
    }
}
