use modular_storage::SqlitePool;

use crate::error::Error;

use super::RawRecord;

pub struct GroupRepo {
    pool: SqlitePool,
}

impl Clone for GroupRepo {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl GroupRepo {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, group_name: &str) -> Result<Option<RawRecord>, Error> {
        sqlx::query_as("SELECT body, hash FROM GROUPS WHERE group_name = ?")
            .bind(group_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<RawRecord>, Error> {
        sqlx::query_as("SELECT body, hash FROM GROUPS ORDER BY group_name")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self, body, hash))]
    pub async fn create(&self, group_name: &str, body: &str, hash: &str) -> Result<(), Error> {
        sqlx::query("INSERT INTO GROUPS (group_name, body, hash) VALUES (?, ?, ?)")
            .bind(group_name)
            .bind(body)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|_| ())
    }

    #[tracing::instrument(skip(self, body, hash))]
    pub async fn update(&self, group_name: &str, body: &str, hash: &str) -> Result<bool, Error> {
        sqlx::query("UPDATE GROUPS SET body = ?, hash = ? WHERE group_name = ?")
            .bind(body)
            .bind(hash)
            .bind(group_name)
            .execute(&self.pool)
            .await
            .map_err(Into::into)
            .map(|res| res.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, group_name: &str) -> Result<bool, Error> {
        sqlx::query("DELETE FROM GROUPS WHERE group_name = ?")
            .bind(group_name)
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
        let repo = GroupRepo::new(pool().await);

        repo.create("g1", r#"{"group_name":"g1"}"#, "h1")
            .await
            .unwrap();
        assert!(repo.create("g1", "{}", "h1").await.is_err());

        assert!(repo.update("g1", r#"{"group_name":"g1","policies":["p1"]}"#, "h2").await.unwrap());
        let record = repo.lookup("g1").await.unwrap().unwrap();
        assert_eq!(record.hash, "h2");

        assert!(repo.remove("g1").await.unwrap());
        assert!(repo.lookup("g1").await.unwrap().is_none());
    }
}
