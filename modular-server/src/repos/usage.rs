use modular_storage::SqlitePool;

use crate::error::Error;

/// Windows older than this are garbage collected opportunistically on
/// increment.
const WINDOW_RETENTION_SECS: i64 = 10;

pub struct UsageRepo {
    pool: SqlitePool,
}

impl Clone for UsageRepo {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl UsageRepo {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Increment the fixed-window counter for `(username, route, window)`
    /// and return the count after the increment. The upsert keyed by the
    /// window second makes concurrent increments from multiple workers
    /// safe without a transaction.
    #[tracing::instrument(skip(self))]
    pub async fn increment(
        &self,
        username: &str,
        route: &str,
        window: i64,
    ) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar(
            "INSERT INTO USAGE_COUNTERS (username, route, window, count)
            VALUES (?, ?, ?, 1)
            ON CONFLICT (username, route, window) DO UPDATE SET count = count + 1
            RETURNING count",
        )
        .bind(username)
        .bind(route)
        .bind(window)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::from)?;

        sqlx::query("DELETE FROM USAGE_COUNTERS WHERE window < ?")
            .bind(window - WINDOW_RETENTION_SECS)
            .execute(&self.pool)
            .await?;

        Ok(count)
    }
}
