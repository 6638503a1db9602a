use chrono::{DateTime, Utc};
use modular_storage::SqlitePool;

use crate::error::Error;

pub struct AuditRepo {
    pool: SqlitePool,
}

impl Clone for AuditRepo {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// A stored audit row. `body` is the canonical JSON of the record, `hash`
/// the fingerprint computed over it when it was appended.
#[derive(Debug, sqlx::FromRow)]
pub struct AuditRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub grp: String,
    pub command: String,
    pub body: String,
    pub hash: String,
}

/// Range predicate pushed down to the store.
#[derive(Debug, Default)]
pub struct AuditFilter {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub group: Option<String>,
    pub command: Option<String>,
}

impl AuditRepo {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one record. There is deliberately no update or delete path.
    #[tracing::instrument(skip(self, body, hash))]
    pub async fn append(
        &self,
        timestamp: DateTime<Utc>,
        group: &str,
        command: &str,
        body: &str,
        hash: &str,
    ) -> Result<i64, Error> {
        sqlx::query_scalar(
            "INSERT INTO AUDIT (timestamp, grp, command, body, hash)
            VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(timestamp)
        .bind(group)
        .bind(command)
        .bind(body)
        .bind(hash)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRow>, Error> {
        let mut sql = String::from("SELECT * FROM AUDIT WHERE 1 = 1");
        if filter.from_date.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if filter.to_date.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }
        if filter.group.is_some() {
            sql.push_str(" AND grp = ?");
        }
        if filter.command.is_some() {
            sql.push_str(" AND command = ?");
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_as(&sql);
        if let Some(from_date) = filter.from_date {
            query = query.bind(from_date);
        }
        if let Some(to_date) = filter.to_date {
            query = query.bind(to_date);
        }
        if let Some(group) = filter.group.as_ref() {
            query = query.bind(group.clone());
        }
        if let Some(command) = filter.command.as_ref() {
            query = query.bind(command.clone());
        }

        query.fetch_all(&self.pool).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::repos::tests::pool;

    use super::*;

    #[tokio::test]
    async fn append_and_query() {
        let repo = AuditRepo::new(pool().await);
        let now = Utc::now();

        let first = repo
            .append(now, "m3admin", "aws", r#"{"result":"ok"}"#, "h1")
            .await
            .unwrap();
        let second = repo
            .append(now + Duration::seconds(1), "user", "block", "{}", "h2")
            .await
            .unwrap();
        assert!(second > first);

        let all = repo.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let by_group = repo
            .query(&AuditFilter {
                group: Some("m3admin".into()),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_group.len(), 1);
        assert_eq!(by_group[0].command, "aws");

        let by_range = repo
            .query(&AuditFilter {
                from_date: Some(now + Duration::seconds(1)),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_range.len(), 1);
        assert_eq!(by_range[0].grp, "user");
    }
}
