use chrono::Utc;
use modular_types::audit::{AuditEntry, AuditQuery, AuditRecord};
use serde_json::Value;

use crate::{
    error::Error,
    integrity::IntegrityService,
    repos::{audit::AuditFilter, Repos},
};

use super::{canonical_body, decode_body};

const MASK: &str = "*****";
const SENSITIVE_MARKERS: [&str; 3] = ["password", "secret", "token"];

/// Append-only audit log with integrity hashes and masked sensitive
/// fields.
#[derive(Clone)]
pub struct AuditStore {
    repos: Repos,
    integrity: IntegrityService,
}

impl AuditStore {
    #[must_use]
    pub fn new(repos: Repos, integrity: IntegrityService) -> Self {
        Self { repos, integrity }
    }

    /// Append one record. Password-like parameter values are masked before
    /// anything touches the store.
    #[tracing::instrument(skip(self, record), fields(group = %record.group, command = %record.command))]
    pub async fn append(&self, mut record: AuditRecord) -> Result<i64, Error> {
        mask_sensitive(&mut record.parameters);
        let body = canonical_body(&record)?;
        let hash = self.integrity.fingerprint(&body);
        self.repos
            .audit
            .append(record.timestamp, &record.group, &record.command, &body, &hash)
            .await
    }

    /// Convenience used by the admin command surface.
    pub async fn log(
        &self,
        group: &str,
        command: &str,
        parameters: Value,
        result: &str,
    ) -> Result<i64, Error> {
        self.append(AuditRecord {
            group: group.to_string(),
            command: command.to_string(),
            parameters,
            result: result.to_string(),
            warnings: vec![],
            timestamp: Utc::now(),
        })
        .await
    }

    /// Query the log. Integrity failures surface as consistency flags,
    /// never by hiding the record.
    #[tracing::instrument(skip(self))]
    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, Error> {
        let filter = AuditFilter {
            from_date: query.from_date,
            to_date: query.to_date,
            group: query.group.clone(),
            command: query.command.clone(),
        };
        let mut entries = vec![];
        for row in self.repos.audit.query(&filter).await? {
            let consistency = self.integrity.verify(&row.body, &row.hash);
            if query.invalid_only && consistency.is_ok() {
                continue;
            }
            entries.push(AuditEntry {
                id: row.id,
                record: decode_body(&row.body)?,
                consistency,
            });
        }
        Ok(entries)
    }
}

fn mask_sensitive(value: &mut Value) {
    if let Value::Object(map) = value {
        for (key, entry) in map.iter_mut() {
            let lowered = key.to_lowercase();
            if SENSITIVE_MARKERS.iter().any(|m| lowered.contains(m)) {
                *entry = Value::String(MASK.to_string());
            } else {
                mask_sensitive(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use modular_types::audit::ConsistencyStatus;
    use serde_json::json;

    use crate::repos::tests::repos;

    use super::*;

    fn integrity() -> IntegrityService {
        IntegrityService::new(b"test-secret-key!")
    }

    #[tokio::test]
    async fn masks_sensitive_parameters() {
        let repos = repos().await;
        let store = AuditStore::new(repos.clone(), integrity());

        store
            .log(
                "user",
                "change_password",
                json!({"username": "alice", "password": "hunter2", "nested": {"api_token": "abc"}}),
                "succeeded",
            )
            .await
            .unwrap();

        let entries = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.parameters["password"], json!(MASK));
        assert_eq!(entries[0].record.parameters["nested"]["api_token"], json!(MASK));
        assert_eq!(entries[0].record.parameters["username"], json!("alice"));
        assert_eq!(entries[0].consistency, ConsistencyStatus::Ok);
    }

    #[tokio::test]
    async fn query_filters() {
        let store = AuditStore::new(repos().await, integrity());
        store
            .log("m3admin", "aws", json!({}), "succeeded")
            .await
            .unwrap();
        store
            .log("user", "block", json!({}), "succeeded")
            .await
            .unwrap();

        let by_command = store
            .query(&AuditQuery {
                command: Some("aws".into()),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_command.len(), 1);
        assert_eq!(by_command[0].record.group, "m3admin");

        let future = store
            .query(&AuditQuery {
                from_date: Some(Utc::now() + Duration::hours(1)),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn tampering_surfaces_as_compromised() {
        let repos = repos().await;
        let store = AuditStore::new(repos.clone(), integrity());
        let id = store
            .log("m3admin", "aws", json!({"region": "eu-central-1"}), "succeeded")
            .await
            .unwrap();

        sqlx::query("UPDATE AUDIT SET body = REPLACE(body, 'eu-central-1', 'us-east-1') WHERE id = ?")
            .bind(id)
            .execute(&repos.pool)
            .await
            .unwrap();

        let entries = store
            .query(&AuditQuery {
                invalid_only: true,
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].consistency, ConsistencyStatus::Compromised);
    }
}
