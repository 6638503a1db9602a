use chrono::Utc;
use modular_types::{
    audit::ConsistencyStatus,
    entity::{valid_entity_name, Group},
    policy::{Policy, Statement},
};

use crate::{
    error::{Error, ErrorType},
    integrity::IntegrityService,
    repos::Repos,
};

use super::{canonical_body, decode_body};

/// CRUD surface for policies.
#[derive(Clone)]
pub struct PolicyStore {
    repos: Repos,
    integrity: IntegrityService,
}

impl PolicyStore {
    #[must_use]
    pub fn new(repos: Repos, integrity: IntegrityService) -> Self {
        Self { repos, integrity }
    }

    fn validate_statements(statements: &[Statement]) -> Result<(), Error> {
        if statements.is_empty() {
            return Err(ErrorType::InvalidPayload(
                "A policy must carry at least one statement".into(),
            )
            .into());
        }
        if statements.iter().any(|s| s.resources.is_empty()) {
            return Err(ErrorType::InvalidPayload(
                "Every statement must list at least one resource pattern".into(),
            )
            .into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, statements))]
    pub async fn create(
        &self,
        policy_name: &str,
        statements: Vec<Statement>,
    ) -> Result<Policy, Error> {
        if !valid_entity_name(policy_name) {
            return Err(ErrorType::InvalidPayload(format!(
                "`{policy_name}` is not a valid policy name"
            ))
            .into());
        }
        Self::validate_statements(&statements)?;
        if self.repos.policy.lookup(policy_name).await?.is_some() {
            return Err(ErrorType::AlreadyExists(format!(
                "Policy `{policy_name}` already exists"
            ))
            .into());
        }

        let policy = Policy::new(policy_name.to_string(), statements, Utc::now());
        let body = canonical_body(&policy)?;
        let hash = self.integrity.fingerprint(&body);
        self.repos.policy.create(policy_name, &body, &hash).await?;
        Ok(policy)
    }

    /// Replace the statements of an existing policy. Statement order is
    /// preserved for describe; evaluation ignores it.
    #[tracing::instrument(skip(self, statements))]
    pub async fn update(
        &self,
        policy_name: &str,
        statements: Vec<Statement>,
    ) -> Result<Policy, Error> {
        Self::validate_statements(&statements)?;
        let Some((mut policy, _)) = self.lookup(policy_name).await? else {
            return Err(ErrorType::NotFound(format!("Policy `{policy_name}` not found")).into());
        };
        policy.statements = statements;
        policy.last_modification_date = Utc::now();
        let body = canonical_body(&policy)?;
        let hash = self.integrity.fingerprint(&body);
        if !self.repos.policy.update(policy_name, &body, &hash).await? {
            return Err(ErrorType::NotFound(format!("Policy `{policy_name}` not found")).into());
        }
        Ok(policy)
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(
        &self,
        policy_name: &str,
    ) -> Result<Option<(Policy, ConsistencyStatus)>, Error> {
        match self.repos.policy.lookup(policy_name).await? {
            Some(record) => {
                let consistency = self.integrity.verify(&record.body, &record.hash);
                Ok(Some((decode_body(&record.body)?, consistency)))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<(Policy, ConsistencyStatus)>, Error> {
        let mut policies = vec![];
        for record in self.repos.policy.list().await? {
            let consistency = self.integrity.verify(&record.body, &record.hash);
            policies.push((decode_body(&record.body)?, consistency));
        }
        Ok(policies)
    }

    /// Groups currently referencing the policy. Deletion is refused while
    /// any exist.
    #[tracing::instrument(skip(self))]
    pub async fn referencing_groups(&self, policy_name: &str) -> Result<Vec<String>, Error> {
        let mut referencing = vec![];
        for record in self.repos.group.list().await? {
            let group: Group = decode_body(&record.body)?;
            if group.policies.iter().any(|p| p == policy_name) {
                referencing.push(group.group_name);
            }
        }
        Ok(referencing)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, policy_name: &str) -> Result<(), Error> {
        let referencing = self.referencing_groups(policy_name).await?;
        if !referencing.is_empty() {
            return Err(ErrorType::InvalidState(format!(
                "Policy `{policy_name}` is attached to groups: {}",
                referencing.join(", ")
            ))
            .into());
        }
        if !self.repos.policy.remove(policy_name).await? {
            return Err(ErrorType::NotFound(format!("Policy `{policy_name}` not found")).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use modular_types::policy::Effect;

    use crate::{repos::tests::repos, store::GroupStore};

    use super::*;

    fn integrity() -> IntegrityService {
        IntegrityService::new(b"test-secret-key!")
    }

    fn statement(effect: Effect, resources: &[&str]) -> Statement {
        Statement {
            effect,
            module: "m3admin".into(),
            resources: resources.iter().map(|r| r.parse().unwrap()).collect(),
            description: None,
        }
    }

    #[tokio::test]
    async fn create_describe_round_trip() {
        let store = PolicyStore::new(repos().await, integrity());
        let statements = vec![
            statement(Effect::Allow, &["aws", "tenant:*"]),
            statement(Effect::Deny, &["tenant:delete"]),
        ];
        store.create("p1", statements.clone()).await.unwrap();

        // Describe returns the exact statements submitted, in order.
        let (policy, consistency) = store.lookup("p1").await.unwrap().unwrap();
        assert_eq!(policy.statements, statements);
        assert_eq!(consistency, ConsistencyStatus::Ok);
    }

    #[tokio::test]
    async fn rejects_empty_statements() {
        let store = PolicyStore::new(repos().await, integrity());
        assert!(store.create("p1", vec![]).await.is_err());

        let mut empty_resources = statement(Effect::Allow, &["aws"]);
        empty_resources.resources.clear();
        assert!(store.create("p1", vec![empty_resources]).await.is_err());
    }

    #[tokio::test]
    async fn update_recomputes_hash() {
        let repos = repos().await;
        let store = PolicyStore::new(repos.clone(), integrity());
        store
            .create("p1", vec![statement(Effect::Allow, &["aws"])])
            .await
            .unwrap();
        let before = repos.policy.lookup("p1").await.unwrap().unwrap();

        store
            .update("p1", vec![statement(Effect::Deny, &["aws"])])
            .await
            .unwrap();
        let after = repos.policy.lookup("p1").await.unwrap().unwrap();
        assert_ne!(before.hash, after.hash);
        assert_eq!(
            store.lookup("p1").await.unwrap().unwrap().1,
            ConsistencyStatus::Ok
        );
    }

    #[tokio::test]
    async fn delete_refused_while_referenced() {
        let repos = repos().await;
        let store = PolicyStore::new(repos.clone(), integrity());
        let group_store = GroupStore::new(repos, integrity());

        store
            .create("p1", vec![statement(Effect::Allow, &["aws"])])
            .await
            .unwrap();
        group_store.create("g1", vec!["p1".into()]).await.unwrap();

        let err = store.delete("p1").await.unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidState(_)));

        group_store.delete("g1").await.unwrap();
        store.delete("p1").await.unwrap();
        assert!(store.lookup("p1").await.unwrap().is_none());
    }
}
