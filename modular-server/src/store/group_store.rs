use chrono::Utc;
use modular_types::{
    audit::ConsistencyStatus,
    entity::{valid_entity_name, EntityState, Group},
    policy::Policy,
};

use crate::{
    error::{Error, ErrorType},
    integrity::IntegrityService,
    repos::Repos,
};

use super::{canonical_body, decode_body};

/// CRUD surface for groups.
#[derive(Clone)]
pub struct GroupStore {
    repos: Repos,
    integrity: IntegrityService,
}

impl GroupStore {
    #[must_use]
    pub fn new(repos: Repos, integrity: IntegrityService) -> Self {
        Self { repos, integrity }
    }

    /// Every referenced policy must exist and be activated at creation
    /// time.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, group_name: &str, policies: Vec<String>) -> Result<Group, Error> {
        if !valid_entity_name(group_name) {
            return Err(ErrorType::InvalidPayload(format!(
                "`{group_name}` is not a valid group name"
            ))
            .into());
        }
        if self.repos.group.lookup(group_name).await?.is_some() {
            return Err(ErrorType::AlreadyExists(format!(
                "Group `{group_name}` already exists"
            ))
            .into());
        }
        let mut deduped: Vec<String> = vec![];
        for policy_name in policies {
            self.require_activated_policy(&policy_name).await?;
            if !deduped.contains(&policy_name) {
                deduped.push(policy_name);
            }
        }

        let group = Group::new(group_name.to_string(), deduped, Utc::now());
        let body = canonical_body(&group)?;
        let hash = self.integrity.fingerprint(&body);
        self.repos.group.create(group_name, &body, &hash).await?;
        Ok(group)
    }

    async fn require_activated_policy(&self, policy_name: &str) -> Result<(), Error> {
        let Some(record) = self.repos.policy.lookup(policy_name).await? else {
            return Err(ErrorType::ReferencedEntityMissing {
                kind: "Policy",
                name: policy_name.to_string(),
            }
            .into());
        };
        let policy: Policy = decode_body(&record.body)?;
        if policy.state == EntityState::Blocked {
            return Err(ErrorType::InvalidState(format!(
                "Policy `{policy_name}` is blocked"
            ))
            .into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(
        &self,
        group_name: &str,
    ) -> Result<Option<(Group, ConsistencyStatus)>, Error> {
        match self.repos.group.lookup(group_name).await? {
            Some(record) => {
                let consistency = self.integrity.verify(&record.body, &record.hash);
                Ok(Some((decode_body(&record.body)?, consistency)))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<(Group, ConsistencyStatus)>, Error> {
        let mut groups = vec![];
        for record in self.repos.group.list().await? {
            let consistency = self.integrity.verify(&record.body, &record.hash);
            groups.push((decode_body(&record.body)?, consistency));
        }
        Ok(groups)
    }

    async fn require(&self, group_name: &str) -> Result<Group, Error> {
        self.lookup(group_name)
            .await?
            .map(|(group, _)| group)
            .ok_or_else(|| ErrorType::NotFound(format!("Group `{group_name}` not found")).into())
    }

    async fn persist(&self, mut group: Group) -> Result<Group, Error> {
        group.last_modification_date = Utc::now();
        let body = canonical_body(&group)?;
        let hash = self.integrity.fingerprint(&body);
        if !self
            .repos
            .group
            .update(&group.group_name, &body, &hash)
            .await?
        {
            return Err(
                ErrorType::NotFound(format!("Group `{}` not found", group.group_name)).into(),
            );
        }
        Ok(group)
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_policies(
        &self,
        group_name: &str,
        policies: Vec<String>,
    ) -> Result<Group, Error> {
        let mut group = self.require(group_name).await?;
        for policy_name in policies {
            self.require_activated_policy(&policy_name).await?;
            if !group.policies.contains(&policy_name) {
                group.policies.push(policy_name);
            }
        }
        self.persist(group).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_policies(
        &self,
        group_name: &str,
        policies: &[String],
    ) -> Result<Group, Error> {
        let mut group = self.require(group_name).await?;
        group.policies.retain(|p| !policies.contains(p));
        self.persist(group).await
    }

    /// Deletion is immediate and removes the group's permissions from its
    /// members transitively.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, group_name: &str) -> Result<(), Error> {
        if !self.repos.group.remove(group_name).await? {
            return Err(ErrorType::NotFound(format!("Group `{group_name}` not found")).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use modular_types::policy::{Effect, Statement};

    use crate::{repos::tests::repos, store::PolicyStore};

    use super::*;

    fn integrity() -> IntegrityService {
        IntegrityService::new(b"test-secret-key!")
    }

    fn statement() -> Statement {
        Statement {
            effect: Effect::Allow,
            module: "m3admin".into(),
            resources: vec!["aws".parse().unwrap()],
            description: None,
        }
    }

    #[tokio::test]
    async fn create_requires_existing_policies() {
        let repos = repos().await;
        let store = GroupStore::new(repos.clone(), integrity());

        let err = store.create("g1", vec!["p1".into()]).await.unwrap_err();
        assert!(matches!(
            err.variant,
            ErrorType::ReferencedEntityMissing { .. }
        ));

        PolicyStore::new(repos, integrity())
            .create("p1", vec![statement()])
            .await
            .unwrap();
        let group = store.create("g1", vec!["p1".into()]).await.unwrap();
        assert_eq!(group.policies, vec!["p1".to_string()]);
        assert_eq!(group.state, EntityState::Activated);

        let err = store.create("g1", vec![]).await.unwrap_err();
        assert!(matches!(err.variant, ErrorType::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn policy_membership_mutations() {
        let repos = repos().await;
        let store = GroupStore::new(repos.clone(), integrity());
        let policy_store = PolicyStore::new(repos, integrity());
        policy_store.create("p1", vec![statement()]).await.unwrap();
        policy_store.create("p2", vec![statement()]).await.unwrap();

        store.create("g1", vec!["p1".into()]).await.unwrap();
        let group = store
            .add_policies("g1", vec!["p2".into(), "p2".into()])
            .await
            .unwrap();
        assert_eq!(group.policies, vec!["p1".to_string(), "p2".to_string()]);

        let group = store
            .remove_policies("g1", &["p1".to_string()])
            .await
            .unwrap();
        assert_eq!(group.policies, vec!["p2".to_string()]);

        store.delete("g1").await.unwrap();
        assert!(store.delete("g1").await.is_err());
    }
}
