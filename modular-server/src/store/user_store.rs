use chrono::Utc;
use modular_types::{
    audit::ConsistencyStatus,
    entity::{valid_entity_name, EntityState, Group, User, UserMeta},
    policy::{Policy, Statement},
};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::Value;

use crate::{
    error::{Error, ErrorType},
    integrity::IntegrityService,
    repos::Repos,
};

use super::{canonical_body, decode_body};

const GENERATED_PASSWORD_LENGTH: usize = 16;

/// CRUD surface for users. Reference checks, name validation and the
/// integrity fingerprint are enforced here, never pushed down to the store.
#[derive(Clone)]
pub struct UserStore {
    repos: Repos,
    integrity: IntegrityService,
}

impl UserStore {
    #[must_use]
    pub fn new(repos: Repos, integrity: IntegrityService) -> Self {
        Self { repos, integrity }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn create(
        &self,
        username: &str,
        password: Option<String>,
        groups: Vec<String>,
    ) -> Result<(User, Option<String>), Error> {
        if !valid_entity_name(username) {
            return Err(ErrorType::InvalidPayload(format!(
                "`{username}` is not a valid username"
            ))
            .into());
        }
        if self.repos.user.lookup(username).await?.is_some() {
            return Err(ErrorType::AlreadyExists(format!(
                "User `{username}` already exists"
            ))
            .into());
        }
        for group_name in &groups {
            if self.repos.group.lookup(group_name).await?.is_none() {
                return Err(ErrorType::ReferencedEntityMissing {
                    kind: "Group",
                    name: group_name.clone(),
                }
                .into());
            }
        }

        let (password, generated) = match password {
            Some(password) => (password, None),
            None => {
                let generated = generate_password();
                (generated.clone(), Some(generated))
            }
        };
        if password.is_empty() {
            return Err(ErrorType::InvalidPayload("Password must not be empty".into()).into());
        }
        let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
            .map_err(|err| ErrorType::InternalError(err.into()))?;

        let now = Utc::now();
        let user = User {
            username: username.to_string(),
            password_hash,
            groups,
            state: EntityState::Activated,
            state_reason: None,
            meta: UserMeta::default(),
            creation_date: now,
            last_modification_date: now,
        };
        let body = canonical_body(&user)?;
        let hash = self.integrity.fingerprint(&body);
        self.repos.user.create(username, &body, &hash).await?;

        Ok((user, generated))
    }

    #[tracing::instrument(skip(self))]
    pub async fn lookup(
        &self,
        username: &str,
    ) -> Result<Option<(User, ConsistencyStatus)>, Error> {
        match self.repos.user.lookup(username).await? {
            Some(record) => {
                let consistency = self.integrity.verify(&record.body, &record.hash);
                let user: User = decode_body(&record.body)?;
                Ok(Some((user, consistency)))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<(User, ConsistencyStatus)>, Error> {
        let mut users = vec![];
        for record in self.repos.user.list().await? {
            let consistency = self.integrity.verify(&record.body, &record.hash);
            users.push((decode_body(&record.body)?, consistency));
        }
        Ok(users)
    }

    async fn require(&self, username: &str) -> Result<(User, ConsistencyStatus), Error> {
        self.lookup(username).await?.ok_or_else(|| {
            ErrorType::NotFound(format!("User `{username}` not found")).into()
        })
    }

    /// Verify basic credentials and return the user. Compromised records
    /// never authenticate.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, Error> {
        let Some((user, consistency)) = self.lookup(username).await? else {
            return Err(ErrorType::AuthenticationFailed.into());
        };
        if !consistency.is_ok() {
            tracing::warn!(username, "user record failed integrity check");
            return Err(ErrorType::AuthenticationFailed.into());
        }
        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|err| ErrorType::InternalError(err.into()))?;
        if !valid {
            return Err(ErrorType::AuthenticationFailed.into());
        }
        if user.is_blocked() {
            return Err(ErrorType::BlockedUser {
                reason: user.state_reason,
            }
            .into());
        }
        Ok(user)
    }

    /// The union of statements across all policies of all groups the user
    /// belongs to. Blocked or compromised groups and policies contribute
    /// nothing.
    #[tracing::instrument(skip_all, fields(username = %user.username))]
    pub async fn effective_statements(&self, user: &User) -> Result<Vec<Statement>, Error> {
        let mut statements = vec![];
        for group_name in &user.groups {
            let Some(record) = self.repos.group.lookup(group_name).await? else {
                continue;
            };
            if !self.integrity.verify(&record.body, &record.hash).is_ok() {
                tracing::warn!(group_name, "group record failed integrity check");
                continue;
            }
            let group: Group = decode_body(&record.body)?;
            if group.state == EntityState::Blocked {
                continue;
            }
            for policy_name in &group.policies {
                let Some(record) = self.repos.policy.lookup(policy_name).await? else {
                    continue;
                };
                if !self.integrity.verify(&record.body, &record.hash).is_ok() {
                    tracing::warn!(policy_name, "policy record failed integrity check");
                    continue;
                }
                let policy: Policy = decode_body(&record.body)?;
                if policy.state == EntityState::Blocked {
                    continue;
                }
                statements.extend(policy.statements);
            }
        }
        Ok(statements)
    }

    async fn persist(&self, mut user: User) -> Result<User, Error> {
        user.last_modification_date = Utc::now();
        let body = canonical_body(&user)?;
        let hash = self.integrity.fingerprint(&body);
        if !self.repos.user.update(&user.username, &body, &hash).await? {
            return Err(ErrorType::NotFound(format!("User `{}` not found", user.username)).into());
        }
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn block(&self, username: &str, reason: Option<String>) -> Result<User, Error> {
        let (mut user, _) = self.require(username).await?;
        user.state = EntityState::Blocked;
        user.state_reason = reason;
        let user = self.persist(user).await?;
        // A blocked user must not retain any live session.
        self.repos.token.remove_all(username).await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn unblock(&self, username: &str) -> Result<User, Error> {
        let (mut user, _) = self.require(username).await?;
        user.state = EntityState::Activated;
        user.state_reason = None;
        self.persist(user).await
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn change_password(&self, username: &str, password: &str) -> Result<User, Error> {
        if password.is_empty() {
            return Err(ErrorType::InvalidPayload("Password must not be empty".into()).into());
        }
        let (mut user, _) = self.require(username).await?;
        user.password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|err| ErrorType::InternalError(err.into()))?;
        let user = self.persist(user).await?;
        self.repos.token.remove_all(username).await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_username(
        &self,
        username: &str,
        new_username: &str,
    ) -> Result<User, Error> {
        if !valid_entity_name(new_username) {
            return Err(ErrorType::InvalidPayload(format!(
                "`{new_username}` is not a valid username"
            ))
            .into());
        }
        if self.repos.user.lookup(new_username).await?.is_some() {
            return Err(ErrorType::AlreadyExists(format!(
                "User `{new_username}` already exists"
            ))
            .into());
        }
        let (mut user, _) = self.require(username).await?;
        user.username = new_username.to_string();
        user.last_modification_date = Utc::now();
        let body = canonical_body(&user)?;
        let hash = self.integrity.fingerprint(&body);
        if !self
            .repos
            .user
            .rename(username, new_username, &body, &hash)
            .await?
        {
            return Err(ErrorType::NotFound(format!("User `{username}` not found")).into());
        }
        self.repos.token.remove_all(username).await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_to_groups(
        &self,
        username: &str,
        groups: Vec<String>,
    ) -> Result<User, Error> {
        let (mut user, _) = self.require(username).await?;
        for group_name in groups {
            if self.repos.group.lookup(&group_name).await?.is_none() {
                return Err(ErrorType::ReferencedEntityMissing {
                    kind: "Group",
                    name: group_name,
                }
                .into());
            }
            if !user.groups.contains(&group_name) {
                user.groups.push(group_name);
            }
        }
        self.persist(user).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_from_groups(
        &self,
        username: &str,
        groups: &[String],
    ) -> Result<User, Error> {
        let (mut user, _) = self.require(username).await?;
        user.groups.retain(|g| !groups.contains(g));
        self.persist(user).await
    }

    /// Declare a new meta attribute: the allow-list and/or the injected
    /// auxiliary datum for one option name.
    #[tracing::instrument(skip(self, values, aux))]
    pub async fn set_meta_attribute(
        &self,
        username: &str,
        key: &str,
        values: Option<Vec<String>>,
        aux: Option<Value>,
    ) -> Result<User, Error> {
        if values.is_none() && aux.is_none() {
            return Err(ErrorType::InvalidPayload(
                "Either `values` or `aux` must be provided".into(),
            )
            .into());
        }
        let (mut user, _) = self.require(username).await?;
        if let Some(values) = values {
            if user.meta.allowed_values.contains_key(key) {
                return Err(ErrorType::AlreadyExists(format!(
                    "Meta attribute `{key}` already exists"
                ))
                .into());
            }
            user.meta
                .allowed_values
                .insert(key.to_string(), values.into_iter().collect());
        }
        if let Some(aux) = aux {
            if user.meta.aux_data.contains_key(key) {
                return Err(ErrorType::AlreadyExists(format!(
                    "Meta attribute `{key}` already exists"
                ))
                .into());
            }
            user.meta.aux_data.insert(key.to_string(), aux);
        }
        self.persist(user).await
    }

    /// Replace the allow-list and/or auxiliary datum of an existing meta
    /// attribute.
    #[tracing::instrument(skip(self, values, aux))]
    pub async fn update_meta_attribute(
        &self,
        username: &str,
        key: &str,
        values: Option<Vec<String>>,
        aux: Option<Value>,
    ) -> Result<User, Error> {
        if values.is_none() && aux.is_none() {
            return Err(ErrorType::InvalidPayload(
                "Either `values` or `aux` must be provided".into(),
            )
            .into());
        }
        let (mut user, _) = self.require(username).await?;
        if let Some(values) = values {
            if !user.meta.allowed_values.contains_key(key) {
                return Err(ErrorType::NotFound(format!(
                    "Meta attribute `{key}` not found"
                ))
                .into());
            }
            user.meta
                .allowed_values
                .insert(key.to_string(), values.into_iter().collect());
        }
        if let Some(aux) = aux {
            if !user.meta.aux_data.contains_key(key) {
                return Err(ErrorType::NotFound(format!(
                    "Meta attribute `{key}` not found"
                ))
                .into());
            }
            user.meta.aux_data.insert(key.to_string(), aux);
        }
        self.persist(user).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_meta_attribute(&self, username: &str, key: &str) -> Result<User, Error> {
        let (mut user, _) = self.require(username).await?;
        let removed_values = user.meta.allowed_values.remove(key).is_some();
        let removed_aux = user.meta.aux_data.remove(key).is_some();
        if !removed_values && !removed_aux {
            return Err(
                ErrorType::NotFound(format!("Meta attribute `{key}` not found")).into(),
            );
        }
        self.persist(user).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reset_meta(&self, username: &str) -> Result<User, Error> {
        let (mut user, _) = self.require(username).await?;
        user.meta = UserMeta::default();
        self.persist(user).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_meta(&self, username: &str) -> Result<UserMeta, Error> {
        let (user, _) = self.require(username).await?;
        Ok(user.meta)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, username: &str) -> Result<(), Error> {
        if !self.repos.user.remove(username).await? {
            return Err(ErrorType::NotFound(format!("User `{username}` not found")).into());
        }
        self.repos.token.remove_all(username).await?;
        Ok(())
    }
}

fn generate_password() -> String {
    let mut rng = thread_rng();
    (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}
