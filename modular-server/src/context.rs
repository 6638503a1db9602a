use std::sync::Arc;

use crate::{
    integrity::IntegrityService,
    registry::ModuleRegistry,
    repos::Repos,
    store::{AuditStore, GroupStore, PolicyStore, TokenStore, UserStore},
    Config,
};

/// Process-wide state constructed once at startup and threaded into every
/// handler.
pub struct Context {
    pub config: Arc<Config>,
    pub repos: Repos,
    pub registry: Arc<ModuleRegistry>,
    pub users: UserStore,
    pub groups: GroupStore,
    pub policies: PolicyStore,
    pub tokens: TokenStore,
    pub audit: AuditStore,
    pub http: reqwest::Client,
}

impl Context {
    #[must_use]
    pub fn new(config: Arc<Config>, repos: Repos, registry: Arc<ModuleRegistry>) -> Self {
        let integrity = IntegrityService::new(config.secret_key_bytes());
        Self {
            users: UserStore::new(repos.clone(), integrity.clone()),
            groups: GroupStore::new(repos.clone(), integrity.clone()),
            policies: PolicyStore::new(repos.clone(), integrity.clone()),
            tokens: TokenStore::new(repos.clone(), config.secret_key_bytes()),
            audit: AuditStore::new(repos.clone(), integrity),
            http: reqwest::Client::new(),
            config,
            repos,
            registry,
        }
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            repos: self.repos.clone(),
            registry: Arc::clone(&self.registry),
            users: self.users.clone(),
            groups: self.groups.clone(),
            policies: self.policies.clone(),
            tokens: self.tokens.clone(),
            audit: self.audit.clone(),
            http: self.http.clone(),
        }
    }
}
