use modular_system::{
    AuditStore, Config, GroupStore, IntegrityService, ModuleRegistry, PolicyStore, UserStore,
};
use serde_json::Value;

/// Direct access to the stores, for administrator commands running on the
/// server host. Mutations are audited the same way dispatched module calls
/// are.
pub struct Admin {
    pub users: UserStore,
    pub groups: GroupStore,
    pub policies: PolicyStore,
    pub audit: AuditStore,
    pub registry: ModuleRegistry,
}

impl Admin {
    pub async fn connect() -> anyhow::Result<Self> {
        let config = Config::from_env()?;
        let repos = modular_system::open_repos(&config).await?;
        let integrity = IntegrityService::new(config.secret_key_bytes());
        let registry = ModuleRegistry::new(&config.modules_path);
        registry.load().map_err(anyhow::Error::from)?;
        Ok(Self {
            users: UserStore::new(repos.clone(), integrity.clone()),
            groups: GroupStore::new(repos.clone(), integrity.clone()),
            policies: PolicyStore::new(repos.clone(), integrity.clone()),
            audit: AuditStore::new(repos, integrity),
            registry,
        })
    }

    /// Record a successful administrator mutation.
    pub async fn log(&self, group: &str, command: &str, parameters: Value) {
        if let Err(error) = self.audit.log(group, command, parameters, "succeeded").await {
            tracing::warn!(%error, "failed to append audit record");
        }
    }
}
