use modular_storage::SqlitePool;

use self::{
    audit::AuditRepo, group::GroupRepo, policy::PolicyRepo, token::TokenRepo, usage::UsageRepo,
    user::UserRepo,
};

pub mod audit;
pub mod group;
pub mod policy;
pub mod token;
pub mod usage;
pub mod user;

/// A persisted identity document: the canonical JSON body plus the keyed
/// fingerprint computed over it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawRecord {
    pub body: String,
    pub hash: String,
}

#[derive(Clone)]
pub struct Repos {
    pub user: UserRepo,
    pub group: GroupRepo,
    pub policy: PolicyRepo,
    pub token: TokenRepo,
    pub audit: AuditRepo,
    pub usage: UsageRepo,
    pub pool: SqlitePool,
}

impl Repos {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            user: UserRepo::new(pool.clone()),
            group: GroupRepo::new(pool.clone()),
            policy: PolicyRepo::new(pool.clone()),
            token: TokenRepo::new(pool.clone()),
            audit: AuditRepo::new(pool.clone()),
            usage: UsageRepo::new(pool.clone()),
            pool,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use modular_storage::{connect, StorageLocation};

    use super::*;

    pub(crate) async fn pool() -> SqlitePool {
        let pool = connect(&StorageLocation::InMemory)
            .await
            .expect("in-memory pool");
        crate::migrations::migrate(&pool).await.expect("migrations");
        pool
    }

    pub(crate) async fn repos() -> Repos {
        Repos::new(pool().await)
    }
}
