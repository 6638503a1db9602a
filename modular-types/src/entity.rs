use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activation state shared by users, groups and policies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub enum EntityState {
    #[strum(serialize = "activated")]
    Activated,
    #[strum(serialize = "blocked")]
    Blocked,
}

/// Per-user parameter restrictions and injected auxiliary data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMeta {
    /// Option name -> literal values the user may supply for it.
    #[serde(default)]
    pub allowed_values: BTreeMap<String, BTreeSet<String>>,
    /// Option name -> value injected into outgoing backend requests.
    #[serde(default)]
    pub aux_data: BTreeMap<String, Value>,
}

impl UserMeta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed_values.is_empty() && self.aux_data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Salted bcrypt hash. Never serialized into responses; describe
    /// surfaces go through [`crate::methods::user::UserView`].
    pub password_hash: String,
    pub groups: Vec<String>,
    pub state: EntityState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub meta: UserMeta,
    pub creation_date: DateTime<Utc>,
    pub last_modification_date: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.state == EntityState::Blocked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_name: String,
    pub policies: Vec<String>,
    pub state: EntityState,
    pub creation_date: DateTime<Utc>,
    pub last_modification_date: DateTime<Utc>,
}

impl Group {
    #[must_use]
    pub fn new(group_name: String, policies: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            group_name,
            policies,
            state: EntityState::Activated,
            creation_date: now,
            last_modification_date: now,
        }
    }
}

/// Entity names must be addressable in routes, patterns and logs.
#[must_use]
pub fn valid_entity_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_name_validation() {
        assert!(valid_entity_name("alice"));
        assert!(valid_entity_name("ops-team_2"));
        assert!(!valid_entity_name(""));
        assert!(!valid_entity_name("a b"));
        assert!(!valid_entity_name("a\tb"));
        assert!(!valid_entity_name("a\u{7}b"));
    }

    #[test]
    fn state_round_trip() {
        assert_eq!(EntityState::Activated.to_string(), "activated");
        assert_eq!("blocked".parse::<EntityState>().unwrap(), EntityState::Blocked);
    }
}
