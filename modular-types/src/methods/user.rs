use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    audit::ConsistencyStatus,
    entity::{EntityState, User, UserMeta},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserParams {
    pub username: String,
    /// When omitted a strong password is generated and returned exactly
    /// once in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUserParams {
    pub username: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DescribeUserParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Client-facing projection of a user. The password hash never leaves the
/// server.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserView {
    pub username: String,
    pub groups: Vec<String>,
    pub state: EntityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
    pub meta: UserMeta,
    pub creation_date: DateTime<Utc>,
    pub last_modification_date: DateTime<Utc>,
    pub consistency: ConsistencyStatus,
}

impl UserView {
    #[must_use]
    pub fn new(user: User, consistency: ConsistencyStatus) -> Self {
        Self {
            username: user.username,
            groups: user.groups,
            state: user.state,
            state_reason: user.state_reason,
            meta: user.meta,
            creation_date: user.creation_date,
            last_modification_date: user.last_modification_date,
            consistency,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockUserParams {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnblockUserParams {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordParams {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangeUsernameParams {
    pub username: String,
    pub new_username: String,
}

/// Parameters for `user add_to_group` and `user remove_from_group`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserGroupParams {
    pub username: String,
    pub groups: Vec<String>,
}

/// Parameters for the meta-attribute operations. `values` addresses the
/// allow-list for the option name, `aux` the injected auxiliary datum;
/// at least one must be present.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetaAttributeParams {
    pub username: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteMetaAttributeParams {
    pub username: String,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetMetaParams {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetMetaParams {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetMetaResponse {
    pub username: String,
    pub meta: UserMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserWriteResponse {
    pub username: String,
}
