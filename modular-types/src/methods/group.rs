use serde::{Deserialize, Serialize};

use crate::{audit::ConsistencyStatus, entity::Group};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGroupParams {
    pub group_name: String,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// Parameters for `group add_policy` and `group delete_policy`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupPolicyParams {
    pub group_name: String,
    pub policies: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DescribeGroupParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteGroupParams {
    pub group_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    pub consistency: ConsistencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupListResponse {
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupWriteResponse {
    pub group_name: String,
}
