use serde::{Deserialize, Serialize};

use crate::{
    audit::ConsistencyStatus,
    policy::{Policy, Statement},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePolicyParams {
    pub policy_name: String,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePolicyParams {
    pub policy_name: String,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DescribePolicyParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePolicyParams {
    pub policy_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyView {
    #[serde(flatten)]
    pub policy: Policy,
    pub consistency: ConsistencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyListResponse {
    pub policies: Vec<PolicyView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyWriteResponse {
    pub policy_name: String,
}
