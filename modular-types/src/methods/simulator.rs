use serde::{Deserialize, Serialize};

use crate::policy::Decision;

/// Whose statements the simulator evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject_type", rename_all = "lowercase")]
pub enum SimulationSubject {
    User { username: String },
    Group { group_name: String },
    Policy { policy_name: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulateParams {
    #[serde(flatten)]
    pub subject: SimulationSubject,
    pub module: String,
    /// `/`-separated command path, e.g. `tenant/describe`.
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulateResponse {
    #[serde(flatten)]
    pub decision: Decision,
}
