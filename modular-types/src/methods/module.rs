use semver::Version;
use serde::{Deserialize, Serialize};

use crate::module::ApiMeta;

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallModuleParams {
    /// Path of the module directory on the server host.
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallModuleResponse {
    pub module_name: String,
    pub version: Version,
    pub mount_point: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UninstallModuleParams {
    pub module_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UninstallModuleResponse {
    pub module_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub meta: ApiMeta,
}
