use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;

pub use crate::audit::AuditQuery;

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditQueryResponse {
    pub records: Vec<AuditEntry>,
}
