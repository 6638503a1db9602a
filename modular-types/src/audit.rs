use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of recomputing a persisted record's integrity fingerprint.
/// Compromised records are surfaced in describe and audit listings but are
/// never used for authorization decisions.
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
pub enum ConsistencyStatus {
    #[strum(serialize = "ok")]
    Ok,
    #[strum(serialize = "compromised")]
    Compromised,
}

impl ConsistencyStatus {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }
}

/// One append-only audit entry. Sensitive parameter values are masked
/// before the record is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub group: String,
    pub command: String,
    pub parameters: Value,
    pub result: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A persisted audit entry as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: AuditRecord,
    pub consistency: ConsistencyStatus,
}

/// Range predicate over the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Only return records whose integrity check failed.
    #[serde(default)]
    pub invalid_only: bool,
}
