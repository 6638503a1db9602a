use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, ErrorType};

pub mod audit_store;
pub mod group_store;
pub mod policy_store;
pub mod token_store;
pub mod user_store;

pub use audit_store::AuditStore;
pub use group_store::GroupStore;
pub use policy_store::PolicyStore;
pub use token_store::TokenStore;
pub use user_store::UserStore;

/// Canonical serialization the integrity fingerprint is computed over:
/// struct field order, UTF-8, no insignificant whitespace.
pub(crate) fn canonical_body<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|err| ErrorType::BadResponseData(err).into())
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body)
        .map_err(|_| ErrorType::BadData(format!("Unable to parse stored record `{body}`")).into())
}
