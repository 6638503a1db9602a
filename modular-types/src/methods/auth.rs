use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{module::ApiMeta, token::Token};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: Token,
    pub expires_at: DateTime<Utc>,
    /// Catalog filtered to the commands the caller may invoke. Parameter
    /// details are included only when the login request asked for the full
    /// API meta (`?meta=true`).
    pub catalog: ApiMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}
