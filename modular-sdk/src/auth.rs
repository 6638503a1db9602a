use std::sync::Arc;

use modular_types::methods::auth::{LoginResponse, LogoutResponse};

use crate::base::BaseClient;

pub struct AuthClient {
    base: Arc<BaseClient>,
}

impl AuthClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    /// Exchange basic credentials for a bearer token. With `meta` the
    /// returned catalog keeps the parameter-level detail.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        meta: bool,
    ) -> Result<LoginResponse, String> {
        let path = if meta { "/login?meta=true" } else { "/login" };
        self.base.post_basic(path, username, password).await
    }

    pub async fn logout(&self) -> Result<LogoutResponse, String> {
        self.base.post("/logout", &serde_json::json!({})).await
    }
}
