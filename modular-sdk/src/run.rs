use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;

use crate::base::BaseClient;

pub struct RunClient {
    base: Arc<BaseClient>,
}

impl RunClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    /// Invoke an arbitrary mounted module command. Returns the backend's
    /// status and body as forwarded by the facade.
    pub async fn execute(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), String> {
        self.base.dispatch(method, path, query, body).await
    }
}
