use std::sync::Arc;

use modular_types::methods::status::HealthCheckResponse;

use crate::base::BaseClient;

pub struct StatusClient {
    base: Arc<BaseClient>,
}

impl StatusClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    pub async fn health_check(&self) -> Result<HealthCheckResponse, String> {
        self.base.get("/health_check").await
    }
}
