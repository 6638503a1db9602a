use std::sync::Arc;

use modular_types::methods::module::DescribeResponse;

use crate::base::BaseClient;

pub struct MetaClient {
    base: Arc<BaseClient>,
}

impl MetaClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    /// The catalog of commands the authenticated caller may invoke.
    pub async fn describe(&self) -> Result<DescribeResponse, String> {
        self.base.get("/meta").await
    }
}
