mod auth;
mod base;
mod meta;
mod run;
mod status;

use std::sync::Arc;

pub use auth::AuthClient;
pub use meta::MetaClient;
pub use run::RunClient;
pub use status::StatusClient;

use base::BaseClient;

/// Client for the Modular API facade.
pub struct Client {
    base: Arc<BaseClient>,
    pub auth: AuthClient,
    pub meta: MetaClient,
    pub run: RunClient,
    pub status: StatusClient,
}

impl Client {
    #[must_use]
    pub fn new(api_url: impl ToString) -> Self {
        let base = Arc::new(BaseClient::new(api_url));
        Self {
            auth: AuthClient::new(Arc::clone(&base)),
            meta: MetaClient::new(Arc::clone(&base)),
            run: RunClient::new(Arc::clone(&base)),
            status: StatusClient::new(Arc::clone(&base)),
            base,
        }
    }

    pub async fn set_token(&self, token: Option<String>) {
        self.base.set_token(token).await;
    }
}
