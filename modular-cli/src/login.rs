use clap::Args;
use modular_sdk::Client;

use crate::output;

#[derive(Args, Debug)]
pub struct Login {
    #[arg(long)]
    username: String,
    #[arg(long, env = "MODULAR_API_PASSWORD")]
    password: String,
    #[arg(long, help = "include the parameter-level API meta in the catalog")]
    meta: bool,
}

impl Login {
    pub async fn handle(self, sdk: &Client) -> anyhow::Result<()> {
        let resp = sdk
            .auth
            .login(&self.username, &self.password, self.meta)
            .await
            .map_err(anyhow::Error::msg)?;
        println!("export MODULAR_API_TOKEN={}", resp.token.to_string());
        println!("# expires at {}", resp.expires_at.to_rfc3339());
        output::print_json(&resp.catalog)
    }
}
