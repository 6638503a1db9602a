use clap::Args;
use modular_sdk::Client;
use serde_json::Value;

use crate::output;

#[derive(Args, Debug)]
pub struct Run {
    #[arg(long, default_value = "POST")]
    method: String,
    #[arg(long, help = "facade route, e.g. /m3admin/aws")]
    path: String,
    #[arg(long = "param", help = "query parameter as key=value, repeatable")]
    params: Vec<String>,
    #[arg(long, help = "JSON body")]
    body: Option<String>,
}

impl Run {
    pub async fn handle(self, sdk: &Client) -> anyhow::Result<()> {
        let query = self
            .params
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| anyhow::Error::msg(format!("`{pair}` is not key=value")))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let body = self
            .body
            .map(|raw| serde_json::from_str::<Value>(&raw))
            .transpose()?;

        let (status, response) = sdk
            .run
            .execute(&self.method, &self.path, &query, body.as_ref())
            .await
            .map_err(anyhow::Error::msg)?;

        output::print_json(&response)?;
        if !status.is_success() {
            anyhow::bail!("command failed with status {status}");
        }
        Ok(())
    }
}
