use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use crate::admin::Admin;

#[derive(Args, Debug)]
pub struct Install {
    #[arg(help = "directory holding module.json and the command tree")]
    path: PathBuf,
}

impl Install {
    pub async fn handle(self) -> anyhow::Result<()> {
        let admin = Admin::connect().await?;
        let module = admin.registry.install(&self.path)?;
        admin
            .log(
                "module",
                "install",
                json!({
                    "module_name": module.descriptor.module_name,
                    "version": module.descriptor.version.to_string(),
                }),
            )
            .await;
        println!(
            "Installed `{}` {} at `{}`",
            module.descriptor.module_name,
            module.descriptor.version,
            module.descriptor.mount_point
        );
        println!("Routes become reachable on the next server reload");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct Uninstall {
    module_name: String,
}

impl Uninstall {
    pub async fn handle(self) -> anyhow::Result<()> {
        let admin = Admin::connect().await?;
        admin.registry.uninstall(&self.module_name)?;
        admin
            .log(
                "module",
                "uninstall",
                json!({ "module_name": self.module_name }),
            )
            .await;
        println!("Uninstalled `{}`", self.module_name);
        Ok(())
    }
}
