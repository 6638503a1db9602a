use modular_storage::{migrator, SqlitePool};
use rust_embed::RustEmbed;

use crate::error::Error;

#[derive(RustEmbed)]
#[folder = "migrations/"]
pub(crate) struct Migrations;

pub(crate) async fn migrate(pool: &SqlitePool) -> Result<(), Error> {
    let scripts = migrator::migration_scripts::<Migrations>()?;
    migrator::migrate(pool, &scripts).await?;
    Ok(())
}
