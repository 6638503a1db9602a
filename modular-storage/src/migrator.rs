use chrono::Utc;
use sha2::{Digest, Sha384};
use sqlx::SqlitePool;

const MIGRATIONS_TABLE: &str = "_MIGRATIONS";

#[derive(Debug)]
pub struct MigrationScript {
    pub script: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("sqlx error")]
    DB(#[from] sqlx::Error),
    #[error("unable to parse migration script `{filename}`")]
    Script { filename: String, error: String },
    #[error("unable to execute migration script `{filename}`")]
    Execution {
        filename: String,
        error: sqlx::Error,
    },
    #[error("migration script `{filename}` was modified after it was applied")]
    ChecksumMismatch { filename: String },
}

/// Collect the embedded migration scripts in filename order.
///
/// # Errors
///
/// Returns an error if a script is not valid UTF-8.
pub fn migration_scripts<M: rust_embed::RustEmbed>() -> Result<Vec<MigrationScript>, MigrationError>
{
    let mut filenames = M::iter().map(|f| f.to_string()).collect::<Vec<_>>();
    filenames.sort();

    let mut scripts = Vec::with_capacity(filenames.len());
    for filename in filenames {
        let file = M::get(&filename).ok_or_else(|| MigrationError::Script {
            filename: filename.clone(),
            error: "missing embedded file".to_string(),
        })?;
        let script =
            String::from_utf8(file.data.into_owned()).map_err(|err| MigrationError::Script {
                filename: filename.clone(),
                error: err.to_string(),
            })?;
        scripts.push(MigrationScript {
            script,
            description: filename,
        });
    }
    Ok(scripts)
}

async fn create_migrate_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE}(
        version INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        checksum BLOB NOT NULL,
        created_at TIMESTAMP NOT NULL
    )"
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct AppliedMigration {
    version: i64,
    checksum: Vec<u8>,
}

/// Apply the [`MigrationScript`]s that have not run yet. Already applied
/// versions are verified against their stored checksum.
///
/// # Errors
///
/// Returns an error if a script fails to execute or an applied script was
/// modified.
#[tracing::instrument(skip_all)]
pub async fn migrate(
    pool: &SqlitePool,
    migrations: &[MigrationScript],
) -> Result<(), MigrationError> {
    create_migrate_table(pool).await?;

    let applied: Vec<AppliedMigration> = sqlx::query_as(&format!(
        "SELECT version, checksum FROM {MIGRATIONS_TABLE} ORDER BY version"
    ))
    .fetch_all(pool)
    .await?;

    for (index, migration) in migrations.iter().enumerate() {
        let version = i64::try_from(index).map_err(|_| MigrationError::Script {
            filename: migration.description.clone(),
            error: "too many migrations".to_string(),
        })?;
        let checksum = Sha384::digest(migration.script.as_bytes()).to_vec();

        if let Some(prior) = applied.iter().find(|m| m.version == version) {
            if prior.checksum != checksum {
                return Err(MigrationError::ChecksumMismatch {
                    filename: migration.description.clone(),
                });
            }
            continue;
        }

        for statement in migration.script.split(';') {
            if statement.trim().is_empty() {
                continue;
            }
            sqlx::query(statement).execute(pool).await.map_err(|error| {
                MigrationError::Execution {
                    filename: migration.description.clone(),
                    error,
                }
            })?;
        }

        sqlx::query(&format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, description, checksum, created_at)
            VALUES (?, ?, ?, ?)"
        ))
        .bind(version)
        .bind(&migration.description)
        .bind(checksum)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    }
    Ok(())
}
