#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![deny(clippy::pedantic)]
#![deny(clippy::get_unwrap)]
#![allow(clippy::module_name_repetitions)]

pub mod migrator;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use sqlx::SqlitePool;

/// Where the document collections live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Connection string handed to the facade by the hosting environment.
    Uri(String),
    /// Local database file owned by the facade itself.
    File(String),
    /// Volatile storage, used by the dev server and tests.
    InMemory,
}

/// Open a connection pool to the configured document storage and enforce
/// foreign keys on every connection.
///
/// # Errors
///
/// Returns an error if the storage cannot be opened.
pub async fn connect(location: &StorageLocation) -> Result<SqlitePool, sqlx::Error> {
    let options = match location {
        StorageLocation::Uri(uri) => uri.parse::<SqliteConnectOptions>()?,
        StorageLocation::File(path) => SqliteConnectOptions::new()
            .create_if_missing(true)
            .filename(path),
        StorageLocation::InMemory => SqliteConnectOptions::new().filename(":memory:"),
    }
    .foreign_keys(true);

    let pool_options = match location {
        // A single connection keeps the shared in-memory database alive and
        // visible to every handle.
        StorageLocation::InMemory => SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1),
        _ => SqlitePoolOptions::new().min_connections(1),
    };

    pool_options.connect_with(options).await
}
