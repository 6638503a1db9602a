use std::time::Duration;

use modular_storage::StorageLocation;
use semver::Version;
use serde::Deserialize;
use tokio::sync::oneshot;

/// Which document backend the facade runs against.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub enum Mode {
    #[strum(serialize = "hosted")]
    Hosted,
    #[strum(serialize = "self-hosted")]
    SelfHosted,
}

pub const DEFAULT_PORT: u16 = 8085;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(skip)]
    pub port_tx: Option<oneshot::Sender<u16>>,
    pub secret_key: String,
    pub mode: Mode,
    /// Connection string handed over by the hosting environment (hosted
    /// mode).
    #[serde(default)]
    pub database_uri: Option<String>,
    /// Local database file (self-hosted mode).
    #[serde(default)]
    pub database_path: Option<String>,
    pub modules_path: String,
    /// `None` disables the limiter.
    #[serde(default)]
    pub calls_per_second_limit: Option<u32>,
    #[serde(default)]
    pub min_cli_version: Option<Version>,
    #[serde(default)]
    pub enable_private_mode: bool,
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
    /// Secret store the self-hosted mode may fetch the server key from when
    /// `MODULAR_API_SECRET_KEY` is not set directly.
    #[serde(default)]
    pub secret_store_addr: Option<String>,
    #[serde(default)]
    pub secret_store_token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_upstream_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Build the configuration from `MODULAR_API_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        let secret_store_addr = env("MODULAR_API_SECRET_STORE_ADDR");
        let secret_key = match env("MODULAR_API_SECRET_KEY") {
            Some(key) => key,
            None if secret_store_addr.is_some() => String::new(),
            None => anyhow::bail!("MODULAR_API_SECRET_KEY must be set"),
        };
        let mode = env("MODULAR_API_MODE")
            .map_or(Ok(Mode::SelfHosted), |raw| {
                raw.parse::<Mode>()
                    .map_err(|_| anyhow::Error::msg(format!("invalid MODULAR_API_MODE `{raw}`")))
            })?;
        let port = env("MODULAR_API_PORT")
            .map(|raw| raw.parse::<u16>())
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let calls_per_second_limit = match env("MODULAR_API_CALLS_PER_SECOND_LIMIT") {
            None => None,
            Some(raw) if raw == "disabled" => None,
            Some(raw) => Some(raw.parse::<u32>()?),
        };
        let min_cli_version = env("MODULAR_API_MIN_CLI_VERSION")
            .map(|raw| Version::parse(&raw))
            .transpose()?;
        let enable_private_mode = env("MODULAR_API_ENABLE_PRIVATE_MODE")
            .map(|raw| raw.parse::<bool>())
            .transpose()?
            .unwrap_or(false);
        let upstream_timeout_secs = env("MODULAR_API_UPSTREAM_TIMEOUT_SECONDS")
            .map(|raw| raw.parse::<u64>())
            .transpose()?
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

        Ok(Self {
            port,
            port_tx: None,
            secret_key,
            mode,
            database_uri: env("MODULAR_API_DATABASE_URI"),
            database_path: env("MODULAR_API_DATABASE_PATH"),
            modules_path: env("MODULAR_API_MODULES_PATH")
                .unwrap_or_else(|| "modules".to_string()),
            calls_per_second_limit,
            min_cli_version,
            enable_private_mode,
            log_path: env("MODULAR_API_LOG_PATH"),
            upstream_timeout_secs,
            secret_store_addr,
            secret_store_token: env("MODULAR_API_SECRET_STORE_TOKEN"),
        })
    }

    /// Whether the server key still has to be fetched from the secret store.
    #[must_use]
    pub fn needs_secret_fetch(&self) -> bool {
        self.secret_key.is_empty() && self.secret_store_addr.is_some()
    }

    #[must_use]
    pub fn secret_key_bytes(&self) -> &[u8] {
        self.secret_key.as_bytes()
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Resolve where the six document collections live.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured mode has no matching connection
    /// setting.
    pub fn storage_location(&self) -> anyhow::Result<StorageLocation> {
        match self.mode {
            Mode::Hosted => match self.database_uri.as_ref() {
                Some(uri) => Ok(StorageLocation::Uri(uri.clone())),
                None => anyhow::bail!("MODULAR_API_DATABASE_URI must be set in hosted mode"),
            },
            Mode::SelfHosted => match self.database_path.as_ref() {
                Some(path) if path.contains(":memory:") => Ok(StorageLocation::InMemory),
                Some(path) => Ok(StorageLocation::File(path.clone())),
                None => anyhow::bail!("MODULAR_API_DATABASE_PATH must be set in self-hosted mode"),
            },
        }
    }

    pub fn sanitize(&self) -> anyhow::Result<()> {
        if self.secret_key.len() < 16 {
            anyhow::bail!("MODULAR_API_SECRET_KEY must be at least 16 bytes");
        }
        let modules_path = std::path::Path::new(&self.modules_path);
        if !modules_path.exists()
            && std::fs::DirBuilder::new()
                .recursive(true)
                .create(modules_path)
                .is_err()
        {
            anyhow::bail!("Failed to create modules directory");
        }
        if !modules_path.is_dir() {
            anyhow::bail!("The modules path provided is not a directory");
        }
        Ok(())
    }
}
