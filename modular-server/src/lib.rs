#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![deny(clippy::pedantic)]
#![deny(clippy::get_unwrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod config;
mod context;
mod error;
mod integrity;
mod layer;
mod migrations;
mod registry;
mod repos;
mod response;
mod restrictions;
mod router;
mod simulator;
mod store;
mod system;
mod validate;

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

pub use config::{Config, Mode};
pub use context::Context;
pub use error::{Error, ErrorType};
pub use integrity::IntegrityService;
pub use registry::{Catalog, CommandMeta, InstalledModule, ModuleRegistry, DESCRIPTOR_FILE};
pub use repos::Repos;
pub use router::{Dispatcher, DispatcherService};
pub use simulator::simulate;
pub use store::{AuditStore, GroupStore, PolicyStore, TokenStore, UserStore};

use serde::Deserialize;
use tower::{make::Shared, ServiceBuilder};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::info;

use crate::layer::{
    auth_service::AuthServiceLayer, rate_limit::RateLimitLayer,
    request_mapper::RequestMapperLayer, version_gate::VersionGateLayer,
};

pub async fn shutdown_signal() {
    // Wait for the CTRL+C signal
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
}

/// Open the configured document storage, apply migrations and hand back
/// the repository layer. Shared by the server and the administrator CLI,
/// which operates on the same store directly.
pub async fn open_repos(config: &Config) -> anyhow::Result<Repos> {
    let location = config.storage_location()?;
    let pool = modular_storage::connect(&location).await?;
    migrations::migrate(&pool).await?;
    Ok(Repos::new(pool))
}

pub async fn start(
    mut config: Config,
    shutdown_signal: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    if config.needs_secret_fetch() {
        fetch_secret_key(&mut config).await?;
    }
    config.sanitize()?;

    let repos = open_repos(&config).await?;

    let registry = Arc::new(ModuleRegistry::new(&config.modules_path));
    registry.load()?;

    let port_tx = config.port_tx.take();
    let config = Arc::new(config);
    let ctx = Context::new(Arc::clone(&config), repos.clone(), registry);
    let dispatcher = Arc::new(Dispatcher::new(ctx.clone()));

    let server_svc = ServiceBuilder::new()
        .concurrency_limit(1000)
        .timeout(Duration::from_secs(config.upstream_timeout_secs + 5))
        .layer(RequestBodyLimitLayer::new(1024 * 64))
        .layer(CorsLayer::permissive())
        .layer(RequestMapperLayer::new())
        .layer(VersionGateLayer::new(config.min_cli_version.clone()))
        .layer(AuthServiceLayer::new(ctx.users.clone(), ctx.tokens.clone()))
        .layer(RateLimitLayer::new(
            repos.usage.clone(),
            config.calls_per_second_limit,
        ))
        .service(DispatcherService::new(dispatcher));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let server = hyper::Server::bind(&addr).serve(Shared::new(server_svc));
    let addr = server.local_addr();
    let server = server.with_graceful_shutdown(shutdown_signal);

    info!("listening on {addr}");
    if let Some(tx) = port_tx {
        let _ = tx.send(addr.port());
    }

    // And run forever...
    if let Err(error) = server.await {
        tracing::error!(?error, "Encountered server error. Shutting down.");
        return Err(error.into());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SecretStoreResponse {
    key: String,
}

/// Self-hosted deployments may keep the server key in an external secret
/// store instead of the environment.
async fn fetch_secret_key(config: &mut Config) -> anyhow::Result<()> {
    let Some(addr) = config.secret_store_addr.as_ref() else {
        anyhow::bail!("secret store address is not configured");
    };
    let mut request = reqwest::Client::new().get(format!("{addr}/v1/secret/modular-api"));
    if let Some(token) = config.secret_store_token.as_ref() {
        request = request.header("x-secret-store-token", token);
    }
    let secret: SecretStoreResponse = request
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    config.secret_key = secret.key;
    Ok(())
}
