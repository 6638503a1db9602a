//! Modular API command-line interface.
//!
//! Administrator commands (policy, group, user, audit, policy-simulator,
//! install, uninstall) operate directly on the document store on the
//! server host; client commands (login, describe, run, health-check) go
//! through the HTTP surface.

mod admin;
mod audit;
mod describe;
mod group;
mod login;
mod module;
mod output;
mod policy;
mod run;
mod server;
mod simulator;
mod user;

use clap::{Parser, Subcommand};
use modular_sdk::Client;

use audit::Audit;
use describe::Describe;
use group::Group;
use login::Login;
use module::{Install, Uninstall};
use policy::Policy;
use run::Run;
use server::Server;
use simulator::PolicySimulator;
use user::User;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, env = "MODULAR_API_URL", default_value = "http://127.0.0.1:8085")]
    api_url: String,

    #[arg(long, env = "MODULAR_API_TOKEN")]
    api_token: Option<String>,

    #[arg(long, global = true, help = "emit structured JSON instead of tables")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "manage policies")]
    Policy(Policy),
    #[command(about = "manage groups")]
    Group(Group),
    #[command(about = "manage users")]
    User(User),
    #[command(about = "query the audit log")]
    Audit(Audit),
    #[command(about = "evaluate a policy decision without dispatching anything")]
    PolicySimulator(PolicySimulator),
    #[command(about = "install a module from a directory")]
    Install(Install),
    #[command(about = "uninstall a module")]
    Uninstall(Uninstall),
    #[command(about = "show the commands the caller may invoke")]
    Describe(Describe),
    #[command(about = "invoke a mounted module command")]
    Run(Run),
    #[command(about = "exchange credentials for a bearer token")]
    Login(Login),
    #[command(about = "start a Modular API server")]
    Server(Server),
}

#[tokio::main]
async fn main() {
    let Cli {
        api_url,
        api_token,
        json,
        command,
    } = Cli::parse();
    // The server subcommand installs its own subscriber with the server
    // log settings.
    if !matches!(command, Commands::Server(_)) {
        init_tracing();
    }

    let result = match command {
        Commands::Policy(policy) => policy.handle(json).await,
        Commands::Group(group) => group.handle(json).await,
        Commands::User(user) => user.handle(json).await,
        Commands::Audit(audit) => audit.handle(json).await,
        Commands::PolicySimulator(simulator) => simulator.handle().await,
        Commands::Install(install) => install.handle().await,
        Commands::Uninstall(uninstall) => uninstall.handle().await,
        Commands::Describe(describe) => {
            describe.handle(&client(api_url, api_token).await, json).await
        }
        Commands::Run(run) => run.handle(&client(api_url, api_token).await).await,
        Commands::Login(login) => login.handle(&client(api_url, api_token).await).await,
        Commands::Server(server) => server.handle().await,
    };

    if let Err(error) = result {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

async fn client(api_url: String, api_token: Option<String>) -> Client {
    let sdk = Client::new(api_url);
    sdk.set_token(api_token).await;
    sdk
}

fn init_tracing() {
    let level =
        std::env::var("MODULAR_API_CLI_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .try_init();
}
