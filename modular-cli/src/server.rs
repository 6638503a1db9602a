use clap::Args;
use modular_system::Config;

#[derive(Args, Debug)]
pub struct Server {
    #[arg(short, long, env = "MODULAR_API_PORT")]
    port: Option<u16>,
    #[arg(
        long,
        help = "run against a throwaway in-memory store; all data is erased on exit"
    )]
    dev: bool,
}

impl Server {
    pub async fn handle(self) -> anyhow::Result<()> {
        init_server_tracing();

        let mut config = if self.dev {
            println!("Starting in dev mode. All data will be erased on exit.");
            let tmpdir = tempfile::tempdir()?;
            std::env::set_var("MODULAR_API_MODE", "self-hosted");
            std::env::set_var("MODULAR_API_DATABASE_PATH", ":memory:");
            if std::env::var("MODULAR_API_SECRET_KEY").is_err() {
                std::env::set_var("MODULAR_API_SECRET_KEY", "dev-mode-secret-key");
            }
            std::env::set_var(
                "MODULAR_API_MODULES_PATH",
                tmpdir.path().join("modules").display().to_string(),
            );
            // The directory must outlive the server.
            std::mem::forget(tmpdir);
            Config::from_env()?
        } else {
            Config::from_env()?
        };
        if let Some(port) = self.port {
            config.port = port;
        }

        modular_system::start(config, modular_system::shutdown_signal()).await
    }
}

fn init_server_tracing() {
    let level =
        std::env::var("MODULAR_API_SERVER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level));

    match std::env::var("MODULAR_API_LOG_PATH").ok() {
        Some(path) => {
            match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => {
                    let _ = builder
                        .with_writer(move || {
                            file.try_clone().unwrap_or_else(|_| {
                                std::fs::OpenOptions::new()
                                    .append(true)
                                    .open("/dev/null")
                                    .expect("fallback writer")
                            })
                        })
                        .try_init();
                }
                Err(error) => {
                    eprintln!("unable to open log file `{path}`: {error}");
                    let _ = builder.try_init();
                }
            }
        }
        None => {
            let _ = builder.try_init();
        }
    }
}
