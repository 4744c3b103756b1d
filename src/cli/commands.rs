use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::application::Application;
use crate::config::Config;
use crate::router::{Router, RouterError};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer, ServerHandle, StaticFiles};

/// Command-line interface for a minimvc site
#[derive(Parser, Debug)]
#[command(name = "minimvc")]
#[command(about = "minimvc site runner", long_about = None)]
pub struct Cli {
    /// Site root containing config/, public/, resources/ and storage/
    #[arg(long, env = "MINIMVC_BASE_PATH", default_value = ".", global = true)]
    pub base_path: PathBuf,

    /// Configuration file (YAML or JSON); defaults to <base-path>/config/app.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve the site over HTTP
    Serve {
        /// Address to bind
        #[arg(long, env = "MINIMVC_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Print the route table
    Routes,
}

/// Defaults, then the config file, then process environment overrides.
///
/// # Errors
///
/// An explicitly named file that cannot be read or parsed. A missing default
/// file is not an error.
pub fn load_config(base_path: &Path, explicit: Option<&Path>) -> anyhow::Result<Config> {
    let config = match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let default = base_path.join("config").join("app.yaml");
            if default.is_file() {
                Config::load(&default)
                    .with_context(|| format!("Failed to load config {}", default.display()))?
            } else {
                Config::defaults()
            }
        }
    };
    Ok(config.with_process_env())
}

/// Run the parsed command. `routes` builds the site's route table.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration cannot be loaded
/// - A storage directory cannot be created
/// - Route registration fails (bad template, unknown `Controller#action`)
/// - The server fails to bind
pub fn run_cli<F>(cli: Cli, routes: F) -> anyhow::Result<()>
where
    F: FnOnce() -> Result<Router, RouterError>,
{
    let router = routes().context("Failed to build route table")?;

    match cli.command {
        Commands::Routes => {
            for line in router.dump_routes() {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Serve { addr } => {
            let config = load_config(&cli.base_path, cli.config.as_deref())?;
            RuntimeConfig::from_env().apply();

            let mut app = Application::bootstrap(&cli.base_path, config)
                .context("Failed to initialize services")?;
            app.set_router(router);

            let service = AppService::new(
                Arc::new(app),
                Some(StaticFiles::new(cli.base_path.join("public"))),
            );
            let handle = HttpServer(service)
                .start(addr.as_str())
                .with_context(|| format!("Failed to bind {addr}"))?;
            wait_for_shutdown(handle)
        }
    }
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, addr = %handle.addr(), "Shutdown signal received");
    }
    handle.stop();
    info!("Server stopped");
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("Server coroutine panicked: {e:?}"))
}
