//! # CLI Module
//!
//! Command-line entry point for a `minimvc` site.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Bootstrap the application under `--base-path` and serve it until SIGINT
//! or SIGTERM:
//!
//! ```bash
//! minimvc --base-path ./site serve --addr 127.0.0.1:8080
//! ```
//!
//! ### `routes`
//!
//! Print the route table in priority order, one line per route:
//!
//! ```bash
//! minimvc routes
//! ```
//!
//! ## Configuration
//!
//! `--config` names a YAML or JSON file. Without it `config/app.yaml` under
//! the base path is used when present. Environment overrides (`APP_ENV`,
//! `APP_DEBUG`, ...) apply last.
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use clap::Parser;
//! use minimvc::cli::{run_cli, Cli};
//!
//! run_cli(Cli::parse(), site::routes)?;
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{load_config, run_cli, Cli, Commands};
