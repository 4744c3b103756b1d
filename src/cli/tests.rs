//! Unit tests for CLI commands

use crate::cli::{load_config, Cli, Commands};
use clap::Parser;
use std::fs;

#[test]
fn test_serve_command_with_addr() {
    let cli = Cli::try_parse_from(["minimvc", "serve", "--addr", "127.0.0.1:9000"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Serve {
            addr: "127.0.0.1:9000".to_string()
        }
    );
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli =
        Cli::try_parse_from(["minimvc", "routes", "--base-path", "/srv/site", "-c", "app.json"])
            .unwrap();
    assert_eq!(cli.command, Commands::Routes);
    assert_eq!(cli.base_path.to_string_lossy(), "/srv/site");
    assert_eq!(cli.config.unwrap().to_string_lossy(), "app.json");
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["minimvc", "generate"]).is_err());
}

#[test]
fn test_load_config_prefers_site_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/app.yaml"),
        "app:\n  name: Site From File\n",
    )
    .unwrap();

    let config = load_config(dir.path(), None).unwrap();
    assert_eq!(config.str("app.name", ""), "Site From File");
}

#[test]
fn test_load_config_missing_explicit_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_config(dir.path(), Some(&dir.path().join("nope.yaml"))).is_err());
}
