use clap::Parser;
use minimvc::cli::{run_cli, Cli};
use minimvc::telemetry;

mod site;

fn main() -> anyhow::Result<()> {
    let _logging = telemetry::init_logging()?;
    run_cli(Cli::parse(), site::routes)
}
