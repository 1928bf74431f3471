//! Pin-set reconciliation daemon binary.

mod cli;
mod commands;
mod config;
mod logging;

use clap::Parser;
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();
    logging::init_logging(&cli.logs)?;

    match cli.command {
        cli::Commands::Run(args) => commands::run::run(args).await,
        cli::Commands::Report(args) => commands::report::run(args),
    }
}
