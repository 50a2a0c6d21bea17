//! `gat` command-line entry point.
//!
//! Exit status: 0 when the solve converged, 2 when it ran but did not converge,
//! 1 on any error (unreadable input, configuration errors).

use clap::Parser;
use gat_cli::cli::{Cli, Commands};
use std::io;
use std::process::ExitCode;
use tracing::error;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level.into()),
        )
        .with_writer(io::stderr)
        .init();

    let outcome = match &cli.command {
        Commands::Opf { command } => commands::opf::handle(command),
    };
    match outcome {
        Ok(result) if result.is_converged() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
