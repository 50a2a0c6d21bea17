use clap::{Args, CommandFactory, Parser, Subcommand};
use gat_opf::{Formulation, OpfOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gat", author, version, about, long_about = None)]
pub struct Cli {
    /// Minimum level of the diagnostics written to stderr (`RUST_LOG` refines it)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimal power flow
    Opf {
        #[command(subcommand)]
        command: OpfCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum OpfCommands {
    /// Run DC optimal power flow
    Dc(OpfArgs),
    /// Run AC optimal power flow
    Ac(OpfArgs),
}

impl OpfCommands {
    pub fn formulation(&self) -> Formulation {
        match self {
            OpfCommands::Dc(_) => Formulation::Dc,
            OpfCommands::Ac(_) => Formulation::Ac,
        }
    }

    pub fn args(&self) -> &OpfArgs {
        match self {
            OpfCommands::Dc(args) | OpfCommands::Ac(args) => args,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OpfArgs {
    /// Network snapshot (JSON); read from stdin when omitted
    #[arg(long, short)]
    pub input: Option<PathBuf>,
    /// Maximum number of interior-point iterations
    #[arg(long, default_value = "150")]
    pub max_iter: usize,
    /// Convergence tolerance
    #[arg(long, default_value = "1e-6")]
    pub tol: f64,
    /// Enforce branch angle-difference limits
    #[arg(long)]
    pub angle_limits: bool,
    /// Search for a cheaper unit commitment by switching off expensive units
    #[arg(long)]
    pub decommit: bool,
    /// Print the solve summary and the populated network as JSON
    #[arg(long)]
    pub json: bool,
    /// Linear solver for the Newton steps (gauss, faer)
    #[arg(long, default_value = "faer")]
    pub solver: String,
}

impl OpfArgs {
    /// Solver options for `formulation`; the linear solver is resolved separately.
    pub fn options(&self, formulation: Formulation) -> OpfOptions {
        OpfOptions {
            formulation,
            max_iterations: self.max_iter,
            tolerance: self.tol,
            ignore_angle_limits: !self.angle_limits,
            ..OpfOptions::default()
        }
    }
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
