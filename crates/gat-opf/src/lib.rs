//! # gat-opf: Optimal Power Flow
//!
//! Least-cost generator dispatch for a [`gat_core::Network`], with locational prices.
//!
//! Two formulations share one pipeline:
//!
//! - **DC**: linearized lossless flows; a quadratic program over bus angles and active
//!   output
//! - **AC**: polar power flow with voltage magnitudes, reactive output and apparent
//!   power branch limits
//!
//! Both are solved by the primal-dual interior-point method in [`ipm`]. Polynomial
//! costs up to degree 2 enter the objective directly; convex piecewise-linear costs
//! are modeled with one epigraph variable per generator.
//!
//! ## Modules
//!
//! - [`sparse`]: DC susceptance and AC admittance matrices
//! - [`opf`]: cost normalization, constraint assembly, AC callbacks, solution
//!   mapping, decommitment
//! - [`ipm`]: the interior-point solver
//! - [`error`]: configuration errors
//!
//! ## Logging
//!
//! The crate emits `tracing` events (solve summaries at `info`, model sizes at `debug`,
//! per-iteration measures at `trace`) and never installs a subscriber.

pub mod error;
pub mod ipm;
pub mod opf;
pub mod sparse;

pub use error::{ConfigurationError, OpfError};
pub use opf::decommit::{solve_with_decommitment, DecommitResult};
pub use opf::{Formulation, OpfOptions, OpfSolver, SolveResult, SolveStatus};

use gat_core::Network;

/// Solve with explicit options; shorthand for `OpfSolver::with_options(..).solve(..)`.
pub fn solve(network: &mut Network, options: &OpfOptions) -> Result<SolveResult, OpfError> {
    OpfSolver::with_options(options.clone()).solve(network)
}
