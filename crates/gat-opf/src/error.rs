//! Error taxonomy for optimal power flow runs.
//!
//! A [`ConfigurationError`] means the network cannot be turned into a well-posed
//! optimization problem and is always detected before the first iteration. Numerical
//! trouble during the solve is not an error: it is reported through
//! [`SolveStatus::Infeasible`](crate::SolveStatus::Infeasible).

use gat_core::{BranchId, BusId, GenId, ModelError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Network has no in-service buses")]
    NoBuses,

    #[error("Network has no in-service generators")]
    NoGenerators,

    #[error("{entity} references unknown bus {bus:?}")]
    UnknownBus { entity: String, bus: BusId },

    #[error("Island containing bus {first:?} has {count} reference buses; exactly one is allowed")]
    MultipleReferenceBuses { first: BusId, count: usize },

    #[error("Generator {gen:?} has a malformed piecewise-linear cost: {reason}")]
    MalformedPiecewiseLinear { gen: GenId, reason: String },

    #[error("Generator {gen:?} is in service but has no cost model")]
    MissingCost { gen: GenId },

    #[error("Generator {gen:?} cost polynomial has degree {degree}; at most 2 is supported")]
    PolynomialDegree { gen: GenId, degree: usize },

    #[error("Generator {gen:?} cost polynomial has a non-finite coefficient")]
    NonFiniteCost { gen: GenId },

    #[error("Generator {gen:?} cost polynomial is concave (negative quadratic coefficient)")]
    NonConvexPolynomial { gen: GenId },

    #[error("Branch {branch:?} has near-zero reactance {reactance:e} p.u.")]
    NearZeroReactance { branch: BranchId, reactance: f64 },

    #[error("Invalid limits on {entity}: {reason}")]
    InvalidLimits { entity: String, reason: String },
}

/// Errors returned by [`OpfSolver::solve`](crate::OpfSolver::solve).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpfError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl OpfError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, OpfError::Configuration(_))
    }
}
