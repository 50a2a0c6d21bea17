//! Errors raised while building or checking a [`Network`](crate::Network).
//!
//! These are structural problems with the model itself (duplicate ids, dangling
//! references, malformed cost curves). Problems that only matter to a particular
//! optimization run are reported by the solver crate.

use crate::{BranchId, BusId, GenId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate bus id {0:?}")]
    DuplicateBus(BusId),

    #[error("Branch {branch:?} references unknown bus {bus:?}")]
    BranchUnknownBus { branch: BranchId, bus: BusId },

    #[error("Generator {gen:?} references unknown bus {bus:?}")]
    GenUnknownBus { gen: GenId, bus: BusId },

    /// Cost curve fails its shape invariants (see [`CostModel::validate`](crate::CostModel::validate)).
    #[error("Invalid cost curve: {0}")]
    InvalidCostCurve(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convenience alias for model-level results.
pub type ModelResult<T> = Result<T, ModelError>;
