//! # Sparse network matrices
//!
//! Both builders walk the in-service branches of a [`NetworkIndex`](crate::opf::NetworkIndex)
//! once, collect triplets and freeze them to CSR:
//!
//! - [`susceptance`]: the linearized `B`, `Bf` pair and the phase-shift injections used by
//!   the DC formulation
//! - [`ybus`]: complex bus and branch admittances (`Ybus`, `Yf`, `Yt`) used by the AC
//!   formulation
//!
//! Rows and columns follow the model ordering of the index, not network positions.

pub mod susceptance;
pub mod ybus;

pub use susceptance::DcMatrices;
pub use ybus::Admittance;

use crate::error::ConfigurationError;
use gat_core::Branch;

/// How branches with (near-)zero series reactance are treated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactancePolicy {
    pub min_reactance: f64,
    /// Replace small reactances by `min_reactance` (sign preserved) instead of failing.
    pub clamp: bool,
}

impl Default for ReactancePolicy {
    fn default() -> Self {
        Self {
            min_reactance: 1e-9,
            clamp: false,
        }
    }
}

impl ReactancePolicy {
    /// Series reactance to use for `branch`.
    pub fn reactance(&self, branch: &Branch) -> Result<f64, ConfigurationError> {
        let x = branch.reactance;
        if x.is_finite() && x.abs() >= self.min_reactance {
            return Ok(x);
        }
        if self.clamp && x.is_finite() {
            return Ok(if x < 0.0 {
                -self.min_reactance
            } else {
                self.min_reactance
            });
        }
        Err(ConfigurationError::NearZeroReactance {
            branch: branch.id,
            reactance: x,
        })
    }
}
