use std::fmt;

use gat_core::solver::LinearSolverKind;
use serde::{Deserialize, Serialize};

use crate::ipm::IpmStatus;

/// Network model used by the optimizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formulation {
    /// Linearized lossless power flow (quadratic program)
    #[default]
    Dc,
    /// Full nonlinear power flow in polar coordinates
    Ac,
}

impl Formulation {
    /// Objective scaling used while iterating when none is configured.
    pub fn default_cost_mult(self) -> f64 {
        match self {
            Formulation::Dc => 1.0,
            Formulation::Ac => 1e-4,
        }
    }
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formulation::Dc => write!(f, "dc"),
            Formulation::Ac => write!(f, "ac"),
        }
    }
}

impl std::str::FromStr for Formulation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dc" => Ok(Formulation::Dc),
            "ac" => Ok(Formulation::Ac),
            _ => Err(format!("Unknown OPF formulation: {}", s)),
        }
    }
}

/// Solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpfOptions {
    pub formulation: Formulation,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Leave branch angle-difference limits out of the model
    pub ignore_angle_limits: bool,
    /// Smallest admissible series reactance (p.u.)
    pub min_reactance: f64,
    /// Clamp reactances below `min_reactance` instead of rejecting the branch
    pub clamp_reactance: bool,
    /// Objective scaling; `None` picks the formulation default
    pub cost_mult: Option<f64>,
    pub linear_solver: LinearSolverKind,
}

impl Default for OpfOptions {
    fn default() -> Self {
        Self {
            formulation: Formulation::Dc,
            max_iterations: 150,
            tolerance: 1e-6,
            ignore_angle_limits: true,
            min_reactance: 1e-9,
            clamp_reactance: false,
            cost_mult: None,
            linear_solver: LinearSolverKind::default(),
        }
    }
}

impl OpfOptions {
    pub fn cost_mult(&self) -> f64 {
        self.cost_mult
            .unwrap_or_else(|| self.formulation.default_cost_mult())
    }
}

/// Terminal state of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Converged,
    MaxIterationsExceeded,
    /// No feasible dispatch exists, or the iteration broke down numerically
    Infeasible,
}

impl From<IpmStatus> for SolveStatus {
    fn from(status: IpmStatus) -> Self {
        match status {
            IpmStatus::Converged => SolveStatus::Converged,
            IpmStatus::MaxIterations => SolveStatus::MaxIterationsExceeded,
            IpmStatus::NumericalFailure => SolveStatus::Infeasible,
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Converged => write!(f, "converged"),
            SolveStatus::MaxIterationsExceeded => write!(f, "max iterations exceeded"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
        }
    }
}

/// Summary of one solve. Detailed results are written onto the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub status: SolveStatus,
    /// Total production cost ($/h)
    pub objective: f64,
    pub iterations: usize,
    pub solve_time_ms: u128,
    pub formulation: Formulation,
}

impl SolveResult {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}
