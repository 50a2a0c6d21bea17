//! Problem description consumed by the interior-point solver.

use sprs::{CsMat, TriMat};

/// Smooth part of an optimization problem: cost plus optional nonlinear constraints.
///
/// The solver owns linear rows and variable bounds; implementors only describe
/// `f(x)`, `g(x) = 0` and `h(x) ≤ 0` with their derivatives.
pub trait NonlinearProblem {
    /// Cost value and gradient.
    fn objective(&self, x: &[f64]) -> (f64, Vec<f64>);

    /// Cost Hessian (nx × nx).
    fn objective_hessian(&self, x: &[f64]) -> CsMat<f64>;

    /// Nonlinear constraint values and Jacobians, `None` when there are none.
    fn nonlinear_constraints(&self, _x: &[f64]) -> Option<NonlinearConstraints> {
        None
    }

    /// `Σ λ_i ∇²g_i(x) + Σ μ_j ∇²h_j(x)`, `None` when there are no nonlinear constraints.
    fn constraint_hessian(&self, _x: &[f64], _lam: &[f64], _mu: &[f64]) -> Option<CsMat<f64>> {
        None
    }
}

/// Values and Jacobians of `h(x) ≤ 0` and `g(x) = 0`.
#[derive(Debug, Clone)]
pub struct NonlinearConstraints {
    pub h: Vec<f64>,
    pub g: Vec<f64>,
    /// `∂h/∂x` (nh × nx)
    pub jh: CsMat<f64>,
    /// `∂g/∂x` (ng × nx)
    pub jg: CsMat<f64>,
}

/// `l ≤ A·x ≤ u`; infinite sides are `±f64::INFINITY` (anything beyond ±1e10 counts).
#[derive(Debug, Clone)]
pub struct LinearConstraints {
    pub a: CsMat<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl LinearConstraints {
    pub fn empty(nx: usize) -> Self {
        Self {
            a: TriMat::new((0, nx)).to_csr(),
            lower: Vec::new(),
            upper: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.lower.len()
    }
}

/// `f(x) = ½·xᵀHx + cᵀx + c0`
#[derive(Debug, Clone)]
pub struct QuadraticObjective {
    pub hessian: CsMat<f64>,
    pub linear: Vec<f64>,
    pub constant: f64,
}

impl QuadraticObjective {
    pub fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let mut grad = self.linear.clone();
        for (&v, (i, j)) in self.hessian.iter() {
            grad[i] += v * x[j];
        }
        let f = x
            .iter()
            .zip(&grad)
            .zip(&self.linear)
            .map(|((xi, gi), ci)| 0.5 * xi * (gi + ci))
            .sum::<f64>()
            + self.constant;
        (f, grad)
    }
}

impl NonlinearProblem for QuadraticObjective {
    fn objective(&self, x: &[f64]) -> (f64, Vec<f64>) {
        self.evaluate(x)
    }

    fn objective_hessian(&self, _x: &[f64]) -> CsMat<f64> {
        self.hessian.clone()
    }
}
