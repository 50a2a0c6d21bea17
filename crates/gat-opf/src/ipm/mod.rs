//! # Primal-dual interior-point solver
//!
//! Solves
//!
//! ```text
//! min f(x)   s.t.   g(x) = 0,  h(x) ≤ 0,  l ≤ A·x ≤ u,  xmin ≤ x ≤ xmax
//! ```
//!
//! with the step rule of the MATPOWER Interior Point Solver (MIPS): bound rows are
//! stacked as identity rows above `A`, every row is classified as equality, one-sided
//! or boxed, and the one-sided/boxed rows join `h` as linear inequalities with slacks
//! `z > 0` and multipliers `μ > 0`. Each iteration solves the reduced Newton system
//!
//! ```text
//! [ M   Jgᵀ ] [ dx ]   [ -N ]      M = Lxx + Jhᵀ·Z⁻¹·diag(μ)·Jh
//! [ Jg  0   ] [ dλ ] = [ -g ]      N = Lx  + Jhᵀ·Z⁻¹·(μ∘h + γ·e)
//! ```
//!
//! then recovers `dz`, `dμ`, takes fraction-to-boundary steps and shrinks the barrier
//! parameter `γ = σ·zᵀμ / n_ineq`.
//!
//! ## References
//!
//! - H. Wang, C. E. Murillo-Sánchez, R. D. Zimmerman, R. J. Thomas, "On Computational
//!   Issues of Market-Based Optimal Power Flow", IEEE Trans. Power Systems 22(3), 2007.

mod problem;

pub use problem::{LinearConstraints, NonlinearConstraints, NonlinearProblem, QuadraticObjective};

use gat_core::solver::{DenseMatrix, LinearSystemBackend};
use serde::Serialize;
use sprs::CsMat;
use tracing::{debug, trace};

/// Anything at or beyond this magnitude is an absent bound.
pub const INFINITE_BOUND: f64 = 1e10;

/// Solver parameters. Defaults match MIPS.
#[derive(Debug, Clone, PartialEq)]
pub struct IpmOptions {
    pub max_iterations: usize,
    pub feasibility_tolerance: f64,
    pub gradient_tolerance: f64,
    pub complementarity_tolerance: f64,
    pub cost_tolerance: f64,
    /// Cost scaling applied to `f`, its gradient and Hessian while iterating
    pub cost_mult: f64,
    /// Fraction-to-boundary factor
    pub xi: f64,
    /// Centering parameter
    pub sigma: f64,
    /// Initial slack and multiplier value
    pub z0: f64,
    /// Smallest step accepted before declaring numerical failure
    pub alpha_min: f64,
    /// Inactive inequality multipliers below this are reported as zero
    pub mu_threshold: f64,
}

impl Default for IpmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 150,
            feasibility_tolerance: 1e-6,
            gradient_tolerance: 1e-6,
            complementarity_tolerance: 1e-6,
            cost_tolerance: 1e-6,
            cost_mult: 1.0,
            xi: 0.99995,
            sigma: 0.1,
            z0: 1.0,
            alpha_min: 1e-8,
            mu_threshold: 1e-5,
        }
    }
}

impl IpmOptions {
    /// Use the same tolerance for all four termination tests.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.feasibility_tolerance = tolerance;
        self.gradient_tolerance = tolerance;
        self.complementarity_tolerance = tolerance;
        self.cost_tolerance = tolerance;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpmStatus {
    Converged,
    MaxIterations,
    NumericalFailure,
}

/// Lagrange multipliers, unscaled.
///
/// `mu_l`/`mu_u` belong to the rows of `A`; `lower`/`upper` to the variable bounds.
/// Equality rows report a positive multiplier on `mu_u` and a negative one (negated)
/// on `mu_l`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Multipliers {
    pub eq_nonlin: Vec<f64>,
    pub ineq_nonlin: Vec<f64>,
    pub mu_l: Vec<f64>,
    pub mu_u: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Scaled termination measures of the last iterate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConvergenceMeasures {
    pub feasibility: f64,
    pub gradient: f64,
    pub complementarity: f64,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct IpmSolution {
    pub x: Vec<f64>,
    /// Unscaled cost at `x`
    pub f: f64,
    pub status: IpmStatus,
    pub iterations: usize,
    pub multipliers: Multipliers,
    pub measures: ConvergenceMeasures,
}

/// Sparse rows as `(column, value)` lists.
#[derive(Debug, Clone, Default)]
struct RowMatrix {
    rows: Vec<Vec<(usize, f64)>>,
}

impl RowMatrix {
    fn from_csmat(m: &CsMat<f64>) -> Self {
        let mut rows = vec![Vec::new(); m.rows()];
        for (&v, (i, j)) in m.iter() {
            rows[i].push((j, v));
        }
        Self { rows }
    }

    fn push(&mut self, row: Vec<(usize, f64)>) {
        self.rows.push(row);
    }

    fn extend(&mut self, other: &RowMatrix) {
        self.rows.extend(other.rows.iter().cloned());
    }

    fn mul(&self, x: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(j, v)| v * x[j]).sum::<f64>())
            .collect()
    }

    /// `out += selfᵀ·y`
    fn tmul_add(&self, y: &[f64], out: &mut [f64]) {
        for (row, &w) in self.rows.iter().zip(y) {
            if w == 0.0 {
                continue;
            }
            for &(j, v) in row {
                out[j] += v * w;
            }
        }
    }
}

/// Row classes of the stacked `[I; A]` system.
struct RowClasses {
    eq: Vec<usize>,
    upper_only: Vec<usize>,
    lower_only: Vec<usize>,
    boxed: Vec<usize>,
}

impl RowClasses {
    fn classify(lower: &[f64], upper: &[f64]) -> Self {
        let mut classes = RowClasses {
            eq: Vec::new(),
            upper_only: Vec::new(),
            lower_only: Vec::new(),
            boxed: Vec::new(),
        };
        for (r, (&l, &u)) in lower.iter().zip(upper).enumerate() {
            let has_lower = l > -INFINITE_BOUND;
            let has_upper = u < INFINITE_BOUND;
            if has_lower && has_upper && (u - l).abs() <= f64::EPSILON {
                classes.eq.push(r);
            } else if has_lower && has_upper {
                classes.boxed.push(r);
            } else if has_upper {
                classes.upper_only.push(r);
            } else if has_lower {
                classes.lower_only.push(r);
            }
        }
        classes
    }
}

/// Objective, constraints and Jacobians at one point (cost already scaled).
struct Evaluation {
    f: f64,
    df: Vec<f64>,
    h: Vec<f64>,
    g: Vec<f64>,
    jh: RowMatrix,
    jg: RowMatrix,
}

struct Stacked<'a> {
    ae: &'a RowMatrix,
    be: &'a [f64],
    ai: &'a RowMatrix,
    bi: &'a [f64],
}

impl Stacked<'_> {
    fn evaluate<P: NonlinearProblem + ?Sized>(
        &self,
        problem: &P,
        x: &[f64],
        cost_mult: f64,
    ) -> (Evaluation, usize, usize) {
        let (f, mut df) = problem.objective(x);
        df.iter_mut().for_each(|d| *d *= cost_mult);

        let (mut h, mut g, mut jh, mut jg) = match problem.nonlinear_constraints(x) {
            Some(nl) => (
                nl.h,
                nl.g,
                RowMatrix::from_csmat(&nl.jh),
                RowMatrix::from_csmat(&nl.jg),
            ),
            None => (Vec::new(), Vec::new(), RowMatrix::default(), RowMatrix::default()),
        };
        let (niq_nl, neq_nl) = (h.len(), g.len());

        h.extend(self.ai.mul(x).iter().zip(self.bi).map(|(v, b)| v - b));
        g.extend(self.ae.mul(x).iter().zip(self.be).map(|(v, b)| v - b));
        jh.extend(self.ai);
        jg.extend(self.ae);

        (
            Evaluation {
                f: f * cost_mult,
                df,
                h,
                g,
                jh,
                jg,
            },
            neq_nl,
            niq_nl,
        )
    }
}

fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `Lx = df + Jgᵀλ + Jhᵀμ`
fn lagrangian_gradient(eval: &Evaluation, lam: &[f64], mu: &[f64]) -> Vec<f64> {
    let mut lx = eval.df.clone();
    eval.jg.tmul_add(lam, &mut lx);
    eval.jh.tmul_add(mu, &mut lx);
    lx
}

fn measures(
    eval: &Evaluation,
    lx: &[f64],
    x: &[f64],
    z: &[f64],
    lam: &[f64],
    mu: &[f64],
    f0: f64,
) -> ConvergenceMeasures {
    let max_h = eval.h.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let xnorm = norm_inf(x);
    ConvergenceMeasures {
        feasibility: norm_inf(&eval.g).max(max_h) / (1.0 + xnorm.max(norm_inf(z))),
        gradient: norm_inf(lx) / (1.0 + norm_inf(lam).max(norm_inf(mu))),
        complementarity: dot(z, mu) / (1.0 + xnorm),
        cost: (eval.f - f0).abs() / (1.0 + f0.abs()),
    }
}

fn converged(m: &ConvergenceMeasures, options: &IpmOptions) -> bool {
    m.feasibility < options.feasibility_tolerance
        && m.gradient < options.gradient_tolerance
        && m.complementarity < options.complementarity_tolerance
        && m.cost < options.cost_tolerance
}

/// Largest step in `(0, 1]` keeping `v + α·dv` positive, damped by `xi`.
fn step_to_boundary(v: &[f64], dv: &[f64], xi: f64) -> f64 {
    let ratio = v
        .iter()
        .zip(dv)
        .filter(|(_, d)| **d < 0.0)
        .map(|(vi, di)| vi / -di)
        .fold(f64::INFINITY, f64::min);
    if ratio.is_finite() {
        (xi * ratio).min(1.0)
    } else {
        1.0
    }
}

/// Run the interior-point method from `x0`.
///
/// Never fails: a singular Newton system, a vanishing step or a runaway barrier
/// parameter ends the run with [`IpmStatus::NumericalFailure`] and the last finite
/// iterate.
pub fn solve<P: NonlinearProblem + ?Sized>(
    problem: &P,
    linear: &LinearConstraints,
    xmin: &[f64],
    xmax: &[f64],
    x0: &[f64],
    options: &IpmOptions,
    backend: &dyn LinearSystemBackend,
) -> IpmSolution {
    let nx = x0.len();
    let na = linear.rows();
    let cost_mult = options.cost_mult;

    // [I; A] with [xmin; l] .. [xmax; u]
    let a_rows = RowMatrix::from_csmat(&linear.a);
    let stacked_row = |r: usize| -> Vec<(usize, f64)> {
        if r < nx {
            vec![(r, 1.0)]
        } else {
            a_rows.rows[r - nx].clone()
        }
    };
    let ll: Vec<f64> = xmin.iter().chain(&linear.lower).copied().collect();
    let uu: Vec<f64> = xmax.iter().chain(&linear.upper).copied().collect();
    let classes = RowClasses::classify(&ll, &uu);

    let mut ae = RowMatrix::default();
    let mut be = Vec::with_capacity(classes.eq.len());
    for &r in &classes.eq {
        ae.push(stacked_row(r));
        be.push(uu[r]);
    }
    let negate = |row: Vec<(usize, f64)>| row.into_iter().map(|(j, v)| (j, -v)).collect();
    let mut ai = RowMatrix::default();
    let mut bi = Vec::new();
    for &r in &classes.upper_only {
        ai.push(stacked_row(r));
        bi.push(uu[r]);
    }
    for &r in &classes.lower_only {
        ai.push(negate(stacked_row(r)));
        bi.push(-ll[r]);
    }
    for &r in &classes.boxed {
        ai.push(stacked_row(r));
        bi.push(uu[r]);
    }
    for &r in &classes.boxed {
        ai.push(negate(stacked_row(r)));
        bi.push(-ll[r]);
    }
    let stacked = Stacked {
        ae: &ae,
        be: &be,
        ai: &ai,
        bi: &bi,
    };

    let mut x = x0.to_vec();
    let (mut eval, neq_nl, niq_nl) = stacked.evaluate(problem, &x, cost_mult);
    let neq = eval.g.len();
    let niq = eval.h.len();
    debug!(nx, na, neq, niq, "interior point start");

    let mut gamma = 1.0;
    let mut lam = vec![0.0; neq];
    let mut z = vec![options.z0; niq];
    let mut mu = vec![options.z0; niq];
    for k in 0..niq {
        if eval.h[k] < -options.z0 {
            z[k] = -eval.h[k];
        }
        if gamma / z[k] > options.z0 {
            mu[k] = gamma / z[k];
        }
    }

    let mut f0 = eval.f;
    let mut lx = lagrangian_gradient(&eval, &lam, &mu);
    let mut conds = measures(&eval, &lx, &x, &z, &lam, &mu, f0);
    let mut status = if converged(&conds, options) {
        IpmStatus::Converged
    } else {
        IpmStatus::MaxIterations
    };
    let mut iterations = 0;

    while status == IpmStatus::MaxIterations && iterations < options.max_iterations {
        iterations += 1;

        let mut kkt = DenseMatrix::zeros(nx + neq);
        for (&v, (i, j)) in problem.objective_hessian(&x).iter() {
            kkt.add(i, j, cost_mult * v);
        }
        if neq_nl + niq_nl > 0 {
            if let Some(hess) =
                problem.constraint_hessian(&x, &lam[..neq_nl], &mu[..niq_nl])
            {
                for (&v, (i, j)) in hess.iter() {
                    kkt.add(i, j, v);
                }
            }
        }
        let mut n_vec = lx.clone();
        let mut weights = vec![0.0; niq];
        for k in 0..niq {
            weights[k] = (mu[k] * eval.h[k] + gamma) / z[k];
        }
        eval.jh.tmul_add(&weights, &mut n_vec);
        for (k, row) in eval.jh.rows.iter().enumerate() {
            let w = mu[k] / z[k];
            for &(i, a) in row {
                for &(j, b) in row {
                    kkt.add(i, j, w * a * b);
                }
            }
        }
        for (k, row) in eval.jg.rows.iter().enumerate() {
            for &(i, a) in row {
                kkt.add(nx + k, i, a);
                kkt.add(i, nx + k, a);
            }
        }
        let rhs: Vec<f64> = n_vec
            .iter()
            .chain(&eval.g)
            .map(|v| -v)
            .collect();

        let step = match backend.solve(&kkt, &rhs) {
            Ok(step) => step,
            Err(err) => {
                debug!(iteration = iterations, %err, "Newton system could not be solved");
                status = IpmStatus::NumericalFailure;
                break;
            }
        };
        let (dx, dlam) = step.split_at(nx);

        let jh_dx = eval.jh.mul(dx);
        let dz: Vec<f64> = (0..niq).map(|k| -eval.h[k] - z[k] - jh_dx[k]).collect();
        let dmu: Vec<f64> = (0..niq)
            .map(|k| -mu[k] + (gamma - mu[k] * dz[k]) / z[k])
            .collect();

        let alpha_p = step_to_boundary(&z, &dz, options.xi);
        let alpha_d = step_to_boundary(&mu, &dmu, options.xi);

        let previous = (x.clone(), z.clone(), lam.clone(), mu.clone());
        x.iter_mut().zip(dx).for_each(|(v, d)| *v += alpha_p * d);
        z.iter_mut().zip(&dz).for_each(|(v, d)| *v += alpha_p * d);
        lam.iter_mut().zip(dlam).for_each(|(v, d)| *v += alpha_d * d);
        mu.iter_mut().zip(&dmu).for_each(|(v, d)| *v += alpha_d * d);
        if niq > 0 {
            gamma = options.sigma * dot(&z, &mu) / niq as f64;
        }

        if x.iter().any(|v| !v.is_finite()) {
            (x, z, lam, mu) = previous;
            status = IpmStatus::NumericalFailure;
            break;
        }

        (eval, _, _) = stacked.evaluate(problem, &x, cost_mult);
        lx = lagrangian_gradient(&eval, &lam, &mu);
        conds = measures(&eval, &lx, &x, &z, &lam, &mu, f0);
        trace!(
            iteration = iterations,
            f = eval.f / cost_mult,
            feas = conds.feasibility,
            grad = conds.gradient,
            comp = conds.complementarity,
            cost = conds.cost,
            gamma,
            alpha_p,
            alpha_d,
            "interior point iteration"
        );

        if converged(&conds, options) {
            status = IpmStatus::Converged;
        } else if !eval.f.is_finite()
            || alpha_p < options.alpha_min
            || alpha_d < options.alpha_min
            || gamma < f64::EPSILON
            || gamma > 1.0 / f64::EPSILON
        {
            status = IpmStatus::NumericalFailure;
        }
        f0 = eval.f;
    }

    if status == IpmStatus::NumericalFailure {
        eval = stacked.evaluate(problem, &x, cost_mult).0;
    }
    debug!(?status, iterations, "interior point finished");

    // inactive inequalities carry no price
    for k in 0..niq {
        if eval.h[k] < -options.feasibility_tolerance && mu[k] < options.mu_threshold {
            mu[k] = 0.0;
        }
    }
    lam.iter_mut().for_each(|v| *v /= cost_mult);
    mu.iter_mut().for_each(|v| *v /= cost_mult);

    let multipliers = unpack_multipliers(&classes, &lam, &mu, neq_nl, niq_nl, nx, na);
    IpmSolution {
        f: eval.f / cost_mult,
        x,
        status,
        iterations,
        multipliers,
        measures: conds,
    }
}

fn unpack_multipliers(
    classes: &RowClasses,
    lam: &[f64],
    mu: &[f64],
    neq_nl: usize,
    niq_nl: usize,
    nx: usize,
    na: usize,
) -> Multipliers {
    let lam_lin = &lam[neq_nl..];
    let mu_lin = &mu[niq_nl..];
    let mut mu_l = vec![0.0; nx + na];
    let mut mu_u = vec![0.0; nx + na];

    for (&r, &v) in classes.eq.iter().zip(lam_lin) {
        if v < 0.0 {
            mu_l[r] = -v;
        } else if v > 0.0 {
            mu_u[r] = v;
        }
    }
    let nlt = classes.upper_only.len();
    let ngt = classes.lower_only.len();
    let nbx = classes.boxed.len();
    for (k, &r) in classes.upper_only.iter().enumerate() {
        mu_u[r] = mu_lin[k];
    }
    for (k, &r) in classes.lower_only.iter().enumerate() {
        mu_l[r] = mu_lin[nlt + k];
    }
    for (k, &r) in classes.boxed.iter().enumerate() {
        mu_u[r] = mu_lin[nlt + ngt + k];
        mu_l[r] = mu_lin[nlt + ngt + nbx + k];
    }

    let mu_l_rows = mu_l.split_off(nx);
    let mu_u_rows = mu_u.split_off(nx);
    Multipliers {
        eq_nonlin: lam[..neq_nl].to_vec(),
        ineq_nonlin: mu[..niq_nl].to_vec(),
        mu_l: mu_l_rows,
        mu_u: mu_u_rows,
        lower: mu_l,
        upper: mu_u,
    }
}
