//! Optimal power flow driver.
//!
//! A solve runs the same pipeline for both formulations:
//!
//! 1. classify buses and index the participating elements ([`NetworkIndex`])
//! 2. normalize cost curves and check limits (all configuration errors surface here)
//! 3. build the network matrices (`B`/`Bf` for DC, `Ybus`/`Yf`/`Yt` for AC)
//! 4. assemble the [`OptimizationModel`](model::OptimizationModel)
//! 5. run the interior-point method
//! 6. write prices, flows and dispatch back onto the network
//!
//! ```
//! use gat_core::*;
//! use gat_opf::{OpfSolver, SolveStatus};
//!
//! let mut network = Network::new("two-bus");
//! network.add_bus(Bus::new(BusId::new(1), "gen").as_reference()).unwrap();
//! network.add_bus(Bus::new(BusId::new(2), "load").with_demand(50.0, 0.0)).unwrap();
//! network
//!     .add_branch(Branch::new(BranchId::new(1), "1-2", BusId::new(1), BusId::new(2), 0.0, 0.1))
//!     .unwrap();
//! network
//!     .add_gen(
//!         Gen::new(GenId::new(1), "G1", BusId::new(1))
//!             .with_p_limits(0.0, 100.0)
//!             .with_cost(CostModel::linear(0.0, 20.0)),
//!     )
//!     .unwrap();
//!
//! let result = OpfSolver::new().solve(&mut network).unwrap();
//! assert_eq!(result.status, SolveStatus::Converged);
//! assert!((network.gens[0].p.value() - 50.0).abs() < 1e-4);
//! assert!((network.buses[1].p_lambda - 20.0).abs() < 1e-4);
//! ```

pub mod ac;
pub mod constraints;
pub mod costs;
pub mod decommit;
mod index;
pub mod mapper;
pub mod model;
mod types;

pub use index::{IslandIndex, NetworkIndex};
pub use types::{Formulation, OpfOptions, SolveResult, SolveStatus};

use std::time::Instant;

use crate::error::OpfError;
use crate::ipm::{self, IpmOptions, IpmSolution};
use crate::sparse::{Admittance, DcMatrices, ReactancePolicy};
use ac::AcProblem;
use gat_core::solver::LinearSolverKind;
use gat_core::Network;
use mapper::FlowModel;
use model::OptimizationModel;
use tracing::{debug, info, warn};

/// Optimal power flow solver. Immutable once configured; one instance can serve
/// any number of solves, from any thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpfSolver {
    options: OpfOptions,
}

impl OpfSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: OpfOptions) -> Self {
        Self { options }
    }

    pub fn with_formulation(mut self, formulation: Formulation) -> Self {
        self.options.formulation = formulation;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.options.max_iterations = max_iterations;
        self
    }

    /// Termination tolerance shared by the feasibility, gradient, complementarity and
    /// cost tests.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.options.tolerance = tolerance;
        self
    }

    /// Include branch angle-difference limits.
    pub fn with_angle_limits(mut self, enabled: bool) -> Self {
        self.options.ignore_angle_limits = !enabled;
        self
    }

    pub fn with_min_reactance(mut self, min_reactance: f64) -> Self {
        self.options.min_reactance = min_reactance;
        self
    }

    pub fn with_clamp_reactance(mut self, clamp: bool) -> Self {
        self.options.clamp_reactance = clamp;
        self
    }

    pub fn with_cost_mult(mut self, cost_mult: f64) -> Self {
        self.options.cost_mult = Some(cost_mult);
        self
    }

    pub fn with_linear_solver(mut self, kind: LinearSolverKind) -> Self {
        self.options.linear_solver = kind;
        self
    }

    pub fn options(&self) -> &OpfOptions {
        &self.options
    }

    fn ipm_options(&self) -> IpmOptions {
        IpmOptions {
            max_iterations: self.options.max_iterations,
            cost_mult: self.options.cost_mult(),
            ..IpmOptions::default()
        }
        .with_tolerance(self.options.tolerance)
    }

    /// Solve the configured formulation and write the results onto `network`.
    ///
    /// Configuration problems are returned as errors before any iteration. A solve
    /// that runs but does not converge is `Ok` with a non-converged status.
    pub fn solve(&self, network: &mut Network) -> Result<SolveResult, OpfError> {
        let start = Instant::now();
        let options = &self.options;
        let formulation = options.formulation;

        network.derive_bus_types();
        let index = NetworkIndex::build(network)?;
        let costs = costs::normalize(network, &index)?;
        constraints::check_limits(network, &index, formulation)?;
        let policy = ReactancePolicy {
            min_reactance: options.min_reactance,
            clamp: options.clamp_reactance,
        };
        info!(
            network = %network.name,
            %formulation,
            buses = index.nb(),
            branches = index.nl(),
            gens = index.ng(),
            islands = index.islands.len(),
            "starting OPF"
        );

        let backend = options.linear_solver.build_solver();
        let ipm_options = self.ipm_options();
        let solution = match formulation {
            Formulation::Dc => {
                let dc = DcMatrices::build(network, &index, &policy)?;
                if let Some(reason) = constraints::capacity_shortfall(network, &index, formulation) {
                    return Ok(infeasible(network, formulation, start, &reason));
                }
                let model = OptimizationModel::dc(network, &index, &costs, &dc, options);
                debug!(nx = model.vars.nx(), rows = model.linear.rows(), "DC model assembled");
                let solution = ipm::solve(
                    &model.objective,
                    &model.linear,
                    &model.xmin,
                    &model.xmax,
                    &model.x0,
                    &ipm_options,
                    backend.as_ref(),
                );
                mapper::write_solution(network, &index, &model, &solution, FlowModel::Dc(&dc));
                solution
            }
            Formulation::Ac => {
                let admittance = Admittance::build(network, &index, &policy)?;
                if let Some(reason) = constraints::capacity_shortfall(network, &index, formulation) {
                    return Ok(infeasible(network, formulation, start, &reason));
                }
                let model = OptimizationModel::ac(network, &index, &costs, options);
                debug!(
                    nx = model.vars.nx(),
                    rows = model.linear.rows(),
                    flow_limits = model.rated_branches.len(),
                    "AC model assembled"
                );
                let solution = {
                    let problem = AcProblem::new(network, &index, &model, &admittance);
                    ipm::solve(
                        &problem,
                        &model.linear,
                        &model.xmin,
                        &model.xmax,
                        &model.x0,
                        &ipm_options,
                        backend.as_ref(),
                    )
                };
                mapper::write_solution(
                    network,
                    &index,
                    &model,
                    &solution,
                    FlowModel::Ac(&admittance),
                );
                solution
            }
        };

        Ok(finish(solution, formulation, start))
    }
}

fn finish(solution: IpmSolution, formulation: Formulation, start: Instant) -> SolveResult {
    let result = SolveResult {
        status: solution.status.into(),
        objective: solution.f,
        iterations: solution.iterations,
        solve_time_ms: start.elapsed().as_millis(),
        formulation,
    };
    match result.status {
        SolveStatus::Converged => info!(
            objective = result.objective,
            iterations = result.iterations,
            time_ms = result.solve_time_ms,
            "OPF converged"
        ),
        status => warn!(
            %status,
            iterations = result.iterations,
            feasibility = solution.measures.feasibility,
            "OPF did not converge"
        ),
    }
    result
}

fn infeasible(network: &mut Network, formulation: Formulation, start: Instant, reason: &str) -> SolveResult {
    warn!(reason, "OPF infeasible before iterating");
    mapper::reset(network);
    SolveResult {
        status: SolveStatus::Infeasible,
        objective: 0.0,
        iterations: 0,
        solve_time_ms: start.elapsed().as_millis(),
        formulation,
    }
}
