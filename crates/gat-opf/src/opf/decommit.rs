//! Unit decommitment on top of the OPF.
//!
//! A continuous OPF cannot switch a unit off: a unit whose minimum output is more
//! expensive than the rest of the fleet stays pinned at `pmin`. This module searches
//! greedily for a cheaper commitment.
//!
//! 1. While the summed `pmin` of online units exceeds the demand, switch off the unit
//!    with the highest average cost at `pmin`.
//! 2. Solve. Every online unit sitting at `pmin` with a positive price on that bound is
//!    a candidate; trial-solve the network without each candidate and commit the
//!    shutdown that lowers the objective the most.
//! 3. Repeat step 2 until no candidate improves the objective, then solve the caller's
//!    network with the final commitment.

use super::{OpfSolver, SolveResult};
use crate::error::OpfError;
use gat_core::{GenId, Network};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecommitResult {
    /// Result of the final solve
    pub result: SolveResult,
    /// Units switched off, in shutdown order
    pub shut_down: Vec<GenId>,
    /// Improvement stages committed after the first solve
    pub stages: usize,
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

/// Switch off expensive must-run units until the fleet's minimum output fits the
/// demand. Returns the positions switched off.
fn shed_excess_minimum(network: &mut Network) -> Vec<usize> {
    let load = network.total_demand().value();
    let mut shed = Vec::new();
    loop {
        let must_run: f64 = network
            .gens
            .iter()
            .filter(|g| g.status)
            .map(|g| g.pmin.value())
            .sum();
        if must_run <= load {
            break;
        }
        let costliest = network
            .gens
            .iter()
            .enumerate()
            .filter(|(_, g)| g.status && g.pmin.value() > 0.0)
            .map(|(i, g)| {
                let pmin = g.pmin.value();
                (i, g.cost_model.evaluate(pmin) / pmin)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((pos, average)) = costliest else {
            break;
        };
        info!(
            gen = ?network.gens[pos].id,
            average_cost = average,
            must_run_mw = must_run,
            load_mw = load,
            "minimum output exceeds demand, switching off unit"
        );
        network.gens[pos].status = false;
        shed.push(pos);
    }
    shed
}

/// OPF with greedy unit decommitment. On return `network` holds the final
/// commitment in its generator status flags and the results of the final solve.
pub fn solve_with_decommitment(
    network: &mut Network,
    solver: &OpfSolver,
) -> Result<DecommitResult, OpfError> {
    let mut working = network.clone();
    let mut shut_down: Vec<GenId> = shed_excess_minimum(&mut working)
        .into_iter()
        .map(|pos| working.gens[pos].id)
        .collect();

    let mut result = solver.solve(&mut working)?;
    if !result.is_converged() {
        *network = working;
        return Ok(DecommitResult {
            result,
            shut_down,
            stages: 0,
        });
    }

    let mut stages = 0;
    loop {
        let candidates: Vec<usize> = working
            .gens
            .iter()
            .enumerate()
            .filter(|(_, g)| g.status && g.pmin.value() > 0.0 && round4(g.mu_pmin) > 0.0)
            .map(|(i, _)| i)
            .collect();

        let mut best: Option<(usize, Network, SolveResult)> = None;
        for &pos in &candidates {
            let mut trial = working.clone();
            trial.gens[pos].status = false;
            match solver.solve(&mut trial) {
                Ok(trial_result) if trial_result.is_converged() => {
                    let best_objective = best.as_ref().map_or(result.objective, |b| b.2.objective);
                    debug!(
                        gen = ?trial.gens[pos].id,
                        objective = trial_result.objective,
                        best_objective,
                        "decommitment trial"
                    );
                    if trial_result.objective < best_objective {
                        best = Some((pos, trial, trial_result));
                    }
                }
                Ok(trial_result) => {
                    debug!(gen = ?trial.gens[pos].id, status = %trial_result.status, "decommitment trial failed");
                }
                Err(err) => {
                    debug!(gen = ?trial.gens[pos].id, %err, "decommitment trial rejected");
                }
            }
        }

        let Some((pos, trial, trial_result)) = best else {
            break;
        };
        stages += 1;
        info!(
            stage = stages,
            gen = ?trial.gens[pos].id,
            objective = trial_result.objective,
            saving = result.objective - trial_result.objective,
            "switching off unit"
        );
        shut_down.push(trial.gens[pos].id);
        working = trial;
        result = trial_result;
    }

    for (gen, committed) in network.gens.iter_mut().zip(&working.gens) {
        gen.status = committed.status;
    }
    let result = solver.solve(network)?;
    Ok(DecommitResult {
        result,
        shut_down,
        stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gat_core::{Bus, BusId, CostModel, Gen};

    fn single_bus(demand: f64, gens: &[(f64, f64, f64)]) -> Network {
        let mut network = Network::new("decommit");
        network
            .add_bus(Bus::new(BusId::new(1), "bus").as_reference().with_demand(demand, 0.0))
            .unwrap();
        for (k, &(pmin, pmax, price)) in gens.iter().enumerate() {
            network
                .add_gen(
                    Gen::new(GenId::new(k + 1), format!("g{}", k + 1), BusId::new(1))
                        .with_p_limits(pmin, pmax)
                        .with_cost(CostModel::linear(0.0, price)),
                )
                .unwrap();
        }
        network
    }

    #[test]
    fn excess_minimum_output_is_shed_first() {
        let mut network = single_bus(50.0, &[(40.0, 100.0, 10.0), (30.0, 100.0, 20.0)]);
        let shed = shed_excess_minimum(&mut network);
        assert_eq!(shed, vec![1]);
        assert!(network.gens[0].status);
        assert!(!network.gens[1].status);
    }

    #[test]
    fn rounding_ignores_numerical_noise() {
        assert_eq!(round4(3e-5), 0.0);
        assert_eq!(round4(0.12346), 0.1235);
    }

    #[test]
    fn decommitment_removes_expensive_must_run_unit() {
        let mut network = single_bus(50.0, &[(0.0, 100.0, 10.0), (30.0, 100.0, 50.0)]);
        let mut plain = network.clone();
        let continuous = OpfSolver::new().solve(&mut plain).unwrap();
        assert!((continuous.objective - 1700.0).abs() < 1e-3);

        let outcome = solve_with_decommitment(&mut network, &OpfSolver::new()).unwrap();
        assert!(outcome.result.is_converged());
        assert_eq!(outcome.shut_down, vec![GenId::new(2)]);
        assert_eq!(outcome.stages, 1);
        assert!((outcome.result.objective - 500.0).abs() < 1e-3);
        assert!(!network.gens[1].status);
        assert!((network.gens[0].p.value() - 50.0).abs() < 1e-3);
        assert_eq!(network.gens[1].p.value(), 0.0);
    }
}
