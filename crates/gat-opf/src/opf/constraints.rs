//! Row builders for the linear constraint blocks, plus the limit and capacity checks
//! that run before a model is assembled.

use std::f64::consts::PI;

use super::model::{LinearRow, VarLayout};
use super::{Formulation, NetworkIndex};
use crate::error::ConfigurationError;
use crate::sparse::DcMatrices;
use gat_core::Network;

/// Model branches with a finite thermal rating.
pub fn rated_branches(network: &Network, index: &NetworkIndex) -> Vec<usize> {
    index
        .branches
        .iter()
        .enumerate()
        .filter(|(_, &pos)| network.branches[pos].is_rate_limited())
        .map(|(l, _)| l)
        .collect()
}

/// Angle limit in radians, or `None` when absent or outside a full turn either way.
fn effective_angle_limit(limit: Option<f64>) -> Option<f64> {
    limit.filter(|a| a.is_finite() && a.abs() < 2.0 * PI)
}

/// Model branches with at least one effective angle-difference limit.
pub fn angle_limited_branches(network: &Network, index: &NetworkIndex) -> Vec<usize> {
    index
        .branches
        .iter()
        .enumerate()
        .filter(|(_, &pos)| {
            let branch = &network.branches[pos];
            effective_angle_limit(branch.angle_min.map(|a| a.value())).is_some()
                || effective_angle_limit(branch.angle_max.map(|a| a.value())).is_some()
        })
        .map(|(l, _)| l)
        .collect()
}

/// `Va_ref = θ_ref`, one row per island.
pub fn reference_angle_rows(network: &Network, index: &NetworkIndex, vars: &VarLayout) -> Vec<LinearRow> {
    index
        .islands
        .iter()
        .map(|island| {
            let angle = network.buses[index.buses[island.reference]].angle.value();
            LinearRow::equal_to(vec![(vars.va.start + island.reference, 1.0)], angle)
        })
        .collect()
}

/// `B·Va - Cg·Pg = -(Pd + Gs)/base - Pbus_inj`, one row per bus.
pub fn dc_power_balance_rows(
    network: &Network,
    index: &NetworkIndex,
    vars: &VarLayout,
    dc: &DcMatrices,
) -> Vec<LinearRow> {
    let base = network.base_mva;
    let mut gens_at = vec![Vec::new(); index.nb()];
    for (k, &b) in index.gen_bus.iter().enumerate() {
        gens_at[b].push(k);
    }

    dc.b
        .outer_iterator()
        .enumerate()
        .map(|(i, row)| {
            let bus = &network.buses[index.buses[i]];
            let mut entries: Vec<(usize, f64)> =
                row.iter().map(|(j, &v)| (vars.va.start + j, v)).collect();
            entries.extend(gens_at[i].iter().map(|&k| (vars.pg.start + k, -1.0)));
            let demand = (bus.p_demand.value() + bus.g_shunt.value()) / base;
            LinearRow::equal_to(entries, -demand - dc.pbus_inj[i])
        })
        .collect()
}

/// From-end (`Pf`) and to-end (`Pt`) flow limits over `rated`.
pub fn dc_flow_limit_rows(
    network: &Network,
    index: &NetworkIndex,
    vars: &VarLayout,
    dc: &DcMatrices,
    rated: &[usize],
) -> (Vec<LinearRow>, Vec<LinearRow>) {
    let base = network.base_mva;
    let mut from_rows = Vec::with_capacity(rated.len());
    let mut to_rows = Vec::with_capacity(rated.len());
    for &l in rated {
        let rate = network.branches[index.branches[l]].rate_a.to_per_unit(base);
        let entries: Vec<(usize, f64)> = dc
            .bf
            .outer_view(l)
            .map(|row| row.iter().map(|(j, &v)| (vars.va.start + j, v)).collect())
            .unwrap_or_default();
        let negated = entries.iter().map(|&(j, v)| (j, -v)).collect();
        from_rows.push(LinearRow::at_most(entries, rate - dc.pf_inj[l]));
        to_rows.push(LinearRow::at_most(negated, rate + dc.pf_inj[l]));
    }
    (from_rows, to_rows)
}

/// `angmin ≤ Va_f - Va_t ≤ angmax` over `branches`; a missing side is unbounded.
pub fn angle_difference_rows(
    network: &Network,
    index: &NetworkIndex,
    vars: &VarLayout,
    branches: &[usize],
) -> Vec<LinearRow> {
    branches
        .iter()
        .map(|&l| {
            let branch = &network.branches[index.branches[l]];
            let lower = effective_angle_limit(branch.angle_min.map(|a| a.value()))
                .unwrap_or(f64::NEG_INFINITY);
            let upper =
                effective_angle_limit(branch.angle_max.map(|a| a.value())).unwrap_or(f64::INFINITY);
            LinearRow::between(
                vec![
                    (vars.va.start + index.branch_from[l], 1.0),
                    (vars.va.start + index.branch_to[l], -1.0),
                ],
                lower,
                upper,
            )
        })
        .collect()
}

/// Dispatchable loads with a reactive limit keep the power factor set by
/// `(pmin, qlim)`: `sin θ·Pg - cos θ·Qg = 0`.
pub fn constant_power_factor_rows(
    network: &Network,
    index: &NetworkIndex,
    vars: &VarLayout,
) -> Vec<LinearRow> {
    if vars.qg.is_empty() {
        return Vec::new();
    }
    index
        .gens
        .iter()
        .enumerate()
        .filter_map(|(k, &pos)| {
            let gen = &network.gens[pos];
            let (qmin, qmax) = (gen.qmin.value(), gen.qmax.value());
            if !gen.is_dispatchable_load() || (qmin == 0.0 && qmax == 0.0) {
                return None;
            }
            let qlim = if qmin == 0.0 {
                qmax
            } else if qmax == 0.0 {
                qmin
            } else {
                0.0
            };
            let theta = qlim.atan2(gen.pmin.value());
            Some(LinearRow::equal_to(
                vec![(vars.pg.start + k, theta.sin()), (vars.qg.start + k, -theta.cos())],
                0.0,
            ))
        })
        .collect()
}

/// Reject bounds the optimizer cannot work with.
pub fn check_limits(
    network: &Network,
    index: &NetworkIndex,
    formulation: Formulation,
) -> Result<(), ConfigurationError> {
    let invalid = |entity: String, reason: String| ConfigurationError::InvalidLimits { entity, reason };

    for &pos in &index.gens {
        let gen = &network.gens[pos];
        let (pmin, pmax) = (gen.pmin.value(), gen.pmax.value());
        if pmin.is_nan() || pmax.is_nan() || pmin > pmax {
            return Err(invalid(
                format!("generator {:?}", gen.id),
                format!("pmin {pmin} MW exceeds pmax {pmax} MW"),
            ));
        }
        if formulation == Formulation::Ac {
            let (qmin, qmax) = (gen.qmin.value(), gen.qmax.value());
            if qmin.is_nan() || qmax.is_nan() || qmin > qmax {
                return Err(invalid(
                    format!("generator {:?}", gen.id),
                    format!("qmin {qmin} Mvar exceeds qmax {qmax} Mvar"),
                ));
            }
        }
    }

    if formulation == Formulation::Ac {
        for &pos in &index.buses {
            let bus = &network.buses[pos];
            let (vmin, vmax) = (bus.v_min.value(), bus.v_max.value());
            if !(vmin > 0.0 && vmin <= vmax) {
                return Err(invalid(
                    format!("bus {:?}", bus.id),
                    format!("voltage bounds [{vmin}, {vmax}] p.u. are not a positive range"),
                ));
            }
        }
    }

    for &pos in &index.branches {
        let branch = &network.branches[pos];
        let rate = branch.rate_a.value();
        if rate.is_nan() || rate < 0.0 {
            return Err(invalid(
                format!("branch {:?}", branch.id),
                format!("rating {rate} MVA is negative"),
            ));
        }
        if let (Some(lo), Some(hi)) = (branch.angle_min, branch.angle_max) {
            if lo.value() > hi.value() {
                return Err(invalid(
                    format!("branch {:?}", branch.id),
                    format!(
                        "angle_min {} rad exceeds angle_max {} rad",
                        lo.value(),
                        hi.value()
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// First island whose demand the online fleet cannot match, as a log-ready message.
///
/// DC checks both ends of the fleet's range; AC only the upper end since losses and
/// reactive demand are not known in advance.
pub fn capacity_shortfall(
    network: &Network,
    index: &NetworkIndex,
    formulation: Formulation,
) -> Option<String> {
    for (n, island) in index.islands.iter().enumerate() {
        if island.gens.is_empty() {
            return Some(format!("island {n}: carries demand but has no online generation"));
        }
        let demand: f64 = island
            .buses
            .iter()
            .map(|&b| {
                let bus = &network.buses[index.buses[b]];
                bus.p_demand.value() + bus.g_shunt.value()
            })
            .sum();
        let (pmin, pmax) = island.gens.iter().fold((0.0, 0.0), |(lo, hi), &g| {
            let gen = &network.gens[index.gens[g]];
            (lo + gen.pmin.value(), hi + gen.pmax.value())
        });
        if demand > pmax {
            return Some(format!(
                "island {n}: demand {demand:.3} MW exceeds online capacity {pmax:.3} MW"
            ));
        }
        if formulation == Formulation::Dc && demand < pmin {
            return Some(format!(
                "island {n}: demand {demand:.3} MW is below online minimum output {pmin:.3} MW"
            ));
        }
    }
    None
}
