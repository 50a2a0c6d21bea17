//! Writes a finished solve back onto the network.
//!
//! Every derived field is cleared first, so entities that took no part in the solve
//! (offline generators, isolated buses, out-of-service branches) and constraints that
//! were not in the model read as zero.

use super::model::{LinearBlock, OptimizationModel};
use super::NetworkIndex;
use crate::ipm::IpmSolution;
use crate::sparse::ybus::mul_vec;
use crate::sparse::{Admittance, DcMatrices};
use gat_core::{Megavars, Megawatts, Network, PerUnit, Radians};
use num_complex::Complex64;

/// Branch flow model matching the solved formulation.
#[derive(Debug, Clone, Copy)]
pub enum FlowModel<'a> {
    Dc(&'a DcMatrices),
    Ac(&'a Admittance),
}

/// Clear every derived field, generator output included.
pub fn reset(network: &mut Network) {
    network.reset_results();
    for gen in network.gens.iter_mut() {
        gen.p = Megawatts(0.0);
        gen.q = Megavars(0.0);
    }
}

pub fn write_solution(
    network: &mut Network,
    index: &NetworkIndex,
    model: &OptimizationModel,
    solution: &IpmSolution,
    flows: FlowModel<'_>,
) {
    reset(network);
    let base = network.base_mva;
    let vars = &model.vars;
    let x = &solution.x;
    let mult = &solution.multipliers;
    let nb = index.nb();

    // buses
    let pmis = model.blocks.range(LinearBlock::Pmis);
    for (k, &pos) in index.buses.iter().enumerate() {
        let bus = &mut network.buses[pos];
        bus.angle = Radians(x[vars.va.start + k]);
        match flows {
            FlowModel::Dc(_) => {
                bus.voltage = PerUnit(1.0);
                let row = pmis.start + k;
                bus.p_lambda = (mult.mu_u[row] - mult.mu_l[row]) / base;
            }
            FlowModel::Ac(_) => {
                let vm = vars.vm.start + k;
                bus.voltage = PerUnit(x[vm]);
                bus.p_lambda = mult.eq_nonlin[k] / base;
                bus.q_lambda = mult.eq_nonlin[nb + k] / base;
                bus.mu_vmin = mult.lower[vm];
                bus.mu_vmax = mult.upper[vm];
            }
        }
    }

    // branch flows
    match flows {
        FlowModel::Dc(dc) => {
            let p_from = dc.branch_flows(&x[vars.va.clone()]);
            for (l, &pos) in index.branches.iter().enumerate() {
                let branch = &mut network.branches[pos];
                branch.p_from = Megawatts(p_from[l] * base);
                branch.p_to = Megawatts(-p_from[l] * base);
            }
            let (pf, pt) = (
                model.blocks.range(LinearBlock::Pf),
                model.blocks.range(LinearBlock::Pt),
            );
            for (k, &l) in model.rated_branches.iter().enumerate() {
                let branch = &mut network.branches[index.branches[l]];
                branch.mu_s_from = mult.mu_u[pf.start + k] / base;
                branch.mu_s_to = mult.mu_u[pt.start + k] / base;
            }
        }
        FlowModel::Ac(admittance) => {
            let v: Vec<Complex64> = vars
                .va
                .clone()
                .zip(vars.vm.clone())
                .map(|(a, m)| Complex64::from_polar(x[m], x[a]))
                .collect();
            let i_from = mul_vec(&admittance.yf, &v);
            let i_to = mul_vec(&admittance.yt, &v);
            for (l, &pos) in index.branches.iter().enumerate() {
                let s_from = v[index.branch_from[l]] * i_from[l].conj() * base;
                let s_to = v[index.branch_to[l]] * i_to[l].conj() * base;
                let branch = &mut network.branches[pos];
                branch.p_from = Megawatts(s_from.re);
                branch.q_from = Megavars(s_from.im);
                branch.p_to = Megawatts(s_to.re);
                branch.q_to = Megavars(s_to.im);
            }
            let nr = model.rated_branches.len();
            for (k, &l) in model.rated_branches.iter().enumerate() {
                let branch = &mut network.branches[index.branches[l]];
                let scale = 2.0 * branch.rate_a.value() / (base * base);
                branch.mu_s_from = mult.ineq_nonlin[k] * scale;
                branch.mu_s_to = mult.ineq_nonlin[nr + k] * scale;
            }
        }
    }

    let ang = model.blocks.range(LinearBlock::Ang);
    for (k, &l) in model.angle_branches.iter().enumerate() {
        let branch = &mut network.branches[index.branches[l]];
        branch.mu_angmin = mult.mu_l[ang.start + k];
        branch.mu_angmax = mult.mu_u[ang.start + k];
    }

    // generators
    for (k, &pos) in index.gens.iter().enumerate() {
        let gen = &mut network.gens[pos];
        let pg = vars.pg.start + k;
        gen.p = Megawatts(x[pg] * base);
        gen.mu_pmin = mult.lower[pg] / base;
        gen.mu_pmax = mult.upper[pg] / base;
        if vars.qg.is_empty() {
            gen.q = Megavars(0.0);
        } else {
            let qg = vars.qg.start + k;
            gen.q = Megavars(x[qg] * base);
            gen.mu_qmin = mult.lower[qg] / base;
            gen.mu_qmax = mult.upper[qg] / base;
        }
    }
}
