//! Per-solve optimization model: variable layout, stacked linear rows, bounds and
//! starting point.
//!
//! ## Variable order
//!
//! `x = [Va (nb), Vm (nb, AC only), Pg (ng), Qg (ng, AC only), y (one per PWL curve)]`,
//! all electrical quantities in per-unit and radians.
//!
//! ## Linear block order
//!
//! | Formulation | Blocks |
//! |-------------|--------|
//! | DC | `RefAngle`, `Pmis`, `Pf`, `Pt`, `Ang`, `Ycon` |
//! | AC | `RefAngle`, `Vl`, `Ang`, `Ycon` |
//!
//! The AC power balance (`Pmis`, `Qmis`) and flow limits (`Sf`, `St`) are nonlinear and
//! handled by [`AcProblem`](super::ac::AcProblem).

use std::ops::Range;

use super::constraints;
use super::costs::{self, NormalizedCost};
use super::{Formulation, NetworkIndex, OpfOptions};
use crate::ipm::{LinearConstraints, QuadraticObjective};
use crate::sparse::DcMatrices;
use gat_core::Network;
use sprs::TriMat;

/// Position of each variable group in `x`. Absent groups are empty ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarLayout {
    pub va: Range<usize>,
    pub vm: Range<usize>,
    pub pg: Range<usize>,
    pub qg: Range<usize>,
    pub y: Range<usize>,
}

impl VarLayout {
    pub fn new(formulation: Formulation, nb: usize, ng: usize, ny: usize) -> Self {
        let ac = formulation == Formulation::Ac;
        let va = 0..nb;
        let vm = va.end..va.end + if ac { nb } else { 0 };
        let pg = vm.end..vm.end + ng;
        let qg = pg.end..pg.end + if ac { ng } else { 0 };
        let y = qg.end..qg.end + ny;
        Self { va, vm, pg, qg, y }
    }

    pub fn nx(&self) -> usize {
        self.y.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinearBlock {
    /// Reference angle, one row per island
    RefAngle,
    /// Constant power factor of dispatchable loads
    Vl,
    /// DC power balance, one row per bus
    Pmis,
    /// DC from-end flow limit
    Pf,
    /// DC to-end flow limit
    Pt,
    /// Angle-difference limit
    Ang,
    /// Piecewise-linear cost epigraph
    Ycon,
}

/// Row ranges of the linear blocks, in stacking order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockLayout {
    blocks: Vec<(LinearBlock, Range<usize>)>,
}

impl BlockLayout {
    /// Rows of `block`; empty when the block is absent.
    pub fn range(&self, block: LinearBlock) -> Range<usize> {
        self.blocks
            .iter()
            .find(|(b, _)| *b == block)
            .map_or(0..0, |(_, r)| r.clone())
    }

    pub fn order(&self) -> Vec<LinearBlock> {
        self.blocks.iter().map(|(b, _)| *b).collect()
    }
}

/// One sparse row `lower ≤ Σ a_j·x_j ≤ upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    pub entries: Vec<(usize, f64)>,
    pub lower: f64,
    pub upper: f64,
}

impl LinearRow {
    pub fn equal_to(entries: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            entries,
            lower: rhs,
            upper: rhs,
        }
    }

    pub fn at_most(entries: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            entries,
            lower: f64::NEG_INFINITY,
            upper: rhs,
        }
    }

    pub fn between(entries: Vec<(usize, f64)>, lower: f64, upper: f64) -> Self {
        Self {
            entries,
            lower,
            upper,
        }
    }
}

/// Stacks blocks of rows in the order they are pushed.
struct LinearAssembly {
    nx: usize,
    triplets: Vec<(usize, usize, f64)>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    layout: BlockLayout,
}

impl LinearAssembly {
    fn new(nx: usize) -> Self {
        Self {
            nx,
            triplets: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            layout: BlockLayout::default(),
        }
    }

    fn push_block(&mut self, block: LinearBlock, rows: Vec<LinearRow>) {
        let start = self.lower.len();
        for row in rows {
            let r = self.lower.len();
            self.triplets
                .extend(row.entries.into_iter().map(|(j, v)| (r, j, v)));
            self.lower.push(row.lower);
            self.upper.push(row.upper);
        }
        self.layout.blocks.push((block, start..self.lower.len()));
    }

    fn finish(self) -> (LinearConstraints, BlockLayout) {
        let mut a = TriMat::new((self.lower.len(), self.nx));
        for (i, j, v) in self.triplets {
            a.add_triplet(i, j, v);
        }
        (
            LinearConstraints {
                a: a.to_csr(),
                lower: self.lower,
                upper: self.upper,
            },
            self.layout,
        )
    }
}

/// Everything the interior-point solver needs for one solve.
#[derive(Debug, Clone)]
pub struct OptimizationModel {
    pub formulation: Formulation,
    pub vars: VarLayout,
    pub linear: LinearConstraints,
    pub blocks: BlockLayout,
    pub xmin: Vec<f64>,
    pub xmax: Vec<f64>,
    pub x0: Vec<f64>,
    pub objective: QuadraticObjective,
    /// Model branches with a finite thermal rating
    pub rated_branches: Vec<usize>,
    /// Model branches with an angle-difference row
    pub angle_branches: Vec<usize>,
}

impl OptimizationModel {
    /// Linearized model over `[Va, Pg, y]`.
    pub fn dc(
        network: &Network,
        index: &NetworkIndex,
        costs: &[NormalizedCost],
        dc: &DcMatrices,
        options: &OpfOptions,
    ) -> Self {
        let ny = costs.iter().filter(|c| c.is_piecewise()).count();
        let vars = VarLayout::new(Formulation::Dc, index.nb(), index.ng(), ny);
        let terms = costs::assemble(costs, &vars, network.base_mva);
        let rated_branches = constraints::rated_branches(network, index);
        let angle_branches = if options.ignore_angle_limits {
            Vec::new()
        } else {
            constraints::angle_limited_branches(network, index)
        };

        let mut assembly = LinearAssembly::new(vars.nx());
        assembly.push_block(
            LinearBlock::RefAngle,
            constraints::reference_angle_rows(network, index, &vars),
        );
        assembly.push_block(
            LinearBlock::Pmis,
            constraints::dc_power_balance_rows(network, index, &vars, dc),
        );
        let (pf, pt) = constraints::dc_flow_limit_rows(network, index, &vars, dc, &rated_branches);
        assembly.push_block(LinearBlock::Pf, pf);
        assembly.push_block(LinearBlock::Pt, pt);
        assembly.push_block(
            LinearBlock::Ang,
            constraints::angle_difference_rows(network, index, &vars, &angle_branches),
        );
        assembly.push_block(LinearBlock::Ycon, terms.pwl_rows);
        let (linear, blocks) = assembly.finish();

        let (xmin, xmax) = variable_bounds(network, index, &vars);
        let x0 = starting_point(network, index, &vars, &xmin, &xmax, terms.y_start);
        Self {
            formulation: Formulation::Dc,
            vars,
            linear,
            blocks,
            xmin,
            xmax,
            x0,
            objective: terms.objective,
            rated_branches,
            angle_branches,
        }
    }

    /// Linear part of the polar AC model over `[Va, Vm, Pg, Qg, y]`.
    pub fn ac(
        network: &Network,
        index: &NetworkIndex,
        costs: &[NormalizedCost],
        options: &OpfOptions,
    ) -> Self {
        let ny = costs.iter().filter(|c| c.is_piecewise()).count();
        let vars = VarLayout::new(Formulation::Ac, index.nb(), index.ng(), ny);
        let terms = costs::assemble(costs, &vars, network.base_mva);
        let rated_branches = constraints::rated_branches(network, index);
        let angle_branches = if options.ignore_angle_limits {
            Vec::new()
        } else {
            constraints::angle_limited_branches(network, index)
        };

        let mut assembly = LinearAssembly::new(vars.nx());
        assembly.push_block(
            LinearBlock::RefAngle,
            constraints::reference_angle_rows(network, index, &vars),
        );
        assembly.push_block(
            LinearBlock::Vl,
            constraints::constant_power_factor_rows(network, index, &vars),
        );
        assembly.push_block(
            LinearBlock::Ang,
            constraints::angle_difference_rows(network, index, &vars, &angle_branches),
        );
        assembly.push_block(LinearBlock::Ycon, terms.pwl_rows);
        let (linear, blocks) = assembly.finish();

        let (xmin, xmax) = variable_bounds(network, index, &vars);
        let x0 = starting_point(network, index, &vars, &xmin, &xmax, terms.y_start);
        Self {
            formulation: Formulation::Ac,
            vars,
            linear,
            blocks,
            xmin,
            xmax,
            x0,
            objective: terms.objective,
            rated_branches,
            angle_branches,
        }
    }
}

/// Variable bounds. Angles and epigraph variables are free; the reference angle is
/// pinned by its own row.
fn variable_bounds(network: &Network, index: &NetworkIndex, vars: &VarLayout) -> (Vec<f64>, Vec<f64>) {
    let nx = vars.nx();
    let base = network.base_mva;
    let mut xmin = vec![f64::NEG_INFINITY; nx];
    let mut xmax = vec![f64::INFINITY; nx];

    for (k, col) in vars.vm.clone().enumerate() {
        let bus = &network.buses[index.buses[k]];
        xmin[col] = bus.v_min.value();
        xmax[col] = bus.v_max.value();
    }
    for (k, &pos) in index.gens.iter().enumerate() {
        let gen = &network.gens[pos];
        xmin[vars.pg.start + k] = gen.pmin.to_per_unit(base);
        xmax[vars.pg.start + k] = gen.pmax.to_per_unit(base);
        if !vars.qg.is_empty() {
            xmin[vars.qg.start + k] = gen.qmin.to_per_unit(base);
            xmax[vars.qg.start + k] = gen.qmax.to_per_unit(base);
        }
    }
    (xmin, xmax)
}

/// Interior starting point: bounded variables at the middle of their range, angles
/// at their island's reference angle, voltages at the generator setpoint where one
/// applies, epigraph variables above every curve.
fn starting_point(
    network: &Network,
    index: &NetworkIndex,
    vars: &VarLayout,
    xmin: &[f64],
    xmax: &[f64],
    y_start: f64,
) -> Vec<f64> {
    let mut x0: Vec<f64> = xmin
        .iter()
        .zip(xmax)
        .map(|(&lo, &hi)| {
            if lo.is_finite() && hi.is_finite() {
                0.5 * (lo + hi)
            } else {
                0.0
            }
        })
        .collect();

    for island in &index.islands {
        let angle = network.buses[index.buses[island.reference]].angle.value();
        for &b in &island.buses {
            x0[vars.va.start + b] = angle;
        }
    }
    if !vars.vm.is_empty() {
        for (k, &pos) in index.gens.iter().enumerate() {
            let col = vars.vm.start + index.gen_bus[k];
            let setpoint = network.gens[pos].voltage_setpoint.value();
            if setpoint.is_finite() && xmin[col] <= xmax[col] {
                x0[col] = setpoint.clamp(xmin[col], xmax[col]);
            }
        }
    }
    for col in vars.y.clone() {
        x0[col] = y_start;
    }
    x0
}
