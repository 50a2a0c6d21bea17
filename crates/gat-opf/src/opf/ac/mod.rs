//! Polar AC formulation callbacks.
//!
//! Nonlinear equalities are the bus power balance, real parts first,
//!
//! ```text
//! mis = V∘conj(Ybus·V) + Sd - Cg·(Pg + j·Qg)        g = [Re(mis); Im(mis)]
//! ```
//!
//! and nonlinear inequalities the squared apparent-power limits of rated branches,
//! from ends first, `h = [|Sf|² - Smax²; |St|² - Smax²]`.

pub mod derivatives;

use super::model::{OptimizationModel, VarLayout};
use super::NetworkIndex;
use crate::ipm::{NonlinearConstraints, NonlinearProblem, QuadraticObjective};
use crate::sparse::Admittance;
use derivatives::{d2abr_dv2, d2sbus_dv2, dsbus_dv, BranchFlows, SecondOrder};
use gat_core::Network;
use num_complex::Complex64;
use sprs::{CsMat, TriMat};

pub struct AcProblem<'a> {
    vars: &'a VarLayout,
    objective: &'a QuadraticObjective,
    ybus: &'a CsMat<Complex64>,
    /// `Yf` and `Yt` restricted to rated branches
    yf: CsMat<Complex64>,
    yt: CsMat<Complex64>,
    from_bus: Vec<usize>,
    to_bus: Vec<usize>,
    flow_limit_sq: Vec<f64>,
    demand: Vec<Complex64>,
    gen_bus: &'a [usize],
}

impl<'a> AcProblem<'a> {
    pub fn new(
        network: &Network,
        index: &'a NetworkIndex,
        model: &'a OptimizationModel,
        admittance: &'a Admittance,
    ) -> Self {
        let base = network.base_mva;
        let rated = &model.rated_branches;
        let (yf, yt) = admittance.branch_rows(rated);
        let demand = index
            .buses
            .iter()
            .map(|&pos| {
                let bus = &network.buses[pos];
                Complex64::new(bus.p_demand.value(), bus.q_demand.value()) / base
            })
            .collect();
        Self {
            vars: &model.vars,
            objective: &model.objective,
            ybus: &admittance.ybus,
            yf,
            yt,
            from_bus: rated.iter().map(|&l| index.branch_from[l]).collect(),
            to_bus: rated.iter().map(|&l| index.branch_to[l]).collect(),
            flow_limit_sq: rated
                .iter()
                .map(|&l| network.branches[index.branches[l]].rate_a.to_per_unit(base).powi(2))
                .collect(),
            demand,
            gen_bus: &index.gen_bus,
        }
    }

    fn nb(&self) -> usize {
        self.vars.va.len()
    }

    pub fn voltages(&self, x: &[f64]) -> Vec<Complex64> {
        self.vars
            .va
            .clone()
            .zip(self.vars.vm.clone())
            .map(|(a, m)| Complex64::from_polar(x[m], x[a]))
            .collect()
    }

    /// Bus power mismatch `V∘conj(Ybus·V) + Sd - Cg·Sg`.
    pub fn mismatch(&self, x: &[f64]) -> Vec<Complex64> {
        let v = self.voltages(x);
        let current = crate::sparse::ybus::mul_vec(self.ybus, &v);
        let mut mis: Vec<Complex64> = v
            .iter()
            .zip(&current)
            .zip(&self.demand)
            .map(|((v, i), sd)| *v * i.conj() + *sd)
            .collect();
        for (k, &b) in self.gen_bus.iter().enumerate() {
            mis[b] -= Complex64::new(x[self.vars.pg.start + k], x[self.vars.qg.start + k]);
        }
        mis
    }

    /// Place the four `[Va, Vm]` blocks of a second-order term into `out`.
    fn place(&self, out: &mut TriMat<f64>, blocks: &SecondOrder<f64>) {
        let (va, vm) = (self.vars.va.start, self.vars.vm.start);
        for (m, r0, c0) in [
            (&blocks.aa, va, va),
            (&blocks.av, va, vm),
            (&blocks.va, vm, va),
            (&blocks.vv, vm, vm),
        ] {
            for (&v, (i, j)) in m.iter() {
                out.add_triplet(r0 + i, c0 + j, v);
            }
        }
    }
}

impl NonlinearProblem for AcProblem<'_> {
    fn objective(&self, x: &[f64]) -> (f64, Vec<f64>) {
        self.objective.evaluate(x)
    }

    fn objective_hessian(&self, _x: &[f64]) -> CsMat<f64> {
        self.objective.hessian.clone()
    }

    fn nonlinear_constraints(&self, x: &[f64]) -> Option<NonlinearConstraints> {
        let nb = self.nb();
        let nx = self.vars.nx();
        let v = self.voltages(x);
        let (va, vm) = (self.vars.va.start, self.vars.vm.start);

        let mis = self.mismatch(x);
        let g = mis.iter().map(|s| s.re).chain(mis.iter().map(|s| s.im)).collect();
        let (ds_dva, ds_dvm) = dsbus_dv(self.ybus, &v);
        let mut jg = TriMat::new((2 * nb, nx));
        for (m, c0) in [(&ds_dva, va), (&ds_dvm, vm)] {
            for (d, (i, j)) in m.iter() {
                jg.add_triplet(i, c0 + j, d.re);
                jg.add_triplet(nb + i, c0 + j, d.im);
            }
        }
        for (k, &b) in self.gen_bus.iter().enumerate() {
            jg.add_triplet(b, self.vars.pg.start + k, -1.0);
            jg.add_triplet(nb + b, self.vars.qg.start + k, -1.0);
        }

        let nr = self.flow_limit_sq.len();
        let mut h = Vec::with_capacity(2 * nr);
        let mut jh = TriMat::new((2 * nr, nx));
        for (offset, ybr, bus) in [(0, &self.yf, &self.from_bus), (nr, &self.yt, &self.to_bus)] {
            let flows = BranchFlows::compute(ybr, bus, &v);
            h.extend(
                flows
                    .squared_magnitude()
                    .iter()
                    .zip(&self.flow_limit_sq)
                    .map(|(s, limit)| s - limit),
            );
            let (da_dva, da_dvm) = flows.dabr_dv();
            for (m, c0) in [(&da_dva, va), (&da_dvm, vm)] {
                for (&d, (l, j)) in m.iter() {
                    jh.add_triplet(offset + l, c0 + j, d);
                }
            }
        }

        Some(NonlinearConstraints {
            h,
            g,
            jh: jh.to_csr(),
            jg: jg.to_csr(),
        })
    }

    fn constraint_hessian(&self, x: &[f64], lam: &[f64], mu: &[f64]) -> Option<CsMat<f64>> {
        let nb = self.nb();
        let nx = self.vars.nx();
        let nr = self.flow_limit_sq.len();
        let v = self.voltages(x);
        let mut out = TriMat::new((nx, nx));

        // Re(λP·S'') + Im(λQ·S'') = Re((λP - j·λQ)·S'')
        let weights: Vec<Complex64> = (0..nb).map(|i| Complex64::new(lam[i], -lam[nb + i])).collect();
        self.place(&mut out, &d2sbus_dv2(self.ybus, &v, &weights).real());

        for (offset, ybr, bus) in [(0, &self.yf, &self.from_bus), (nr, &self.yt, &self.to_bus)] {
            let mu_side = &mu[offset..offset + nr];
            if mu_side.iter().all(|&m| m == 0.0) {
                continue;
            }
            let flows = BranchFlows::compute(ybr, bus, &v);
            self.place(&mut out, &d2abr_dv2(&flows, ybr, bus, &v, mu_side));
        }
        Some(out.to_csr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opf::costs::normalize;
    use crate::opf::OpfOptions;
    use crate::sparse::ReactancePolicy;
    use gat_core::{Branch, BranchId, Bus, BusId, CostModel, Gen, GenId};

    fn network() -> Network {
        let mut network = Network::new("ac");
        network.add_bus(Bus::new(BusId::new(1), "a").as_reference()).unwrap();
        network
            .add_bus(Bus::new(BusId::new(2), "b").with_demand(60.0, 20.0))
            .unwrap();
        network
            .add_bus(Bus::new(BusId::new(3), "c").with_demand(40.0, 10.0).with_shunt(0.0, 5.0))
            .unwrap();
        for (k, (f, t, rate)) in [(1, 2, 80.0), (2, 3, 0.0), (1, 3, 60.0)].into_iter().enumerate() {
            network
                .add_branch(
                    Branch::new(BranchId::new(k), "", BusId::new(f), BusId::new(t), 0.01, 0.1)
                        .with_charging(0.02)
                        .with_rate_a(rate),
                )
                .unwrap();
        }
        for (k, bus) in [1, 3].into_iter().enumerate() {
            network
                .add_gen(
                    Gen::new(GenId::new(k), "", BusId::new(bus))
                        .with_p_limits(0.0, 150.0)
                        .with_q_limits(-80.0, 80.0)
                        .with_cost(CostModel::quadratic(0.0, 10.0 + k as f64, 0.01)),
                )
                .unwrap();
        }
        network
    }

    #[test]
    fn jacobians_match_finite_differences() {
        let network = network();
        let index = NetworkIndex::build(&network).unwrap();
        let costs = normalize(&network, &index).unwrap();
        let model = OptimizationModel::ac(&network, &index, &costs, &OpfOptions::default());
        let admittance = Admittance::build(&network, &index, &ReactancePolicy::default()).unwrap();
        let problem = AcProblem::new(&network, &index, &model, &admittance);

        let x: Vec<f64> = vec![0.0, -0.04, -0.06, 1.03, 0.99, 1.0, 0.7, 0.4, 0.2, 0.1];
        assert_eq!(x.len(), model.vars.nx());
        let nl = problem.nonlinear_constraints(&x).unwrap();
        assert_eq!(nl.g.len(), 6);
        assert_eq!(nl.h.len(), 4);

        let step = 1e-6;
        for col in 0..x.len() {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[col] += step;
            minus[col] -= step;
            let p = problem.nonlinear_constraints(&plus).unwrap();
            let m = problem.nonlinear_constraints(&minus).unwrap();
            for row in 0..nl.g.len() {
                let numeric = (p.g[row] - m.g[row]) / (2.0 * step);
                let analytic = nl.jg.get(row, col).copied().unwrap_or(0.0);
                assert!((numeric - analytic).abs() < 1e-6, "jg[{row}, {col}]");
            }
            for row in 0..nl.h.len() {
                let numeric = (p.h[row] - m.h[row]) / (2.0 * step);
                let analytic = nl.jh.get(row, col).copied().unwrap_or(0.0);
                assert!((numeric - analytic).abs() < 1e-6, "jh[{row}, {col}]");
            }
        }
    }

    #[test]
    fn lagrangian_hessian_matches_finite_differences() {
        let network = network();
        let index = NetworkIndex::build(&network).unwrap();
        let costs = normalize(&network, &index).unwrap();
        let model = OptimizationModel::ac(&network, &index, &costs, &OpfOptions::default());
        let admittance = Admittance::build(&network, &index, &ReactancePolicy::default()).unwrap();
        let problem = AcProblem::new(&network, &index, &model, &admittance);

        let x: Vec<f64> = vec![0.0, -0.04, -0.06, 1.03, 0.99, 1.0, 0.7, 0.4, 0.2, 0.1];
        let lam = [12.0, 13.5, 11.0, 0.5, -0.8, 0.3];
        let mu = [0.0, 4.0, 2.0, 0.0];
        let hess = problem.constraint_hessian(&x, &lam, &mu).unwrap();

        let gradient = |x: &[f64]| -> Vec<f64> {
            let nl = problem.nonlinear_constraints(x).unwrap();
            let mut out = vec![0.0; x.len()];
            for (&v, (i, j)) in nl.jg.iter() {
                out[j] += lam[i] * v;
            }
            for (&v, (i, j)) in nl.jh.iter() {
                out[j] += mu[i] * v;
            }
            out
        };
        let step = 1e-6;
        for col in 0..x.len() {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[col] += step;
            minus[col] -= step;
            let (gp, gm) = (gradient(&plus), gradient(&minus));
            for row in 0..x.len() {
                let numeric = (gp[row] - gm[row]) / (2.0 * step);
                let analytic = hess.get(row, col).copied().unwrap_or(0.0);
                assert!((numeric - analytic).abs() < 1e-5, "H[{row}, {col}]");
            }
        }
    }
}
