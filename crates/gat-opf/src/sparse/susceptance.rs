//! Linearized (DC) network matrices.
//!
//! Every in-service branch `l = (f, t)` with reactance `x` and turns ratio `τ`
//! contributes
//!
//! ```text
//! b_l = 1 / (x · τ)
//!
//! B[f,f] += b_l   B[t,t] += b_l   B[f,t] -= b_l   B[t,f] -= b_l
//! Bf[l,f] = b_l   Bf[l,t] = -b_l
//! Pf_inj[l] = -φ_l · b_l          (φ = phase shift in radians)
//! Pbus_inj  = Cfᵀ·Pf_inj - Ctᵀ·Pf_inj
//! ```
//!
//! so that bus injections are `P = B·θ + Pbus_inj` and from-end flows are
//! `Pf = Bf·θ + Pf_inj`, all in per-unit.

use super::ReactancePolicy;
use crate::error::ConfigurationError;
use crate::opf::NetworkIndex;
use gat_core::Network;
use sprs::{CsMat, TriMat};

/// `B`, `Bf` and the phase-shift injection vectors in model ordering.
#[derive(Debug, Clone)]
pub struct DcMatrices {
    /// Bus susceptance matrix (nb × nb)
    pub b: CsMat<f64>,
    /// Branch from-end flow matrix (nl × nb)
    pub bf: CsMat<f64>,
    /// Bus injections caused by phase shifters (nb)
    pub pbus_inj: Vec<f64>,
    /// From-end flow offsets caused by phase shifters (nl)
    pub pf_inj: Vec<f64>,
}

impl DcMatrices {
    pub fn build(
        network: &Network,
        index: &NetworkIndex,
        policy: &ReactancePolicy,
    ) -> Result<Self, ConfigurationError> {
        let nb = index.nb();
        let nl = index.nl();
        let mut b = TriMat::new((nb, nb));
        let mut bf = TriMat::new((nl, nb));
        let mut pbus_inj = vec![0.0; nb];
        let mut pf_inj = vec![0.0; nl];

        for (l, &pos) in index.branches.iter().enumerate() {
            let branch = &network.branches[pos];
            let x = policy.reactance(branch)?;
            let susceptance = 1.0 / (x * branch.effective_tap());
            let (f, t) = (index.branch_from[l], index.branch_to[l]);

            b.add_triplet(f, f, susceptance);
            b.add_triplet(t, t, susceptance);
            b.add_triplet(f, t, -susceptance);
            b.add_triplet(t, f, -susceptance);

            bf.add_triplet(l, f, susceptance);
            bf.add_triplet(l, t, -susceptance);

            let shift_injection = -branch.phase_shift.value() * susceptance;
            pf_inj[l] = shift_injection;
            pbus_inj[f] += shift_injection;
            pbus_inj[t] -= shift_injection;
        }

        Ok(Self {
            b: b.to_csr(),
            bf: bf.to_csr(),
            pbus_inj,
            pf_inj,
        })
    }

    /// From-end flows `Bf·θ + Pf_inj` in per-unit.
    pub fn branch_flows(&self, angles: &[f64]) -> Vec<f64> {
        self.bf
            .outer_iterator()
            .zip(&self.pf_inj)
            .map(|(row, offset)| {
                row.iter().map(|(j, &v)| v * angles[j]).sum::<f64>() + offset
            })
            .collect()
    }

    /// Net bus injections `B·θ + Pbus_inj` in per-unit.
    pub fn bus_injections(&self, angles: &[f64]) -> Vec<f64> {
        self.b
            .outer_iterator()
            .zip(&self.pbus_inj)
            .map(|(row, offset)| {
                row.iter().map(|(j, &v)| v * angles[j]).sum::<f64>() + offset
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gat_core::{Branch, BranchId, Bus, BusId, CostModel, Gen, GenId, Radians};

    fn triangle() -> Network {
        let mut network = Network::new("triangle");
        for i in 1..=3 {
            network.add_bus(Bus::new(BusId::new(i), format!("b{i}"))).unwrap();
        }
        network.buses[0].bus_type = gat_core::BusType::Reference;
        let lines = [(1, 2, 0.1), (2, 3, 0.2), (1, 3, 0.25)];
        for (k, (f, t, x)) in lines.into_iter().enumerate() {
            network
                .add_branch(Branch::new(BranchId::new(k + 1), "", BusId::new(f), BusId::new(t), 0.0, x))
                .unwrap();
        }
        network
            .add_gen(
                Gen::new(GenId::new(1), "g", BusId::new(1))
                    .with_p_limits(0.0, 100.0)
                    .with_cost(CostModel::linear(0.0, 1.0)),
            )
            .unwrap();
        network
    }

    fn dense(m: &CsMat<f64>) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; m.cols()]; m.rows()];
        for (&v, (i, j)) in m.iter() {
            out[i][j] += v;
        }
        out
    }

    #[test]
    fn susceptance_matrix_is_a_laplacian() {
        let network = triangle();
        let index = NetworkIndex::build(&network).unwrap();
        let dc = DcMatrices::build(&network, &index, &ReactancePolicy::default()).unwrap();
        let b = dense(&dc.b);
        assert!((b[0][0] - (10.0 + 4.0)).abs() < 1e-12);
        assert!((b[1][2] + 5.0).abs() < 1e-12);
        for row in &b {
            assert!(row.iter().sum::<f64>().abs() < 1e-12);
        }
        let bf = dense(&dc.bf);
        assert_eq!(bf[0], vec![10.0, -10.0, 0.0]);
        assert!(dc.pbus_inj.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn tap_and_shift_enter_the_injections() {
        let mut network = triangle();
        network.branches[0] = network.branches[0]
            .clone()
            .with_tap(0.5, Radians(0.1));
        let index = NetworkIndex::build(&network).unwrap();
        let dc = DcMatrices::build(&network, &index, &ReactancePolicy::default()).unwrap();
        // b = 1 / (0.1 * 0.5) = 20
        assert!((dense(&dc.bf)[0][0] - 20.0).abs() < 1e-12);
        assert!((dc.pf_inj[0] + 2.0).abs() < 1e-12);
        assert!((dc.pbus_inj[0] + 2.0).abs() < 1e-12);
        assert!((dc.pbus_inj[1] - 2.0).abs() < 1e-12);

        let flows = dc.branch_flows(&[0.0, 0.0, 0.0]);
        assert!((flows[0] + 2.0).abs() < 1e-12);
        let injections = dc.bus_injections(&[0.0, 0.0, 0.0]);
        assert!(injections.iter().sum::<f64>().abs() < 1e-12);
    }

    #[test]
    fn near_zero_reactance_is_rejected_or_clamped() {
        let mut network = triangle();
        network.branches[1].reactance = 0.0;
        let index = NetworkIndex::build(&network).unwrap();
        let err = DcMatrices::build(&network, &index, &ReactancePolicy::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::NearZeroReactance { .. }));

        let clamped = ReactancePolicy {
            min_reactance: 1e-3,
            clamp: true,
        };
        let dc = DcMatrices::build(&network, &index, &clamped).unwrap();
        assert!((dense(&dc.bf)[1][1] - 1000.0).abs() < 1e-9);
    }
}
