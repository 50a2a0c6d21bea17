//! Complex admittance matrices for the AC formulation.
//!
//! Each in-service branch is a π-model with series admittance `ys = 1/(r + jx)`, total
//! charging `bc` and complex ratio `N = τ·e^{jφ}` at the from end:
//!
//! ```text
//! Ytt = ys + j·bc/2
//! Yff = Ytt / |N|²
//! Yft = -ys / conj(N)
//! Ytf = -ys / N
//! ```
//!
//! `Yf` (nl × nb) holds `[Yff, Yft]` per branch row, `Yt` holds `[Ytf, Ytt]`, and
//! `Ybus = Cfᵀ·Yf + Ctᵀ·Yt + diag((Gs + j·Bs) / base)`.

use super::ReactancePolicy;
use crate::error::ConfigurationError;
use crate::opf::NetworkIndex;
use gat_core::Network;
use num_complex::Complex64;
use sprs::{CsMat, TriMat};

#[derive(Debug, Clone)]
pub struct Admittance {
    pub ybus: CsMat<Complex64>,
    pub yf: CsMat<Complex64>,
    pub yt: CsMat<Complex64>,
}

impl Admittance {
    pub fn build(
        network: &Network,
        index: &NetworkIndex,
        policy: &ReactancePolicy,
    ) -> Result<Self, ConfigurationError> {
        let nb = index.nb();
        let nl = index.nl();
        let base = network.base_mva;
        let mut ybus = TriMat::new((nb, nb));
        let mut yf = TriMat::new((nl, nb));
        let mut yt = TriMat::new((nl, nb));

        for (l, &pos) in index.branches.iter().enumerate() {
            let branch = &network.branches[pos];
            let x = policy.reactance(branch)?;
            let ys = Complex64::new(branch.resistance, x).inv();
            let ratio = Complex64::from_polar(branch.effective_tap(), branch.phase_shift.value());
            let ytt = ys + Complex64::new(0.0, branch.charging_b / 2.0);
            let yff = ytt / ratio.norm_sqr();
            let yft = -ys / ratio.conj();
            let ytf = -ys / ratio;
            let (f, t) = (index.branch_from[l], index.branch_to[l]);

            yf.add_triplet(l, f, yff);
            yf.add_triplet(l, t, yft);
            yt.add_triplet(l, f, ytf);
            yt.add_triplet(l, t, ytt);

            ybus.add_triplet(f, f, yff);
            ybus.add_triplet(f, t, yft);
            ybus.add_triplet(t, f, ytf);
            ybus.add_triplet(t, t, ytt);
        }

        for (k, &pos) in index.buses.iter().enumerate() {
            let bus = &network.buses[pos];
            let shunt = Complex64::new(bus.g_shunt.value(), bus.b_shunt.value()) / base;
            if shunt != Complex64::new(0.0, 0.0) {
                ybus.add_triplet(k, k, shunt);
            }
        }

        Ok(Self {
            ybus: ybus.to_csr(),
            yf: yf.to_csr(),
            yt: yt.to_csr(),
        })
    }

    /// Keep only the listed branch rows of `Yf` and `Yt`.
    pub fn branch_rows(&self, rows: &[usize]) -> (CsMat<Complex64>, CsMat<Complex64>) {
        (select_rows(&self.yf, rows), select_rows(&self.yt, rows))
    }
}

/// `m · v` for a CSR complex matrix.
pub fn mul_vec(m: &CsMat<Complex64>, v: &[Complex64]) -> Vec<Complex64> {
    m.outer_iterator()
        .map(|row| row.iter().map(|(j, &y)| y * v[j]).sum::<Complex64>())
        .collect()
}

fn select_rows(m: &CsMat<Complex64>, rows: &[usize]) -> CsMat<Complex64> {
    let mut out = TriMat::new((rows.len(), m.cols()));
    for (k, &r) in rows.iter().enumerate() {
        if let Some(row) = m.outer_view(r) {
            for (j, &y) in row.iter() {
                out.add_triplet(k, j, y);
            }
        }
    }
    out.to_csr()
}
