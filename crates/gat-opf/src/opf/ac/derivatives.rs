//! First and second derivatives of bus injections and branch flows in polar
//! coordinates.
//!
//! Voltages are `V = Vm·e^{j·Va}`. Bus injections are `S = V∘conj(Ybus·V)`; branch
//! flows at one end are `S_l = V_{bus(l)}·conj(Ybr_l·V)` where `Ybr` is `Yf` or `Yt` and
//! `bus(l)` the matching end bus.
//!
//! Second derivatives are returned already contracted with a multiplier vector, as
//! four blocks `aa`, `av`, `va`, `vv` where `av` has `Va` rows and `Vm` columns.

use crate::sparse::ybus::mul_vec;
use num_complex::Complex64;
use sprs::{CsMat, TriMat};

type Triplets = Vec<(usize, usize, Complex64)>;

const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

fn freeze(shape: (usize, usize), triplets: Triplets) -> CsMat<Complex64> {
    let mut m = TriMat::new(shape);
    for (i, j, v) in triplets {
        m.add_triplet(i, j, v);
    }
    m.to_csr()
}

fn unit(v: &[Complex64]) -> Vec<Complex64> {
    v.iter().map(|x| *x / x.norm()).collect()
}

/// Contracted second-derivative blocks.
#[derive(Debug, Clone)]
pub struct SecondOrder<T> {
    pub aa: CsMat<T>,
    pub av: CsMat<T>,
    pub va: CsMat<T>,
    pub vv: CsMat<T>,
}

impl SecondOrder<Complex64> {
    pub fn real(&self) -> SecondOrder<f64> {
        SecondOrder {
            aa: real_part(&self.aa),
            av: real_part(&self.av),
            va: real_part(&self.va),
            vv: real_part(&self.vv),
        }
    }
}

pub fn real_part(m: &CsMat<Complex64>) -> CsMat<f64> {
    let mut out = TriMat::new(m.shape());
    for (v, (i, j)) in m.iter() {
        out.add_triplet(i, j, v.re);
    }
    out.to_csr()
}

/// `(∂S/∂Va, ∂S/∂Vm)` for bus injections.
pub fn dsbus_dv(ybus: &CsMat<Complex64>, v: &[Complex64]) -> (CsMat<Complex64>, CsMat<Complex64>) {
    let n = v.len();
    let ibus = mul_vec(ybus, v);
    let vn = unit(v);
    let mut dva = Vec::with_capacity(ybus.nnz() + n);
    let mut dvm = Vec::with_capacity(ybus.nnz() + n);
    for (&y, (i, j)) in ybus.iter() {
        dva.push((i, j, -J * v[i] * (y * v[j]).conj()));
        dvm.push((i, j, v[i] * (y * vn[j]).conj()));
    }
    for i in 0..n {
        dva.push((i, i, J * v[i] * ibus[i].conj()));
        dvm.push((i, i, ibus[i].conj() * vn[i]));
    }
    (freeze((n, n), dva), freeze((n, n), dvm))
}

/// Flows at one branch end and their first derivatives.
#[derive(Debug, Clone)]
pub struct BranchFlows {
    pub s: Vec<Complex64>,
    pub dva: CsMat<Complex64>,
    pub dvm: CsMat<Complex64>,
}

impl BranchFlows {
    pub fn compute(ybr: &CsMat<Complex64>, bus: &[usize], v: &[Complex64]) -> Self {
        let (nl, nb) = ybr.shape();
        let current = mul_vec(ybr, v);
        let vn = unit(v);
        let mut dva = Vec::with_capacity(ybr.nnz() + nl);
        let mut dvm = Vec::with_capacity(ybr.nnz() + nl);
        for (&y, (l, j)) in ybr.iter() {
            let vb = v[bus[l]];
            dva.push((l, j, -J * vb * (y * v[j]).conj()));
            dvm.push((l, j, vb * (y * vn[j]).conj()));
        }
        for l in 0..nl {
            let b = bus[l];
            dva.push((l, b, J * current[l].conj() * v[b]));
            dvm.push((l, b, current[l].conj() * vn[b]));
        }
        let s = (0..nl).map(|l| v[bus[l]] * current[l].conj()).collect();
        Self {
            s,
            dva: freeze((nl, nb), dva),
            dvm: freeze((nl, nb), dvm),
        }
    }

    /// `|S|²` per branch.
    pub fn squared_magnitude(&self) -> Vec<f64> {
        self.s.iter().map(|s| s.norm_sqr()).collect()
    }

    /// `(∂|S|²/∂Va, ∂|S|²/∂Vm)`
    pub fn dabr_dv(&self) -> (CsMat<f64>, CsMat<f64>) {
        let chain = |d: &CsMat<Complex64>| {
            let mut out = TriMat::new(d.shape());
            for (dv, (l, j)) in d.iter() {
                let s = self.s[l];
                out.add_triplet(l, j, 2.0 * (s.re * dv.re + s.im * dv.im));
            }
            out.to_csr()
        };
        (chain(&self.dva), chain(&self.dvm))
    }
}

/// `∂/∂x (∂S/∂y)ᵀ·λ` for bus injections, `λ` possibly complex.
pub fn d2sbus_dv2(ybus: &CsMat<Complex64>, v: &[Complex64], lam: &[Complex64]) -> SecondOrder<Complex64> {
    let n = v.len();
    let ibus = mul_vec(ybus, v);
    let vabs: Vec<f64> = v.iter().map(|x| x.norm()).collect();

    let mut c: Triplets = Vec::with_capacity(ybus.nnz());
    let mut e: Triplets = Vec::with_capacity(ybus.nnz() + n);
    let mut d_lam = vec![Complex64::default(); n];
    for (&y, (i, j)) in ybus.iter() {
        c.push((i, j, lam[i] * v[i] * (y * v[j]).conj()));
        let w = y.conj() * v[i] * lam[i];
        e.push((j, i, v[j].conj() * w));
        d_lam[j] += w;
    }
    for p in 0..n {
        e.push((p, p, -v[p].conj() * d_lam[p]));
    }
    let f_diag: Vec<Complex64> = (0..n).map(|p| lam[p] * v[p] * ibus[p].conj()).collect();

    let mut aa: Triplets = Vec::with_capacity(e.len() + c.len() + n);
    let mut va: Triplets = Vec::with_capacity(e.len() + c.len() + n);
    let mut vv: Triplets = Vec::with_capacity(2 * c.len());
    for &(i, j, x) in &e {
        aa.push((i, j, x));
        va.push((i, j, J * x / vabs[i]));
    }
    for &(i, j, x) in &c {
        aa.push((i, j, x));
        va.push((i, j, -J * x / vabs[i]));
        let scale = vabs[i] * vabs[j];
        vv.push((i, j, x / scale));
        vv.push((j, i, x / scale));
    }
    for (p, &x) in f_diag.iter().enumerate() {
        aa.push((p, p, -x));
        va.push((p, p, J * x / vabs[p]));
    }
    let av: Triplets = va.iter().map(|&(i, j, x)| (j, i, x)).collect();

    SecondOrder {
        aa: freeze((n, n), aa),
        av: freeze((n, n), av),
        va: freeze((n, n), va),
        vv: freeze((n, n), vv),
    }
}

/// `∂/∂x (∂S_br/∂y)ᵀ·λ` for flows at one branch end.
pub fn d2sbr_dv2(
    ybr: &CsMat<Complex64>,
    bus: &[usize],
    v: &[Complex64],
    lam: &[Complex64],
) -> SecondOrder<Complex64> {
    let n = v.len();
    let vabs: Vec<f64> = v.iter().map(|x| x.norm()).collect();
    let mut aa: Triplets = Vec::with_capacity(4 * ybr.nnz());
    let mut va: Triplets = Vec::with_capacity(4 * ybr.nnz());
    let mut vv: Triplets = Vec::with_capacity(2 * ybr.nnz());

    for (&y, (l, i)) in ybr.iter() {
        let j = bus[l];
        let b = v[i].conj() * y.conj() * lam[l] * v[j];
        aa.extend([(i, j, b), (j, i, b), (i, i, -b), (j, j, -b)]);
        va.extend([
            (i, j, J * b / vabs[i]),
            (j, i, -J * b / vabs[j]),
            (i, i, -J * b / vabs[i]),
            (j, j, J * b / vabs[j]),
        ]);
        let scale = vabs[i] * vabs[j];
        vv.extend([(i, j, b / scale), (j, i, b / scale)]);
    }
    let av: Triplets = va.iter().map(|&(i, j, x)| (j, i, x)).collect();

    SecondOrder {
        aa: freeze((n, n), aa),
        av: freeze((n, n), av),
        va: freeze((n, n), va),
        vv: freeze((n, n), vv),
    }
}

/// `Σ_l μ_l ∇²|S_l|²` over `[Va, Vm]`.
pub fn d2abr_dv2(
    flows: &BranchFlows,
    ybr: &CsMat<Complex64>,
    bus: &[usize],
    v: &[Complex64],
    mu: &[f64],
) -> SecondOrder<f64> {
    let n = v.len();
    let lam: Vec<Complex64> = flows.s.iter().zip(mu).map(|(s, &m)| s.conj() * m).collect();
    let s2 = d2sbr_dv2(ybr, bus, v, &lam);

    // dSxᵀ·diag(μ)·conj(dSy)
    let outer = |dx: &CsMat<Complex64>, dy: &CsMat<Complex64>| {
        let mut out = Vec::new();
        for (l, (rx, ry)) in dx.outer_iterator().zip(dy.outer_iterator()).enumerate() {
            if mu[l] == 0.0 {
                continue;
            }
            for (p, &a) in rx.iter() {
                for (q, &b) in ry.iter() {
                    out.push((p, q, a * mu[l] * b.conj()));
                }
            }
        }
        out
    };
    let combine = |second: &CsMat<Complex64>, product: Triplets| {
        let mut out = TriMat::new((n, n));
        for (x, (i, j)) in second.iter() {
            out.add_triplet(i, j, 2.0 * x.re);
        }
        for (i, j, x) in product {
            out.add_triplet(i, j, 2.0 * x.re);
        }
        out.to_csr()
    };

    SecondOrder {
        aa: combine(&s2.aa, outer(&flows.dva, &flows.dva)),
        av: combine(&s2.av, outer(&flows.dva, &flows.dvm)),
        va: combine(&s2.va, outer(&flows.dvm, &flows.dva)),
        vv: combine(&s2.vv, outer(&flows.dvm, &flows.dvm)),
    }
}
