use anyhow::{anyhow, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Square dense matrix in row-major order.
///
/// Used for the reduced KKT systems of the interior-point method, which are small
/// enough that a dense factorization is simpler than a sparse one.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if rows.iter().any(|row| row.len() != n) {
            return Err(anyhow!("matrix must be square"));
        }
        Ok(Self {
            n,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
    }

    /// Accumulate into an entry.
    #[inline]
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] += value;
    }

    fn check_rhs(&self, rhs: &[f64]) -> Result<()> {
        if rhs.len() != self.n {
            return Err(anyhow!(
                "rhs length ({}) does not match matrix dimension {}",
                rhs.len(),
                self.n
            ));
        }
        Ok(())
    }
}

/// Trait for solving dense linear systems (Ax = b).
///
/// A singular or numerically degenerate system is an error, never a solution
/// containing NaN or infinities.
pub trait LinearSystemBackend: Send + Sync {
    fn solve(&self, matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>>;
}

/// Gaussian elimination with partial pivoting.
#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        matrix.check_rhs(rhs)?;
        let n = matrix.dim();
        let mut a = matrix.data.clone();
        let mut b = rhs.to_vec();
        let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);

        for k in 0..n {
            let pivot = (k..n)
                .max_by(|&r, &s| a[r * n + k].abs().total_cmp(&a[s * n + k].abs()))
                .unwrap_or(k);
            if a[pivot * n + k].abs() <= 1e-14 * scale {
                return Err(anyhow!("singular matrix (pivot {k})"));
            }
            if pivot != k {
                for j in 0..n {
                    a.swap(k * n + j, pivot * n + j);
                }
                b.swap(k, pivot);
            }
            let diag = a[k * n + k];
            for row in k + 1..n {
                let factor = a[row * n + k] / diag;
                if factor == 0.0 {
                    continue;
                }
                for j in k..n {
                    a[row * n + j] -= factor * a[k * n + j];
                }
                b[row] -= factor * b[k];
            }
        }

        let mut x = vec![0.0; n];
        for k in (0..n).rev() {
            let tail: f64 = (k + 1..n).map(|j| a[k * n + j] * x[j]).sum();
            x[k] = (b[k] - tail) / a[k * n + k];
        }
        finite_or_singular(x)
    }
}

/// LU with partial pivoting from `faer`.
#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        matrix.check_rhs(rhs)?;
        let n = matrix.dim();
        if n == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix.get(i, j));
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        finite_or_singular((0..n).map(|i| sol.read(i, 0)).collect())
    }
}

fn finite_or_singular(solution: Vec<f64>) -> Result<Vec<f64>> {
    if solution.iter().all(|v| v.is_finite()) {
        Ok(solution)
    } else {
        Err(anyhow!("singular matrix (non-finite solution)"))
    }
}
