use super::backend::{FaerSolver, GaussSolver, LinearSystemBackend};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Available dense linear-system backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearSolverKind {
    Gauss,
    #[default]
    Faer,
}

impl LinearSolverKind {
    pub fn build_solver(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            LinearSolverKind::Gauss => Arc::new(GaussSolver),
            LinearSolverKind::Faer => Arc::new(FaerSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinearSolverKind::Gauss => "gauss",
            LinearSolverKind::Faer => "faer",
        }
    }
}

impl FromStr for LinearSolverKind {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.to_ascii_lowercase().as_str() {
            "gauss" => Ok(LinearSolverKind::Gauss),
            "faer" | "default" => Ok(LinearSolverKind::Faer),
            other => Err(anyhow!(
                "unknown linear solver '{}'; supported values: {}",
                other,
                Self::available().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DenseMatrix;

    #[test]
    fn parsing_supports_all_backends() {
        assert_eq!("gauss".parse::<LinearSolverKind>().unwrap(), LinearSolverKind::Gauss);
        assert_eq!("FAER".parse::<LinearSolverKind>().unwrap(), LinearSolverKind::Faer);
        assert!("cholmod".parse::<LinearSolverKind>().is_err());
    }

    #[test]
    fn backends_agree_on_pivoting_system() {
        // zero leading pivot forces a row swap
        let matrix = DenseMatrix::from_rows(&[
            vec![0.0, 2.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![3.0, 0.0, 4.0],
        ])
        .unwrap();
        let rhs = [5.0, 3.0, 15.0];
        for kind in [LinearSolverKind::Gauss, LinearSolverKind::Faer] {
            let x = kind.build_solver().solve(&matrix, &rhs).unwrap();
            assert!((x[0] - 1.0).abs() < 1e-10, "{}: {:?}", kind.as_str(), x);
            assert!((x[1] - 2.0).abs() < 1e-10);
            assert!((x[2] - 3.0).abs() < 1e-10);
        }
    }

    #[test]
    fn singular_system_is_an_error() {
        let matrix = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert!(GaussSolver.solve(&matrix, &[1.0, 2.0]).is_err());
        assert!(LinearSolverKind::Gauss
            .build_solver()
            .solve(&matrix, &[1.0])
            .is_err());
    }
}
