//! Generator production cost curves.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// Generator cost model for OPF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// No cost function specified. The optimizer rejects online units carrying this.
    #[default]
    NoCost,
    /// Polynomial cost: `cost = sum(coeffs[i] * P^i)` with `coeffs[0]` the constant term.
    Polynomial(Vec<f64>),
    /// Piecewise-linear cost through `(MW, $/h)` breakpoints. Must be convex.
    PiecewiseLinear(Vec<(f64, f64)>),
}

impl CostModel {
    /// `c0 + c1*P + c2*P^2`
    pub fn quadratic(c0: f64, c1: f64, c2: f64) -> Self {
        CostModel::Polynomial(vec![c0, c1, c2])
    }

    /// `c0 + c1*P` (marginal cost `c1` in $/MWh)
    pub fn linear(c0: f64, c1: f64) -> Self {
        CostModel::Polynomial(vec![c0, c1])
    }

    pub fn piecewise_linear(points: Vec<(f64, f64)>) -> Self {
        CostModel::PiecewiseLinear(points)
    }

    pub fn has_cost(&self) -> bool {
        !matches!(self, CostModel::NoCost)
    }

    /// Degree of a polynomial after dropping zero high-order coefficients.
    ///
    /// Returns `None` for anything that is not a polynomial.
    pub fn polynomial_degree(&self) -> Option<usize> {
        match self {
            CostModel::Polynomial(coeffs) => Some(
                coeffs
                    .iter()
                    .rposition(|c| *c != 0.0)
                    .unwrap_or(0),
            ),
            CostModel::NoCost | CostModel::PiecewiseLinear(_) => None,
        }
    }

    /// Cost in $/h at `p_mw`.
    ///
    /// Piecewise-linear curves are extrapolated beyond their end points with the
    /// first and last segment.
    pub fn evaluate(&self, p_mw: f64) -> f64 {
        match self {
            CostModel::NoCost => 0.0,
            CostModel::Polynomial(coeffs) => coeffs.iter().rev().fold(0.0, |acc, c| acc * p_mw + c),
            CostModel::PiecewiseLinear(points) => match points.len() {
                0 => 0.0,
                1 => points[0].1,
                _ => {
                    let k = segment_containing(points, p_mw);
                    let (x0, y0) = points[k];
                    let (x1, y1) = points[k + 1];
                    y0 + (p_mw - x0) * (y1 - y0) / (x1 - x0)
                }
            },
        }
    }

    /// Marginal cost in $/MWh at `p_mw`.
    pub fn marginal_cost(&self, p_mw: f64) -> f64 {
        match self {
            CostModel::NoCost => 0.0,
            CostModel::Polynomial(coeffs) => coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, c)| (i as f64) * c * p_mw.powi(i as i32 - 1))
                .sum(),
            CostModel::PiecewiseLinear(points) => {
                if points.len() < 2 {
                    return 0.0;
                }
                let k = segment_containing(points, p_mw);
                let (x0, y0) = points[k];
                let (x1, y1) = points[k + 1];
                (y1 - y0) / (x1 - x0)
            }
        }
    }

    /// Check the shape invariants of the curve.
    ///
    /// Polynomials need at least one finite coefficient. Piecewise-linear curves need
    /// at least two finite points, strictly increasing output and non-decreasing
    /// segment slopes.
    pub fn validate(&self) -> ModelResult<()> {
        match self {
            CostModel::NoCost => Ok(()),
            CostModel::Polynomial(coeffs) => {
                if coeffs.is_empty() {
                    return Err(ModelError::InvalidCostCurve(
                        "polynomial has no coefficients".into(),
                    ));
                }
                if coeffs.iter().any(|c| !c.is_finite()) {
                    return Err(ModelError::InvalidCostCurve(
                        "polynomial coefficient is not finite".into(),
                    ));
                }
                Ok(())
            }
            CostModel::PiecewiseLinear(points) => {
                if points.len() < 2 {
                    return Err(ModelError::InvalidCostCurve(format!(
                        "piecewise-linear curve needs at least 2 points, got {}",
                        points.len()
                    )));
                }
                if points.iter().any(|(p, c)| !p.is_finite() || !c.is_finite()) {
                    return Err(ModelError::InvalidCostCurve(
                        "piecewise-linear point is not finite".into(),
                    ));
                }
                let mut previous_slope = f64::NEG_INFINITY;
                for (k, pair) in points.windows(2).enumerate() {
                    let (x0, y0) = pair[0];
                    let (x1, y1) = pair[1];
                    if x1 <= x0 {
                        return Err(ModelError::InvalidCostCurve(format!(
                            "breakpoint {} ({} MW) does not increase past {} MW",
                            k + 1,
                            x1,
                            x0
                        )));
                    }
                    let slope = (y1 - y0) / (x1 - x0);
                    let slack = 1e-9 * slope.abs().max(1.0);
                    if slope < previous_slope - slack {
                        return Err(ModelError::InvalidCostCurve(format!(
                            "segment {} slope {:.6} is below the previous slope {:.6} (curve is not convex)",
                            k, slope, previous_slope
                        )));
                    }
                    previous_slope = slope;
                }
                Ok(())
            }
        }
    }

    /// Sample the curve into `n_points` piecewise-linear breakpoints over `[pmin, pmax]`.
    ///
    /// When `pmin > 0` the first breakpoint is anchored at zero output and the remaining
    /// `n_points - 1` are spread evenly over the operating range. Piecewise-linear
    /// curves are returned unchanged.
    pub fn to_piecewise_linear(&self, pmin: f64, pmax: f64, n_points: usize) -> CostModel {
        match self {
            CostModel::NoCost | CostModel::PiecewiseLinear(_) => self.clone(),
            CostModel::Polynomial(_) => {
                let n_points = n_points.max(2);
                let mut points = Vec::with_capacity(n_points);
                let (start, count) = if pmin > 0.0 {
                    points.push((0.0, self.evaluate(0.0)));
                    (pmin, n_points - 1)
                } else {
                    (pmin, n_points)
                };
                let step = if count > 1 {
                    (pmax - start) / (count - 1) as f64
                } else {
                    0.0
                };
                for i in 0..count {
                    let p = start + step * i as f64;
                    points.push((p, self.evaluate(p)));
                }
                CostModel::PiecewiseLinear(points)
            }
        }
    }

    /// Convert a single-segment piecewise-linear curve into the equivalent linear
    /// polynomial. Any other curve is returned unchanged.
    pub fn piecewise_to_polynomial(&self) -> CostModel {
        match self {
            CostModel::PiecewiseLinear(points) if points.len() == 2 => {
                let (x0, y0) = points[0];
                let (x1, y1) = points[1];
                let slope = (y1 - y0) / (x1 - x0);
                CostModel::linear(y0 - slope * x0, slope)
            }
            CostModel::NoCost | CostModel::Polynomial(_) | CostModel::PiecewiseLinear(_) => {
                self.clone()
            }
        }
    }
}

/// Index `k` of the segment `[points[k], points[k + 1]]` used to evaluate `p`.
fn segment_containing(points: &[(f64, f64)], p: f64) -> usize {
    let last = points.len() - 2;
    points
        .windows(2)
        .position(|pair| p <= pair[1].0)
        .unwrap_or(last)
        .min(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_evaluation() {
        let cost = CostModel::quadratic(100.0, 20.0, 0.01);
        assert!((cost.evaluate(50.0) - 1125.0).abs() < 1e-9);
        assert!((cost.marginal_cost(50.0) - 21.0).abs() < 1e-9);
        assert_eq!(cost.polynomial_degree(), Some(2));
        assert_eq!(CostModel::Polynomial(vec![1.0, 5.0, 0.0, 0.0]).polynomial_degree(), Some(1));
    }

    #[test]
    fn test_piecewise_evaluation_and_extrapolation() {
        let cost = CostModel::piecewise_linear(vec![(0.0, 0.0), (50.0, 250.0), (100.0, 750.0)]);
        assert!((cost.evaluate(25.0) - 125.0).abs() < 1e-9);
        assert!((cost.evaluate(75.0) - 500.0).abs() < 1e-9);
        assert!((cost.evaluate(110.0) - 850.0).abs() < 1e-9);
        assert!((cost.evaluate(-10.0) + 50.0).abs() < 1e-9);
        assert!((cost.marginal_cost(60.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_non_convex_curve() {
        let cost = CostModel::piecewise_linear(vec![(0.0, 0.0), (50.0, 500.0), (100.0, 600.0)]);
        assert!(matches!(cost.validate(), Err(ModelError::InvalidCostCurve(_))));
    }

    #[test]
    fn test_validate_rejects_non_increasing_output() {
        let cost = CostModel::piecewise_linear(vec![(0.0, 0.0), (50.0, 100.0), (50.0, 200.0)]);
        assert!(cost.validate().is_err());
        assert!(CostModel::piecewise_linear(vec![(0.0, 0.0)]).validate().is_err());
        assert!(CostModel::Polynomial(vec![]).validate().is_err());
        assert!(CostModel::linear(0.0, 6.0).validate().is_ok());
    }

    #[test]
    fn test_to_piecewise_linear_from_zero() {
        let cost = CostModel::quadratic(0.0, 2.0, 0.02);
        let CostModel::PiecewiseLinear(points) = cost.to_piecewise_linear(0.0, 80.0, 10) else {
            panic!("expected piecewise-linear curve");
        };
        assert_eq!(points.len(), 10);
        assert!((points[2].0 - 17.78).abs() < 1e-2);
        assert!((points[2].1 - 41.88).abs() < 1e-2);
        assert!((points[6].0 - 53.33).abs() < 1e-2);
        assert!((points[6].1 - 163.56).abs() < 1e-2);
    }

    #[test]
    fn test_to_piecewise_linear_anchors_zero_when_pmin_positive() {
        let cost = CostModel::quadratic(0.0, 2.0, 0.02);
        let CostModel::PiecewiseLinear(points) = cost.to_piecewise_linear(10.0, 80.0, 10) else {
            panic!("expected piecewise-linear curve");
        };
        assert_eq!(points.len(), 10);
        assert_eq!(points[0], (0.0, 0.0));
        assert!((points[1].0 - 10.0).abs() < 1e-9);
        assert!((points[1].1 - 22.0).abs() < 1e-9);
        assert!((points[9].0 - 80.0).abs() < 1e-9);
        assert!((points[9].1 - 288.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_segment_becomes_linear() {
        let cost = CostModel::piecewise_linear(vec![(10.0, 100.0), (60.0, 400.0)]);
        assert_eq!(cost.piecewise_to_polynomial(), CostModel::linear(40.0, 6.0));
    }
}
