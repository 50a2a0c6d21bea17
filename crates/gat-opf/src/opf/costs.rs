//! Cost normalizer: turns generator cost curves into objective terms on the shared
//! variable vector.
//!
//! Polynomials of degree ≤ 2 become diagonal quadratic terms on `Pg`. Each
//! piecewise-linear curve gets an epigraph variable `y` with unit cost and one row per
//! segment,
//!
//! ```text
//! m_i·Pg - y ≤ m_i·p_i - c_i        m_i = (c_{i+1} - c_i) / (p_{i+1} - p_i)
//! ```
//!
//! with powers in per-unit, so `y` equals the curve value at the optimum.

use super::model::{LinearRow, VarLayout};
use super::NetworkIndex;
use crate::error::ConfigurationError;
use crate::ipm::QuadraticObjective;
use gat_core::{CostModel, Gen, ModelError, Network};
use sprs::TriMat;

/// A validated cost curve in network units (MW, $/h).
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedCost {
    Polynomial { c0: f64, c1: f64, c2: f64 },
    PiecewiseLinear(Vec<(f64, f64)>),
}

impl NormalizedCost {
    pub fn is_piecewise(&self) -> bool {
        matches!(self, NormalizedCost::PiecewiseLinear(_))
    }

    pub fn evaluate(&self, p_mw: f64) -> f64 {
        match self {
            NormalizedCost::Polynomial { c0, c1, c2 } => c0 + p_mw * (c1 + p_mw * c2),
            NormalizedCost::PiecewiseLinear(points) => {
                CostModel::PiecewiseLinear(points.clone()).evaluate(p_mw)
            }
        }
    }
}

/// Validate the cost curve of one in-service generator.
pub fn normalize_gen(gen: &Gen) -> Result<NormalizedCost, ConfigurationError> {
    match &gen.cost_model {
        CostModel::NoCost => Err(ConfigurationError::MissingCost { gen: gen.id }),
        CostModel::Polynomial(coeffs) if coeffs.is_empty() => {
            Err(ConfigurationError::MissingCost { gen: gen.id })
        }
        CostModel::Polynomial(coeffs) => {
            if coeffs.iter().any(|c| !c.is_finite()) {
                return Err(ConfigurationError::NonFiniteCost { gen: gen.id });
            }
            let degree = gen.cost_model.polynomial_degree().unwrap_or(0);
            if degree > 2 {
                return Err(ConfigurationError::PolynomialDegree {
                    gen: gen.id,
                    degree,
                });
            }
            let coeff = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
            if coeff(2) < 0.0 {
                return Err(ConfigurationError::NonConvexPolynomial { gen: gen.id });
            }
            Ok(NormalizedCost::Polynomial {
                c0: coeff(0),
                c1: coeff(1),
                c2: coeff(2),
            })
        }
        CostModel::PiecewiseLinear(points) => {
            gen.cost_model.validate().map_err(|err| {
                let reason = match err {
                    ModelError::InvalidCostCurve(reason) => reason,
                    other => other.to_string(),
                };
                ConfigurationError::MalformedPiecewiseLinear {
                    gen: gen.id,
                    reason,
                }
            })?;
            match gen.cost_model.piecewise_to_polynomial() {
                CostModel::Polynomial(line) if points.len() == 2 => Ok(NormalizedCost::Polynomial {
                    c0: line.first().copied().unwrap_or(0.0),
                    c1: line.get(1).copied().unwrap_or(0.0),
                    c2: 0.0,
                }),
                _ => Ok(NormalizedCost::PiecewiseLinear(points.clone())),
            }
        }
    }
}

/// Normalized cost of every model generator, in model order.
pub fn normalize(
    network: &Network,
    index: &NetworkIndex,
) -> Result<Vec<NormalizedCost>, ConfigurationError> {
    index
        .gens
        .iter()
        .map(|&pos| normalize_gen(&network.gens[pos]))
        .collect()
}

/// Objective and epigraph rows over a variable layout.
#[derive(Debug, Clone)]
pub struct CostTerms {
    pub objective: QuadraticObjective,
    /// `Ycon` block rows
    pub pwl_rows: Vec<LinearRow>,
    /// Starting value for every `y`
    pub y_start: f64,
}

pub fn assemble(costs: &[NormalizedCost], vars: &VarLayout, base_mva: f64) -> CostTerms {
    let nx = vars.nx();
    let mut hessian = TriMat::new((nx, nx));
    let mut linear = vec![0.0; nx];
    let mut constant = 0.0;
    let mut pwl_rows = Vec::new();
    let mut max_cost: Option<f64> = None;
    let mut y_col = vars.y.start;

    for (k, cost) in costs.iter().enumerate() {
        let pg = vars.pg.start + k;
        match cost {
            NormalizedCost::Polynomial { c0, c1, c2 } => {
                if *c2 != 0.0 {
                    hessian.add_triplet(pg, pg, 2.0 * c2 * base_mva * base_mva);
                }
                linear[pg] = c1 * base_mva;
                constant += c0;
            }
            NormalizedCost::PiecewiseLinear(points) => {
                linear[y_col] = 1.0;
                for pair in points.windows(2) {
                    let (p0, c0) = (pair[0].0 / base_mva, pair[0].1);
                    let (p1, c1) = (pair[1].0 / base_mva, pair[1].1);
                    let slope = (c1 - c0) / (p1 - p0);
                    pwl_rows.push(LinearRow::at_most(
                        vec![(pg, slope), (y_col, -1.0)],
                        slope * p0 - c0,
                    ));
                }
                let top = points.iter().map(|(_, c)| *c).fold(f64::NEG_INFINITY, f64::max);
                max_cost = Some(max_cost.map_or(top, |m: f64| m.max(top)));
                y_col += 1;
            }
        }
    }

    let y_start = max_cost.map_or(0.0, |m| m + 0.1 * m.abs());
    CostTerms {
        objective: QuadraticObjective {
            hessian: hessian.to_csr(),
            linear,
            constant,
        },
        pwl_rows,
        y_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opf::Formulation;
    use gat_core::{BusId, GenId};

    fn gen(cost: CostModel) -> Gen {
        Gen::new(GenId::new(1), "g", BusId::new(1))
            .with_p_limits(0.0, 100.0)
            .with_cost(cost)
    }

    #[test]
    fn polynomial_terms_are_scaled_to_per_unit() {
        let costs = vec![NormalizedCost::Polynomial {
            c0: 10.0,
            c1: 20.0,
            c2: 0.05,
        }];
        let vars = VarLayout::new(Formulation::Dc, 2, 1, 0);
        let terms = assemble(&costs, &vars, 100.0);
        assert_eq!(terms.objective.linear, vec![0.0, 0.0, 2000.0]);
        assert_eq!(terms.objective.constant, 10.0);
        assert_eq!(terms.objective.hessian.get(2, 2), Some(&1000.0));
        // same cost at 50 MW either way
        let mut x = vec![0.0; 3];
        x[2] = 0.5;
        let (f, _) = terms.objective.evaluate(&x);
        assert!((f - costs[0].evaluate(50.0)).abs() < 1e-9);
    }

    #[test]
    fn piecewise_rows_form_an_epigraph() {
        let points = vec![(0.0, 0.0), (50.0, 250.0), (100.0, 750.0)];
        let costs = vec![NormalizedCost::PiecewiseLinear(points)];
        let vars = VarLayout::new(Formulation::Dc, 1, 1, 1);
        let terms = assemble(&costs, &vars, 100.0);
        assert_eq!(terms.pwl_rows.len(), 2);
        assert_eq!(terms.objective.linear[vars.y.start], 1.0);
        // second segment: slope 1000 $/h per p.u., row 1000·Pg - y ≤ 1000·0.5 - 250
        let row = &terms.pwl_rows[1];
        assert_eq!(row.entries, vec![(vars.pg.start, 1000.0), (vars.y.start, -1.0)]);
        assert!((row.upper - 250.0).abs() < 1e-9);
        assert!((terms.y_start - 825.0).abs() < 1e-9);
    }

    #[test]
    fn normalizer_rejects_bad_curves() {
        assert_eq!(
            normalize_gen(&gen(CostModel::NoCost)),
            Err(ConfigurationError::MissingCost { gen: GenId::new(1) })
        );
        assert_eq!(
            normalize_gen(&gen(CostModel::Polynomial(vec![0.0, 1.0, 0.0, 0.001]))),
            Err(ConfigurationError::PolynomialDegree {
                gen: GenId::new(1),
                degree: 3
            })
        );
        assert!(matches!(
            normalize_gen(&gen(CostModel::piecewise_linear(vec![
                (0.0, 0.0),
                (50.0, 500.0),
                (100.0, 600.0)
            ]))),
            Err(ConfigurationError::MalformedPiecewiseLinear { .. })
        ));
        assert_eq!(
            normalize_gen(&gen(CostModel::quadratic(0.0, 20.0, -0.1))),
            Err(ConfigurationError::NonConvexPolynomial { gen: GenId::new(1) })
        );
        // trailing zero coefficients do not raise the degree
        assert!(normalize_gen(&gen(CostModel::Polynomial(vec![1.0, 2.0, 0.0, 0.0]))).is_ok());
    }

    #[test]
    fn single_segment_becomes_linear() {
        let cost = normalize_gen(&gen(CostModel::piecewise_linear(vec![
            (10.0, 100.0),
            (60.0, 400.0),
        ])))
        .unwrap();
        assert_eq!(
            cost,
            NormalizedCost::Polynomial {
                c0: 40.0,
                c1: 6.0,
                c2: 0.0
            }
        );
    }
}
