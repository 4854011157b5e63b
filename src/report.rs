//! Plain-data views for reporting and visualization.
//!
//! Nothing here renders. Each type is what a chart or table needs, derived
//! from immutable optimizer output.

use std::fmt;

use nalgebra::DVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, Result};
use crate::problem::{OptimizationResult, PortfolioProblem};
use crate::risk::RiskModel;
use crate::solver::Settings;

/// Weight of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub ticker: String,
    pub weight: f64,
}

/// Allocation across tickers, the input of a bar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub entries: Vec<AllocationEntry>,
}

impl Allocation {
    /// Pair tickers with weights. Both must have the same length.
    pub fn new(tickers: &[String], weights: &[f64]) -> Result<Self> {
        if tickers.len() != weights.len() {
            return Err(PortfolioError::ShapeMismatch {
                expected: format!("{} weights", tickers.len()),
                got: format!("{}", weights.len()),
            });
        }
        Ok(Allocation {
            entries: tickers
                .iter()
                .zip(weights)
                .map(|(ticker, &weight)| AllocationEntry {
                    ticker: ticker.clone(),
                    weight,
                })
                .collect(),
        })
    }

    pub fn from_result(tickers: &[String], result: &OptimizationResult) -> Result<Self> {
        Self::new(tickers, &result.weights)
    }

    /// Sum of weights.
    pub fn invested(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Weight left uninvested, negative if the allocation is levered.
    pub fn cash(&self) -> f64 {
        1.0 - self.invested()
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.entries {
            writeln!(f, "{}: {:.2}%", e.ticker, e.weight * 100.0)?;
        }
        write!(f, "cash: {:.2}%", self.cash() * 100.0)
    }
}

/// One portfolio on the risk/return plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskReturnPoint {
    pub volatility: f64,
    pub expected_return: f64,
}

impl RiskReturnPoint {
    /// Evaluate `weights` under a risk model and expected returns.
    pub fn evaluate(risk: &dyn RiskModel, expected_returns: &[f64], weights: &[f64]) -> Result<Self> {
        let n = risk.dim();
        if expected_returns.len() != n || weights.len() != n {
            return Err(PortfolioError::ShapeMismatch {
                expected: format!("{} returns and weights", n),
                got: format!("{} returns, {} weights", expected_returns.len(), weights.len()),
            });
        }
        let w = DVector::from_column_slice(weights);
        let r = DVector::from_column_slice(expected_returns);
        Ok(RiskReturnPoint {
            volatility: risk.volatility(&w),
            expected_return: r.dot(&w),
        })
    }
}

/// Max-return portfolio at one risk cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub max_risk: f64,
    pub volatility: f64,
    pub expected_return: f64,
    pub weights: Vec<f64>,
}

/// Solve `problem` once per risk cap, in parallel.
///
/// Fails if any cap fails; points come back in the order of `risk_levels`.
pub fn efficient_frontier(
    problem: &PortfolioProblem,
    risk_levels: &[f64],
    settings: &Settings,
) -> Result<Vec<FrontierPoint>> {
    risk_levels
        .par_iter()
        .map(|&max_risk| -> Result<FrontierPoint> {
            let result = problem.with_max_risk(max_risk)?.solve_with(settings)?;
            Ok(FrontierPoint {
                max_risk,
                volatility: result.volatility,
                expected_return: result.expected_return,
                weights: result.weights,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::DiagonalRisk;

    #[test]
    fn test_allocation_reports_cash() {
        let tickers = vec!["A".to_string(), "B".to_string()];
        let alloc = Allocation::new(&tickers, &[0.25, 0.5]).unwrap();
        assert!((alloc.cash() - 0.25).abs() < 1e-12);
        let text = alloc.to_string();
        assert!(text.contains("A: 25.00%"));
        assert!(text.ends_with("cash: 25.00%"));
    }

    #[test]
    fn test_allocation_length_mismatch() {
        let tickers = vec!["A".to_string()];
        assert!(Allocation::new(&tickers, &[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_risk_return_point() {
        let risk = DiagonalRisk::from_volatilities(&[0.3, 0.4]).unwrap();
        let p = RiskReturnPoint::evaluate(&risk, &[0.1, 0.2], &[1.0, 1.0]).unwrap();
        assert!((p.volatility - 0.5).abs() < 1e-12);
        assert!((p.expected_return - 0.3).abs() < 1e-12);
    }
}
