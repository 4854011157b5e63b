//! Problem definition and solving API.
//!
//! A `PortfolioProblem` maximizes expected return under a volatility cap and
//! per-asset bounds. Use the builder to construct one:
//! ```ignore
//! let result = PortfolioProblem::maximize_return(vec![0.12, 0.08])
//!     .asset_risk(vec![0.25, 0.15])
//!     .max_risk(0.18)
//!     .solve()?;
//! ```
//! or the one-shot `optimize` function for the diagonal risk model.

use std::sync::Arc;

use nalgebra::DVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constraints::{Bounds, PortfolioConstraints};
use crate::error::{PortfolioError, Result};
use crate::risk::{DiagonalRisk, RiskModel};
use crate::solver::{solve_sqp, Multipliers, Settings, SqpProblem, Termination};

/// Weights closer than this to a bound count as sitting on it.
const ACTIVE_TOL: f64 = 1e-6;

/// Outcome of a successful optimization.
///
/// Only converged results are ever returned; failures surface as
/// `PortfolioError::Convergence`. Weights need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// One weight per asset, in input order.
    pub weights: Vec<f64>,
    /// Whether the KKT conditions were met.
    pub converged: bool,
    /// Human-readable solver message.
    pub diagnostic: String,
    /// QP subproblems solved (0 when the risk cap is inactive).
    pub iterations: u32,
    /// wᵀr.
    pub expected_return: f64,
    /// sqrt(wᵀΣw).
    pub volatility: f64,
    /// Final KKT residual, measured with weights in units of the risk cap.
    pub kkt_residual: f64,
    /// Final Lagrange multiplier estimates.
    pub multipliers: Multipliers,
}

impl OptimizationResult {
    /// Total invested weight.
    pub fn invested(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Indices of assets held at their lower bound.
    pub fn at_lower(&self, bounds: &[Bounds]) -> Vec<usize> {
        self.active(bounds, |w, b| w - b.lower <= ACTIVE_TOL)
    }

    /// Indices of assets held at their upper bound.
    pub fn at_upper(&self, bounds: &[Bounds]) -> Vec<usize> {
        self.active(bounds, |w, b| b.upper - w <= ACTIVE_TOL)
    }

    /// Whether the risk cap binds, judged by its multiplier.
    pub fn risk_binding(&self) -> bool {
        self.multipliers.risk > ACTIVE_TOL
    }

    fn active(&self, bounds: &[Bounds], pred: impl Fn(f64, &Bounds) -> bool) -> Vec<usize> {
        self.weights
            .iter()
            .zip(bounds)
            .enumerate()
            .filter(|(_, (w, b))| pred(**w, b))
            .map(|(i, _)| i)
            .collect()
    }
}

/// A validated risk-capped return maximization problem.
#[derive(Debug, Clone)]
pub struct PortfolioProblem {
    expected_returns: DVector<f64>,
    risk: Arc<dyn RiskModel>,
    constraints: PortfolioConstraints,
}

impl PortfolioProblem {
    /// Start building a problem that maximizes `wᵀ expected_returns`.
    pub fn maximize_return(expected_returns: impl Into<Vec<f64>>) -> ProblemBuilder {
        ProblemBuilder {
            expected_returns: expected_returns.into(),
            risk: None,
            asset_risk: None,
            max_risk: None,
            bounds: None,
        }
    }

    pub fn num_assets(&self) -> usize {
        self.expected_returns.len()
    }

    pub fn expected_returns(&self) -> &DVector<f64> {
        &self.expected_returns
    }

    pub fn risk_model(&self) -> &dyn RiskModel {
        self.risk.as_ref()
    }

    pub fn constraints(&self) -> &PortfolioConstraints {
        &self.constraints
    }

    pub fn max_risk(&self) -> f64 {
        self.constraints.max_risk
    }

    /// Same problem under a different risk cap.
    pub fn with_max_risk(&self, max_risk: f64) -> Result<Self> {
        let constraints = PortfolioConstraints {
            max_risk,
            bounds: self.constraints.bounds.clone(),
        };
        constraints.validate(self.num_assets())?;
        Ok(PortfolioProblem {
            expected_returns: self.expected_returns.clone(),
            risk: Arc::clone(&self.risk),
            constraints,
        })
    }

    /// Solve the problem with default settings.
    pub fn solve(&self) -> Result<OptimizationResult> {
        self.solve_with(&Settings::default())
    }

    /// Solve the problem with custom settings.
    pub fn solve_with(&self, settings: &Settings) -> Result<OptimizationResult> {
        let sqp = SqpProblem {
            returns: &self.expected_returns,
            risk: self.risk.as_ref(),
            max_risk: self.constraints.max_risk,
            bounds: &self.constraints.bounds,
        };
        let outcome = solve_sqp(&sqp, settings)?;

        let diagnostic = match outcome.termination {
            Termination::RiskInactive => {
                "Optimization terminated successfully: risk constraint inactive".to_string()
            }
            Termination::KktSatisfied => format!(
                "Optimization terminated successfully: KKT residual {:.3e} after {} iterations",
                outcome.kkt.total(),
                outcome.iterations
            ),
        };

        Ok(OptimizationResult {
            expected_return: self.expected_returns.dot(&outcome.weights),
            volatility: self.risk.volatility(&outcome.weights),
            weights: outcome.weights.iter().copied().collect(),
            converged: true,
            diagnostic,
            iterations: outcome.iterations,
            kkt_residual: outcome.kkt.total(),
            multipliers: outcome.multipliers,
        })
    }
}

/// Builder for constructing problems.
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    expected_returns: Vec<f64>,
    risk: Option<Arc<dyn RiskModel>>,
    asset_risk: Option<Vec<f64>>,
    max_risk: Option<f64>,
    bounds: Option<Vec<Bounds>>,
}

impl ProblemBuilder {
    /// Use an arbitrary risk model.
    pub fn risk_model(mut self, model: impl RiskModel + 'static) -> Self {
        self.risk = Some(Arc::new(model));
        self.asset_risk = None;
        self
    }

    /// Use a shared risk model.
    pub fn shared_risk_model(mut self, model: Arc<dyn RiskModel>) -> Self {
        self.risk = Some(model);
        self.asset_risk = None;
        self
    }

    /// Use the diagonal risk model built from per-asset volatilities.
    pub fn asset_risk(mut self, volatilities: impl Into<Vec<f64>>) -> Self {
        self.asset_risk = Some(volatilities.into());
        self.risk = None;
        self
    }

    /// Upper bound on portfolio volatility.
    pub fn max_risk(mut self, max_risk: f64) -> Self {
        self.max_risk = Some(max_risk);
        self
    }

    /// Per-asset bounds; `(0, 1)` for every asset when not given.
    pub fn bounds<B: Into<Bounds>>(mut self, bounds: impl IntoIterator<Item = B>) -> Self {
        self.bounds = Some(bounds.into_iter().map(Into::into).collect());
        self
    }

    /// Validate and build the problem.
    pub fn build(self) -> Result<PortfolioProblem> {
        let n = self.expected_returns.len();
        if n == 0 {
            return Err(PortfolioError::InvalidConstraint(
                "at least one asset is required".into(),
            ));
        }
        if let Some((i, r)) = self
            .expected_returns
            .iter()
            .enumerate()
            .find(|(_, r)| !r.is_finite())
        {
            return Err(PortfolioError::InvalidConstraint(format!(
                "expected return of asset {} is not finite: {}",
                i, r
            )));
        }

        let risk: Arc<dyn RiskModel> = match (self.risk, self.asset_risk) {
            (Some(model), _) => model,
            (None, Some(volatilities)) => {
                if volatilities.len() != n {
                    return Err(PortfolioError::ShapeMismatch {
                        expected: format!("{} asset risks", n),
                        got: format!("{}", volatilities.len()),
                    });
                }
                Arc::new(DiagonalRisk::from_volatilities(&volatilities)?)
            }
            (None, None) => {
                return Err(PortfolioError::InvalidConstraint(
                    "no risk model given".into(),
                ))
            }
        };
        if risk.dim() != n {
            return Err(PortfolioError::ShapeMismatch {
                expected: format!("risk model over {} assets", n),
                got: format!("{}", risk.dim()),
            });
        }

        let max_risk = self.max_risk.ok_or_else(|| {
            PortfolioError::InvalidConstraint("max risk not set".into())
        })?;
        let constraints = match self.bounds {
            Some(bounds) => PortfolioConstraints::with_bounds(max_risk, bounds),
            None => PortfolioConstraints::new(max_risk, n),
        };
        constraints.validate(n)?;

        Ok(PortfolioProblem {
            expected_returns: DVector::from_vec(self.expected_returns),
            risk,
            constraints,
        })
    }

    /// Build and solve the problem with default settings.
    pub fn solve(self) -> Result<OptimizationResult> {
        self.build()?.solve()
    }

    /// Build and solve the problem with custom settings.
    pub fn solve_with(self, settings: &Settings) -> Result<OptimizationResult> {
        self.build()?.solve_with(settings)
    }
}

/// Maximize `wᵀr` subject to `sqrt(wᵀ diag(σ²) w) <= max_risk` and the bounds.
pub fn optimize(
    expected_returns: &[f64],
    asset_risk: &[f64],
    max_risk: f64,
    bounds: &[Bounds],
) -> Result<OptimizationResult> {
    optimize_with(expected_returns, asset_risk, max_risk, bounds, &Settings::default())
}

/// `optimize` with custom settings.
pub fn optimize_with(
    expected_returns: &[f64],
    asset_risk: &[f64],
    max_risk: f64,
    bounds: &[Bounds],
    settings: &Settings,
) -> Result<OptimizationResult> {
    PortfolioProblem::maximize_return(expected_returns)
        .asset_risk(asset_risk)
        .max_risk(max_risk)
        .bounds(bounds.iter().copied())
        .solve_with(settings)
}

/// Solve independent problems in parallel. Results keep the input order.
pub fn solve_batch(problems: &[PortfolioProblem], settings: &Settings) -> Vec<Result<OptimizationResult>> {
    debug!("solving batch of {} problems", problems.len());
    problems.par_iter().map(|p| p.solve_with(settings)).collect()
}
