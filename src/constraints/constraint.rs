//! Portfolio constraints.
//!
//! Two kinds of constraints shape the feasible region:
//! - Box bounds `lo_i <= w_i <= hi_i` per asset (long-only, `0 <= lo`)
//! - A volatility cap `sqrt(wᵀΣw) <= max_risk`
//!
//! There is no aggregate (sum-to-one) constraint; unallocated weight is idle cash.

use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, Result};

/// Per-asset weight bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// Create bounds, checking `0 <= lower <= upper` with both finite.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        let b = Bounds { lower, upper };
        b.validate()?;
        Ok(b)
    }

    /// Check `0 <= lower <= upper` with both finite.
    pub fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(PortfolioError::InvalidConstraint(format!(
                "bounds must be finite, got ({}, {})",
                self.lower, self.upper
            )));
        }
        if self.lower < 0.0 {
            return Err(PortfolioError::InvalidConstraint(format!(
                "lower bound {} is negative; short selling is not supported",
                self.lower
            )));
        }
        if self.lower > self.upper {
            return Err(PortfolioError::InvalidConstraint(format!(
                "lower bound {} exceeds upper bound {}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    /// Project a weight onto the interval.
    pub fn clamp(&self, w: f64) -> f64 {
        w.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, w: f64, tol: f64) -> bool {
        w >= self.lower - tol && w <= self.upper + tol
    }
}

impl Default for Bounds {
    /// No short selling and no more than 100% in a single asset.
    fn default() -> Self {
        Bounds {
            lower: 0.0,
            upper: 1.0,
        }
    }
}

impl From<(f64, f64)> for Bounds {
    fn from((lower, upper): (f64, f64)) -> Self {
        Bounds { lower, upper }
    }
}

/// Risk ceiling together with per-asset bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConstraints {
    /// Upper bound on portfolio standard deviation.
    pub max_risk: f64,
    /// One entry per asset.
    pub bounds: Vec<Bounds>,
}

impl PortfolioConstraints {
    /// Default `(0, 1)` bounds for `n` assets.
    pub fn new(max_risk: f64, n: usize) -> Self {
        PortfolioConstraints {
            max_risk,
            bounds: vec![Bounds::default(); n],
        }
    }

    pub fn with_bounds(max_risk: f64, bounds: Vec<Bounds>) -> Self {
        PortfolioConstraints { max_risk, bounds }
    }

    /// Check the risk ceiling, every bound, and the asset count.
    pub fn validate(&self, n: usize) -> Result<()> {
        if !(self.max_risk.is_finite() && self.max_risk > 0.0) {
            return Err(PortfolioError::InvalidConstraint(format!(
                "max risk must be positive and finite, got {}",
                self.max_risk
            )));
        }
        if self.bounds.len() != n {
            return Err(PortfolioError::ShapeMismatch {
                expected: format!("{} bounds", n),
                got: format!("{}", self.bounds.len()),
            });
        }
        for (i, b) in self.bounds.iter().enumerate() {
            b.validate().map_err(|e| match e {
                PortfolioError::InvalidConstraint(msg) => {
                    PortfolioError::InvalidConstraint(format!("asset {}: {}", i, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}
