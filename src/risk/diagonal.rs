//! Uncorrelated risk: Σ = diag(σ²).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::RiskModel;
use crate::constraints::Bounds;
use crate::error::{PortfolioError, Result};
use crate::solver::Settings;

/// Diagonal covariance built from per-asset volatilities.
///
/// Cross-asset correlation is not modeled, so portfolio risk is understated
/// whenever assets move together. Use `CovarianceRisk` when that matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagonalRisk {
    variances: DVector<f64>,
}

impl DiagonalRisk {
    /// Build from annualized volatilities. Each must be finite and ≥ 0.
    pub fn from_volatilities(volatilities: &[f64]) -> Result<Self> {
        if let Some((i, v)) = volatilities
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(PortfolioError::InvalidConstraint(format!(
                "asset risk {} must be finite and non-negative, got {}",
                i, v
            )));
        }

        Ok(DiagonalRisk {
            variances: DVector::from_iterator(volatilities.len(), volatilities.iter().map(|v| v * v)),
        })
    }

    pub fn variances(&self) -> &DVector<f64> {
        &self.variances
    }
}

impl RiskModel for DiagonalRisk {
    fn dim(&self) -> usize {
        self.variances.len()
    }

    fn apply(&self, w: &DVector<f64>) -> DVector<f64> {
        self.variances.component_mul(w)
    }

    fn covariance(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.variances)
    }

    fn asset_volatilities(&self) -> DVector<f64> {
        self.variances.map(f64::sqrt)
    }

    /// With non-negative lower bounds the variance is minimized coordinate-wise
    /// at `w = lo`.
    fn min_volatility(&self, bounds: &[Bounds], _settings: &Settings) -> Result<f64> {
        let variance: f64 = self
            .variances
            .iter()
            .zip(bounds)
            .map(|(v, b)| v * b.lower * b.lower)
            .sum();
        Ok(variance.sqrt())
    }
}
