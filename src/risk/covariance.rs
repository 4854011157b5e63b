//! Full covariance risk model.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::RiskModel;
use crate::error::{PortfolioError, Result};

/// Dense symmetric covariance matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceRisk {
    sigma: DMatrix<f64>,
}

impl CovarianceRisk {
    /// Wrap a covariance matrix. It must be square, finite, symmetric and have
    /// a non-negative diagonal.
    pub fn new(sigma: DMatrix<f64>) -> Result<Self> {
        if !sigma.is_square() {
            return Err(PortfolioError::ShapeMismatch {
                expected: "square covariance matrix".into(),
                got: format!("{}x{}", sigma.nrows(), sigma.ncols()),
            });
        }
        if sigma.iter().any(|v| !v.is_finite()) {
            return Err(PortfolioError::InvalidConstraint(
                "covariance contains non-finite entries".into(),
            ));
        }
        if sigma.diagonal().iter().any(|v| *v < 0.0) {
            return Err(PortfolioError::InvalidConstraint(
                "covariance has a negative variance".into(),
            ));
        }

        let scale = sigma.amax().max(1.0);
        let asymmetry = (&sigma - sigma.transpose()).amax();
        if asymmetry > 1e-10 * scale {
            return Err(PortfolioError::InvalidConstraint(format!(
                "covariance is not symmetric (max |Σ - Σᵀ| = {:e})",
                asymmetry
            )));
        }

        // Remove round-off asymmetry so Hessians stay exactly symmetric.
        let sigma = (&sigma + sigma.transpose()) * 0.5;
        Ok(CovarianceRisk { sigma })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    /// Pearson correlation between two assets, `None` if either has zero variance.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let denom = (self.sigma[(i, i)] * self.sigma[(j, j)]).sqrt();
        (denom > 0.0).then(|| self.sigma[(i, j)] / denom)
    }
}

impl RiskModel for CovarianceRisk {
    fn dim(&self) -> usize {
        self.sigma.nrows()
    }

    fn apply(&self, w: &DVector<f64>) -> DVector<f64> {
        &self.sigma * w
    }

    fn covariance(&self) -> DMatrix<f64> {
        self.sigma.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Bounds;
    use crate::solver::Settings;

    #[test]
    fn test_rejects_asymmetric() {
        let sigma = DMatrix::from_row_slice(2, 2, &[0.04, 0.02, 0.0, 0.09]);
        assert!(matches!(
            CovarianceRisk::new(sigma),
            Err(PortfolioError::InvalidConstraint(_))
        ));
    }

    #[test]
    fn test_rejects_non_square() {
        let sigma = DMatrix::zeros(2, 3);
        assert!(matches!(
            CovarianceRisk::new(sigma),
            Err(PortfolioError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_correlation() {
        let sigma = DMatrix::from_row_slice(2, 2, &[0.04, 0.012, 0.012, 0.09]);
        let model = CovarianceRisk::new(sigma).unwrap();
        assert!((model.correlation(0, 1).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_min_volatility_through_qp() {
        // Negatively correlated pair with both weights forced to at least 0.5.
        let sigma = DMatrix::from_row_slice(2, 2, &[0.04, -0.02, -0.02, 0.04]);
        let model = CovarianceRisk::new(sigma).unwrap();
        let bounds = [Bounds::new(0.5, 1.0).unwrap(), Bounds::new(0.5, 1.0).unwrap()];
        let min = model.min_volatility(&bounds, &Settings::default()).unwrap();
        // At w = (0.5, 0.5): 0.25 * (0.04 + 0.04 - 0.04) = 0.01.
        assert!((min - 0.1).abs() < 1e-4, "got {}", min);
    }
}
