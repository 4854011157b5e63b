//! Risk models.
//!
//! A risk model supplies the covariance structure Σ behind portfolio
//! volatility `s(w) = sqrt(wᵀΣw)`. The optimizer only talks to the
//! `RiskModel` trait, so the diagonal model can be replaced by a full
//! covariance without touching the solver.

pub mod covariance;
pub mod diagonal;

use nalgebra::{DMatrix, DVector};

pub use covariance::CovarianceRisk;
pub use diagonal::DiagonalRisk;

use crate::constraints::Bounds;
use crate::error::Result;
use crate::solver::min_variance_on_box;
use crate::solver::Settings;

/// Volatility below which the gradient of `s(w)` is treated as zero.
pub(crate) const VOLATILITY_FLOOR: f64 = 1e-12;

/// Covariance structure of a fixed asset universe.
pub trait RiskModel: std::fmt::Debug + Send + Sync {
    /// Number of assets.
    fn dim(&self) -> usize;

    /// Σ w.
    fn apply(&self, w: &DVector<f64>) -> DVector<f64>;

    /// Dense Σ.
    fn covariance(&self) -> DMatrix<f64>;

    /// Portfolio variance wᵀΣw.
    fn variance(&self, w: &DVector<f64>) -> f64 {
        w.dot(&self.apply(w))
    }

    /// Portfolio volatility sqrt(wᵀΣw).
    fn volatility(&self, w: &DVector<f64>) -> f64 {
        self.variance(w).max(0.0).sqrt()
    }

    /// Per-asset volatility sqrt(Σ_ii).
    fn asset_volatilities(&self) -> DVector<f64> {
        self.covariance().diagonal().map(|v| v.max(0.0).sqrt())
    }

    /// Smallest volatility attainable inside the box.
    fn min_volatility(&self, bounds: &[Bounds], settings: &Settings) -> Result<f64> {
        let variance = min_variance_on_box(&self.covariance(), bounds, settings)?;
        Ok(variance.max(0.0).sqrt())
    }
}

/// Value, gradient and Hessian of `s(w)` at one point.
#[derive(Debug, Clone)]
pub struct VolatilityModel {
    pub value: f64,
    pub gradient: DVector<f64>,
    pub hessian: DMatrix<f64>,
}

impl VolatilityModel {
    /// Second-order information of `s(w) = sqrt(wᵀΣw)`:
    /// ∇s = Σw / s and ∇²s = (Σ − (Σw)(Σw)ᵀ / s²) / s.
    ///
    /// At `s ≈ 0` the function is not differentiable; both derivatives are
    /// reported as zero there.
    pub fn at(model: &dyn RiskModel, w: &DVector<f64>) -> Self {
        let n = model.dim();
        let sigma_w = model.apply(w);
        let value = w.dot(&sigma_w).max(0.0).sqrt();

        if value < VOLATILITY_FLOOR {
            return VolatilityModel {
                value,
                gradient: DVector::zeros(n),
                hessian: DMatrix::zeros(n, n),
            };
        }

        let gradient = &sigma_w / value;
        let hessian = (model.covariance() - &gradient * gradient.transpose()) / value;

        VolatilityModel {
            value,
            gradient,
            hessian,
        }
    }
}
