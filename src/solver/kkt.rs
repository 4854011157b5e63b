//! Karush-Kuhn-Tucker residuals.
//!
//! For `min -rᵀw` subject to `s(w) - R <= 0`, `w - hi <= 0` and `lo - w <= 0`
//! with multipliers `λ`, `μ_hi` and `μ_lo`:
//!
//! - stationarity: `-r + λ∇s(w) + μ_hi - μ_lo = 0`
//! - primal feasibility: every constraint holds
//! - dual feasibility: every multiplier is non-negative
//! - complementary slackness: multiplier × slack = 0 for every constraint
//!
//! Stationarity is measured relative to `max(1, ‖r‖∞)`.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Lagrange multiplier estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    /// Risk constraint.
    pub risk: f64,
    /// Lower bounds `w_i >= lo_i`.
    pub lower: Vec<f64>,
    /// Upper bounds `w_i <= hi_i`.
    pub upper: Vec<f64>,
}

/// Point at which the residual is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct KktPoint<'a> {
    pub weights: &'a DVector<f64>,
    pub returns: &'a DVector<f64>,
    pub volatility: f64,
    pub volatility_gradient: &'a DVector<f64>,
    pub max_risk: f64,
    pub lower: &'a DVector<f64>,
    pub upper: &'a DVector<f64>,
}

/// Components of the KKT residual, each an ∞-norm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KktResidual {
    pub stationarity: f64,
    pub primal: f64,
    pub dual: f64,
    pub complementarity: f64,
}

impl KktResidual {
    /// Evaluate every component at `point` with multipliers `mult`.
    pub fn evaluate(point: &KktPoint<'_>, mult: &Multipliers) -> Self {
        let n = point.weights.len();

        let mut stationarity = 0.0_f64;
        let mut primal = (point.volatility - point.max_risk).max(0.0);
        let mut dual = (-mult.risk).max(0.0);
        let mut complementarity = (mult.risk * (point.max_risk - point.volatility)).abs();

        for i in 0..n {
            let w = point.weights[i];
            let (lo, hi) = (point.lower[i], point.upper[i]);
            let (mu_lo, mu_hi) = (mult.lower[i], mult.upper[i]);

            let grad = -point.returns[i] + mult.risk * point.volatility_gradient[i] + mu_hi - mu_lo;
            stationarity = stationarity.max(grad.abs());
            primal = primal.max(w - hi).max(lo - w);
            dual = dual.max(-mu_lo).max(-mu_hi);
            complementarity = complementarity
                .max((mu_hi * (hi - w)).abs())
                .max((mu_lo * (w - lo)).abs());
        }

        let scale = point.returns.amax().max(1.0);

        KktResidual {
            stationarity: stationarity / scale,
            primal,
            dual,
            complementarity,
        }
    }

    /// Combined residual used as the convergence criterion.
    pub fn total(&self) -> f64 {
        self.stationarity + self.primal + self.dual + self.complementarity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kkt_at_single_asset_optimum() {
        // One asset, r = 0.1, σ = 0.3, R = 0.15: optimum w = 0.5 with λ = r/σ.
        let w = DVector::from_vec(vec![0.5]);
        let r = DVector::from_vec(vec![0.1]);
        let grad = DVector::from_vec(vec![0.3]);
        let lo = DVector::from_vec(vec![0.0]);
        let hi = DVector::from_vec(vec![1.0]);
        let point = KktPoint {
            weights: &w,
            returns: &r,
            volatility: 0.15,
            volatility_gradient: &grad,
            max_risk: 0.15,
            lower: &lo,
            upper: &hi,
        };
        let mult = Multipliers {
            risk: 0.1 / 0.3,
            lower: vec![0.0],
            upper: vec![0.0],
        };
        let res = KktResidual::evaluate(&point, &mult);
        assert!(res.total() < 1e-12, "{:?}", res);
    }

    #[test]
    fn test_kkt_flags_slack_with_positive_multiplier() {
        let w = DVector::from_vec(vec![0.5]);
        let r = DVector::from_vec(vec![0.0]);
        let grad = DVector::from_vec(vec![0.0]);
        let lo = DVector::from_vec(vec![0.0]);
        let hi = DVector::from_vec(vec![1.0]);
        let point = KktPoint {
            weights: &w,
            returns: &r,
            volatility: 0.1,
            volatility_gradient: &grad,
            max_risk: 0.2,
            lower: &lo,
            upper: &hi,
        };
        let mult = Multipliers {
            risk: 0.0,
            lower: vec![0.0],
            upper: vec![0.2],
        };
        let res = KktResidual::evaluate(&point, &mult);
        assert!((res.complementarity - 0.1).abs() < 1e-12);
        assert!((res.stationarity - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_stationarity_is_relative_to_large_returns() {
        let w = DVector::from_vec(vec![0.5]);
        let r = DVector::from_vec(vec![5.0]);
        let grad = DVector::from_vec(vec![1.0]);
        let lo = DVector::from_vec(vec![0.0]);
        let hi = DVector::from_vec(vec![1.0]);
        let point = KktPoint {
            weights: &w,
            returns: &r,
            volatility: 0.2,
            volatility_gradient: &grad,
            max_risk: 0.2,
            lower: &lo,
            upper: &hi,
        };
        let mult = Multipliers {
            risk: 4.0,
            lower: vec![0.0],
            upper: vec![0.0],
        };
        // Absolute residual |-5 + 4| = 1, divided by ‖r‖∞ = 5.
        let res = KktResidual::evaluate(&point, &mult);
        assert!((res.stationarity - 0.2).abs() < 1e-12);
    }
}
