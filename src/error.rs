//! Error types for maxret.

use thiserror::Error;

/// Error type for estimation and optimization.
#[derive(Debug, Error)]
pub enum PortfolioError {
    /// An asset has too few valid price observations to estimate from.
    #[error("Insufficient data for {asset}: {observations} valid observation(s), need at least 2")]
    InsufficientData { asset: String, observations: usize },

    /// Malformed bounds, non-positive risk ceiling or non-finite inputs.
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// The solver did not reach a KKT point, or the region is empty.
    #[error("Optimization did not converge: {diagnostic}")]
    Convergence { diagnostic: String },

    /// Input vectors of different lengths.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// The QP backend could not be set up.
    #[error("Solver error: {0}")]
    Solver(String),
}

impl PortfolioError {
    pub(crate) fn convergence(diagnostic: impl Into<String>) -> Self {
        PortfolioError::Convergence {
            diagnostic: diagnostic.into(),
        }
    }

    /// True when this is an infeasibility report from the optimizer.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, PortfolioError::Convergence { diagnostic } if diagnostic.contains("infeasible"))
    }
}

/// Result type for maxret operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;
