//! # maxret
//!
//! Risk-capped expected return maximization for long-only portfolios.
//!
//! maxret estimates annualized returns and volatilities from historical
//! prices and finds the weights that maximize expected return while keeping
//! portfolio volatility under a ceiling, solved to KKT optimality with a
//! sequential quadratic programming (SQP) method.
//!
//! ## Quick Start
//!
//! ```ignore
//! use maxret::prelude::*;
//!
//! let table = PriceTable::from_series(&series);
//! let profile = estimate(&table)?;
//!
//! let result = optimize(
//!     &profile.expected_returns(),
//!     &profile.volatilities(),
//!     0.2,
//!     &vec![Bounds::default(); profile.len()],
//! )?;
//!
//! println!("{}", Allocation::new(&profile.tickers(), &result.weights)?);
//! ```
//!
//! ## Problem
//!
//! ```text
//! maximize    rᵀw
//! subject to  sqrt(wᵀΣw) <= max_risk
//!             lo_i <= w_i <= hi_i
//! ```
//!
//! There is no sum-to-one constraint: weight left unallocated is idle cash.
//!
//! ## Architecture
//!
//! - **Estimation** of annualized mean and sample volatility (252 periods/year)
//! - **Risk models** behind the `RiskModel` trait: diagonal or full covariance
//! - **SQP** with exact Lagrangian Hessian, ℓ1 merit line search, KKT stopping
//! - **Clarabel** for the convex QP subproblems
//! - **Reports** as plain serializable data

pub mod constraints;
pub mod data;
pub mod error;
pub mod estimate;
pub mod problem;
pub mod report;
pub mod risk;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use maxret::prelude::*;
/// ```
pub mod prelude {
    // Data
    pub use crate::data::{PriceObservation, PriceSeries, PriceTable};

    // Estimation
    pub use crate::estimate::{
        cumulative_returns, estimate, estimate_series, AssetProfile, CumulativeReturns, Estimator,
        ReturnRiskProfile,
    };

    // Risk
    pub use crate::risk::{CovarianceRisk, DiagonalRisk, RiskModel};

    // Constraints
    pub use crate::constraints::{Bounds, PortfolioConstraints};

    // Problem
    pub use crate::problem::{
        optimize, optimize_with, solve_batch, OptimizationResult, PortfolioProblem, ProblemBuilder,
    };

    // Solver
    pub use crate::solver::{Multipliers, Settings};

    // Reports
    pub use crate::report::{
        efficient_frontier, Allocation, AllocationEntry, FrontierPoint, RiskReturnPoint,
    };

    // Errors
    pub use crate::error::{PortfolioError, Result};
}

// Re-export main types at crate root
pub use error::{PortfolioError, Result};
pub use problem::{optimize, OptimizationResult, PortfolioProblem};
pub use solver::Settings;
