//! Return and risk estimation from price histories.

pub mod estimator;
pub mod returns;

pub use estimator::{
    estimate, estimate_series, AssetProfile, Estimator, ReturnRiskProfile,
    TRADING_PERIODS_PER_YEAR,
};
pub use returns::{cumulative_returns, mean, periodic_returns, sample_std, CumulativeReturns};
