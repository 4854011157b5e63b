//! Annualized return and volatility per asset.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::returns::{mean, periodic_returns, sample_covariance_of, sample_std};
use crate::data::{PriceSeries, PriceTable};
use crate::error::{PortfolioError, Result};
use crate::risk::{CovarianceRisk, DiagonalRisk};

/// Trading days per year.
pub const TRADING_PERIODS_PER_YEAR: f64 = 252.0;

/// Expected return and volatility of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetProfile {
    pub ticker: String,
    /// Annualized mean periodic return.
    pub expected_return: f64,
    /// Annualized standard deviation of periodic returns, always >= 0.
    pub volatility: f64,
    /// Number of valid prices the estimate is based on.
    pub observations: usize,
}

/// Estimates for a whole asset universe, in table column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRiskProfile {
    pub assets: Vec<AssetProfile>,
}

impl ReturnRiskProfile {
    pub fn tickers(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.ticker.clone()).collect()
    }

    pub fn expected_returns(&self) -> Vec<f64> {
        self.assets.iter().map(|a| a.expected_return).collect()
    }

    pub fn volatilities(&self) -> Vec<f64> {
        self.assets.iter().map(|a| a.volatility).collect()
    }

    /// Uncorrelated risk model built from the volatilities.
    pub fn diagonal_risk(&self) -> Result<DiagonalRisk> {
        DiagonalRisk::from_volatilities(&self.volatilities())
    }

    pub fn get(&self, ticker: &str) -> Option<&AssetProfile> {
        self.assets.iter().find(|a| a.ticker == ticker)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Return/risk estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimator {
    /// Periods per year used to annualize; 252 for daily data.
    pub periods_per_year: f64,
}

impl Default for Estimator {
    fn default() -> Self {
        Estimator {
            periods_per_year: TRADING_PERIODS_PER_YEAR,
        }
    }
}

impl Estimator {
    pub fn new(periods_per_year: f64) -> Result<Self> {
        if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
            return Err(PortfolioError::InvalidConstraint(format!(
                "periods per year must be positive, got {}",
                periods_per_year
            )));
        }
        Ok(Estimator { periods_per_year })
    }

    /// Estimate every asset of the table.
    ///
    /// Fails on the first asset with fewer than 2 valid prices; a partial
    /// profile is never returned.
    pub fn estimate(&self, table: &PriceTable) -> Result<ReturnRiskProfile> {
        let assets = (0..table.num_assets())
            .map(|asset| {
                let prices: Vec<f64> = table.column(asset).iter().flatten().copied().collect();
                self.estimate_prices(&table.tickers()[asset], &prices)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReturnRiskProfile { assets })
    }

    /// Estimate a set of series after aligning them on their common dates.
    pub fn estimate_series(&self, series: &[PriceSeries]) -> Result<ReturnRiskProfile> {
        self.estimate(&PriceTable::from_series(series))
    }

    fn estimate_prices(&self, ticker: &str, prices: &[f64]) -> Result<AssetProfile> {
        if prices.len() < 2 {
            return Err(PortfolioError::InsufficientData {
                asset: ticker.to_string(),
                observations: prices.len(),
            });
        }

        let returns = periodic_returns(prices);
        let profile = AssetProfile {
            ticker: ticker.to_string(),
            expected_return: mean(&returns) * self.periods_per_year,
            volatility: sample_std(&returns) * self.periods_per_year.sqrt(),
            observations: prices.len(),
        };
        debug!(
            "{}: expected return {:.6}, volatility {:.6} from {} prices",
            ticker, profile.expected_return, profile.volatility, profile.observations
        );
        Ok(profile)
    }

    /// Annualized sample covariance over the dates on which every asset trades.
    ///
    /// Returns are taken between consecutive complete rows. Needs at least 2
    /// complete rows; otherwise the asset with the fewest prices is reported.
    pub fn sample_covariance(&self, table: &PriceTable) -> Result<CovarianceRisk> {
        let n = table.num_assets();
        let rows = table.complete_rows();
        if n == 0 {
            return CovarianceRisk::new(DMatrix::zeros(0, 0));
        }
        if rows.len() < 2 {
            let (asset, observations) = (0..n)
                .map(|a| (a, table.column(a).iter().flatten().count()))
                .min_by_key(|(_, count)| *count)
                .unwrap_or((0, 0));
            return Err(PortfolioError::InsufficientData {
                asset: table.tickers()[asset].clone(),
                observations: observations.min(rows.len()),
            });
        }

        let returns: Vec<Vec<f64>> = (0..n)
            .map(|a| {
                let prices: Vec<f64> = rows.iter().filter_map(|&row| table.column(a)[row]).collect();
                periodic_returns(&prices)
            })
            .collect();

        let sigma = DMatrix::from_fn(n, n, |i, j| {
            sample_covariance_of(&returns[i], &returns[j]) * self.periods_per_year
        });
        CovarianceRisk::new(sigma)
    }
}

/// Estimate with 252 periods per year.
pub fn estimate(table: &PriceTable) -> Result<ReturnRiskProfile> {
    Estimator::default().estimate(table)
}

/// Align and estimate with 252 periods per year.
pub fn estimate_series(series: &[PriceSeries]) -> Result<ReturnRiskProfile> {
    Estimator::default().estimate_series(series)
}
