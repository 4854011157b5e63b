//! Periodic returns and their moments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::PriceTable;

/// Fractional change between consecutive prices, `p_t / p_{t-1} - 1`.
pub fn periodic_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation with the `n - 1` denominator.
///
/// A single value has no dispersion and yields 0.
pub fn sample_std(xs: &[f64]) -> f64 {
    sample_covariance_of(xs, xs).max(0.0).sqrt()
}

/// Sample covariance of two equally long slices with the `n - 1` denominator.
pub(crate) fn sample_covariance_of(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.len() < 2 {
        return 0.0;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let sum: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    sum / (xs.len() - 1) as f64
}

/// Running sum of periodic returns for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeReturns {
    pub ticker: String,
    /// `(date, cumulative return)`, starting at the second valid observation.
    pub points: Vec<(NaiveDate, f64)>,
}

impl CumulativeReturns {
    /// Cumulative return at the last date, 0 if there are no points.
    pub fn last(&self) -> f64 {
        self.points.last().map(|(_, v)| *v).unwrap_or(0.0)
    }
}

/// Cumulative sum of periodic returns per asset, the input of a
/// return-evolution chart.
pub fn cumulative_returns(table: &PriceTable) -> Vec<CumulativeReturns> {
    (0..table.num_assets())
        .map(|asset| {
            let observed = table.observed(asset);
            let mut total = 0.0;
            let points = observed
                .windows(2)
                .map(|w| {
                    total += w[1].1 / w[0].1 - 1.0;
                    (w[1].0, total)
                })
                .collect();
            CumulativeReturns {
                ticker: table.tickers()[asset].clone(),
                points,
            }
        })
        .collect()
}
