//! Per-asset price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single adjusted close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        PriceObservation { date, close }
    }

    /// A price is usable if it is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        is_valid_price(self.close)
    }
}

pub(crate) fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Adjusted closing prices of one asset, ordered by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    /// Create a series. Observations are sorted by date; on duplicate dates the
    /// last one supplied wins.
    pub fn new(ticker: impl Into<String>, observations: Vec<PriceObservation>) -> Self {
        let mut observations = observations;
        // Stable sort keeps supply order within a date, so dedup keeps the last.
        observations.sort_by_key(|o| o.date);
        observations.reverse();
        observations.dedup_by_key(|o| o.date);
        observations.reverse();

        PriceSeries {
            ticker: ticker.into(),
            observations,
        }
    }

    /// Build a series from `(date, close)` pairs.
    pub fn from_pairs(
        ticker: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let observations = pairs
            .into_iter()
            .map(|(date, close)| PriceObservation::new(date, close))
            .collect();
        Self::new(ticker, observations)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Closes of the valid observations, in date order.
    pub fn valid_closes(&self) -> Vec<f64> {
        self.observations
            .iter()
            .filter(|o| o.is_valid())
            .map(|o| o.close)
            .collect()
    }
}
