//! Price table aligned on a common date index.
//!
//! This is the shape a market data provider hands over: one row per date, one
//! column per ticker. A cell is `None` when the asset has no usable close on
//! that date.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::series::{is_valid_price, PriceSeries};
use crate::error::{PortfolioError, Result};

/// Adjusted closes of several assets on a shared, sorted date index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    /// `columns[asset][row]`.
    columns: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    /// Build a table from provider-style columns.
    ///
    /// `dates` must be strictly increasing and each column must have one cell
    /// per date. Invalid prices (non-finite or non-positive) become missing.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PortfolioError::InvalidConstraint(format!(
                "dates must be strictly increasing, found {} before {}",
                w[0], w[1]
            )));
        }

        let mut tickers = Vec::with_capacity(columns.len());
        let mut cells = Vec::with_capacity(columns.len());
        for (ticker, column) in columns {
            if column.len() != dates.len() {
                return Err(PortfolioError::ShapeMismatch {
                    expected: format!("{} prices for {}", dates.len(), ticker),
                    got: format!("{}", column.len()),
                });
            }
            tickers.push(ticker);
            cells.push(
                column
                    .into_iter()
                    .map(|p| p.filter(|&p| is_valid_price(p)))
                    .collect(),
            );
        }

        Ok(PriceTable {
            dates,
            tickers,
            columns: cells,
        })
    }

    /// Align several series on the union of their dates.
    pub fn from_series(series: &[PriceSeries]) -> Self {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.observations().iter().map(|o| o.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = series
            .iter()
            .map(|s| {
                let mut column = vec![None; dates.len()];
                for obs in s.observations().iter().filter(|o| o.is_valid()) {
                    if let Ok(row) = dates.binary_search(&obs.date) {
                        column[row] = Some(obs.close);
                    }
                }
                column
            })
            .collect();

        PriceTable {
            dates,
            tickers: series.iter().map(|s| s.ticker().to_string()).collect(),
            columns,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Number of assets.
    pub fn num_assets(&self) -> usize {
        self.tickers.len()
    }

    /// Number of dates.
    pub fn num_rows(&self) -> usize {
        self.dates.len()
    }

    /// Column index of a ticker.
    pub fn position(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Raw cells of one asset.
    pub fn column(&self, asset: usize) -> &[Option<f64>] {
        &self.columns[asset]
    }

    /// `(date, close)` pairs of one asset where a price is present.
    pub fn observed(&self, asset: usize) -> Vec<(NaiveDate, f64)> {
        self.dates
            .iter()
            .zip(&self.columns[asset])
            .filter_map(|(d, p)| p.map(|p| (*d, p)))
            .collect()
    }

    /// Row indices where every asset has a price.
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.dates.len())
            .filter(|&row| self.columns.iter().all(|c| c[row].is_some()))
            .collect()
    }
}
