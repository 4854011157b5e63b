//! Historical price data.
//!
//! This module provides the inputs of the estimator:
//! - `PriceSeries` - one asset's time-ordered adjusted closes
//! - `PriceTable` - several assets aligned on a common date index

pub mod series;
pub mod table;

pub use series::{PriceObservation, PriceSeries};
pub use table::PriceTable;
