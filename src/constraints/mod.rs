//! Constraint types for portfolio problems.

pub mod constraint;

pub use constraint::{Bounds, PortfolioConstraints};
