//! Solver interface for maxret.
//!
//! This module provides:
//! - The SQP iteration that solves the risk-capped problem to KKT optimality
//! - KKT residual evaluation
//! - Clarabel integration for the convex QP subproblems

pub mod clarabel;
pub mod kkt;
pub mod settings;
pub mod sqp;

pub use self::clarabel::{min_variance_on_box, solve_qp, QpProblem, QpSolution, SolveStatus};
pub use kkt::{KktResidual, Multipliers};
pub use settings::Settings;
pub use sqp::{solve_sqp, SqpOutcome, SqpProblem, Termination};
