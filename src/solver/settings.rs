//! Solver settings.

use serde::{Deserialize, Serialize};

/// Settings for the SQP solver and its QP subproblems.
///
/// Every field has a default, so partial configuration files deserialize:
///
/// ```ignore
/// let settings: Settings = serde_json::from_str(r#"{ "max_iter": 50 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Print Clarabel output for every QP subproblem.
    pub verbose: bool,
    /// Maximum SQP iterations.
    pub max_iter: u32,
    /// Wall-clock limit in seconds, checked between SQP iterations.
    /// `None` means no limit.
    pub time_limit: Option<f64>,
    /// KKT residual tolerance.
    pub tolerance: f64,
    /// Maximum interior-point iterations per QP subproblem.
    pub qp_max_iter: u32,
    /// Sufficient decrease parameter of the Armijo line search.
    pub armijo: f64,
    /// Smallest step length tried by the line search.
    pub min_step: f64,
    /// Multiple of the identity added to the Lagrangian Hessian.
    pub regularization: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 100,
            time_limit: None,
            tolerance: 1e-6,
            qp_max_iter: 200,
            armijo: 1e-4,
            min_step: 1e-10,
            regularization: 1e-8,
        }
    }
}
