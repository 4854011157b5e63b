//! Sequential quadratic programming for risk-capped return maximization.
//!
//! Solves
//!
//! ```text
//! minimize    -rᵀw
//! subject to  s(w) = sqrt(wᵀΣw) <= R
//!             lo <= w <= hi
//! ```
//!
//! Each iteration linearizes the risk constraint, models the Lagrangian with
//! its exact Hessian `λ∇²s(w)` (positive semidefinite because `s` is a norm),
//! solves the resulting convex QP for a step `d` with Clarabel, and accepts a
//! fraction of `d` by Armijo backtracking on the ℓ1 merit function
//! `φ(w) = -rᵀw + ρ·max(0, s(w) - R)`.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use super::clarabel::{solve_qp, QpProblem, SolveStatus};
use super::kkt::{KktPoint, KktResidual, Multipliers};
use super::Settings;
use crate::constraints::Bounds;
use crate::error::{PortfolioError, Result};
use crate::risk::{RiskModel, VolatilityModel};

/// Penalty parameter is kept at this multiple of the risk multiplier.
const PENALTY_MARGIN: f64 = 1.5;

/// A validated problem instance borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct SqpProblem<'a> {
    pub returns: &'a DVector<f64>,
    pub risk: &'a dyn RiskModel,
    pub max_risk: f64,
    pub bounds: &'a [Bounds],
}

/// How the solver reached its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The bound-only optimum already satisfies the risk cap.
    RiskInactive,
    /// The KKT residual fell below tolerance.
    KktSatisfied,
}

/// A converged SQP run.
#[derive(Debug, Clone)]
pub struct SqpOutcome {
    pub weights: DVector<f64>,
    pub multipliers: Multipliers,
    pub kkt: KktResidual,
    /// Number of QP subproblems solved.
    pub iterations: u32,
    pub termination: Termination,
}

/// Run SQP from the uniform starting point `w⁰ = 1/n`.
///
/// Iterates are kept in units of the risk cap, `u = w / R`, so the
/// subproblems and the KKT test see a cap of 1 whatever `R` is.
///
/// Returns `PortfolioError::Convergence` if the region is empty, the
/// iteration or time budget runs out, or the line search breaks down.
pub fn solve_sqp(problem: &SqpProblem<'_>, settings: &Settings) -> Result<SqpOutcome> {
    let start = Instant::now();
    let n = problem.returns.len();
    let lower = DVector::from_iterator(n, problem.bounds.iter().map(|b| b.lower));
    let upper = DVector::from_iterator(n, problem.bounds.iter().map(|b| b.upper));
    let max_risk = problem.max_risk;

    let min_risk = problem.risk.min_volatility(problem.bounds, settings)?;
    if min_risk > max_risk * (1.0 + settings.tolerance) {
        let diagnostic = format!(
            "problem is infeasible: minimum attainable risk {:.6e} exceeds max risk {:.6e}",
            min_risk, max_risk
        );
        warn!("{}", diagnostic);
        return Err(PortfolioError::convergence(diagnostic));
    }

    if let Some(outcome) = bound_optimum(problem, &lower, &upper) {
        info!(
            "risk constraint inactive: bound optimum has risk {:.6e} <= {:.6e}",
            problem.risk.volatility(&outcome.weights),
            max_risk
        );
        return Ok(outcome);
    }

    // s is positively homogeneous, so s(w / R) = s(w) / R.
    let scaled_bounds: Vec<Bounds> = problem
        .bounds
        .iter()
        .map(|b| Bounds {
            lower: b.lower / max_risk,
            upper: b.upper / max_risk,
        })
        .collect();
    let scaled = SqpProblem {
        returns: problem.returns,
        risk: problem.risk,
        max_risk: 1.0,
        bounds: &scaled_bounds,
    };
    let u0 = DVector::from_fn(n, |i, _| problem.bounds[i].clamp(1.0 / n as f64) / max_risk);

    let mut outcome = iterate(&scaled, u0, settings, start)?;
    outcome.weights = clamp_to_box(&(&outcome.weights * max_risk), problem.bounds);

    info!(
        "SQP converged in {} iterations: return {:.6e}, risk {:.6e}, KKT residual {:.3e}",
        outcome.iterations,
        problem.returns.dot(&outcome.weights),
        problem.risk.volatility(&outcome.weights),
        outcome.kkt.total()
    );
    Ok(outcome)
}

/// SQP iterations from `w` until the KKT residual is below tolerance.
fn iterate(
    problem: &SqpProblem<'_>,
    mut w: DVector<f64>,
    settings: &Settings,
    start: Instant,
) -> Result<SqpOutcome> {
    let n = problem.returns.len();
    let lower = DVector::from_iterator(n, problem.bounds.iter().map(|b| b.lower));
    let upper = DVector::from_iterator(n, problem.bounds.iter().map(|b| b.upper));
    let r = problem.returns;
    let max_risk = problem.max_risk;

    let mut lambda = 0.0_f64;
    let mut penalty: Option<f64> = None;
    let mut last_kkt = f64::INFINITY;

    for k in 0..settings.max_iter {
        let elapsed = start.elapsed().as_secs_f64();
        if let Some(limit) = settings.time_limit {
            if elapsed >= limit {
                let diagnostic = format!(
                    "time limit of {}s reached after {} iterations (KKT residual {:.3e})",
                    limit, k, last_kkt
                );
                warn!("{}", diagnostic);
                return Err(PortfolioError::convergence(diagnostic));
            }
        }

        let local = VolatilityModel::at(problem.risk, &w);
        let hessian = &local.hessian * lambda + DMatrix::identity(n, n) * settings.regularization;

        let qp = QpProblem::with_box(
            &hessian,
            &(-r),
            &DMatrix::from_row_slice(1, n, local.gradient.as_slice()),
            &DVector::from_element(1, max_risk - local.value),
            &(&lower - &w),
            &(&upper - &w),
        );
        let remaining = settings.time_limit.map_or(f64::INFINITY, |limit| limit - elapsed);
        let sub = solve_qp(&qp, settings, remaining)?;

        match sub.status {
            SolveStatus::Optimal => {}
            SolveStatus::Infeasible => {
                let diagnostic = format!(
                    "problem is infeasible: linearized risk constraint cannot be met within bounds at iteration {}",
                    k
                );
                warn!("{}", diagnostic);
                return Err(PortfolioError::convergence(diagnostic));
            }
            status => {
                let diagnostic = format!(
                    "QP subproblem ended with status {:?} at iteration {}",
                    status, k
                );
                warn!("{}", diagnostic);
                return Err(PortfolioError::convergence(diagnostic));
            }
        }

        let duals = qp.split_duals(&sub.z);
        let d = DVector::from_vec(sub.x);
        let multipliers = Multipliers {
            risk: duals.general[0],
            lower: duals.lower,
            upper: duals.upper,
        };

        let point = KktPoint {
            weights: &w,
            returns: r,
            volatility: local.value,
            volatility_gradient: &local.gradient,
            max_risk,
            lower: &lower,
            upper: &upper,
        };
        let kkt = KktResidual::evaluate(&point, &multipliers);
        last_kkt = kkt.total();

        if last_kkt <= settings.tolerance {
            return Ok(SqpOutcome {
                weights: w,
                multipliers,
                kkt,
                iterations: k + 1,
                termination: Termination::KktSatisfied,
            });
        }

        // Powell's penalty update, kept above the current multiplier.
        let target = PENALTY_MARGIN * multipliers.risk;
        let rho = match penalty {
            None => target,
            Some(prev) => target.max(0.5 * (prev + target)),
        };
        penalty = Some(rho);

        let violation = (local.value - max_risk).max(0.0);
        let merit = -r.dot(&w) + rho * violation;
        let slope = -r.dot(&d) - rho * violation;
        let roundoff = 10.0 * f64::EPSILON * (1.0 + merit.abs());

        let mut alpha = 1.0;
        let accepted = loop {
            if alpha < settings.min_step {
                break None;
            }
            let trial = clamp_to_box(&(&w + &d * alpha), problem.bounds);
            let trial_violation = (problem.risk.volatility(&trial) - max_risk).max(0.0);
            let trial_merit = -r.dot(&trial) + rho * trial_violation;
            if trial_merit <= merit + settings.armijo * alpha * slope + roundoff {
                break Some((trial, trial_merit));
            }
            alpha *= 0.5;
        };

        let Some((next, next_merit)) = accepted else {
            let diagnostic = format!(
                "line search failed to reduce the merit function at iteration {} (KKT residual {:.3e})",
                k, last_kkt
            );
            warn!("{}", diagnostic);
            return Err(PortfolioError::convergence(diagnostic));
        };

        debug!(
            "SQP iteration {}: merit {:.9} -> {:.9}, step {:.3e}, |d| {:.3e}, lambda {:.6}, rho {:.6}, KKT {:.3e}",
            k,
            merit,
            next_merit,
            alpha,
            d.amax(),
            multipliers.risk,
            rho,
            last_kkt
        );

        w = next;
        lambda = multipliers.risk;
    }

    let diagnostic = format!(
        "iteration limit of {} reached (KKT residual {:.3e})",
        settings.max_iter, last_kkt
    );
    warn!("{}", diagnostic);
    Err(PortfolioError::convergence(diagnostic))
}

/// The linear program over the box alone: `hi` where the return is positive,
/// `lo` otherwise. Returns it if it already respects the risk cap.
fn bound_optimum(
    problem: &SqpProblem<'_>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
) -> Option<SqpOutcome> {
    let n = problem.returns.len();
    let r = problem.returns;
    let w = DVector::from_fn(n, |i, _| if r[i] > 0.0 { upper[i] } else { lower[i] });

    let local = VolatilityModel::at(problem.risk, &w);
    if local.value > problem.max_risk {
        return None;
    }

    let multipliers = Multipliers {
        risk: 0.0,
        lower: r.iter().map(|ri| (-ri).max(0.0)).collect(),
        upper: r.iter().map(|ri| ri.max(0.0)).collect(),
    };
    let point = KktPoint {
        weights: &w,
        returns: r,
        volatility: local.value,
        volatility_gradient: &local.gradient,
        max_risk: problem.max_risk,
        lower,
        upper,
    };
    let kkt = KktResidual::evaluate(&point, &multipliers);

    Some(SqpOutcome {
        weights: w,
        multipliers,
        kkt,
        iterations: 0,
        termination: Termination::RiskInactive,
    })
}

fn clamp_to_box(w: &DVector<f64>, bounds: &[Bounds]) -> DVector<f64> {
    DVector::from_fn(w.len(), |i, _| bounds[i].clamp(w[i]))
}
