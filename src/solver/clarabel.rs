//! Clarabel backend for convex QP subproblems.
//!
//! Every subproblem handed to Clarabel has the form
//!
//! ```text
//! minimize    (1/2) x' P x + q' x
//! subject to  G x <= h
//!             lo <= x <= hi
//! ```
//!
//! stuffed into Clarabel's `A x + s = b` form with a zero cone for fixed
//! variables and a nonnegative cone for everything else.

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use super::Settings;
use crate::constraints::Bounds;
use crate::error::{PortfolioError, Result};
use crate::sparse::{csc_from_triplets, dense_upper_to_csc};

/// Outcome of a QP subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Maximum iterations reached.
    MaxIterations,
    /// Time limit reached.
    TimeLimit,
    /// Numerical difficulties.
    NumericalError,
    /// Unknown status.
    Unknown,
}

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::MaxIterations => SolveStatus::MaxIterations,
            SolverStatus::MaxTime => SolveStatus::TimeLimit,
            SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
                SolveStatus::NumericalError
            }
            _ => SolveStatus::Unknown,
        }
    }
}

/// Rows of the box constraint belonging to one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxRows {
    /// `lo == hi`: a single zero-cone row `x_j = lo_j`.
    Fixed { row: usize },
    /// Nonnegative-cone rows `x_j <= hi_j` and `-x_j <= -lo_j`.
    Free { upper: usize, lower: usize },
}

/// A QP over a box with extra inequality rows.
#[derive(Debug, Clone)]
pub struct QpProblem {
    /// Quadratic cost, upper triangle only (n x n).
    pub p: CscMatrix<f64>,
    /// Linear cost (n).
    pub q: Vec<f64>,
    /// Constraint matrix (m x n): zero-cone rows first, then nonnegative-cone rows.
    pub a: CscMatrix<f64>,
    /// Constraint right-hand side (m).
    pub b: Vec<f64>,
    /// Number of leading zero-cone rows.
    zero_rows: usize,
    /// Number of general inequality rows (`G x <= h`), placed right after the zero rows.
    general_rows: usize,
    box_rows: Vec<BoxRows>,
}

/// Multipliers of a box QP, split by constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct QpDuals {
    /// One per row of `G`.
    pub general: Vec<f64>,
    /// One per variable, for `x_j >= lo_j`.
    pub lower: Vec<f64>,
    /// One per variable, for `x_j <= hi_j`.
    pub upper: Vec<f64>,
}

impl QpProblem {
    /// Build `min ½xᵀPx + qᵀx` over `{x : G x <= h, lo <= x <= hi}`.
    ///
    /// `p` is dense and symmetric. Variables with `lo_j == hi_j` become
    /// equality rows so the interior-point method keeps a strict interior.
    pub fn with_box(
        p: &DMatrix<f64>,
        q: &DVector<f64>,
        g: &DMatrix<f64>,
        h: &DVector<f64>,
        lo: &DVector<f64>,
        hi: &DVector<f64>,
    ) -> Self {
        let n = q.len();
        let m = g.nrows();

        let mut rows = Vec::with_capacity(m * n + 2 * n);
        let mut cols = Vec::with_capacity(m * n + 2 * n);
        let mut vals = Vec::with_capacity(m * n + 2 * n);
        let mut b = Vec::with_capacity(m + 2 * n);
        let mut box_rows = vec![BoxRows::Fixed { row: 0 }; n];

        // x_j = lo_j
        for j in (0..n).filter(|&j| hi[j] <= lo[j]) {
            box_rows[j] = BoxRows::Fixed { row: b.len() };
            rows.push(b.len());
            cols.push(j);
            vals.push(1.0);
            b.push(lo[j]);
        }
        let zero_rows = b.len();

        // G x <= h
        for i in 0..m {
            for j in 0..n {
                let v = g[(i, j)];
                if v != 0.0 {
                    rows.push(b.len());
                    cols.push(j);
                    vals.push(v);
                }
            }
            b.push(h[i]);
        }

        // x_j <= hi_j and -x_j <= -lo_j
        for j in (0..n).filter(|&j| hi[j] > lo[j]) {
            let upper = b.len();
            rows.push(upper);
            cols.push(j);
            vals.push(1.0);
            b.push(hi[j]);

            let lower = b.len();
            rows.push(lower);
            cols.push(j);
            vals.push(-1.0);
            b.push(-lo[j]);

            box_rows[j] = BoxRows::Free { upper, lower };
        }

        QpProblem {
            p: dense_upper_to_csc(p),
            q: q.iter().copied().collect(),
            a: csc_from_triplets(b.len(), n, rows, cols, vals),
            b,
            zero_rows,
            general_rows: m,
            box_rows,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.b.len()
    }

    /// Cone list matching the row layout.
    fn cones(&self) -> Vec<SupportedConeT<f64>> {
        let mut cones = Vec::with_capacity(2);
        if self.zero_rows > 0 {
            cones.push(SupportedConeT::ZeroConeT(self.zero_rows));
        }
        let nonneg = self.num_constraints() - self.zero_rows;
        if nonneg > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(nonneg));
        }
        cones
    }

    /// Split Clarabel's dual vector by constraint.
    ///
    /// The free dual of a fixed variable's equality row is split by sign into
    /// its upper (positive part) and lower (negative part) multipliers.
    pub fn split_duals(&self, z: &[f64]) -> QpDuals {
        let general = z[self.zero_rows..self.zero_rows + self.general_rows]
            .iter()
            .map(|v| v.max(0.0))
            .collect();
        let (lower, upper) = self
            .box_rows
            .iter()
            .map(|rows| match *rows {
                BoxRows::Fixed { row } => ((-z[row]).max(0.0), z[row].max(0.0)),
                BoxRows::Free { upper, lower } => (z[lower].max(0.0), z[upper].max(0.0)),
            })
            .unzip();

        QpDuals {
            general,
            lower,
            upper,
        }
    }
}

/// Solution of a QP subproblem.
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Solution status.
    pub status: SolveStatus,
    /// Primal solution.
    pub x: Vec<f64>,
    /// Constraint multipliers, one per row of A. Use `QpProblem::split_duals`.
    pub z: Vec<f64>,
    /// Interior-point iterations.
    pub iterations: u32,
    /// Solve time in seconds.
    pub solve_time: f64,
}

/// Solve a QP with Clarabel.
///
/// `time_limit` is in seconds; pass `f64::INFINITY` for none.
pub fn solve_qp(problem: &QpProblem, settings: &Settings, time_limit: f64) -> Result<QpSolution> {
    let p = to_clarabel_csc(&problem.p);
    let a = to_clarabel_csc(&problem.a);
    let cones = problem.cones();

    let clarabel_settings = DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.qp_max_iter)
        .time_limit(time_limit)
        .build()
        .map_err(|e| PortfolioError::Solver(e.to_string()))?;

    let mut solver = DefaultSolver::new(&p, &problem.q, &a, &problem.b, &cones, clarabel_settings);
    solver.solve();

    Ok(QpSolution {
        status: solver.solution.status.into(),
        x: solver.solution.x.clone(),
        z: solver.solution.z.clone(),
        iterations: solver.info.iterations,
        solve_time: solver.solution.solve_time,
    })
}

/// Minimum of `wᵀΣw` over the box `lo <= w <= hi`.
pub fn min_variance_on_box(sigma: &DMatrix<f64>, bounds: &[Bounds], settings: &Settings) -> Result<f64> {
    let n = sigma.nrows();
    if bounds.len() != n {
        return Err(PortfolioError::ShapeMismatch {
            expected: format!("{} bounds", n),
            got: format!("{}", bounds.len()),
        });
    }

    let lo = DVector::from_iterator(n, bounds.iter().map(|b| b.lower));
    let hi = DVector::from_iterator(n, bounds.iter().map(|b| b.upper));
    // Clarabel minimizes ½xᵀPx, so P = 2Σ.
    let qp = QpProblem::with_box(
        &(sigma * 2.0),
        &DVector::zeros(n),
        &DMatrix::zeros(0, n),
        &DVector::zeros(0),
        &lo,
        &hi,
    );

    let solution = solve_qp(&qp, settings, settings.time_limit.unwrap_or(f64::INFINITY))?;
    if solution.status != SolveStatus::Optimal {
        return Err(PortfolioError::Solver(format!(
            "minimum variance QP ended with status {:?}",
            solution.status
        )));
    }

    let w = DVector::from_vec(solution.x);
    Ok(w.dot(&(sigma * &w)))
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}
