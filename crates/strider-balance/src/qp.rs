//! Shared dense-QP plumbing around Clarabel.
//!
//! Every QP in the controller is assembled as dense nalgebra matrices with
//! equality rows stacked above inequality rows, converted to CSC, and solved
//! with a `ZeroConeT`/`NonnegativeConeT` cone pair. The problem structure
//! (dimensions, constant coefficients) is built once; per-tick updates only
//! rewrite the varying entries before the next solve.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};

use strider_core::error::SolverError;

/// Interior-point iteration cap used where no configured cap applies.
pub const DEFAULT_MAX_ITERS: u32 = 200;

/// Result of a successful solve.
#[derive(Clone, Debug)]
pub struct QpSolution {
    /// Primal solution.
    pub x: DVector<f64>,
    /// Objective value at the solution.
    pub objective: f64,
}

/// A dense QP: `min ½ xᵀPx + qᵀx` s.t. `A_eq x = b_eq`, `A_in x ≤ b_in`.
///
/// `constraints`/`bounds` hold the equality rows first (`n_eq` of them),
/// then the inequality rows (`n_ineq`).
#[derive(Clone, Debug)]
pub struct DenseQp {
    pub hessian: DMatrix<f64>,
    pub gradient: DVector<f64>,
    pub constraints: DMatrix<f64>,
    pub bounds: DVector<f64>,
    pub n_eq: usize,
    pub n_ineq: usize,
    label: &'static str,
    max_iters: u32,
}

impl DenseQp {
    /// Allocate a zeroed problem of fixed dimensions.
    #[must_use]
    pub fn new(label: &'static str, n_vars: usize, n_eq: usize, n_ineq: usize, max_iters: u32) -> Self {
        Self {
            hessian: DMatrix::zeros(n_vars, n_vars),
            gradient: DVector::zeros(n_vars),
            constraints: DMatrix::zeros(n_eq + n_ineq, n_vars),
            bounds: DVector::zeros(n_eq + n_ineq),
            n_eq,
            n_ineq,
            label,
            max_iters,
        }
    }

    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.gradient.len()
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Solve the problem.
    pub fn solve(&self) -> Result<QpSolution, SolverError> {
        let p_csc = dmatrix_to_csc_upper_tri(&self.hessian);
        let a_csc = dmatrix_to_csc(&self.constraints);
        let cones = vec![ZeroConeT(self.n_eq), NonnegativeConeT(self.n_ineq)];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.max_iters)
            .verbose(false)
            .tol_gap_abs(1e-6)
            .tol_gap_rel(1e-6)
            .tol_feas(1e-6)
            .build()
            .expect("valid solver settings");

        let q_slice: Vec<f64> = self.gradient.iter().copied().collect();
        let b_slice: Vec<f64> = self.bounds.iter().copied().collect();

        let mut solver = DefaultSolver::new(&p_csc, &q_slice, &a_csc, &b_slice, &cones, settings);
        solver.solve();

        let solution = &solver.solution;
        if !matches!(
            solution.status,
            SolverStatus::Solved | SolverStatus::AlmostSolved
        ) {
            // Postmortem payload: enough to rebuild the failing problem
            log::debug!(
                "{} failed ({:?}): n={} eq={} ineq={} |P|={:.3e} |q|={:.3e} |A|={:.3e} |b|={:.3e}",
                self.label,
                solution.status,
                self.n_vars(),
                self.n_eq,
                self.n_ineq,
                self.hessian.norm(),
                self.gradient.norm(),
                self.constraints.norm(),
                self.bounds.norm(),
            );
            return Err(SolverError::NotConverged {
                solver: self.label,
                status: format!("{:?}", solution.status),
            });
        }

        Ok(QpSolution {
            x: DVector::from_column_slice(&solution.x),
            objective: solution.obj_val,
        })
    }

    /// Audit a solution against the constraints.
    ///
    /// Equality rows are checked both ways, inequality rows one-way. A
    /// violation above `tolerance` is fatal and reports the offending row
    /// through `row_label`.
    pub fn check_solution(
        &self,
        x: &DVector<f64>,
        tolerance: f64,
        row_label: impl Fn(usize) -> &'static str,
    ) -> Result<(), SolverError> {
        let residual = &self.constraints * x - &self.bounds;
        for (row, &r) in residual.iter().enumerate() {
            let violation = if row < self.n_eq { r.abs() } else { r };
            if violation > tolerance {
                return Err(SolverError::InfeasibleSolution {
                    solver: self.label,
                    row: row_label(row),
                    violation,
                    tolerance,
                });
            }
        }
        Ok(())
    }
}

/// Convert a dense nalgebra matrix to a Clarabel `CscMatrix` (full matrix).
#[must_use]
pub fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Convert a symmetric dense matrix to upper-triangular `CscMatrix`.
#[must_use]
pub fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}
