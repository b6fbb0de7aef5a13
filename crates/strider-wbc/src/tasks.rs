//! Task machinery shared by the whole-body solvers.
//!
//! A task is "some rows tied to a column block": hard tasks become equality
//! rows, soft tasks fold into the cost through their normal equations. The
//! tagged [`TaskKind`] replaces the inheritance chain of task classes with a
//! variant chosen at construction.

use std::ops::Range;

use nalgebra::{DMatrix, DVector};

use strider_balance::qp::DenseQp;

/// What a Cartesian task constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Full pose: 3 linear + 3 angular rows.
    Pose,
    /// Position only: 3 linear rows.
    Position,
    /// Orientation only: 3 angular rows.
    Orientation,
    /// A single scalar row (e.g. CoM height).
    OneDim,
}

impl TaskKind {
    #[must_use]
    pub const fn rows(self) -> usize {
        match self {
            Self::Pose => 6,
            Self::Position | Self::Orientation => 3,
            Self::OneDim => 1,
        }
    }
}

/// Names for constraint rows, carried only for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintLabel {
    Dynamics,
    ContactNoSlip,
    ComTask,
    ZmpCoupling,
    FrictionCone,
    TorsionalFriction,
    NormalForce,
    CopRectangle,
    TorqueRate,
    FootTracking,
    CentroidalWrench,
    VelocityBound,
}

impl ConstraintLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dynamics => "dynamics",
            Self::ContactNoSlip => "contact_no_slip",
            Self::ComTask => "com_task",
            Self::ZmpCoupling => "zmp_coupling",
            Self::FrictionCone => "friction_cone",
            Self::TorsionalFriction => "torsional_friction",
            Self::NormalForce => "normal_force",
            Self::CopRectangle => "cop_rectangle",
            Self::TorqueRate => "torque_rate",
            Self::FootTracking => "foot_tracking",
            Self::CentroidalWrench => "centroidal_wrench",
            Self::VelocityBound => "velocity_bound",
        }
    }
}

/// Write `jacobian x = rhs` as equality rows starting at `row0`, with the
/// jacobian columns placed at `columns`.
pub fn fill_equality_rows(
    qp: &mut DenseQp,
    row0: usize,
    columns: Range<usize>,
    jacobian: &DMatrix<f64>,
    rhs: &DVector<f64>,
) {
    debug_assert_eq!(jacobian.nrows(), rhs.len());
    debug_assert_eq!(jacobian.ncols(), columns.len());
    for r in 0..jacobian.nrows() {
        for (c, col) in columns.clone().enumerate() {
            qp.constraints[(row0 + r, col)] = jacobian[(r, c)];
        }
        qp.bounds[row0 + r] = rhs[r];
    }
}

/// Fold `weight · ‖jacobian x - target‖²` into the cost, with the jacobian
/// columns placed at `columns`.
///
/// Normal equations: `H += 2 Jᵀ W J`, `g -= 2 Jᵀ W target`.
pub fn add_least_squares_cost(
    qp: &mut DenseQp,
    columns: Range<usize>,
    jacobian: &DMatrix<f64>,
    target: &DVector<f64>,
    weight: f64,
) {
    let jt_j = jacobian.transpose() * jacobian;
    let jt_t = jacobian.transpose() * target;
    for (r, row) in columns.clone().enumerate() {
        for (c, col) in columns.clone().enumerate() {
            qp.hessian[(row, col)] += 2.0 * weight * jt_j[(r, c)];
        }
        qp.gradient[row] -= 2.0 * weight * jt_t[r];
    }
}

/// Fold a diagonal regularization `Σ w_i (x_i - target_i)²` over a column
/// block into the cost.
pub fn add_diagonal_cost(
    qp: &mut DenseQp,
    columns: Range<usize>,
    target: &DVector<f64>,
    weights: &DVector<f64>,
) {
    debug_assert_eq!(columns.len(), target.len());
    debug_assert_eq!(columns.len(), weights.len());
    for (k, col) in columns.enumerate() {
        qp.hessian[(col, col)] += 2.0 * weights[k];
        qp.gradient[col] -= 2.0 * weights[k] * target[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn task_kind_rows() {
        assert_eq!(TaskKind::Pose.rows(), 6);
        assert_eq!(TaskKind::Position.rows(), 3);
        assert_eq!(TaskKind::Orientation.rows(), 3);
        assert_eq!(TaskKind::OneDim.rows(), 1);
    }

    #[test]
    fn equality_rows_land_in_the_right_block() {
        let mut qp = DenseQp::new("test", 6, 2, 0, 50);
        let jacobian = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let rhs = DVector::from_column_slice(&[7.0, 8.0]);
        fill_equality_rows(&mut qp, 0, 2..5, &jacobian, &rhs);

        assert_relative_eq!(qp.constraints[(0, 2)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(qp.constraints[(1, 4)], 6.0, epsilon = 1e-12);
        // Columns outside the block stay empty
        assert_relative_eq!(qp.constraints[(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(qp.constraints[(0, 5)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(qp.bounds[1], 8.0, epsilon = 1e-12);
    }

    #[test]
    fn least_squares_cost_minimizer_matches_target() {
        // min ‖I x - t‖² over a 2-column block: optimum x = t
        let mut qp = DenseQp::new("test", 4, 0, 0, 100);
        let jacobian = DMatrix::identity(2, 2);
        let target = DVector::from_column_slice(&[0.3, -0.7]);
        add_least_squares_cost(&mut qp, 1..3, &jacobian, &target, 5.0);
        // Regularize the untouched variables so the problem is bounded
        qp.hessian[(0, 0)] = 1.0;
        qp.hessian[(3, 3)] = 1.0;

        let solution = qp.solve().unwrap();
        assert_relative_eq!(solution.x[1], 0.3, epsilon = 1e-5);
        assert_relative_eq!(solution.x[2], -0.7, epsilon = 1e-5);
        assert_relative_eq!(solution.x[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn diagonal_cost_pulls_to_target() {
        let mut qp = DenseQp::new("test", 3, 0, 0, 100);
        let target = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
        let weights = DVector::from_column_slice(&[1.0, 1.0, 1.0]);
        add_diagonal_cost(&mut qp, 0..3, &target, &weights);
        let solution = qp.solve().unwrap();
        for k in 0..3 {
            assert_relative_eq!(solution.x[k], target[k], epsilon = 1e-5);
        }
    }

    #[test]
    fn costs_accumulate() {
        // Two identical pulls to different targets settle midway
        let mut qp = DenseQp::new("test", 1, 0, 0, 100);
        let j = DMatrix::identity(1, 1);
        add_least_squares_cost(&mut qp, 0..1, &j, &DVector::from_column_slice(&[0.0]), 1.0);
        add_least_squares_cost(&mut qp, 0..1, &j, &DVector::from_column_slice(&[1.0]), 1.0);
        let solution = qp.solve().unwrap();
        assert_relative_eq!(solution.x[0], 0.5, epsilon = 1e-6);
    }
}
