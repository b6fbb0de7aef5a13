//! Contact-wrench feasibility rows.
//!
//! Shared by the torque QP and the wrench mapper: every foot in contact gets
//! the same inequality block (linearized friction cone, torsional friction,
//! unilaterality, CoP rectangle), and the ZMP coupling ties the feet's
//! centers of pressure to the commanded ZMP with two equality rows.
//!
//! Wrench decision variables are world-frame `[f; τ]` at the sole origin;
//! feasibility rows are formulated in the sole frame and rotated out.

use std::ops::Range;

use nalgebra::{DMatrix, Matrix3, Rotation3, Vector2, Vector6};

use strider_balance::qp::DenseQp;
use strider_core::config::ContactForcesConfig;

use crate::tasks::ConstraintLabel;

/// Inequality block `A w ≤ b` keeping one foot's wrench feasible.
#[derive(Clone, Debug)]
pub struct ForceFeasibility {
    facets: usize,
    rows: DMatrix<f64>,
    bounds: Vec<f64>,
}

impl ForceFeasibility {
    /// Build the canonical (sole-frame) rows once; they only depend on the
    /// configuration.
    #[must_use]
    pub fn new(config: &ContactForcesConfig) -> Self {
        let n = config.friction_facets;
        let n_rows = n + 7;
        let mut rows = DMatrix::zeros(n_rows, 6);
        let mut bounds = vec![0.0; n_rows];

        // Friction polygon: inner approximation of the cone,
        // u_i · (f_x, f_y) <= mu cos(pi/N) f_z for N facet normals.
        #[allow(clippy::cast_precision_loss)]
        let effective_mu = config.static_friction * (std::f64::consts::PI / n as f64).cos();
        for i in 0..n {
            #[allow(clippy::cast_precision_loss)]
            let angle = 2.0 * std::f64::consts::PI * (i as f64 + 0.5) / n as f64;
            rows[(i, 0)] = angle.cos();
            rows[(i, 1)] = angle.sin();
            rows[(i, 2)] = -effective_mu;
        }

        // Torsional friction: |tau_z| <= mu_t f_z
        rows[(n, 5)] = 1.0;
        rows[(n, 2)] = -config.torsional_friction;
        rows[(n + 1, 5)] = -1.0;
        rows[(n + 1, 2)] = -config.torsional_friction;

        // Unilaterality: f_z >= minimal normal force
        rows[(n + 2, 2)] = -1.0;
        bounds[n + 2] = -config.minimal_normal_force;

        // CoP rectangle: cop_x = -tau_y/f_z in [x0, x1], cop_y = tau_x/f_z in [y0, y1]
        let [x0, x1] = config.foot_limits_x;
        let [y0, y1] = config.foot_limits_y;
        rows[(n + 3, 4)] = 1.0;
        rows[(n + 3, 2)] = x0;
        rows[(n + 4, 4)] = -1.0;
        rows[(n + 4, 2)] = -x1;
        rows[(n + 5, 3)] = -1.0;
        rows[(n + 5, 2)] = y0;
        rows[(n + 6, 3)] = 1.0;
        rows[(n + 6, 2)] = -y1;

        Self {
            facets: n,
            rows,
            bounds,
        }
    }

    /// Number of rows of the block.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.nrows()
    }

    /// Diagnostic label of a row inside the block.
    #[must_use]
    pub fn label(&self, row_offset: usize) -> ConstraintLabel {
        let n = self.facets;
        if row_offset < n {
            ConstraintLabel::FrictionCone
        } else if row_offset < n + 2 {
            ConstraintLabel::TorsionalFriction
        } else if row_offset == n + 2 {
            ConstraintLabel::NormalForce
        } else {
            ConstraintLabel::CopRectangle
        }
    }

    /// Write the block into `qp` at `row0` over the wrench columns `cols`,
    /// for a foot with world orientation `rotation`.
    pub fn fill(
        &self,
        qp: &mut DenseQp,
        row0: usize,
        cols: Range<usize>,
        rotation: &Rotation3<f64>,
    ) {
        debug_assert_eq!(cols.len(), 6);
        let world_to_sole = rotation.inverse().matrix().clone_owned();
        for r in 0..self.n_rows() {
            let row_world = rotate_row(&self.rows, r, &world_to_sole);
            for (c, col) in cols.clone().enumerate() {
                qp.constraints[(row0 + r, col)] = row_world[c];
            }
            qp.bounds[row0 + r] = self.bounds[r];
        }
    }

    /// Check a sole-frame wrench against the canonical rows (tests and the
    /// runtime audit of mapped wrenches).
    #[must_use]
    pub fn satisfied(&self, wrench: &Vector6<f64>, tolerance: f64) -> bool {
        for r in 0..self.n_rows() {
            let mut lhs = 0.0;
            for c in 0..6 {
                lhs += self.rows[(r, c)] * wrench[c];
            }
            if lhs > self.bounds[r] + tolerance {
                return false;
            }
        }
        true
    }
}

/// Row `r` of the canonical block re-expressed over a world-frame wrench:
/// `row_world = row_sole · blkdiag(Rᵀ, Rᵀ)`.
fn rotate_row(rows: &DMatrix<f64>, r: usize, world_to_sole: &Matrix3<f64>) -> Vector6<f64> {
    let mut out = Vector6::zeros();
    for c in 0..3 {
        for k in 0..3 {
            out[c] += rows[(r, k)] * world_to_sole[(k, c)];
            out[3 + c] += rows[(r, 3 + k)] * world_to_sole[(k, c)];
        }
    }
    out
}

/// Write the two ZMP coupling equality rows at `row0`.
///
/// For flat contact the foot's center of pressure in world coordinates is
/// `cop_x = p_x - τ_y/f_z`, `cop_y = p_y + τ_x/f_z`; requiring the combined
/// CoP to sit at `target_zmp` is linear in the wrenches:
///
/// ```text
/// Σ_i [ (p_x_i - z_x) f_z_i - τ_y_i ] = 0
/// Σ_i [ (p_y_i - z_y) f_z_i + τ_x_i ] = 0
/// ```
///
/// `blocks` pairs each contact foot's wrench columns with its sole position.
pub fn fill_zmp_rows(
    qp: &mut DenseQp,
    row0: usize,
    blocks: &[(Range<usize>, Vector2<f64>)],
    target_zmp: &Vector2<f64>,
) {
    for (cols, foot_xy) in blocks {
        debug_assert_eq!(cols.len(), 6);
        let fz = cols.start + 2;
        let tau_x = cols.start + 3;
        let tau_y = cols.start + 4;

        qp.constraints[(row0, fz)] = foot_xy.x - target_zmp.x;
        qp.constraints[(row0, tau_y)] = -1.0;

        qp.constraints[(row0 + 1, fz)] = foot_xy.y - target_zmp.y;
        qp.constraints[(row0 + 1, tau_x)] = 1.0;
    }
    qp.bounds[row0] = 0.0;
    qp.bounds[row0 + 1] = 0.0;
}
