//! Model-predictive DCM controller.
//!
//! Receding-horizon alternative to the reactive controller: a convex QP over
//! the horizontal DCM with the ZMP as input,
//!
//! ```text
//! ξ_{k+1} = (1 + ω dT) ξ_k - ω dT u_k
//! ```
//!
//! (forward-Euler discretization of `ξ̇ = ω (ξ - z)`), subject to the ZMP
//! staying inside the support polygon of each horizon sample. The cost
//! tracks the reference DCM and regularizes the input. Only the first input
//! is applied; the problem is rebuilt and re-solved every tick.

use nalgebra::Vector2;

use strider_core::config::DcmMpcConfig;
use strider_core::error::SolverError;

use crate::hull::ConvexHull;
use crate::qp::DenseQp;

pub struct DcmMpcController {
    config: DcmMpcConfig,
}

impl DcmMpcController {
    #[must_use]
    pub fn new(config: DcmMpcConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn horizon(&self) -> usize {
        self.config.horizon
    }

    /// Solve for the desired ZMP.
    ///
    /// * `measured_dcm` — current horizontal DCM.
    /// * `dcm_reference` — desired DCM per horizon sample (`horizon` entries;
    ///   shorter references are padded with their last value).
    /// * `support_polygons` — support polygon per horizon sample, same
    ///   padding rule.
    pub fn solve(
        &self,
        measured_dcm: &Vector2<f64>,
        dcm_reference: &[Vector2<f64>],
        support_polygons: &[ConvexHull],
        omega: f64,
        dt: f64,
    ) -> Result<Vector2<f64>, SolverError> {
        let h = self.config.horizon;
        assert!(h > 0, "MPC horizon must be positive");
        assert!(
            !dcm_reference.is_empty() && !support_polygons.is_empty(),
            "MPC needs at least one reference sample and one polygon"
        );

        let n_x = 2 * h;
        let n_u = 2 * h;
        let n_z = n_x + n_u;

        // ξ_{k+1} = a ξ_k + b u_k
        let a = 1.0 + omega * dt;
        let b = -omega * dt;

        let reference = |k: usize| *dcm_reference.get(k).unwrap_or(
            dcm_reference.last().expect("nonempty reference"),
        );
        let polygon = |k: usize| {
            support_polygons
                .get(k)
                .unwrap_or(support_polygons.last().expect("nonempty polygons"))
        };

        // Count the half-plane rows over the horizon
        let n_ineq: usize = (0..h).map(|k| polygon(k).half_planes().len()).sum();
        let n_eq = n_x;

        let mut qp = DenseQp::new("dcm_mpc", n_z, n_eq, n_ineq, self.config.max_solver_iters);

        // --- Cost ---
        for k in 0..h {
            let x_off = 2 * k;
            let u_off = n_x + 2 * k;
            let reference_k = reference(k);
            for axis in 0..2 {
                let q_weight = self.config.state_weight[axis];
                let r_weight = self.config.input_weight[axis];
                qp.hessian[(x_off + axis, x_off + axis)] = 2.0 * q_weight;
                qp.gradient[x_off + axis] = -2.0 * q_weight * reference_k[axis];
                qp.hessian[(u_off + axis, u_off + axis)] = 2.0 * r_weight;
            }
        }

        // --- Dynamics equalities ---
        // k = 0:      I ξ_1 - b u_0 = a ξ_0
        // k >= 1: -a ξ_k + I ξ_{k+1} - b u_k = 0
        for k in 0..h {
            let row = 2 * k;
            let x_next = 2 * k;
            let u_off = n_x + 2 * k;
            for axis in 0..2 {
                qp.constraints[(row + axis, x_next + axis)] = 1.0;
                qp.constraints[(row + axis, u_off + axis)] = -b;
            }
            if k == 0 {
                qp.bounds[row] = a * measured_dcm.x;
                qp.bounds[row + 1] = a * measured_dcm.y;
            } else {
                let x_prev = 2 * (k - 1);
                for axis in 0..2 {
                    qp.constraints[(row + axis, x_prev + axis)] = -a;
                }
            }
        }

        // --- ZMP-in-support-polygon inequalities ---
        let mut row = n_eq;
        for k in 0..h {
            let u_off = n_x + 2 * k;
            for (normal, offset) in polygon(k).half_planes() {
                qp.constraints[(row, u_off)] = normal.x;
                qp.constraints[(row, u_off + 1)] = normal.y;
                qp.bounds[row] = offset;
                row += 1;
            }
        }
        debug_assert_eq!(row, n_eq + n_ineq);

        let solution = qp.solve()?;
        Ok(Vector2::new(solution.x[n_x], solution.x[n_x + 1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    const FOOT_X: [f64; 2] = [-0.06, 0.10];
    const FOOT_Y: [f64; 2] = [-0.04, 0.04];
    const OMEGA: f64 = 4.3022;
    const DT: f64 = 0.01;

    fn controller(horizon: usize) -> DcmMpcController {
        DcmMpcController::new(DcmMpcConfig {
            horizon,
            state_weight: [10.0, 10.0],
            input_weight: [0.1, 0.1],
            max_solver_iters: 200,
        })
    }

    fn double_support_hull() -> ConvexHull {
        let left = Isometry3::translation(0.0, 0.07, 0.0);
        let right = Isometry3::translation(0.0, -0.07, 0.0);
        ConvexHull::support_polygon(Some(&left), Some(&right), FOOT_X, FOOT_Y)
    }

    #[test]
    fn standing_on_reference_keeps_zmp_near_dcm() {
        let mpc = controller(20);
        let dcm = Vector2::new(0.02, 0.0);
        let reference = vec![dcm; 20];
        let polygons = vec![double_support_hull()];

        let zmp = mpc.solve(&dcm, &reference, &polygons, OMEGA, DT).unwrap();
        // In steady state the ZMP sits under the DCM
        assert_relative_eq!(zmp.x, dcm.x, epsilon = 2e-3);
        assert_relative_eq!(zmp.y, dcm.y, epsilon = 2e-3);
    }

    #[test]
    fn dcm_offset_pushes_zmp_beyond() {
        let mpc = controller(20);
        let measured = Vector2::new(0.03, 0.0);
        let reference = vec![Vector2::zeros(); 20];
        let polygons = vec![double_support_hull()];

        let zmp = mpc.solve(&measured, &reference, &polygons, OMEGA, DT).unwrap();
        // To push the DCM back toward zero the ZMP overshoots the DCM
        assert!(
            zmp.x > measured.x,
            "zmp.x = {} should exceed the DCM offset",
            zmp.x
        );
    }

    #[test]
    fn zmp_respects_support_polygon() {
        let mpc = controller(20);
        // DCM far outside the feet: the unconstrained answer would leave the hull
        let measured = Vector2::new(0.3, 0.0);
        let reference = vec![Vector2::zeros(); 20];
        let hull = double_support_hull();
        let polygons = vec![hull.clone()];

        let zmp = mpc.solve(&measured, &reference, &polygons, OMEGA, DT).unwrap();
        assert!(
            hull.contains(&zmp, 1e-4),
            "zmp {zmp:?} must stay inside the support polygon"
        );
        // Saturated at the front edge of the feet
        assert_relative_eq!(zmp.x, FOOT_X[1], epsilon = 1e-3);
    }

    #[test]
    fn per_sample_polygons_are_honored() {
        let mpc = controller(10);
        let left = Isometry3::translation(0.0, 0.07, 0.0);
        // Single support on the left for the whole horizon
        let hull = ConvexHull::support_polygon(Some(&left), None, FOOT_X, FOOT_Y);
        let measured = Vector2::new(0.0, -0.05);
        let reference = vec![Vector2::new(0.0, -0.05); 10];

        let zmp = mpc
            .solve(&measured, &reference, &vec![hull.clone()], OMEGA, DT)
            .unwrap();
        assert!(hull.contains(&zmp, 1e-4));
        // The left-foot rectangle cannot reach y = -0.05
        assert!(zmp.y >= 0.07 + FOOT_Y[0] - 1e-4);
    }

    #[test]
    fn short_reference_is_padded() {
        let mpc = controller(15);
        let dcm = Vector2::new(0.01, 0.0);
        // One-sample reference: the padding rule must keep the problem sane
        let zmp = mpc
            .solve(&dcm, &[dcm], &vec![double_support_hull()], OMEGA, DT)
            .unwrap();
        assert_relative_eq!(zmp.x, dcm.x, epsilon = 2e-3);
    }
}
