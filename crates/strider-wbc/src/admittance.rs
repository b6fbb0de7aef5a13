//! Admittance controller.
//!
//! Sits upstream of the torque QP: from the feet tracking errors and the
//! wrench error (mapped target vs. measured) it produces the desired
//! generalized acceleration. Its own QP minimizes neck, posture, and torque
//! regularization errors over `[ν̇; τ]` subject to the rigid-body dynamics
//! (with the mapped wrenches as known inputs) and the feet tracking rows.
//!
//! The admittance law folds the wrench error into the feet references: a
//! foot pressing harder than its target is commanded away from the ground,
//! which is what lets a position-stiff robot regulate contact forces.

use nalgebra::{DMatrix, DVector, Rotation3, Vector3};

use strider_balance::cartesian_pid::{LinearPid, RotationalPid};
use strider_balance::qp::DenseQp;
use strider_core::config::ControllerConfig;
use strider_core::error::SolverError;
use strider_core::types::{KinematicsSnapshot, RobotState, SupportPhase, Wrench};

use crate::layout::Foot;
use crate::tasks::{add_least_squares_cost, fill_equality_rows, ConstraintLabel};
use crate::torque_qp::FootReference;
use crate::wrench_map::MappedWrenches;

/// Per-tick inputs of the admittance QP.
#[derive(Clone, Debug)]
pub struct AdmittanceInput<'a> {
    pub snapshot: &'a KinematicsSnapshot,
    pub robot: &'a RobotState,
    pub support: SupportPhase,
    pub left_foot: FootReference,
    pub right_foot: FootReference,
    /// Wrench targets from the contact-wrench mapper.
    pub mapped_wrenches: MappedWrenches,
    /// Desired neck orientation.
    pub neck_orientation: Rotation3<f64>,
    /// Postural setpoint.
    pub joint_positions: DVector<f64>,
}

/// Desired accelerations handed to the torque QP.
#[derive(Clone, Debug)]
pub struct AdmittanceSolution {
    pub generalized_acceleration: DVector<f64>,
    pub joint_accelerations: DVector<f64>,
}

pub struct AdmittanceController {
    linear_pid: LinearPid,
    rotational_pid: RotationalPid,
    force_feedback_gain: f64,
    torque_feedback_gain: f64,
    joint_weight: f64,
    torque_weight: f64,
    neck_pid: RotationalPid,
    neck_weight: f64,
    joint_kp: DVector<f64>,
    joint_kd: DVector<f64>,
    max_iters: u32,
}

impl AdmittanceController {
    #[must_use]
    pub fn new(config: &ControllerConfig, n_joints: usize) -> Self {
        let adm = &config.admittance;
        let reg = &config.joint_regularization;
        let resolve = |values: &[f64], fallback: f64| {
            if values.len() == n_joints {
                DVector::from_column_slice(values)
            } else {
                DVector::from_element(n_joints, fallback)
            }
        };
        Self {
            linear_pid: LinearPid::uniform(adm.kp, adm.kd),
            rotational_pid: RotationalPid::from_gains(adm.rotational_gains),
            force_feedback_gain: adm.force_feedback_gain,
            torque_feedback_gain: adm.torque_feedback_gain,
            joint_weight: adm.joint_regularization_weight,
            torque_weight: config.torque_regularization.weight,
            neck_pid: RotationalPid::from_gains(config.neck_task.rotational_gains),
            neck_weight: config.neck_task.weight,
            joint_kp: resolve(&reg.proportional_gains, 5.0),
            joint_kd: resolve(&reg.derivative_gains, 1.0),
            max_iters: adm.max_solver_iters,
        }
    }

    /// Assemble and solve one tick.
    pub fn solve(&self, input: &AdmittanceInput<'_>) -> Result<AdmittanceSolution, SolverError> {
        let snapshot = input.snapshot;
        let n_joints = snapshot.n_joints();
        let nv = n_joints + 6;
        let n_vars = nv + n_joints;

        let n_eq = nv + 12;
        let mut qp = DenseQp::new("admittance", n_vars, n_eq, 0, self.max_iters);
        let mut labels: Vec<ConstraintLabel> = Vec::with_capacity(n_eq);

        // --- Dynamics with the mapped wrenches as known inputs ---
        // M ν̇ - Sᵀ τ = -h + Σ J_kᵀ w_k
        let mut rhs = -snapshot.bias_forces.clone();
        for foot in [Foot::Left, Foot::Right] {
            let wrench = match foot {
                Foot::Left => input.mapped_wrenches.left,
                Foot::Right => input.mapped_wrenches.right,
            };
            if let Some(w) = wrench {
                let jacobian = match foot {
                    Foot::Left => &snapshot.left_foot_jacobian,
                    Foot::Right => &snapshot.right_foot_jacobian,
                };
                rhs += jacobian.transpose() * w.to_vector();
            }
        }
        for r in 0..nv {
            for c in 0..nv {
                qp.constraints[(r, c)] = snapshot.mass_matrix[(r, c)];
            }
            if r >= 6 {
                qp.constraints[(r, nv + (r - 6))] = -1.0;
            }
            qp.bounds[r] = rhs[r];
            labels.push(ConstraintLabel::Dynamics);
        }
        let mut row = nv;

        // --- Feet tracking rows, with the admittance wrench correction ---
        for foot in [Foot::Left, Foot::Right] {
            let (jacobian, bias, reference, measured_wrench, target_wrench) = match foot {
                Foot::Left => (
                    &snapshot.left_foot_jacobian,
                    snapshot.left_foot_bias_acceleration,
                    &input.left_foot,
                    input.robot.left_wrench,
                    input.mapped_wrenches.left,
                ),
                Foot::Right => (
                    &snapshot.right_foot_jacobian,
                    snapshot.right_foot_bias_acceleration,
                    &input.right_foot,
                    input.robot.right_wrench,
                    input.mapped_wrenches.right,
                ),
            };
            let target = self.foot_acceleration(snapshot, foot, reference, target_wrench, &measured_wrench);
            let bias = bias.to_vector();
            let rhs = DVector::from_fn(6, |r, _| target[r] - bias[r]);
            fill_equality_rows(&mut qp, row, 0..nv, jacobian, &rhs);
            for _ in 0..6 {
                labels.push(ConstraintLabel::FootTracking);
            }
            row += 6;
        }
        debug_assert_eq!(row, n_eq);

        // --- Neck orientation cost ---
        let neck_target = self.neck_pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &input.neck_orientation,
            &snapshot.neck_angular_velocity,
            &snapshot.neck_orientation.to_rotation_matrix(),
        );
        let neck_rhs = DVector::from_fn(3, |r, _| neck_target[r] - snapshot.neck_bias_acceleration[r]);
        let mut neck_jacobian = DMatrix::zeros(3, n_vars);
        neck_jacobian
            .view_mut((0, 0), (3, nv))
            .copy_from(&snapshot.neck_jacobian);
        add_least_squares_cost(&mut qp, 0..n_vars, &neck_jacobian, &neck_rhs, self.neck_weight);

        // --- Postural regularization cost ---
        for j in 0..n_joints {
            let target = self.joint_kp[j]
                * (input.joint_positions[j] - input.robot.joint_positions[j])
                - self.joint_kd[j] * input.robot.joint_velocities[j];
            let col = 6 + j;
            qp.hessian[(col, col)] += 2.0 * self.joint_weight;
            qp.gradient[col] -= 2.0 * self.joint_weight * target;
        }

        // --- Torque regularization cost ---
        for j in 0..n_joints {
            let col = nv + j;
            qp.hessian[(col, col)] += 2.0 * self.torque_weight;
        }
        // Base damping keeps the Hessian positive definite
        for c in 0..6 {
            qp.hessian[(c, c)] += 2.0 * 1e-4;
        }

        let solution = qp.solve()?;
        qp.check_solution(&solution.x, 1e-2, |r| {
            labels.get(r).map_or("unknown", |l| l.as_str())
        })?;

        Ok(AdmittanceSolution {
            generalized_acceleration: DVector::from_fn(nv, |r, _| solution.x[r]),
            joint_accelerations: DVector::from_fn(n_joints, |j, _| solution.x[6 + j]),
        })
    }

    /// Feet task acceleration: Cartesian PIDs plus the admittance term
    /// pushing along the wrench error.
    fn foot_acceleration(
        &self,
        snapshot: &KinematicsSnapshot,
        foot: Foot,
        reference: &FootReference,
        target_wrench: Option<Wrench>,
        measured_wrench: &Wrench,
    ) -> DVector<f64> {
        let (pose, twist) = match foot {
            Foot::Left => (&snapshot.left_foot_pose, &snapshot.left_foot_twist),
            Foot::Right => (&snapshot.right_foot_pose, &snapshot.right_foot_twist),
        };
        let mut linear = self.linear_pid.control(
            &reference.acceleration.linear,
            &reference.twist.linear,
            &reference.pose.translation.vector,
            &twist.linear,
            &pose.translation.vector,
        );
        let mut angular = self.rotational_pid.control(
            &reference.acceleration.angular,
            &reference.twist.angular,
            &reference.pose.rotation.to_rotation_matrix(),
            &twist.angular,
            &pose.rotation.to_rotation_matrix(),
        );
        if let Some(target) = target_wrench {
            linear += self.force_feedback_gain * (target.force - measured_wrench.force);
            angular += self.torque_feedback_gain * (target.torque - measured_wrench.torque);
        }
        DVector::from_column_slice(&[
            linear.x, linear.y, linear.z, angular.x, angular.y, angular.z,
        ])
    }
}
