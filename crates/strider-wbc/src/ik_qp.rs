//! Whole-body inverse-kinematics QP (velocity level).
//!
//! Decision vector `ν = [base twist (6); joint velocities (nJ)]`. Both feet
//! are hard velocity constraints (optionally the CoM too); the cost tracks
//! the neck orientation, the CoM (when soft), and a postural setpoint.
//!
//! Joint-velocity bounds are shaped by the position headroom,
//!
//! ```text
//! v ≤  tanh(k_u (q_max - q)) · v_max
//! v ≥ -tanh(k_b (q - q_min)) · v_max
//! ```
//!
//! so a joint gliding toward a position limit loses velocity authority
//! smoothly and the integrated position command can never cross the limit.

use nalgebra::{DVector, Rotation3, Vector3, Vector6};

use strider_balance::qp::DenseQp;
use strider_balance::RotationalPid;
use strider_core::config::{ControllerConfig, InverseKinematicsConfig};
use strider_core::error::SolverError;
use strider_core::types::{JointLimits, KinematicsSnapshot, RobotState, Twist};

use crate::layout::Foot;
use crate::tasks::{add_least_squares_cost, fill_equality_rows, ConstraintLabel};
use crate::torque_qp::FootReference;

/// Residual tolerance of the post-solve feasibility audit in IK mode.
pub const IK_FEASIBILITY_TOLERANCE: f64 = 1.0;

/// Per-tick inputs of the IK QP.
#[derive(Clone, Debug)]
pub struct IkQpInput<'a> {
    pub snapshot: &'a KinematicsSnapshot,
    pub robot: &'a RobotState,
    pub left_foot: FootReference,
    pub right_foot: FootReference,
    /// CoM velocity command from the ZMP–CoM loop (with the height channel).
    pub com_velocity: Vector3<f64>,
    /// Desired neck orientation.
    pub neck_orientation: Rotation3<f64>,
    /// Postural setpoint.
    pub joint_positions: DVector<f64>,
}

/// Solution of one IK QP.
#[derive(Clone, Debug)]
pub struct IkSolution {
    pub base_twist: Twist,
    pub joint_velocities: DVector<f64>,
}

pub struct VelocityIkSolver {
    config: InverseKinematicsConfig,
    neck_pid: RotationalPid,
    limits: JointLimits,
}

impl VelocityIkSolver {
    #[must_use]
    pub fn new(config: &ControllerConfig, limits: JointLimits) -> Self {
        Self {
            config: config.inverse_kinematics.clone(),
            neck_pid: RotationalPid::from_gains(config.neck_task.rotational_gains),
            limits,
        }
    }

    /// Effective velocity bounds of one joint at position `q`.
    #[must_use]
    pub fn velocity_bounds(&self, joint: usize, q: f64) -> (f64, f64) {
        let v_max = self.limits.velocity_max[joint];
        let upper = (self.config.k_u * (self.limits.position_upper[joint] - q)).tanh() * v_max;
        let lower = -(self.config.k_b * (q - self.limits.position_lower[joint])).tanh() * v_max;
        (lower, upper)
    }

    /// Assemble and solve one tick.
    pub fn solve(&self, input: &IkQpInput<'_>) -> Result<IkSolution, SolverError> {
        let snapshot = input.snapshot;
        let n_joints = snapshot.n_joints();
        let nv = n_joints + 6;

        let com_rows = if self.config.use_com_as_constraint { 3 } else { 0 };
        let n_eq = 12 + com_rows;
        let n_ineq = 2 * n_joints;

        let mut qp = DenseQp::new("ik_qp", nv, n_eq, n_ineq, self.config.max_solver_iters);
        let mut labels: Vec<ConstraintLabel> = Vec::with_capacity(n_eq + n_ineq);

        // --- Feet velocity constraints ---
        let mut row = 0;
        for foot in [Foot::Left, Foot::Right] {
            let (jacobian, reference) = match foot {
                Foot::Left => (&snapshot.left_foot_jacobian, &input.left_foot),
                Foot::Right => (&snapshot.right_foot_jacobian, &input.right_foot),
            };
            let command = self.foot_velocity_command(snapshot, foot, reference);
            let rhs = DVector::from_fn(6, |r, _| command[r]);
            fill_equality_rows(&mut qp, row, 0..nv, jacobian, &rhs);
            for _ in 0..6 {
                labels.push(ConstraintLabel::FootTracking);
            }
            row += 6;
        }

        // --- CoM: constraint or cost ---
        let com_rhs = DVector::from_fn(3, |r, _| input.com_velocity[r]);
        if self.config.use_com_as_constraint {
            fill_equality_rows(&mut qp, row, 0..nv, &snapshot.com_jacobian, &com_rhs);
            for _ in 0..3 {
                labels.push(ConstraintLabel::ComTask);
            }
            row += 3;
        } else {
            add_least_squares_cost(
                &mut qp,
                0..nv,
                &snapshot.com_jacobian,
                &com_rhs,
                self.config.com_weight,
            );
        }
        debug_assert_eq!(row, n_eq);

        // --- Headroom-shaped joint velocity bounds ---
        for j in 0..n_joints {
            let (lower, upper) = self.velocity_bounds(j, input.robot.joint_positions[j]);
            qp.constraints[(row, 6 + j)] = 1.0;
            qp.bounds[row] = upper;
            labels.push(ConstraintLabel::VelocityBound);
            qp.constraints[(row + 1, 6 + j)] = -1.0;
            qp.bounds[row + 1] = -lower;
            labels.push(ConstraintLabel::VelocityBound);
            row += 2;
        }

        // --- Neck orientation cost ---
        let desired_neck = input.neck_orientation
            * Rotation3::from_euler_angles(0.0, 0.0, self.config.additional_rotation);
        let neck_velocity = self.neck_pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &desired_neck,
            &Vector3::zeros(),
            &snapshot.neck_orientation.to_rotation_matrix(),
        );
        let neck_rhs = DVector::from_fn(3, |r, _| neck_velocity[r]);
        add_least_squares_cost(
            &mut qp,
            0..nv,
            &snapshot.neck_jacobian,
            &neck_rhs,
            self.config.neck_weight,
        );

        // --- Postural regularization cost ---
        for j in 0..n_joints {
            let target = self.config.posture_gain
                * (input.joint_positions[j] - input.robot.joint_positions[j]);
            let col = 6 + j;
            qp.hessian[(col, col)] += 2.0 * self.config.joint_regularization_weight;
            qp.gradient[col] -= 2.0 * self.config.joint_regularization_weight * target;
        }
        // A small damping on the base keeps the problem strictly convex
        for c in 0..6 {
            qp.hessian[(c, c)] += 2.0 * 1e-4;
        }

        let solution = qp.solve()?;
        qp.check_solution(&solution.x, IK_FEASIBILITY_TOLERANCE, |r| {
            labels.get(r).map_or("unknown", |l| l.as_str())
        })?;

        Ok(IkSolution {
            base_twist: Twist::from_vector(&Vector6::new(
                solution.x[0],
                solution.x[1],
                solution.x[2],
                solution.x[3],
                solution.x[4],
                solution.x[5],
            )),
            joint_velocities: DVector::from_fn(n_joints, |j, _| solution.x[6 + j]),
        })
    }

    /// Velocity command of one foot: reference twist plus pose feedback.
    fn foot_velocity_command(
        &self,
        snapshot: &KinematicsSnapshot,
        foot: Foot,
        reference: &FootReference,
    ) -> Vector6<f64> {
        let pose = match foot {
            Foot::Left => &snapshot.left_foot_pose,
            Foot::Right => &snapshot.right_foot_pose,
        };
        let position_error = reference.pose.translation.vector - pose.translation.vector;
        let orientation_error =
            (reference.pose.rotation * pose.rotation.inverse()).scaled_axis();

        let linear = reference.twist.linear + self.config.foot_linear_gain * position_error;
        let angular = reference.twist.angular + self.config.foot_angular_gain * orientation_error;
        Vector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torque_qp::test_model::{foot_reference, robot_state, snapshot, N_JOINTS};
    use approx::assert_relative_eq;

    fn solver() -> VelocityIkSolver {
        VelocityIkSolver::new(
            &ControllerConfig::default(),
            JointLimits::uniform(N_JOINTS, 2.0, 5.0, 60.0),
        )
    }

    fn standing_input<'a>(
        snap: &'a KinematicsSnapshot,
        robot: &'a RobotState,
    ) -> IkQpInput<'a> {
        IkQpInput {
            snapshot: snap,
            robot,
            left_foot: foot_reference(snap.left_foot_pose),
            right_foot: foot_reference(snap.right_foot_pose),
            com_velocity: Vector3::zeros(),
            neck_orientation: Rotation3::identity(),
            joint_positions: DVector::zeros(N_JOINTS),
        }
    }

    #[test]
    fn standing_still_commands_zero_motion() {
        let snap = snapshot();
        let robot = robot_state();
        let solution = solver().solve(&standing_input(&snap, &robot)).unwrap();
        assert_relative_eq!(solution.base_twist.linear.norm(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(solution.joint_velocities.norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn foot_error_produces_corrective_base_motion() {
        let snap = snapshot();
        let robot = robot_state();
        let mut input = standing_input(&snap, &robot);
        // Both feet reference 1 cm ahead of the measured pose: with feet
        // rigidly attached to the base (test model), the base must move.
        input.left_foot =
            foot_reference(snap.left_foot_pose * nalgebra::Translation3::new(0.01, 0.0, 0.0));
        input.right_foot =
            foot_reference(snap.right_foot_pose * nalgebra::Translation3::new(0.01, 0.0, 0.0));

        let solution = solver().solve(&input).unwrap();
        // v = gain * error = 2.0 * 0.01
        assert_relative_eq!(solution.base_twist.linear.x, 0.02, epsilon = 1e-4);
    }

    #[test]
    fn velocity_bounds_shrink_near_limits() {
        let solver = solver();
        // Far from the limits: nearly the full velocity authority
        let (lower, upper) = solver.velocity_bounds(0, 0.0);
        assert_relative_eq!(upper, 5.0 * (0.5f64 * 2.0).tanh(), epsilon = 1e-12);
        assert_relative_eq!(lower, -upper, epsilon = 1e-12);

        // Close to the upper limit: upward authority collapses
        let (lower, upper) = solver.velocity_bounds(0, 1.95);
        assert!(upper < 0.2);
        assert!(lower < -1.0);

        // At the limit: no upward velocity at all
        let (_, upper) = solver.velocity_bounds(0, 2.0);
        assert_relative_eq!(upper, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn integrated_positions_stay_inside_limits() {
        let solver = solver();
        let dt = 0.016;
        let mut q: f64 = 1.9;
        // Always command the maximum admissible upward velocity
        for _ in 0..10_000 {
            let (_, upper) = solver.velocity_bounds(0, q);
            q += upper * dt;
        }
        assert!(q <= 2.0 + 1e-9, "q = {q} crossed the position limit");
    }

    #[test]
    fn com_as_constraint_is_honored() {
        let snap = snapshot();
        let robot = robot_state();
        let config = ControllerConfig {
            inverse_kinematics: InverseKinematicsConfig {
                use_com_as_constraint: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let solver =
            VelocityIkSolver::new(&config, JointLimits::uniform(N_JOINTS, 2.0, 5.0, 60.0));
        let mut input = standing_input(&snap, &robot);
        // Feet must agree with the CoM motion in the rigid test model
        let twist = Twist {
            linear: Vector3::new(0.05, 0.0, 0.0),
            angular: Vector3::zeros(),
        };
        input.left_foot.twist = twist;
        input.right_foot.twist = twist;
        input.com_velocity = Vector3::new(0.05, 0.0, 0.0);

        let solution = solver.solve(&input).unwrap();
        assert_relative_eq!(solution.base_twist.linear.x, 0.05, epsilon = 1e-5);
    }

    #[test]
    fn posture_cost_pulls_joints_home() {
        let snap = snapshot();
        let mut robot = robot_state();
        robot.joint_positions[1] = 0.4;
        let input = standing_input(&snap, &robot);

        let solution = solver().solve(&input).unwrap();
        // Joint 1 heads back toward its zero setpoint; the feet constraints
        // live entirely on the base in the test model, so joints are free.
        assert!(
            solution.joint_velocities[1] < -0.05,
            "joint 1 velocity {} should be negative",
            solution.joint_velocities[1]
        );
    }
}
