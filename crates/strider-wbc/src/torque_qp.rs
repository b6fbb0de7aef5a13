//! Task-based torque whole-body QP (inverse dynamics).
//!
//! Decision vector per [`DecisionLayout`]: generalized acceleration, joint
//! torques, and one contact wrench per foot in contact.
//!
//! Hard constraints: free-floating dynamics, no-slip on contact feet, the
//! CoM task, the ZMP coupling rows, contact-wrench feasibility, and the
//! torque rate limit. Costs: swing-foot tracking (single support), neck
//! orientation, joint/torque/wrench regularization, and an optional
//! centroidal angular-momentum damping hook.

use nalgebra::{DMatrix, DVector, Isometry3, Rotation3, Vector2, Vector3};

use strider_balance::cartesian_pid::{LinearPid, RotationalPid};
use strider_balance::qp::DenseQp;
use strider_core::config::ControllerConfig;
use strider_core::error::SolverError;
use strider_core::types::{
    JointLimits, KinematicsSnapshot, RobotState, SpatialAcceleration, SupportPhase, Twist, Wrench,
    GRAVITY,
};

use crate::contact::{fill_zmp_rows, ForceFeasibility};
use crate::layout::{DecisionLayout, Foot};
use crate::tasks::{add_least_squares_cost, ConstraintLabel};

/// Residual tolerance of the post-solve feasibility audit in torque mode.
pub const TORQUE_FEASIBILITY_TOLERANCE: f64 = 0.5;

/// Reference trajectory of one foot at the current sample.
#[derive(Clone, Debug)]
pub struct FootReference {
    pub pose: Isometry3<f64>,
    pub twist: Twist,
    pub acceleration: SpatialAcceleration,
}

/// Per-tick inputs of the torque QP.
#[derive(Clone, Debug)]
pub struct TorqueQpInput<'a> {
    pub snapshot: &'a KinematicsSnapshot,
    pub robot: &'a RobotState,
    pub support: SupportPhase,
    pub left_foot: FootReference,
    pub right_foot: FootReference,
    /// CoM reference (position, velocity, feedforward acceleration).
    pub com_position: Vector3<f64>,
    pub com_velocity: Vector3<f64>,
    pub com_acceleration: Vector3<f64>,
    /// ZMP commanded by the balance cascade and the measured ZMP.
    pub desired_zmp: Vector2<f64>,
    pub measured_zmp: Vector2<f64>,
    /// Desired neck orientation.
    pub neck_orientation: Rotation3<f64>,
    /// Joint-space regularization references.
    pub joint_positions: DVector<f64>,
    pub joint_velocities: DVector<f64>,
    pub joint_accelerations: DVector<f64>,
    /// Commanded weight split, left and right, from the trajectory buffers.
    pub left_weight_fraction: f64,
    pub right_weight_fraction: f64,
}

/// Solution of one torque QP.
#[derive(Clone, Debug)]
pub struct TorqueSolution {
    pub torques: DVector<f64>,
    pub generalized_acceleration: DVector<f64>,
    pub left_wrench: Option<Wrench>,
    pub right_wrench: Option<Wrench>,
}

impl TorqueSolution {
    /// ZMP realized by the solved wrenches (diagnostics and the logger).
    #[must_use]
    pub fn achieved_zmp(
        &self,
        left_pose: &Isometry3<f64>,
        right_pose: &Isometry3<f64>,
        min_normal_force: f64,
    ) -> Option<Vector2<f64>> {
        let mut weighted = Vector2::zeros();
        let mut total_fz = 0.0;
        for (wrench, pose) in [
            (self.left_wrench.as_ref(), left_pose),
            (self.right_wrench.as_ref(), right_pose),
        ] {
            if let Some(w) = wrench {
                if let Some(cop) = w.local_cop(min_normal_force) {
                    let world = Vector2::new(
                        pose.translation.x + cop.x,
                        pose.translation.y + cop.y,
                    );
                    weighted += world * w.force.z;
                    total_fz += w.force.z;
                }
            }
        }
        (total_fz > min_normal_force).then(|| weighted / total_fz)
    }
}

pub struct TaskBasedTorqueSolver {
    dt: f64,
    com_kp: f64,
    com_kd: f64,
    com_height_only: bool,
    feet_linear_pid: LinearPid,
    feet_rotational_pid: RotationalPid,
    swing_weight: f64,
    neck_pid: RotationalPid,
    neck_weight: f64,
    additional_neck_yaw: f64,
    cop_gain: f64,
    joint_weights: DVector<f64>,
    joint_kp: DVector<f64>,
    joint_kd: DVector<f64>,
    torque_weight: f64,
    force_scale: f64,
    force_offset: f64,
    max_torque_rate: f64,
    feasibility: ForceFeasibility,
    limits: JointLimits,
    max_iters: u32,
    /// Optional centroidal angular-momentum damping gain (interface hook;
    /// disabled unless set).
    pub angular_momentum_gain: Option<f64>,
    previous_torques: Option<DVector<f64>>,
}

fn resolve(values: &[f64], fallback: f64, n: usize) -> DVector<f64> {
    if values.len() == n {
        DVector::from_column_slice(values)
    } else {
        DVector::from_element(n, fallback)
    }
}

impl TaskBasedTorqueSolver {
    #[must_use]
    pub fn new(config: &ControllerConfig, limits: JointLimits) -> Self {
        let n = limits.n_joints();
        let reg = &config.joint_regularization;
        Self {
            dt: config.general.sampling_time,
            com_kp: config.com_task.kp,
            com_kd: config.com_task.kd,
            com_height_only: config.com_task.control_only_height,
            feet_linear_pid: LinearPid::uniform(config.feet_task.kp, config.feet_task.kd),
            feet_rotational_pid: RotationalPid::from_gains(config.feet_task.rotational_gains),
            swing_weight: config.feet_task.swing_weight,
            neck_pid: RotationalPid::from_gains(config.neck_task.rotational_gains),
            neck_weight: config.neck_task.weight,
            additional_neck_yaw: config.neck_task.additional_rotation,
            cop_gain: config.zmp_task.cop_gain,
            joint_weights: resolve(&reg.weights, 1.0, n),
            joint_kp: resolve(&reg.proportional_gains, 5.0, n),
            joint_kd: resolve(&reg.derivative_gains, 1.0, n),
            torque_weight: config.torque_regularization.weight,
            force_scale: config.force_regularization.scale,
            force_offset: config.force_regularization.offset,
            max_torque_rate: config.rate_of_change.maximum_torque_rate,
            feasibility: ForceFeasibility::new(&config.contact_forces),
            limits,
            max_iters: strider_balance::qp::DEFAULT_MAX_ITERS,
            angular_momentum_gain: None,
            previous_torques: None,
        }
    }

    /// Forget the rate-limit memory. Called on stop.
    pub fn reset(&mut self) {
        self.previous_torques = None;
    }

    #[must_use]
    pub fn previous_torques(&self) -> Option<&DVector<f64>> {
        self.previous_torques.as_ref()
    }

    /// Assemble and solve one tick.
    pub fn solve(&mut self, input: &TorqueQpInput<'_>) -> Result<TorqueSolution, SolverError> {
        let snapshot = input.snapshot;
        let n_joints = snapshot.n_joints();
        let nv = n_joints + 6;
        let layout = DecisionLayout::new(n_joints, input.support);
        let contacts = layout.contact_wrenches();

        let com_rows = if self.com_height_only { 1 } else { 3 };
        let n_eq = nv + 6 * contacts.len() + com_rows + 2;
        let n_ineq = self.feasibility.n_rows() * contacts.len() + 2 * n_joints;

        let mut qp = DenseQp::new("torque_qp", layout.n_vars(), n_eq, n_ineq, self.max_iters);
        let mut labels: Vec<ConstraintLabel> = Vec::with_capacity(n_eq + n_ineq);

        // --- Dynamics: M ν̇ - Sᵀ τ - Σ J_kᵀ w_k = -h ---
        let mut row = 0;
        for r in 0..nv {
            for c in 0..nv {
                qp.constraints[(row + r, c)] = snapshot.mass_matrix[(r, c)];
            }
            qp.bounds[row + r] = -snapshot.bias_forces[r];
            labels.push(ConstraintLabel::Dynamics);
        }
        let torque_cols = layout.torque();
        for j in 0..n_joints {
            qp.constraints[(row + 6 + j, torque_cols.start + j)] = -1.0;
        }
        for (foot, cols) in &contacts {
            let jacobian = foot_jacobian(snapshot, *foot);
            for r in 0..nv {
                for w in 0..6 {
                    // J_kᵀ block: (nv x 6)
                    qp.constraints[(row + r, cols.start + w)] = -jacobian[(w, r)];
                }
            }
        }
        row += nv;

        // --- No-slip on contact feet: J_k ν̇ = -J̇_k ν ---
        for (foot, _) in &contacts {
            let jacobian = foot_jacobian(snapshot, *foot);
            let bias = foot_bias(snapshot, *foot).to_vector();
            for r in 0..6 {
                for c in 0..nv {
                    qp.constraints[(row + r, c)] = jacobian[(r, c)];
                }
                qp.bounds[row + r] = -bias[r];
                labels.push(ConstraintLabel::ContactNoSlip);
            }
            row += 6;
        }

        // --- CoM task: J_com ν̇ = a* - J̇_com ν ---
        let com_target = self.com_kp * (input.com_position - snapshot.com_position)
            + self.com_kd * (input.com_velocity - snapshot.com_velocity)
            + input.com_acceleration;
        let first_axis = if self.com_height_only { 2 } else { 0 };
        for (r, axis) in (first_axis..3).enumerate() {
            for c in 0..nv {
                qp.constraints[(row + r, c)] = snapshot.com_jacobian[(axis, c)];
            }
            qp.bounds[row + r] = com_target[axis] - snapshot.com_bias_acceleration[axis];
            labels.push(ConstraintLabel::ComTask);
        }
        row += com_rows;

        // --- ZMP coupling on the contact wrenches ---
        // The commanded CoP pulls back against the measured ZMP error.
        let zmp_target = input.desired_zmp
            - self.cop_gain * (input.measured_zmp - input.desired_zmp);
        let blocks: Vec<_> = contacts
            .iter()
            .map(|(foot, cols)| {
                let pose = foot_pose(snapshot, *foot);
                (
                    cols.clone(),
                    Vector2::new(pose.translation.x, pose.translation.y),
                )
            })
            .collect();
        fill_zmp_rows(&mut qp, row, &blocks, &zmp_target);
        labels.push(ConstraintLabel::ZmpCoupling);
        labels.push(ConstraintLabel::ZmpCoupling);
        row += 2;
        debug_assert_eq!(row, n_eq);

        // --- Contact-wrench feasibility ---
        for (foot, cols) in &contacts {
            let rotation = foot_pose(snapshot, *foot).rotation.to_rotation_matrix();
            self.feasibility.fill(&mut qp, row, cols.clone(), &rotation);
            for r in 0..self.feasibility.n_rows() {
                labels.push(self.feasibility.label(r));
            }
            row += self.feasibility.n_rows();
        }

        // --- Torque rate of change ---
        // First solve: previous is zero and the window opens to the full
        // torque limits.
        let (previous, window) = match &self.previous_torques {
            Some(prev) => (
                prev.clone(),
                DVector::from_element(n_joints, self.max_torque_rate * self.dt),
            ),
            None => (DVector::zeros(n_joints), self.limits.torque_max.clone()),
        };
        for j in 0..n_joints {
            qp.constraints[(row, torque_cols.start + j)] = 1.0;
            qp.bounds[row] = previous[j] + window[j];
            labels.push(ConstraintLabel::TorqueRate);
            qp.constraints[(row + 1, torque_cols.start + j)] = -1.0;
            qp.bounds[row + 1] = -(previous[j] - window[j]);
            labels.push(ConstraintLabel::TorqueRate);
            row += 2;
        }
        debug_assert_eq!(row, n_eq + n_ineq);

        // --- Swing-foot tracking cost (single support) ---
        if let Some(stance) = Foot::stance_of(input.support) {
            let swing = stance.other();
            let reference = match swing {
                Foot::Left => &input.left_foot,
                Foot::Right => &input.right_foot,
            };
            let target = self.foot_task_acceleration(snapshot, swing, reference);
            let jacobian = foot_jacobian(snapshot, swing);
            let bias = foot_bias(snapshot, swing).to_vector();
            let rhs = DVector::from_fn(6, |r, _| target[r] - bias[r]);
            add_least_squares_cost(
                &mut qp,
                layout.generalized_acceleration(),
                &jacobian.clone_owned(),
                &rhs,
                self.swing_weight,
            );
        }

        // --- Neck orientation cost ---
        let desired_neck = input.neck_orientation
            * Rotation3::from_euler_angles(0.0, 0.0, self.additional_neck_yaw);
        let neck_target = self.neck_pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &desired_neck,
            &snapshot.neck_angular_velocity,
            &snapshot.neck_orientation.to_rotation_matrix(),
        );
        let neck_rhs = DVector::from_fn(3, |r, _| neck_target[r] - snapshot.neck_bias_acceleration[r]);
        add_least_squares_cost(
            &mut qp,
            layout.generalized_acceleration(),
            &snapshot.neck_jacobian.clone_owned(),
            &neck_rhs,
            self.neck_weight,
        );

        // --- Joint regularization cost ---
        let joint_cols = layout.joint_acceleration();
        for j in 0..n_joints {
            let target = input.joint_accelerations[j]
                + self.joint_kd[j] * (input.joint_velocities[j] - input.robot.joint_velocities[j])
                + self.joint_kp[j] * (input.joint_positions[j] - input.robot.joint_positions[j]);
            let col = joint_cols.start + j;
            qp.hessian[(col, col)] += 2.0 * self.joint_weights[j];
            qp.gradient[col] -= 2.0 * self.joint_weights[j] * target;
        }

        // --- Torque regularization cost ---
        for j in 0..n_joints {
            let col = torque_cols.start + j;
            qp.hessian[(col, col)] += 2.0 * self.torque_weight;
        }

        // --- Wrench regularization cost ---
        // Weight grows with the commanded load fraction, pulling each foot
        // toward its planned share of gravity.
        let total_weight = snapshot.total_mass * GRAVITY;
        for (foot, cols) in &contacts {
            let fraction = match foot {
                Foot::Left => input.left_weight_fraction,
                Foot::Right => input.right_weight_fraction,
            };
            let weight = self.force_scale * fraction.abs() + self.force_offset;
            let share = fraction * total_weight;
            for w in 0..6 {
                let col = cols.start + w;
                qp.hessian[(col, col)] += 2.0 * weight;
                if w == 2 {
                    qp.gradient[col] -= 2.0 * weight * share;
                }
            }
        }

        // --- Angular-momentum damping hook ---
        if let Some(gain) = self.angular_momentum_gain {
            self.add_angular_momentum_cost(&mut qp, snapshot, &contacts, gain);
        }

        let solution = qp.solve()?;
        qp.check_solution(&solution.x, TORQUE_FEASIBILITY_TOLERANCE, |r| {
            labels.get(r).map_or("unknown", |l| l.as_str())
        })?;

        let torques = DVector::from_fn(n_joints, |j, _| solution.x[torque_cols.start + j]);
        self.previous_torques = Some(torques.clone());

        let extract_wrench = |foot: Foot| {
            layout.wrench(foot).map(|cols| {
                Wrench {
                    force: Vector3::new(
                        solution.x[cols.start],
                        solution.x[cols.start + 1],
                        solution.x[cols.start + 2],
                    ),
                    torque: Vector3::new(
                        solution.x[cols.start + 3],
                        solution.x[cols.start + 4],
                        solution.x[cols.start + 5],
                    ),
                }
            })
        };

        Ok(TorqueSolution {
            generalized_acceleration: DVector::from_fn(nv, |r, _| solution.x[r]),
            torques,
            left_wrench: extract_wrench(Foot::Left),
            right_wrench: extract_wrench(Foot::Right),
        })
    }

    /// Desired 6-D acceleration of a tracked foot from its Cartesian PIDs.
    fn foot_task_acceleration(
        &self,
        snapshot: &KinematicsSnapshot,
        foot: Foot,
        reference: &FootReference,
    ) -> DVector<f64> {
        let pose = foot_pose(snapshot, foot);
        let twist = foot_twist(snapshot, foot);
        let linear = self.feet_linear_pid.control(
            &reference.acceleration.linear,
            &reference.twist.linear,
            &reference.pose.translation.vector,
            &twist.linear,
            &pose.translation.vector,
        );
        let angular = self.feet_rotational_pid.control(
            &reference.acceleration.angular,
            &reference.twist.angular,
            &reference.pose.rotation.to_rotation_matrix(),
            &twist.angular,
            &pose.rotation.to_rotation_matrix(),
        );
        DVector::from_column_slice(&[
            linear.x, linear.y, linear.z, angular.x, angular.y, angular.z,
        ])
    }

    /// Damping of the centroidal angular momentum through the contact
    /// wrenches: `Σ (p_i - c) × f_i + τ_i` is pulled toward `-gain · L`.
    fn add_angular_momentum_cost(
        &self,
        qp: &mut DenseQp,
        snapshot: &KinematicsSnapshot,
        contacts: &[(Foot, std::ops::Range<usize>)],
        gain: f64,
    ) {
        let target = -gain * snapshot.angular_momentum;
        let n_vars = qp.n_vars();
        let mut jacobian = DMatrix::zeros(3, n_vars);
        for (foot, cols) in contacts {
            let lever = foot_pose(snapshot, *foot).translation.vector - snapshot.com_position;
            // rows of skew(lever) over the force columns
            let s = [
                [0.0, -lever.z, lever.y],
                [lever.z, 0.0, -lever.x],
                [-lever.y, lever.x, 0.0],
            ];
            for r in 0..3 {
                for c in 0..3 {
                    jacobian[(r, cols.start + c)] = s[r][c];
                }
                jacobian[(r, cols.start + 3 + r)] = 1.0;
            }
        }
        let target = DVector::from_column_slice(&[target.x, target.y, target.z]);
        add_least_squares_cost(qp, 0..n_vars, &jacobian, &target, 1.0);
    }
}

fn foot_jacobian(snapshot: &KinematicsSnapshot, foot: Foot) -> &DMatrix<f64> {
    match foot {
        Foot::Left => &snapshot.left_foot_jacobian,
        Foot::Right => &snapshot.right_foot_jacobian,
    }
}

fn foot_bias(snapshot: &KinematicsSnapshot, foot: Foot) -> SpatialAcceleration {
    match foot {
        Foot::Left => snapshot.left_foot_bias_acceleration,
        Foot::Right => snapshot.right_foot_bias_acceleration,
    }
}

fn foot_pose(snapshot: &KinematicsSnapshot, foot: Foot) -> Isometry3<f64> {
    match foot {
        Foot::Left => snapshot.left_foot_pose,
        Foot::Right => snapshot.right_foot_pose,
    }
}

fn foot_twist(snapshot: &KinematicsSnapshot, foot: Foot) -> Twist {
    match foot {
        Foot::Left => snapshot.left_foot_twist,
        Foot::Right => snapshot.right_foot_twist,
    }
}


#[cfg(test)]
mod tests {
    use super::test_model::{foot_reference, robot_state, snapshot, MASS, N_JOINTS};
    use super::*;
    use approx::assert_relative_eq;

    fn solver() -> TaskBasedTorqueSolver {
        let config = ControllerConfig::default();
        let limits = JointLimits::uniform(N_JOINTS, 2.0, 5.0, 60.0);
        TaskBasedTorqueSolver::new(&config, limits)
    }

    fn standing_input<'a>(
        snap: &'a KinematicsSnapshot,
        robot: &'a RobotState,
    ) -> TorqueQpInput<'a> {
        TorqueQpInput {
            snapshot: snap,
            robot,
            support: SupportPhase::Double,
            left_foot: foot_reference(snap.left_foot_pose),
            right_foot: foot_reference(snap.right_foot_pose),
            com_position: snap.com_position,
            com_velocity: Vector3::zeros(),
            com_acceleration: Vector3::zeros(),
            desired_zmp: Vector2::zeros(),
            measured_zmp: Vector2::zeros(),
            neck_orientation: Rotation3::identity(),
            joint_positions: DVector::zeros(N_JOINTS),
            joint_velocities: DVector::zeros(N_JOINTS),
            joint_accelerations: DVector::zeros(N_JOINTS),
            left_weight_fraction: 0.5,
            right_weight_fraction: 0.5,
        }
    }

    #[test]
    fn standing_balance_carries_gravity() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();
        let solution = solver.solve(&standing_input(&snap, &robot)).unwrap();

        let left = solution.left_wrench.unwrap();
        let right = solution.right_wrench.unwrap();
        // Vertical forces balance gravity
        assert_relative_eq!(
            left.force.z + right.force.z,
            MASS * GRAVITY,
            epsilon = 0.5
        );
        // Symmetric commanded split and geometry: even load sharing
        assert_relative_eq!(left.force.z, right.force.z, epsilon = 1.0);
        // Both feet above the minimal normal force
        assert!(left.force.z > 10.0);
        assert!(right.force.z > 10.0);
    }

    #[test]
    fn achieved_zmp_matches_command() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();
        let mut input = standing_input(&snap, &robot);
        input.desired_zmp = Vector2::new(0.01, 0.0);
        input.measured_zmp = Vector2::new(0.01, 0.0);

        let solution = solver.solve(&input).unwrap();
        let zmp = solution
            .achieved_zmp(&snap.left_foot_pose, &snap.right_foot_pose, 0.1)
            .unwrap();
        assert_relative_eq!(zmp.x, 0.01, epsilon = 1e-3);
        assert_relative_eq!(zmp.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn solved_wrenches_satisfy_feasibility() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();
        let solution = solver.solve(&standing_input(&snap, &robot)).unwrap();

        let feasibility = ForceFeasibility::new(&ControllerConfig::default().contact_forces);
        for wrench in [solution.left_wrench.unwrap(), solution.right_wrench.unwrap()] {
            assert!(feasibility.satisfied(&wrench.to_vector(), 1e-3));
        }
    }

    #[test]
    fn first_tick_rate_window_is_wide_then_tightens() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();

        assert!(solver.previous_torques().is_none());
        let first = solver.solve(&standing_input(&snap, &robot)).unwrap();
        let previous = solver.previous_torques().unwrap().clone();
        assert_relative_eq!(
            (&first.torques - &previous).norm(),
            0.0,
            epsilon = 1e-12
        );

        // Second solve: torques move at most rate * dt per joint
        let window = 150.0 * 0.016;
        let second = solver.solve(&standing_input(&snap, &robot)).unwrap();
        for j in 0..N_JOINTS {
            assert!(
                (second.torques[j] - previous[j]).abs() <= window + 1e-6,
                "joint {j} violates the rate window"
            );
        }
    }

    #[test]
    fn single_support_drops_the_swing_wrench() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();
        let mut input = standing_input(&snap, &robot);
        input.support = SupportPhase::Left;
        input.left_weight_fraction = 1.0;
        input.right_weight_fraction = 0.0;
        // The commanded ZMP must live inside the stance foot in single support
        input.desired_zmp = Vector2::new(0.0, 0.07);
        input.measured_zmp = input.desired_zmp;
        // Lift the swing reference a little
        input.right_foot = foot_reference(Isometry3::translation(0.0, -0.07, 0.02));

        let solution = solver.solve(&input).unwrap();
        assert!(solution.right_wrench.is_none());
        let left = solution.left_wrench.unwrap();
        assert_relative_eq!(left.force.z, MASS * GRAVITY, epsilon = 0.5);
    }

    #[test]
    fn weight_split_biases_the_load() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();
        let mut input = standing_input(&snap, &robot);
        input.left_weight_fraction = 0.8;
        input.right_weight_fraction = 0.2;
        // Let the ZMP follow the commanded split toward the left foot
        input.desired_zmp = Vector2::new(0.0, 0.07 * 0.8 - 0.07 * 0.2);
        input.measured_zmp = input.desired_zmp;

        let solution = solver.solve(&input).unwrap();
        let left = solution.left_wrench.unwrap();
        let right = solution.right_wrench.unwrap();
        assert!(
            left.force.z > 2.0 * right.force.z,
            "left {} vs right {}",
            left.force.z,
            right.force.z
        );
    }

    #[test]
    fn com_height_only_mode_solves() {
        let snap = snapshot();
        let robot = robot_state();
        let config = ControllerConfig {
            com_task: strider_core::config::ComTaskConfig {
                control_only_height: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut solver =
            TaskBasedTorqueSolver::new(&config, JointLimits::uniform(N_JOINTS, 2.0, 5.0, 60.0));
        let solution = solver.solve(&standing_input(&snap, &robot)).unwrap();
        assert!(solution.left_wrench.is_some());
    }

    #[test]
    fn angular_momentum_hook_accepts_gain() {
        let snap = snapshot();
        let robot = robot_state();
        let mut solver = solver();
        solver.angular_momentum_gain = Some(1.0);
        // The hook must not break feasibility of a balanced stance
        let solution = solver.solve(&standing_input(&snap, &robot)).unwrap();
        let left = solution.left_wrench.unwrap();
        let right = solution.right_wrench.unwrap();
        assert_relative_eq!(
            left.force.z + right.force.z,
            MASS * GRAVITY,
            epsilon = 0.5
        );
    }
}
