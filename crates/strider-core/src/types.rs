//! Core types shared across the walking controller.
//!
//! All poses are expressed in a world inertial frame. Twists and spatial
//! accelerations use the mixed representation: linear part in world frame,
//! angular part in world frame.

use nalgebra::{DMatrix, DVector, Isometry3, UnitQuaternion, Vector2, Vector3, Vector6};

/// A rigid-body velocity: linear part in world frame, angular part in world frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Pack into a 6-vector `[linear; angular]`.
    #[must_use]
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        )
    }

    /// Unpack from a 6-vector `[linear; angular]`.
    #[must_use]
    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self {
            linear: Vector3::new(v[0], v[1], v[2]),
            angular: Vector3::new(v[3], v[4], v[5]),
        }
    }
}

/// A spatial acceleration, laid out like [`Twist`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpatialAcceleration {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl SpatialAcceleration {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Pack into a 6-vector `[linear; angular]`.
    #[must_use]
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        )
    }
}

/// A contact wrench: force and torque in world frame at the frame origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
}

impl Wrench {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Pack into a 6-vector `[force; torque]`.
    #[must_use]
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.force.x,
            self.force.y,
            self.force.z,
            self.torque.x,
            self.torque.y,
            self.torque.z,
        )
    }

    /// Unpack from a 6-vector `[force; torque]`.
    #[must_use]
    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self {
            force: Vector3::new(v[0], v[1], v[2]),
            torque: Vector3::new(v[3], v[4], v[5]),
        }
    }

    /// Local center of pressure of a planar contact, `(-tau_y/f_z, tau_x/f_z)`.
    ///
    /// Returns `None` when the normal force is below `min_normal_force`.
    #[must_use]
    pub fn local_cop(&self, min_normal_force: f64) -> Option<Vector2<f64>> {
        if self.force.z < min_normal_force {
            return None;
        }
        Some(Vector2::new(
            -self.torque.y / self.force.z,
            self.torque.x / self.force.z,
        ))
    }
}

/// Which feet carry the robot at a given sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupportPhase {
    /// Only the left foot is in planar contact.
    Left,
    /// Only the right foot is in planar contact.
    Right,
    /// Both feet are in planar contact.
    Double,
}

impl SupportPhase {
    /// Derive the phase from the per-foot contact flags.
    ///
    /// Returns `None` when neither foot is in contact (flight is never a
    /// commanded state; the caller treats it as a sensor fault).
    #[must_use]
    pub fn from_contacts(left: bool, right: bool) -> Option<Self> {
        match (left, right) {
            (true, true) => Some(Self::Double),
            (true, false) => Some(Self::Left),
            (false, true) => Some(Self::Right),
            (false, false) => None,
        }
    }

    #[must_use]
    pub const fn is_double(self) -> bool {
        matches!(self, Self::Double)
    }

    /// Number of feet in contact.
    #[must_use]
    pub const fn contact_count(self) -> usize {
        match self {
            Self::Double => 2,
            Self::Left | Self::Right => 1,
        }
    }
}

/// Per-joint actuation limits.
#[derive(Clone, Debug)]
pub struct JointLimits {
    /// Lower position limit (rad).
    pub position_lower: DVector<f64>,
    /// Upper position limit (rad).
    pub position_upper: DVector<f64>,
    /// Symmetric velocity limit (rad/s).
    pub velocity_max: DVector<f64>,
    /// Symmetric torque limit (Nm).
    pub torque_max: DVector<f64>,
}

impl JointLimits {
    /// Uniform limits for `n` joints, handy for tests and simple robots.
    #[must_use]
    pub fn uniform(n: usize, position: f64, velocity: f64, torque: f64) -> Self {
        Self {
            position_lower: DVector::from_element(n, -position),
            position_upper: DVector::from_element(n, position),
            velocity_max: DVector::from_element(n, velocity),
            torque_max: DVector::from_element(n, torque),
        }
    }

    #[must_use]
    pub fn n_joints(&self) -> usize {
        self.position_lower.len()
    }
}

/// Measured robot state at the start of a tick.
#[derive(Clone, Debug)]
pub struct RobotState {
    /// Actuated joint positions (rad).
    pub joint_positions: DVector<f64>,
    /// Actuated joint velocities (rad/s).
    pub joint_velocities: DVector<f64>,
    /// Floating-base transform (world_T_base), from the external estimator.
    pub base_pose: Isometry3<f64>,
    /// Floating-base twist, from the external estimator.
    pub base_twist: Twist,
    /// Left foot wrench, expressed in world frame at the sole frame origin.
    pub left_wrench: Wrench,
    /// Right foot wrench, expressed in world frame at the sole frame origin.
    pub right_wrench: Wrench,
}

impl RobotState {
    #[must_use]
    pub fn n_joints(&self) -> usize {
        self.joint_positions.len()
    }
}

/// Read-only per-tick snapshot of the external forward-kinematics engine.
///
/// Built once per tick right after the feedback read and handed by reference
/// to every solver, so no subsystem keeps pointers into another's state.
///
/// Jacobians are `6 x (nJ + 6)` (or `3 x (nJ + 6)` for point quantities)
/// with the base columns first, mixed representation.
#[derive(Clone, Debug)]
pub struct KinematicsSnapshot {
    /// Free-floating mass matrix, `(nJ+6) x (nJ+6)`.
    pub mass_matrix: DMatrix<f64>,
    /// Generalized bias forces (Coriolis + gravity), `nJ+6`.
    pub bias_forces: DVector<f64>,
    /// Left sole frame pose.
    pub left_foot_pose: Isometry3<f64>,
    /// Right sole frame pose.
    pub right_foot_pose: Isometry3<f64>,
    /// Left sole frame twist.
    pub left_foot_twist: Twist,
    /// Right sole frame twist.
    pub right_foot_twist: Twist,
    /// Left sole Jacobian, `6 x (nJ+6)`.
    pub left_foot_jacobian: DMatrix<f64>,
    /// Right sole Jacobian, `6 x (nJ+6)`.
    pub right_foot_jacobian: DMatrix<f64>,
    /// Left sole bias acceleration `J̇ ν`.
    pub left_foot_bias_acceleration: SpatialAcceleration,
    /// Right sole bias acceleration `J̇ ν`.
    pub right_foot_bias_acceleration: SpatialAcceleration,
    /// Neck (head) orientation.
    pub neck_orientation: UnitQuaternion<f64>,
    /// Neck angular velocity.
    pub neck_angular_velocity: Vector3<f64>,
    /// Angular rows of the neck Jacobian, `3 x (nJ+6)`.
    pub neck_jacobian: DMatrix<f64>,
    /// Angular part of the neck bias acceleration.
    pub neck_bias_acceleration: Vector3<f64>,
    /// Center of mass position.
    pub com_position: Vector3<f64>,
    /// Center of mass velocity.
    pub com_velocity: Vector3<f64>,
    /// CoM Jacobian, `3 x (nJ+6)`.
    pub com_jacobian: DMatrix<f64>,
    /// CoM bias acceleration `J̇_com ν`.
    pub com_bias_acceleration: Vector3<f64>,
    /// Centroidal angular momentum about the CoM.
    pub angular_momentum: Vector3<f64>,
    /// Total robot mass (kg).
    pub total_mass: f64,
}

impl KinematicsSnapshot {
    /// Number of actuated joints implied by the mass-matrix dimension.
    #[must_use]
    pub fn n_joints(&self) -> usize {
        self.mass_matrix.nrows() - 6
    }

    /// Divergent component of motion `ξ = c + ċ/ω`.
    #[must_use]
    pub fn dcm(&self, omega: f64) -> Vector3<f64> {
        self.com_position + self.com_velocity / omega
    }
}

/// Natural frequency of the linear inverted pendulum, `ω = sqrt(g / h)`.
#[must_use]
pub fn lipm_omega(gravity: f64, com_height: f64) -> f64 {
    (gravity / com_height).sqrt()
}

/// Standard gravity used throughout the controller (m/s^2).
pub const GRAVITY: f64 = 9.81;
