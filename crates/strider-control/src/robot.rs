//! Interfaces to the robot and its estimators.
//!
//! The controller never talks to hardware directly: encoders, wrench
//! sensors, the base estimator, and the forward-kinematics engine sit behind
//! these traits. Implementations live outside this crate (device drivers,
//! simulators, test mocks).

use std::time::Duration;

use nalgebra::{DVector, Isometry3, Vector2};

use strider_core::error::FeedbackError;
use strider_core::types::{JointLimits, KinematicsSnapshot, RobotState, Twist, Wrench};

/// Total vertical force below which a claimed support is treated as a sensor
/// fault or flight (N).
pub const MIN_TOTAL_VERTICAL_FORCE: f64 = 0.1;

/// Gain schedule phases for the low-level joint PIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainPhase {
    /// Both feet on the ground.
    DoubleSupport,
    /// Left foot swinging.
    SwingLeft,
    /// Right foot swinging.
    SwingRight,
}

/// Low-level joint driver: encoder read and command write.
pub trait JointDriver: Send {
    /// Number of actuated joints.
    fn n_joints(&self) -> usize;

    /// Joint limits as reported by the driver.
    fn joint_limits(&self) -> JointLimits;

    /// Read joint positions and velocities within `budget`.
    fn read_joint_state(
        &mut self,
        budget: Duration,
    ) -> Result<(DVector<f64>, DVector<f64>), FeedbackError>;

    /// Stream a torque command.
    fn send_torques(&mut self, torques: &DVector<f64>) -> Result<(), FeedbackError>;

    /// Stream a position command (Preparing and IK mode).
    fn send_positions(&mut self, positions: &DVector<f64>) -> Result<(), FeedbackError>;

    /// True once the last position command has completed (polled while
    /// Preparing).
    fn motion_done(&mut self) -> Result<bool, FeedbackError>;

    /// Switch the low-level PID gain schedule. Drivers without gain
    /// scheduling ignore this.
    fn set_gain_phase(&mut self, _phase: GainPhase) -> Result<(), FeedbackError> {
        Ok(())
    }
}

/// Foot force/torque sensor front-end.
pub trait WrenchSensors: Send {
    /// Left and right sole wrenches, world frame at the sole origins.
    fn read_wrenches(&mut self) -> Result<(Wrench, Wrench), FeedbackError>;
}

/// External floating-base estimator.
pub trait BaseEstimator: Send {
    fn read_base(&mut self) -> Result<(Isometry3<f64>, Twist), FeedbackError>;
}

/// External forward-kinematics / dynamics engine.
pub trait KinematicsEngine: Send {
    /// Build the per-tick snapshot from the measured state. `left_is_fixed`
    /// names the odometry frame when no base estimate is available.
    fn update(
        &mut self,
        state: &RobotState,
        left_is_fixed: bool,
    ) -> Result<KinematicsSnapshot, FeedbackError>;
}

/// External retargeting source for upper-body references.
pub trait RetargetingClient: Send {
    /// Per-joint posture overrides, `None` when idle.
    fn posture_override(&mut self) -> Option<DVector<f64>>;
}

/// Measured ZMP from both foot wrenches.
///
/// Per-foot centers of pressure are combined weighted by the vertical
/// forces. Fails when the total vertical force is below
/// [`MIN_TOTAL_VERTICAL_FORCE`] while at least one foot claims support.
pub fn measured_zmp(
    left_wrench: &Wrench,
    right_wrench: &Wrench,
    left_pose: &Isometry3<f64>,
    right_pose: &Isometry3<f64>,
) -> Result<Vector2<f64>, FeedbackError> {
    let total_fz = left_wrench.force.z + right_wrench.force.z;
    if total_fz < MIN_TOTAL_VERTICAL_FORCE {
        return Err(FeedbackError::ContactForceLost { force: total_fz });
    }

    let mut zmp = Vector2::zeros();
    for (wrench, pose) in [(left_wrench, left_pose), (right_wrench, right_pose)] {
        if let Some(cop) = wrench.local_cop(MIN_TOTAL_VERTICAL_FORCE) {
            let world_cop = Vector2::new(
                pose.translation.x + cop.x,
                pose.translation.y + cop.y,
            );
            zmp += world_cop * wrench.force.z;
        }
    }
    Ok(zmp / total_fz)
}
