//! Bench rig: ideal stand-ins for the robot-side interfaces.
//!
//! Lets the controller run on a desk with no hardware attached: encoders
//! echo the last command, wrench sensors report a balanced stance, and the
//! kinematics engine models the trunk as a single rigid body with both feet
//! planted. Replace these with real device bindings for deployment.

use std::time::Duration;

use nalgebra::{DMatrix, DVector, Isometry3, UnitQuaternion, Vector3};

use strider_core::error::{FeedbackError, PlannerError};
use strider_core::types::{
    JointLimits, KinematicsSnapshot, RobotState, SpatialAcceleration, Twist, Wrench, GRAVITY,
};
use strider_control::{JointDriver, KinematicsEngine, WrenchSensors};
use strider_trajectory::{standing_bundle, FootstepPlanner, PlannerRequest, TrajectoryBundle};

pub const N_JOINTS: usize = 23;
pub const MASS: f64 = 33.0;
pub const COM_HEIGHT: f64 = 0.53;
const FOOT_Y: f64 = 0.07;

/// Joint driver echoing commands back as measurements.
pub struct RigDriver {
    positions: DVector<f64>,
    motion_countdown: usize,
}

impl RigDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            positions: DVector::zeros(N_JOINTS),
            motion_countdown: 0,
        }
    }
}

impl JointDriver for RigDriver {
    fn n_joints(&self) -> usize {
        N_JOINTS
    }

    fn joint_limits(&self) -> JointLimits {
        JointLimits::uniform(N_JOINTS, 2.5, 6.0, 80.0)
    }

    fn read_joint_state(
        &mut self,
        _budget: Duration,
    ) -> Result<(DVector<f64>, DVector<f64>), FeedbackError> {
        Ok((self.positions.clone(), DVector::zeros(N_JOINTS)))
    }

    fn send_torques(&mut self, _torques: &DVector<f64>) -> Result<(), FeedbackError> {
        Ok(())
    }

    fn send_positions(&mut self, positions: &DVector<f64>) -> Result<(), FeedbackError> {
        self.positions = positions.clone();
        self.motion_countdown = 3;
        Ok(())
    }

    fn motion_done(&mut self) -> Result<bool, FeedbackError> {
        self.motion_countdown = self.motion_countdown.saturating_sub(1);
        Ok(self.motion_countdown == 0)
    }
}

/// Wrench sensors reporting a balanced double support.
pub struct RigWrenchSensors;

impl WrenchSensors for RigWrenchSensors {
    fn read_wrenches(&mut self) -> Result<(Wrench, Wrench), FeedbackError> {
        let half = Wrench {
            force: Vector3::new(0.0, 0.0, 0.5 * MASS * GRAVITY),
            torque: Vector3::zeros(),
        };
        Ok((half, half))
    }
}

/// Rigid-trunk kinematics: both feet are extensions of the base.
pub struct RigKinematics;

impl KinematicsEngine for RigKinematics {
    fn update(
        &mut self,
        _state: &RobotState,
        _left_is_fixed: bool,
    ) -> Result<KinematicsSnapshot, FeedbackError> {
        let nv = N_JOINTS + 6;
        let mut mass_matrix = DMatrix::zeros(nv, nv);
        for k in 0..3 {
            mass_matrix[(k, k)] = MASS;
        }
        for k in 3..6 {
            mass_matrix[(k, k)] = 2.5;
        }
        for j in 6..nv {
            mass_matrix[(j, j)] = 0.15;
        }
        let mut bias = DVector::zeros(nv);
        bias[2] = MASS * GRAVITY;

        let mut base_jacobian = DMatrix::zeros(6, nv);
        for k in 0..6 {
            base_jacobian[(k, k)] = 1.0;
        }
        let mut com_jacobian = DMatrix::zeros(3, nv);
        for k in 0..3 {
            com_jacobian[(k, k)] = 1.0;
        }
        let mut neck_jacobian = DMatrix::zeros(3, nv);
        for k in 0..3 {
            neck_jacobian[(k, 3 + k)] = 1.0;
        }

        Ok(KinematicsSnapshot {
            mass_matrix,
            bias_forces: bias,
            left_foot_pose: Isometry3::translation(0.0, FOOT_Y, 0.0),
            right_foot_pose: Isometry3::translation(0.0, -FOOT_Y, 0.0),
            left_foot_twist: Twist::zero(),
            right_foot_twist: Twist::zero(),
            left_foot_jacobian: base_jacobian.clone(),
            right_foot_jacobian: base_jacobian,
            left_foot_bias_acceleration: SpatialAcceleration::zero(),
            right_foot_bias_acceleration: SpatialAcceleration::zero(),
            neck_orientation: UnitQuaternion::identity(),
            neck_angular_velocity: Vector3::zeros(),
            neck_jacobian,
            neck_bias_acceleration: Vector3::zeros(),
            com_position: Vector3::new(0.0, 0.0, COM_HEIGHT),
            com_velocity: Vector3::zeros(),
            com_jacobian,
            com_bias_acceleration: Vector3::zeros(),
            angular_momentum: Vector3::zeros(),
            total_mass: MASS,
        })
    }
}

/// Placeholder planner until a unicycle planner binding is wired in: every
/// request yields a standing block anchored at the bench feet.
pub struct RigPlanner;

impl FootstepPlanner for RigPlanner {
    fn plan(&mut self, _request: &PlannerRequest) -> Result<TrajectoryBundle, PlannerError> {
        let mut bundle = standing_bundle(
            Isometry3::translation(0.0, FOOT_Y, 0.0),
            Isometry3::translation(0.0, -FOOT_Y, 0.0),
            COM_HEIGHT,
            120,
        );
        bundle.merge_points = vec![0, 30, 60, 90];
        Ok(bundle)
    }
}
