// strider-core: types, configuration, errors, and clock for the strider
// whole-body walking controller.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub mod prelude {
    pub use crate::{
        clock::ControlClock,
        config::ControllerConfig,
        error::{
            ConfigError, FeedbackError, FsmError, PlannerError, SolverError, StriderError,
        },
        types::{
            lipm_omega, JointLimits, KinematicsSnapshot, RobotState, SpatialAcceleration,
            SupportPhase, Twist, Wrench, GRAVITY,
        },
    };
}
