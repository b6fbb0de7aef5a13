// strider-control: the walking FSM, per-tick orchestration, and the
// interfaces the controller expects from the robot.

pub mod fsm;
pub mod logging;
pub mod orchestrator;
pub mod robot;

pub use fsm::{WalkingFsm, WalkingState};
pub use logging::{LogPublisher, LogSample};
pub use orchestrator::WalkingController;
pub use robot::{
    measured_zmp, BaseEstimator, GainPhase, JointDriver, KinematicsEngine, RetargetingClient,
    WrenchSensors, MIN_TOTAL_VERTICAL_FORCE,
};
