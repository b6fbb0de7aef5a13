// strider-trajectory: reference buffers, merge scheduling, and the planner
// handshake for the strider walking controller.

pub mod buffers;
pub mod bundle;
pub mod merge;
pub mod planner;
pub mod swing;

pub use buffers::{ReferenceBuffers, ReferenceSample};
pub use bundle::{standing_bundle, TrajectoryBundle};
pub use merge::{MergeAction, MergeScheduler, SPLICE_OFFSET};
pub use planner::{
    modulated_step_timings, FootstepPlanner, PlannerHandle, PlannerRequest, StepTimings,
};
pub use swing::SwingTrajectory;
