//! Handshake with the external unicycle footstep planner.
//!
//! The planner itself is out of scope; the controller sees it through the
//! [`FootstepPlanner`] trait. [`PlannerHandle`] runs the planner on its own
//! worker thread behind a pair of bounded channels, so the control tick never
//! blocks on planning: the request is posted at the merge lookahead and the
//! response is polled non-blockingly at the splice deadline.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::warn;
use nalgebra::{Isometry3, Vector2};

use strider_core::config::TrajectoryPlannerConfig;
use strider_core::error::PlannerError;

use crate::bundle::TrajectoryBundle;

/// Min/max/nominal step durations handed to the planner (s).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepTimings {
    pub min: f64,
    pub max: f64,
    pub nominal: f64,
}

/// One planning request, posted at the merge lookahead.
#[derive(Clone, Debug)]
pub struct PlannerRequest {
    /// Controller time of the merge sample (s).
    pub initial_time: f64,
    /// Measured pose of the fixed foot at the merge sample.
    pub fixed_foot_pose: Isometry3<f64>,
    /// True when the left foot will be the swing foot.
    pub left_is_swinging: bool,
    /// Desired unicycle goal in the fixed-foot frame.
    pub goal: Vector2<f64>,
    /// Desired DCM position at the merge sample.
    pub dcm_position: Vector2<f64>,
    /// Desired DCM velocity at the merge sample.
    pub dcm_velocity: Vector2<f64>,
    /// Step timings modulated by the commanded speed, when enabled.
    pub step_timings: Option<StepTimings>,
    /// Ask the planner to close the gait with a terminal double-support step.
    pub terminal_step: bool,
}

/// The external unicycle planner + DCM sub-trajectory generator.
pub trait FootstepPlanner: Send {
    /// Produce a trajectory bundle starting at the request's merge sample.
    fn plan(&mut self, request: &PlannerRequest) -> Result<TrajectoryBundle, PlannerError>;
}

/// Worker-thread wrapper around a [`FootstepPlanner`].
pub struct PlannerHandle {
    requests: Sender<PlannerRequest>,
    responses: Receiver<Result<TrajectoryBundle, PlannerError>>,
    worker: Option<JoinHandle<()>>,
}

impl PlannerHandle {
    /// Spawn the planner on its own thread.
    #[must_use]
    pub fn spawn<P: FootstepPlanner + 'static>(mut planner: P) -> Self {
        let (request_tx, request_rx) = bounded::<PlannerRequest>(1);
        let (response_tx, response_rx) = bounded::<Result<TrajectoryBundle, PlannerError>>(1);

        let worker = thread::Builder::new()
            .name("strider-planner".into())
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    let result = planner.plan(&request);
                    if response_tx.send(result).is_err() {
                        break;
                    }
                }
            })
            .expect("spawning the planner thread");

        Self {
            requests: request_tx,
            responses: response_rx,
            worker: Some(worker),
        }
    }

    /// Post a request without blocking.
    ///
    /// A stale, uncollected response is discarded first: a new handoff
    /// implicitly cancels the previous plan.
    pub fn request(&self, request: PlannerRequest) -> Result<(), PlannerError> {
        while self.responses.try_recv().is_ok() {
            warn!("discarding a stale planner response");
        }
        match self.requests.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                // The worker is still chewing on the previous request; the new
                // goal will be re-posted by the next schedule cycle.
                warn!("planner busy, request dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PlannerError::Disconnected),
        }
    }

    /// Collect a finished plan without blocking.
    ///
    /// `Ok(None)` means the planner is still running.
    pub fn try_take(&self) -> Result<Option<TrajectoryBundle>, PlannerError> {
        match self.responses.try_recv() {
            Ok(Ok(bundle)) => Ok(Some(bundle)),
            Ok(Err(err)) => Err(err),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PlannerError::Disconnected),
        }
    }
}

impl Drop for PlannerHandle {
    fn drop(&mut self) {
        // Closing the request channel lets the worker's recv() return Err.
        let (closed_tx, _) = bounded(1);
        self.requests = closed_tx;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Interpolate step timings against the commanded speed.
///
/// Linear between the configured `[slow, fast]` endpoints, clamped outside.
/// Faster goals get shorter steps.
#[must_use]
pub fn modulated_step_timings(
    goal_speed: f64,
    config: &TrajectoryPlannerConfig,
) -> StepTimings {
    let [v_min, v_max] = config.velocity_endpoints;
    let t = ((goal_speed - v_min) / (v_max - v_min)).clamp(0.0, 1.0);
    let lerp = |slow: f64, fast: f64| slow + (fast - slow) * t;
    StepTimings {
        min: lerp(config.step_duration_slow[0], config.step_duration_fast[0]),
        max: lerp(config.step_duration_slow[1], config.step_duration_fast[1]),
        nominal: lerp(config.step_duration_slow[2], config.step_duration_fast[2]),
    }
}
