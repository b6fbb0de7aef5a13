use thiserror::Error;

/// Top-level error type for the walking controller.
#[derive(Debug, Error)]
pub enum StriderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("State machine error: {0}")]
    Fsm(#[from] FsmError),
}

/// Configuration errors. Fatal at initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid sampling_time: {0} (must be > 0)")]
    InvalidSamplingTime(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Sensor and driver feedback errors.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Driver read exceeded its {budget_ms} ms budget")]
    ReadTimeout { budget_ms: u64 },

    #[error("Joint state dimension mismatch: expected {expected}, got {got}")]
    JointDimMismatch { expected: usize, got: usize },

    #[error("Vertical contact force {force:.3} N below minimum while in support")]
    ContactForceLost { force: f64 },

    #[error("Feedback contains a non-finite value in {signal}")]
    NonFinite { signal: &'static str },
}

/// QP assembly and solution errors.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("{solver} QP did not converge (status: {status})")]
    NotConverged { solver: &'static str, status: String },

    #[error("{solver} solution violates `{row}` by {violation:.4} (tolerance {tolerance})")]
    InfeasibleSolution {
        solver: &'static str,
        row: &'static str,
        violation: f64,
        tolerance: f64,
    },

    #[error("{solver} problem dimensions changed after initialization")]
    DimensionChanged { solver: &'static str },
}

/// Trajectory planner errors.
///
/// A missed deadline is non-fatal: the orchestrator holds the current
/// buffers and re-arms the request.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Planner response not ready at the splice deadline")]
    DeadlineMissed,

    #[error("Planner returned a bundle of {got} samples, shorter than the {expected}-sample splice tail")]
    BundleTooShort { expected: usize, got: usize },

    #[error("Planner worker disconnected")]
    Disconnected,

    #[error("Merge point {merge_point} is outside the trajectory (length {len})")]
    MergePointOutOfRange { merge_point: usize, len: usize },

    #[error("Planned sample {sample} has contact flags inconsistent with its weight split")]
    InconsistentSupport { sample: usize },
}

/// Rejected state-machine transitions. Non-fatal: the command returns false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsmError {
    #[error("prepare is only accepted in Configured or Stopped")]
    PrepareRejected,

    #[error("startWalking is only accepted in Prepared or Paused")]
    StartRejected,

    #[error("pauseWalking is only accepted while Walking")]
    PauseRejected,

    #[error("stopWalking is only accepted while Walking or Paused")]
    StopRejected,

    #[error("setGoal is only accepted while Walking")]
    GoalRejected,
}
