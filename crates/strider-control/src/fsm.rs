//! Walking finite state machine.
//!
//! ```text
//! Configured ── prepare ──> Preparing ── motion done ──> Prepared
//! Prepared ── start ──> Walking <── start ── Paused
//! Walking ── pause ──> Paused
//! Walking | Paused ── stop ──> Stopped ── prepare ──> Preparing
//! any ── failure ──> Stopped
//! ```
//!
//! Rejected commands are reported to the caller and change nothing.

use strider_core::error::FsmError;

/// Controller lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkingState {
    /// Configuration accepted, robot untouched.
    Configured,
    /// Driving the joints to the initial posture.
    Preparing,
    /// Initial posture reached, buffers primed.
    Prepared,
    /// Closed-loop walking.
    Walking,
    /// Walking suspended; buffers and gains retained.
    Paused,
    /// Controllers cleared; a new prepare is required.
    Stopped,
}

#[derive(Clone, Copy, Debug)]
pub struct WalkingFsm {
    state: WalkingState,
}

impl WalkingFsm {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: WalkingState::Configured,
        }
    }

    #[must_use]
    pub const fn state(&self) -> WalkingState {
        self.state
    }

    #[must_use]
    pub const fn is_walking(&self) -> bool {
        matches!(self.state, WalkingState::Walking)
    }

    /// `prepareRobot` command.
    pub fn prepare(&mut self) -> Result<(), FsmError> {
        match self.state {
            WalkingState::Configured | WalkingState::Stopped => {
                self.state = WalkingState::Preparing;
                Ok(())
            }
            _ => Err(FsmError::PrepareRejected),
        }
    }

    /// The position ramp completed.
    pub fn preparation_done(&mut self) {
        if self.state == WalkingState::Preparing {
            self.state = WalkingState::Prepared;
        }
    }

    /// `startWalking` command.
    pub fn start(&mut self) -> Result<(), FsmError> {
        match self.state {
            WalkingState::Prepared | WalkingState::Paused => {
                self.state = WalkingState::Walking;
                Ok(())
            }
            _ => Err(FsmError::StartRejected),
        }
    }

    /// `pauseWalking` command.
    pub fn pause(&mut self) -> Result<(), FsmError> {
        match self.state {
            WalkingState::Walking => {
                self.state = WalkingState::Paused;
                Ok(())
            }
            _ => Err(FsmError::PauseRejected),
        }
    }

    /// `stopWalking` command.
    pub fn stop(&mut self) -> Result<(), FsmError> {
        match self.state {
            WalkingState::Walking | WalkingState::Paused => {
                self.state = WalkingState::Stopped;
                Ok(())
            }
            _ => Err(FsmError::StopRejected),
        }
    }

    /// A fatal tick error: everything lands in Stopped.
    pub fn fail(&mut self) {
        self.state = WalkingState::Stopped;
    }
}

impl Default for WalkingFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_walk_cycle() {
        let mut fsm = WalkingFsm::new();
        assert_eq!(fsm.state(), WalkingState::Configured);

        fsm.prepare().unwrap();
        assert_eq!(fsm.state(), WalkingState::Preparing);
        fsm.preparation_done();
        assert_eq!(fsm.state(), WalkingState::Prepared);
        fsm.start().unwrap();
        assert!(fsm.is_walking());
        fsm.pause().unwrap();
        assert_eq!(fsm.state(), WalkingState::Paused);
        fsm.start().unwrap();
        assert!(fsm.is_walking());
        fsm.stop().unwrap();
        assert_eq!(fsm.state(), WalkingState::Stopped);
    }

    #[test]
    fn start_requires_prepared_or_paused() {
        let mut fsm = WalkingFsm::new();
        assert_eq!(fsm.start(), Err(FsmError::StartRejected));
        fsm.prepare().unwrap();
        assert_eq!(fsm.start(), Err(FsmError::StartRejected));
    }

    #[test]
    fn pause_requires_walking() {
        let mut fsm = WalkingFsm::new();
        assert_eq!(fsm.pause(), Err(FsmError::PauseRejected));
    }

    #[test]
    fn stop_from_paused_is_allowed() {
        let mut fsm = WalkingFsm::new();
        fsm.prepare().unwrap();
        fsm.preparation_done();
        fsm.start().unwrap();
        fsm.pause().unwrap();
        fsm.stop().unwrap();
        assert_eq!(fsm.state(), WalkingState::Stopped);
    }

    #[test]
    fn prepare_again_after_stop() {
        let mut fsm = WalkingFsm::new();
        fsm.prepare().unwrap();
        fsm.preparation_done();
        fsm.start().unwrap();
        fsm.stop().unwrap();
        assert!(fsm.prepare().is_ok());
        assert_eq!(fsm.state(), WalkingState::Preparing);
    }

    #[test]
    fn prepare_while_walking_is_rejected() {
        let mut fsm = WalkingFsm::new();
        fsm.prepare().unwrap();
        fsm.preparation_done();
        fsm.start().unwrap();
        assert_eq!(fsm.prepare(), Err(FsmError::PrepareRejected));
    }

    #[test]
    fn failure_rolls_back_to_stopped() {
        let mut fsm = WalkingFsm::new();
        fsm.prepare().unwrap();
        fsm.fail();
        assert_eq!(fsm.state(), WalkingState::Stopped);
    }

    #[test]
    fn preparation_done_outside_preparing_is_inert() {
        let mut fsm = WalkingFsm::new();
        fsm.preparation_done();
        assert_eq!(fsm.state(), WalkingState::Configured);
    }
}
