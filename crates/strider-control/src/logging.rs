//! Best-effort data logging.
//!
//! One [`LogSample`] per tick is pushed onto a bounded channel with
//! `try_send`: a slow or absent consumer drops samples instead of stalling
//! the control thread.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use nalgebra::{DVector, Isometry3, Vector2, Vector3};

use strider_core::types::Wrench;

/// Everything the logger sees each tick.
#[derive(Clone, Debug)]
pub struct LogSample {
    /// Controller time (s).
    pub time: f64,
    pub measured_dcm: Vector3<f64>,
    pub desired_dcm: Vector3<f64>,
    pub desired_vrp: Vector3<f64>,
    pub measured_com: Vector3<f64>,
    pub desired_com: Vector3<f64>,
    pub measured_zmp: Vector2<f64>,
    pub desired_zmp: Vector2<f64>,
    pub left_foot_measured: Isometry3<f64>,
    pub left_foot_desired: Isometry3<f64>,
    pub right_foot_measured: Isometry3<f64>,
    pub right_foot_desired: Isometry3<f64>,
    pub left_wrench_measured: Wrench,
    pub right_wrench_measured: Wrench,
    pub left_wrench_desired: Option<Wrench>,
    pub right_wrench_desired: Option<Wrench>,
    pub desired_torques: Option<DVector<f64>>,
    /// Neck yaw error (rad).
    pub neck_yaw_error: f64,
}

/// Control-thread side of the log channel.
#[derive(Clone, Debug)]
pub struct LogPublisher {
    sender: Sender<LogSample>,
    dropped: u64,
}

impl LogPublisher {
    /// Create a publisher/receiver pair with the given queue depth.
    #[must_use]
    pub fn channel(depth: usize) -> (Self, Receiver<LogSample>) {
        let (sender, receiver) = bounded(depth);
        (Self { sender, dropped: 0 }, receiver)
    }

    /// Push a sample, dropping it if the consumer lags.
    pub fn publish(&mut self, sample: LogSample) {
        match self.sender.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }

    /// Samples dropped so far.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
