//! Stable LIPM reference integrator.
//!
//! Splitting the linear inverted pendulum `ẍ = ω²(x - z)` around the DCM
//! leaves the stable first-order subsystem `ċ = ω (ξ - c)`: driven by the
//! *desired* DCM it propagates the reference CoM trajectory consumed by the
//! inner ZMP–CoM loop.

use nalgebra::Vector2;

#[derive(Clone, Debug)]
pub struct LipmReference {
    com_position: Vector2<f64>,
    com_velocity: Vector2<f64>,
    initialized: bool,
}

impl LipmReference {
    #[must_use]
    pub fn new() -> Self {
        Self {
            com_position: Vector2::zeros(),
            com_velocity: Vector2::zeros(),
            initialized: false,
        }
    }

    /// Pin the reference CoM, typically to the measured CoM on start.
    pub fn reset(&mut self, com_position: Vector2<f64>) {
        self.com_position = com_position;
        self.com_velocity = Vector2::zeros();
        self.initialized = true;
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Integrate one control period with the desired DCM as input.
    pub fn integrate(&mut self, desired_dcm: &Vector2<f64>, omega: f64, dt: f64) {
        self.com_velocity = omega * (desired_dcm - self.com_position);
        self.com_position += self.com_velocity * dt;
    }

    #[must_use]
    pub fn com_position(&self) -> Vector2<f64> {
        self.com_position
    }

    #[must_use]
    pub fn com_velocity(&self) -> Vector2<f64> {
        self.com_velocity
    }
}

impl Default for LipmReference {
    fn default() -> Self {
        Self::new()
    }
}
