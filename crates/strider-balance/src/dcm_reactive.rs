//! Reactive DCM controller.
//!
//! Outer balance loop: a PD-plus-integral law on the 3D DCM tracking error
//! producing the Virtual Repellent Point,
//!
//! ```text
//! VRP = ξ_d - ξ̇_d/ω + kp (ξ - ξ_d) + ki ∫(ξ - ξ_d)
//! ```
//!
//! Downstream the VRP is projected to the ground plane as the desired ZMP.

use nalgebra::Vector3;

use strider_core::config::DcmReactiveConfig;

#[derive(Clone, Debug)]
pub struct DcmReactiveController {
    kp: f64,
    ki: f64,
    integral_limit: f64,
    integral: Vector3<f64>,
}

impl DcmReactiveController {
    #[must_use]
    pub fn new(config: &DcmReactiveConfig) -> Self {
        Self {
            kp: config.kp,
            ki: config.ki,
            integral_limit: config.integral_limit,
            integral: Vector3::zeros(),
        }
    }

    /// Evaluate the desired VRP.
    ///
    /// `dt` advances the error integral; the integral is clamped per axis
    /// against windup.
    pub fn control(
        &mut self,
        desired_dcm: &Vector3<f64>,
        desired_dcm_velocity: &Vector3<f64>,
        measured_dcm: &Vector3<f64>,
        omega: f64,
        dt: f64,
    ) -> Vector3<f64> {
        let error = measured_dcm - desired_dcm;

        self.integral += error * dt;
        self.integral = self.integral.map(|v| v.clamp(-self.integral_limit, self.integral_limit));

        desired_dcm - desired_dcm_velocity / omega + self.kp * error + self.ki * self.integral
    }

    /// Clear the error integral. Called on start and on stop.
    pub fn reset(&mut self) {
        self.integral = Vector3::zeros();
    }
}
