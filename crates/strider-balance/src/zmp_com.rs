//! Inner ZMP–CoM controller.
//!
//! Converts the desired ZMP from the outer DCM loop plus the LIPM reference
//! into a CoM velocity command,
//!
//! ```text
//! v_cmd = v_ref - k_zmp ∘ (z - z_d) + k_com ∘ (c_ref - c)
//! ```
//!
//! and integrates it at dT into the CoM position command. While standing
//! (the desired DCM velocity norm falls under 1e-3) both gains are scaled
//! down to suppress drift around the measured ZMP noise floor.

use nalgebra::Vector2;

use strider_core::config::ZmpControllerConfig;

#[derive(Clone, Debug)]
pub struct ZmpComController {
    k_zmp: Vector2<f64>,
    k_com: Vector2<f64>,
    stance_gain_scale: f64,
    stance_phase: bool,
    position_command: Option<Vector2<f64>>,
}

impl ZmpComController {
    #[must_use]
    pub fn new(config: &ZmpControllerConfig) -> Self {
        Self {
            k_zmp: Vector2::new(config.k_zmp[0], config.k_zmp[1]),
            k_com: Vector2::new(config.k_com[0], config.k_com[1]),
            stance_gain_scale: config.stance_gain_scale,
            stance_phase: false,
            position_command: None,
        }
    }

    /// Mark the stance phase: gains are scaled by `stance_gain_scale`.
    pub fn set_phase(&mut self, stance: bool) {
        self.stance_phase = stance;
    }

    #[must_use]
    pub const fn stance_phase(&self) -> bool {
        self.stance_phase
    }

    /// Evaluate the CoM command.
    ///
    /// The position command integrates from the measured CoM of the first
    /// evaluation after a [`reset`](Self::reset).
    pub fn control(
        &mut self,
        measured_zmp: &Vector2<f64>,
        measured_com: &Vector2<f64>,
        desired_zmp: &Vector2<f64>,
        com_position_ref: &Vector2<f64>,
        com_velocity_ref: &Vector2<f64>,
        dt: f64,
    ) -> (Vector2<f64>, Vector2<f64>) {
        let scale = if self.stance_phase {
            self.stance_gain_scale
        } else {
            1.0
        };

        let velocity_command = com_velocity_ref
            - scale * self.k_zmp.component_mul(&(measured_zmp - desired_zmp))
            + scale * self.k_com.component_mul(&(com_position_ref - measured_com));

        let position = self.position_command.get_or_insert(*measured_com);
        *position += velocity_command * dt;

        (*position, velocity_command)
    }

    /// Forget the integrated position command; the next evaluation restarts
    /// from the measured CoM.
    pub fn reset(&mut self) {
        self.position_command = None;
        self.stance_phase = false;
    }
}
