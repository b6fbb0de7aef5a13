//! Cartesian PID bank.
//!
//! Two controllers share the contract "given a desired trajectory and the
//! measured state, produce a control acceleration": a per-axis linear PID and
//! a rotational PID defined directly on SO(3) (Olfati-Saber §5.11.6), where
//! the skew-symmetric part of `R R_dᵀ` carries the orientation error.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Extract the vector of the skew-symmetric part of a matrix,
/// `vex((M - Mᵀ) / 2)`.
fn vex_skew_part(m: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(
        0.5 * (m[(2, 1)] - m[(1, 2)]),
        0.5 * (m[(0, 2)] - m[(2, 0)]),
        0.5 * (m[(1, 0)] - m[(0, 1)]),
    )
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Per-axis linear PID producing a desired linear acceleration:
/// `a = a_d + kp ∘ (p_d - p) + kd ∘ (v_d - v)`.
#[derive(Clone, Debug)]
pub struct LinearPid {
    kp: Vector3<f64>,
    kd: Vector3<f64>,
}

impl LinearPid {
    /// Per-axis gains.
    #[must_use]
    pub const fn new(kp: Vector3<f64>, kd: Vector3<f64>) -> Self {
        Self { kp, kd }
    }

    /// Scalar gains applied to every axis.
    #[must_use]
    pub fn uniform(kp: f64, kd: f64) -> Self {
        Self::new(Vector3::from_element(kp), Vector3::from_element(kd))
    }

    /// Evaluate the control acceleration.
    #[must_use]
    pub fn control(
        &self,
        desired_acceleration: &Vector3<f64>,
        desired_velocity: &Vector3<f64>,
        desired_position: &Vector3<f64>,
        velocity: &Vector3<f64>,
        position: &Vector3<f64>,
    ) -> Vector3<f64> {
        desired_acceleration
            + self.kp.component_mul(&(desired_position - position))
            + self.kd.component_mul(&(desired_velocity - velocity))
    }
}

/// Rotational PID on SO(3) producing a desired angular acceleration.
///
/// With `E = R R_dᵀ`:
/// ```text
/// α = ω̇_d - c0 · vex((E - Eᵀ)/2)
///         - c1 · vex((S(ω) E - E S(ω))/2)
///         - c2 · (ω - E ω_d)
/// ```
/// `c0` is the attitude stiffness on the skew part of `E`, `c1` acts on its
/// time derivative, and `c2` damps the velocity error against the desired
/// velocity transported through `E`. Gains are positive scalars.
#[derive(Clone, Debug)]
pub struct RotationalPid {
    c0: f64,
    c1: f64,
    c2: f64,
}

impl RotationalPid {
    #[must_use]
    pub const fn new(c0: f64, c1: f64, c2: f64) -> Self {
        Self { c0, c1, c2 }
    }

    #[must_use]
    pub fn from_gains(gains: [f64; 3]) -> Self {
        Self::new(gains[0], gains[1], gains[2])
    }

    /// Evaluate the control angular acceleration.
    #[must_use]
    pub fn control(
        &self,
        desired_acceleration: &Vector3<f64>,
        desired_velocity: &Vector3<f64>,
        desired_orientation: &Rotation3<f64>,
        velocity: &Vector3<f64>,
        orientation: &Rotation3<f64>,
    ) -> Vector3<f64> {
        let error_rotation = orientation * desired_orientation.inverse();
        let e = error_rotation.matrix();

        let error = vex_skew_part(e);
        let s_omega = skew(velocity);
        let dot_error = vex_skew_part(&(s_omega * e - e * s_omega));
        let transported_velocity = error_rotation * desired_velocity;

        desired_acceleration - self.c1 * dot_error - self.c2 * (velocity - transported_velocity)
            - self.c0 * error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_pid_zero_error_passes_feedforward() {
        let pid = LinearPid::uniform(100.0, 20.0);
        let a_ff = Vector3::new(0.1, 0.0, -0.2);
        let out = pid.control(
            &a_ff,
            &Vector3::zeros(),
            &Vector3::new(1.0, 2.0, 3.0),
            &Vector3::zeros(),
            &Vector3::new(1.0, 2.0, 3.0),
        );
        assert_relative_eq!(out, a_ff, epsilon = 1e-12);
    }

    #[test]
    fn linear_pid_position_error() {
        let pid = LinearPid::uniform(100.0, 20.0);
        let out = pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &Vector3::new(0.1, 0.0, 0.0),
            &Vector3::zeros(),
            &Vector3::zeros(),
        );
        // a = kp * error = 100 * 0.1
        assert_relative_eq!(out.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(out.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_pid_per_axis_gains() {
        let pid = LinearPid::new(Vector3::new(10.0, 20.0, 30.0), Vector3::zeros());
        let out = pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &Vector3::new(1.0, 1.0, 1.0),
            &Vector3::zeros(),
            &Vector3::zeros(),
        );
        assert_relative_eq!(out, Vector3::new(10.0, 20.0, 30.0), epsilon = 1e-12);
    }

    #[test]
    fn rotational_pid_aligned_is_feedforward_only() {
        let pid = RotationalPid::new(50.0, 1.0, 14.0);
        let desired = Rotation3::from_euler_angles(0.1, -0.2, 0.3);
        let alpha_ff = Vector3::new(0.0, 0.5, 0.0);
        let out = pid.control(
            &alpha_ff,
            &Vector3::zeros(),
            &desired,
            &Vector3::zeros(),
            &desired.clone(),
        );
        assert_relative_eq!(out, alpha_ff, epsilon = 1e-10);
    }

    #[test]
    fn rotational_pid_restores_small_yaw_error() {
        let pid = RotationalPid::new(50.0, 1.0, 14.0);
        let desired = Rotation3::identity();
        let actual = Rotation3::from_euler_angles(0.0, 0.0, 0.05);
        let out = pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &desired,
            &Vector3::zeros(),
            &actual,
        );
        // Positive yaw error must command a negative yaw acceleration
        assert!(out.z < 0.0, "yaw acceleration should oppose the error");
        // Small-angle: error ~ sin(0.05) about z, alpha ~ -c0 * 0.05
        assert_relative_eq!(out.z, -50.0 * 0.05, epsilon = 0.01);
    }

    #[test]
    fn rotational_pid_damps_velocity_error() {
        let pid = RotationalPid::new(0.0, 0.0, 14.0);
        let desired = Rotation3::identity();
        let out = pid.control(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &desired,
            &Vector3::new(0.0, 0.0, 1.0),
            &desired.clone(),
        );
        assert_relative_eq!(out.z, -14.0, epsilon = 1e-10);
    }

    #[test]
    fn rotational_pid_transports_desired_velocity() {
        // With zero gains except c2, a matching velocity yields zero output
        // even across an orientation error, because omega_d is transported.
        let pid = RotationalPid::new(0.0, 0.0, 14.0);
        let desired = Rotation3::identity();
        let actual = Rotation3::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let omega_d = Vector3::new(1.0, 0.0, 0.0);
        let transported = actual * omega_d;
        let out = pid.control(
            &Vector3::zeros(),
            &omega_d,
            &desired,
            &transported,
            &actual,
        );
        assert_relative_eq!(out.norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn vex_skew_part_recovers_vector() {
        let v = Vector3::new(0.3, -0.7, 1.1);
        let recovered = vex_skew_part(&skew(&v));
        assert_relative_eq!(recovered, v, epsilon = 1e-12);
    }
}
