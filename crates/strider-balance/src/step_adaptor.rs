//! Step adaptor.
//!
//! During single support the upcoming footstep is re-optimized against the
//! measured DCM using the closed-form propagation
//!
//! ```text
//! ξ(T) = z₀ + e^{ωT} (ξ₀ - z₀)
//! ```
//!
//! Decision vector `[z*_x, z*_y, σ, b_x, b_y]` with `σ = e^{ωT*}`: the next
//! step's ZMP `z*`, the exponential of the adapted time-to-impact, and the
//! next-step DCM offset `b`. The landing condition `z* + b = ξ(T*)` is linear
//! in the decision variables, so a 5-variable QP re-solves every tick:
//! deviations from the nominal ZMP, timing, and offset are penalized, the ZMP
//! stays inside a reachability box, and `σ` inside the step-duration window.
//!
//! On failure the caller degrades to the nominal values.

use nalgebra::Vector2;

use strider_core::config::StepAdaptationConfig;
use strider_core::error::SolverError;

use crate::qp::DenseQp;

/// Inputs sampled at the current tick, all in world frame.
#[derive(Clone, Debug)]
pub struct StepAdaptorInput {
    /// Nominal ZMP of the upcoming step (planned landing point).
    pub nominal_zmp: Vector2<f64>,
    /// Nominal time from now until the planned impact (s).
    pub nominal_duration: f64,
    /// Nominal DCM offset at landing.
    pub nominal_dcm_offset: Vector2<f64>,
    /// Measured horizontal DCM.
    pub current_dcm: Vector2<f64>,
    /// ZMP of the stance foot.
    pub stance_zmp: Vector2<f64>,
    /// Time remaining in the current single support (s).
    pub remaining_single_support: f64,
    /// LIPM natural frequency.
    pub omega: f64,
}

/// Adapted step: where and when the swing foot should land.
#[derive(Clone, Copy, Debug)]
pub struct StepAdaptation {
    /// Adapted next-step ZMP.
    pub zmp: Vector2<f64>,
    /// Adapted time from now until impact (s).
    pub time_to_impact: f64,
    /// Adapted DCM offset at landing.
    pub dcm_offset: Vector2<f64>,
    /// Adapted landing position for the swing foot, `zmp + offset`.
    pub landing: Vector2<f64>,
}

impl StepAdaptation {
    /// The no-adaptation fallback: nominal values passed through.
    #[must_use]
    pub fn nominal(input: &StepAdaptorInput) -> Self {
        Self {
            zmp: input.nominal_zmp,
            time_to_impact: input.nominal_duration,
            dcm_offset: input.nominal_dcm_offset,
            landing: input.nominal_zmp + input.nominal_dcm_offset,
        }
    }
}

pub struct StepAdaptor {
    config: StepAdaptationConfig,
    max_iters: u32,
}

impl StepAdaptor {
    #[must_use]
    pub const fn new(config: StepAdaptationConfig, max_iters: u32) -> Self {
        Self { config, max_iters }
    }

    /// Re-optimize the upcoming step. Solved once per tick in single support.
    pub fn adapt(&self, input: &StepAdaptorInput) -> Result<StepAdaptation, SolverError> {
        let omega = input.omega;
        let sigma_nominal = (omega * input.nominal_duration).exp();

        // Decision vector [z_x, z_y, sigma, b_x, b_y]
        // Rows: 2 equalities (landing condition), then the ZMP box (4) and
        // the sigma window (2) as one-sided inequalities.
        let mut qp = DenseQp::new("step_adaptor", 5, 2, 6, self.max_iters);

        // --- Cost: stay near the nominal step ---
        let weights = [
            self.config.zmp_gain[0],
            self.config.zmp_gain[1],
            self.config.sigma_gain,
            self.config.offset_gain[0],
            self.config.offset_gain[1],
        ];
        let nominals = [
            input.nominal_zmp.x,
            input.nominal_zmp.y,
            sigma_nominal,
            input.nominal_dcm_offset.x,
            input.nominal_dcm_offset.y,
        ];
        for k in 0..5 {
            qp.hessian[(k, k)] = 2.0 * weights[k];
            qp.gradient[k] = -2.0 * weights[k] * nominals[k];
        }

        // --- Landing condition: z* + b - sigma (ξ₀ - z₀) = z₀ ---
        let dcm_gap = input.current_dcm - input.stance_zmp;
        for axis in 0..2 {
            qp.constraints[(axis, axis)] = 1.0; // z*
            qp.constraints[(axis, 2)] = -dcm_gap[axis]; // sigma
            qp.constraints[(axis, 3 + axis)] = 1.0; // b
            qp.bounds[axis] = input.stance_zmp[axis];
        }

        // --- Reachability box on the next-step ZMP ---
        for axis in 0..2 {
            let up = 2 + axis;
            let low = 4 + axis;
            qp.constraints[(up, axis)] = 1.0;
            qp.bounds[up] = nominals[axis] + self.config.zmp_tolerance[axis];
            qp.constraints[(low, axis)] = -1.0;
            qp.bounds[low] = -(nominals[axis] - self.config.zmp_tolerance[axis]);
        }

        // --- Step-duration window on sigma ---
        // The lower edge never asks for an impact before the remaining single
        // support allows (plus a 50 ms guard).
        let tol = self.config.duration_tolerance;
        let shortest = input.nominal_duration
            - tol.min(input.remaining_single_support)
            + 0.05;
        qp.constraints[(6, 2)] = 1.0;
        qp.bounds[6] = (omega * (input.nominal_duration + tol)).exp();
        qp.constraints[(7, 2)] = -1.0;
        qp.bounds[7] = -(omega * shortest).exp();

        let solution = qp.solve()?;
        qp.check_solution(&solution.x, 1e-4, row_label)?;

        let sigma = solution.x[2];
        let zmp = Vector2::new(solution.x[0], solution.x[1]);
        let dcm_offset = Vector2::new(solution.x[3], solution.x[4]);
        Ok(StepAdaptation {
            zmp,
            time_to_impact: sigma.ln() / omega,
            dcm_offset,
            landing: zmp + dcm_offset,
        })
    }
}

fn row_label(row: usize) -> &'static str {
    match row {
        0 | 1 => "landing_condition",
        2..=5 => "zmp_reachability",
        _ => "duration_window",
    }
}
