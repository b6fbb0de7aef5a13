//! Controller configuration, loaded from a hierarchical TOML file.
//!
//! One struct per configuration group; every field carries a serde default so
//! partial files stay valid, and [`ControllerConfig::validate`] rejects the
//! combinations the controller cannot run with.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_sampling_time() -> f64 {
    0.016
}
fn default_name() -> String {
    "strider".into()
}
const fn default_step_height() -> f64 {
    0.035
}
const fn default_merge_lookahead() -> usize {
    10
}
const fn default_planner_deadline() -> usize {
    8
}
const fn default_velocity_endpoints() -> [f64; 2] {
    [0.05, 0.35]
}
const fn default_step_duration_ini() -> [f64; 3] {
    [0.7, 1.3, 1.0]
}
const fn default_step_duration_final() -> [f64; 3] {
    [0.5, 0.9, 0.7]
}
const fn default_zmp_cost_gain() -> [f64; 2] {
    [1.0, 1.0]
}
const fn default_sigma_cost_gain() -> f64 {
    5.0
}
const fn default_offset_cost_gain() -> [f64; 2] {
    [5.0, 5.0]
}
const fn default_zmp_tolerance() -> [f64; 2] {
    [0.05, 0.02]
}
const fn default_duration_tolerance() -> f64 {
    0.25
}
const fn default_mpc_horizon() -> usize {
    30
}
const fn default_mpc_state_weight() -> [f64; 2] {
    [10.0, 10.0]
}
const fn default_mpc_input_weight() -> [f64; 2] {
    [1.0, 1.0]
}
const fn default_max_solver_iters() -> u32 {
    200
}
const fn default_dcm_kp() -> f64 {
    1.2
}
const fn default_dcm_ki() -> f64 {
    0.0
}
const fn default_dcm_integral_limit() -> f64 {
    0.05
}
const fn default_k_zmp() -> [f64; 2] {
    [1.2, 1.2]
}
const fn default_k_com() -> [f64; 2] {
    [4.0, 4.0]
}
const fn default_stance_gain_scale() -> f64 {
    0.5
}
const fn default_k_u() -> f64 {
    0.5
}
const fn default_k_b() -> f64 {
    0.5
}
const fn default_ik_foot_gain() -> f64 {
    2.0
}
const fn default_ik_posture_gain() -> f64 {
    1.0
}
const fn default_joint_reg_weight() -> f64 {
    0.5
}
const fn default_com_weight() -> f64 {
    10.0
}
const fn default_com_kp() -> f64 {
    50.0
}
const fn default_com_kd() -> f64 {
    14.0
}
const fn default_feet_kp() -> f64 {
    250.0
}
const fn default_feet_kd() -> f64 {
    30.0
}
const fn default_swing_weight() -> f64 {
    100.0
}
const fn default_rot_gains() -> [f64; 3] {
    [50.0, 1.0, 14.0]
}
const fn default_zmp_cop_gain() -> f64 {
    1.0
}
const fn default_friction() -> f64 {
    0.5
}
const fn default_friction_facets() -> usize {
    4
}
const fn default_torsional_friction() -> f64 {
    0.013
}
const fn default_foot_limits_x() -> [f64; 2] {
    [-0.06, 0.10]
}
const fn default_foot_limits_y() -> [f64; 2] {
    [-0.04, 0.04]
}
const fn default_min_normal_force() -> f64 {
    10.0
}
const fn default_neck_weight() -> f64 {
    5.0
}
const fn default_torque_reg_weight() -> f64 {
    0.05
}
const fn default_force_scale() -> f64 {
    0.02
}
const fn default_force_offset() -> f64 {
    0.001
}
const fn default_torque_rate() -> f64 {
    150.0
}
const fn default_momentum_gain() -> f64 {
    1.0
}
const fn default_admittance_kp() -> f64 {
    120.0
}
const fn default_admittance_kd() -> f64 {
    22.0
}
const fn default_force_feedback_gain() -> f64 {
    0.005
}
const fn default_torque_feedback_gain() -> f64 {
    0.01
}
const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Configuration groups
// ---------------------------------------------------------------------------

/// `[general]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Control period dT in seconds.
    #[serde(default = "default_sampling_time")]
    pub sampling_time: f64,
    /// Module name, used in log lines.
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sampling_time: default_sampling_time(),
            name: default_name(),
        }
    }
}

/// `[trajectory_planner]` group: inputs forwarded to the external unicycle
/// planner plus the merge scheduling constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryPlannerConfig {
    /// Swing apex height above the ground (m).
    #[serde(default = "default_step_height")]
    pub step_height: f64,
    /// Samples ahead of "now" at which a fresh plan is spliced when no
    /// merge point is available.
    #[serde(default = "default_merge_lookahead")]
    pub merge_lookahead: usize,
    /// Planner budget in samples; a plan not ready after this many ticks
    /// counts as a miss.
    #[serde(default = "default_planner_deadline")]
    pub planner_deadline: usize,
    /// `[min, max]` commanded speed (m/s) between which step timings are
    /// interpolated.
    #[serde(default = "default_velocity_endpoints")]
    pub velocity_endpoints: [f64; 2],
    /// `[min, max, nominal]` step durations at the low-speed endpoint (s).
    #[serde(default = "default_step_duration_ini")]
    pub step_duration_slow: [f64; 3],
    /// `[min, max, nominal]` step durations at the high-speed endpoint (s).
    #[serde(default = "default_step_duration_final")]
    pub step_duration_fast: [f64; 3],
    /// Enable speed-dependent step-timing modulation.
    #[serde(default = "default_true")]
    pub velocity_modulation: bool,
}

impl Default for TrajectoryPlannerConfig {
    fn default() -> Self {
        Self {
            step_height: default_step_height(),
            merge_lookahead: default_merge_lookahead(),
            planner_deadline: default_planner_deadline(),
            velocity_endpoints: default_velocity_endpoints(),
            step_duration_slow: default_step_duration_ini(),
            step_duration_fast: default_step_duration_final(),
            velocity_modulation: default_true(),
        }
    }
}

/// `[step_adaptation]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAdaptationConfig {
    /// Cost on deviating from the nominal next-step ZMP, per axis.
    #[serde(default = "default_zmp_cost_gain")]
    pub zmp_gain: [f64; 2],
    /// Cost on deviating from the nominal step timing (on `e^{omega T}`).
    #[serde(default = "default_sigma_cost_gain")]
    pub sigma_gain: f64,
    /// Cost on deviating from the nominal DCM offset, per axis.
    #[serde(default = "default_offset_cost_gain")]
    pub offset_gain: [f64; 2],
    /// Reachability box half-widths around the nominal step ZMP (m).
    #[serde(default = "default_zmp_tolerance")]
    pub zmp_tolerance: [f64; 2],
    /// Allowed deviation from the nominal step duration (s).
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance: f64,
}

impl Default for StepAdaptationConfig {
    fn default() -> Self {
        Self {
            zmp_gain: default_zmp_cost_gain(),
            sigma_gain: default_sigma_cost_gain(),
            offset_gain: default_offset_cost_gain(),
            zmp_tolerance: default_zmp_tolerance(),
            duration_tolerance: default_duration_tolerance(),
        }
    }
}

/// `[dcm_mpc]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcmMpcConfig {
    /// Prediction horizon in samples.
    #[serde(default = "default_mpc_horizon")]
    pub horizon: usize,
    /// DCM tracking weight, per axis.
    #[serde(default = "default_mpc_state_weight")]
    pub state_weight: [f64; 2],
    /// ZMP input regularization weight, per axis.
    #[serde(default = "default_mpc_input_weight")]
    pub input_weight: [f64; 2],
    /// Maximum interior-point iterations.
    #[serde(default = "default_max_solver_iters")]
    pub max_solver_iters: u32,
}

impl Default for DcmMpcConfig {
    fn default() -> Self {
        Self {
            horizon: default_mpc_horizon(),
            state_weight: default_mpc_state_weight(),
            input_weight: default_mpc_input_weight(),
            max_solver_iters: default_max_solver_iters(),
        }
    }
}

/// `[dcm_reactive]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcmReactiveConfig {
    /// Proportional gain on the DCM error.
    #[serde(default = "default_dcm_kp")]
    pub kp: f64,
    /// Integral gain on the DCM error.
    #[serde(default = "default_dcm_ki")]
    pub ki: f64,
    /// Anti-windup clamp on the integrated error (m·s).
    #[serde(default = "default_dcm_integral_limit")]
    pub integral_limit: f64,
}

impl Default for DcmReactiveConfig {
    fn default() -> Self {
        Self {
            kp: default_dcm_kp(),
            ki: default_dcm_ki(),
            integral_limit: default_dcm_integral_limit(),
        }
    }
}

/// `[zmp_controller]` group: the inner ZMP–CoM loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZmpControllerConfig {
    /// Gain on the ZMP error, per axis.
    #[serde(default = "default_k_zmp")]
    pub k_zmp: [f64; 2],
    /// Gain on the CoM error, per axis.
    #[serde(default = "default_k_com")]
    pub k_com: [f64; 2],
    /// Gain multiplier applied while standing (‖desired DCM velocity‖ < 1e-3).
    #[serde(default = "default_stance_gain_scale")]
    pub stance_gain_scale: f64,
}

impl Default for ZmpControllerConfig {
    fn default() -> Self {
        Self {
            k_zmp: default_k_zmp(),
            k_com: default_k_com(),
            stance_gain_scale: default_stance_gain_scale(),
        }
    }
}

/// `[inverse_kinematics]` group: the velocity-IK QP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverseKinematicsConfig {
    /// Treat the CoM velocity as a hard constraint instead of a cost.
    #[serde(default)]
    pub use_com_as_constraint: bool,
    /// Upper joint-limit sharpness in the tanh velocity shaping.
    #[serde(default = "default_k_u")]
    pub k_u: f64,
    /// Lower joint-limit sharpness in the tanh velocity shaping.
    #[serde(default = "default_k_b")]
    pub k_b: f64,
    /// Weight on the joint-posture regularization cost.
    #[serde(default = "default_joint_reg_weight")]
    pub joint_regularization_weight: f64,
    /// Velocity-level feedback gain on the feet position error (1/s).
    #[serde(default = "default_ik_foot_gain")]
    pub foot_linear_gain: f64,
    /// Velocity-level feedback gain on the feet orientation error (1/s).
    #[serde(default = "default_ik_foot_gain")]
    pub foot_angular_gain: f64,
    /// Velocity-level feedback gain pulling the posture to its setpoint (1/s).
    #[serde(default = "default_ik_posture_gain")]
    pub posture_gain: f64,
    /// Weight on the CoM cost (ignored when it is a constraint).
    #[serde(default = "default_com_weight")]
    pub com_weight: f64,
    /// Weight on the neck orientation cost.
    #[serde(default = "default_neck_weight")]
    pub neck_weight: f64,
    /// Extra yaw (rad) composed onto the neck reference.
    #[serde(default)]
    pub additional_rotation: f64,
    /// Maximum interior-point iterations.
    #[serde(default = "default_max_solver_iters")]
    pub max_solver_iters: u32,
}

impl Default for InverseKinematicsConfig {
    fn default() -> Self {
        Self {
            use_com_as_constraint: false,
            k_u: default_k_u(),
            k_b: default_k_b(),
            joint_regularization_weight: default_joint_reg_weight(),
            foot_linear_gain: default_ik_foot_gain(),
            foot_angular_gain: default_ik_foot_gain(),
            posture_gain: default_ik_posture_gain(),
            com_weight: default_com_weight(),
            neck_weight: default_neck_weight(),
            additional_rotation: 0.0,
            max_solver_iters: default_max_solver_iters(),
        }
    }
}

/// `[com_task]` group for the torque QP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComTaskConfig {
    #[serde(default = "default_com_kp")]
    pub kp: f64,
    #[serde(default = "default_com_kd")]
    pub kd: f64,
    /// Track only the vertical CoM channel (the horizontal channels are then
    /// governed by the ZMP rows alone).
    #[serde(default)]
    pub control_only_height: bool,
}

impl Default for ComTaskConfig {
    fn default() -> Self {
        Self {
            kp: default_com_kp(),
            kd: default_com_kd(),
            control_only_height: false,
        }
    }
}

/// `[feet_task]` group: gains of the swing-foot tracking task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeetTaskConfig {
    /// Linear proportional gain.
    #[serde(default = "default_feet_kp")]
    pub kp: f64,
    /// Linear derivative gain.
    #[serde(default = "default_feet_kd")]
    pub kd: f64,
    /// Rotational gains `[c0, c1, c2]`.
    #[serde(default = "default_rot_gains")]
    pub rotational_gains: [f64; 3],
    /// Cost weight of the swing-foot tracking task in the torque QP.
    #[serde(default = "default_swing_weight")]
    pub swing_weight: f64,
}

impl Default for FeetTaskConfig {
    fn default() -> Self {
        Self {
            kp: default_feet_kp(),
            kd: default_feet_kd(),
            rotational_gains: default_rot_gains(),
            swing_weight: default_swing_weight(),
        }
    }
}

/// `[zmp_task]` group: gain of the CoP coupling rows in the torque QP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZmpTaskConfig {
    /// Feedback gain from the measured-vs-desired ZMP error onto the
    /// commanded CoP.
    #[serde(default = "default_zmp_cop_gain")]
    pub cop_gain: f64,
}

impl Default for ZmpTaskConfig {
    fn default() -> Self {
        Self {
            cop_gain: default_zmp_cop_gain(),
        }
    }
}

/// `[contact_forces]` group: force feasibility constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactForcesConfig {
    /// Coulomb static friction coefficient.
    #[serde(default = "default_friction")]
    pub static_friction: f64,
    /// Number of facets of the linearized friction cone.
    #[serde(default = "default_friction_facets")]
    pub friction_facets: usize,
    /// Torsional friction coefficient.
    #[serde(default = "default_torsional_friction")]
    pub torsional_friction: f64,
    /// Sole extent along x, `[back, front]`, in the sole frame (m).
    #[serde(default = "default_foot_limits_x")]
    pub foot_limits_x: [f64; 2],
    /// Sole extent along y, `[right, left]`, in the sole frame (m).
    #[serde(default = "default_foot_limits_y")]
    pub foot_limits_y: [f64; 2],
    /// Minimum normal force for a foot in contact (N).
    #[serde(default = "default_min_normal_force")]
    pub minimal_normal_force: f64,
}

impl Default for ContactForcesConfig {
    fn default() -> Self {
        Self {
            static_friction: default_friction(),
            friction_facets: default_friction_facets(),
            torsional_friction: default_torsional_friction(),
            foot_limits_x: default_foot_limits_x(),
            foot_limits_y: default_foot_limits_y(),
            minimal_normal_force: default_min_normal_force(),
        }
    }
}

/// `[neck_task]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeckTaskConfig {
    /// Rotational gains `[c0, c1, c2]`.
    #[serde(default = "default_rot_gains")]
    pub rotational_gains: [f64; 3],
    /// Cost weight.
    #[serde(default = "default_neck_weight")]
    pub weight: f64,
    /// Extra yaw (rad) composed onto the mean-foot-yaw reference.
    #[serde(default)]
    pub additional_rotation: f64,
}

impl Default for NeckTaskConfig {
    fn default() -> Self {
        Self {
            rotational_gains: default_rot_gains(),
            weight: default_neck_weight(),
            additional_rotation: 0.0,
        }
    }
}

/// `[joint_regularization]` group for the torque QP.
///
/// Vectors are either empty (uniform defaults applied at init) or exactly
/// `nJ` long.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JointRegularizationConfig {
    /// Postural setpoint (rad); empty means "the prepared configuration".
    #[serde(default)]
    pub setpoint: Vec<f64>,
    /// Per-joint cost weights.
    #[serde(default)]
    pub weights: Vec<f64>,
    /// Per-joint proportional gains.
    #[serde(default)]
    pub proportional_gains: Vec<f64>,
    /// Per-joint derivative gains.
    #[serde(default)]
    pub derivative_gains: Vec<f64>,
}

/// `[torque_regularization]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorqueRegularizationConfig {
    #[serde(default = "default_torque_reg_weight")]
    pub weight: f64,
}

impl Default for TorqueRegularizationConfig {
    fn default() -> Self {
        Self {
            weight: default_torque_reg_weight(),
        }
    }
}

/// `[force_regularization]` group: wrench regularization in the torque QP.
///
/// The per-foot weight is `scale * weight_fraction + offset`, so the loaded
/// foot is regularized harder and the unloading foot sheds force smoothly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceRegularizationConfig {
    #[serde(default = "default_force_scale")]
    pub scale: f64,
    #[serde(default = "default_force_offset")]
    pub offset: f64,
}

impl Default for ForceRegularizationConfig {
    fn default() -> Self {
        Self {
            scale: default_force_scale(),
            offset: default_force_offset(),
        }
    }
}

/// `[rate_of_change]` group: torque slew limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOfChangeConfig {
    /// Maximum torque rate (Nm/s); the per-tick bound is `rate * dT`.
    #[serde(default = "default_torque_rate")]
    pub maximum_torque_rate: f64,
}

impl Default for RateOfChangeConfig {
    fn default() -> Self {
        Self {
            maximum_torque_rate: default_torque_rate(),
        }
    }
}

/// `[admittance]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmittanceConfig {
    /// Linear proportional gain of the feet tasks.
    #[serde(default = "default_admittance_kp")]
    pub kp: f64,
    /// Linear derivative gain of the feet tasks.
    #[serde(default = "default_admittance_kd")]
    pub kd: f64,
    /// Rotational gains `[c0, c1, c2]` of the feet tasks.
    #[serde(default = "default_rot_gains")]
    pub rotational_gains: [f64; 3],
    /// Weight of the joint regularization cost.
    #[serde(default = "default_joint_reg_weight")]
    pub joint_regularization_weight: f64,
    /// Admittance gain from contact force error to linear acceleration.
    #[serde(default = "default_force_feedback_gain")]
    pub force_feedback_gain: f64,
    /// Admittance gain from contact torque error to angular acceleration.
    #[serde(default = "default_torque_feedback_gain")]
    pub torque_feedback_gain: f64,
    /// Maximum interior-point iterations.
    #[serde(default = "default_max_solver_iters")]
    pub max_solver_iters: u32,
}

impl Default for AdmittanceConfig {
    fn default() -> Self {
        Self {
            kp: default_admittance_kp(),
            kd: default_admittance_kd(),
            rotational_gains: default_rot_gains(),
            joint_regularization_weight: default_joint_reg_weight(),
            force_feedback_gain: default_force_feedback_gain(),
            torque_feedback_gain: default_torque_feedback_gain(),
            max_solver_iters: default_max_solver_iters(),
        }
    }
}

/// `[wrench_mapping]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrenchMappingConfig {
    /// Scale of the weight-fraction-dependent regularization.
    #[serde(default = "default_force_scale")]
    pub regularization_scale: f64,
    /// Offset of the weight-fraction-dependent regularization.
    #[serde(default = "default_force_offset")]
    pub regularization_offset: f64,
    /// Damping gain on the centroidal angular momentum (1/s).
    #[serde(default = "default_momentum_gain")]
    pub angular_momentum_gain: f64,
    /// Maximum interior-point iterations.
    #[serde(default = "default_max_solver_iters")]
    pub max_solver_iters: u32,
}

impl Default for WrenchMappingConfig {
    fn default() -> Self {
        Self {
            regularization_scale: default_force_scale(),
            regularization_offset: default_force_offset(),
            angular_momentum_gain: default_momentum_gain(),
            max_solver_iters: default_max_solver_iters(),
        }
    }
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Complete controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub trajectory_planner: TrajectoryPlannerConfig,
    #[serde(default)]
    pub step_adaptation: StepAdaptationConfig,
    #[serde(default)]
    pub dcm_mpc: DcmMpcConfig,
    #[serde(default)]
    pub dcm_reactive: DcmReactiveConfig,
    #[serde(default)]
    pub zmp_controller: ZmpControllerConfig,
    #[serde(default)]
    pub inverse_kinematics: InverseKinematicsConfig,
    #[serde(default)]
    pub com_task: ComTaskConfig,
    #[serde(default)]
    pub feet_task: FeetTaskConfig,
    #[serde(default)]
    pub zmp_task: ZmpTaskConfig,
    #[serde(default)]
    pub contact_forces: ContactForcesConfig,
    #[serde(default)]
    pub neck_task: NeckTaskConfig,
    #[serde(default)]
    pub joint_regularization: JointRegularizationConfig,
    #[serde(default)]
    pub torque_regularization: TorqueRegularizationConfig,
    #[serde(default)]
    pub force_regularization: ForceRegularizationConfig,
    #[serde(default)]
    pub rate_of_change: RateOfChangeConfig,
    #[serde(default)]
    pub admittance: AdmittanceConfig,
    #[serde(default)]
    pub wrench_mapping: WrenchMappingConfig,

    /// Use the model-predictive DCM controller instead of the reactive one.
    #[serde(default)]
    pub use_mpc: bool,
    /// Use the velocity-IK whole-body QP instead of the torque pipeline.
    #[serde(default)]
    pub use_qp_ik: bool,
    /// Enable per-tick step adaptation during single support.
    #[serde(default = "default_true")]
    pub use_step_adaptation: bool,
    /// Emit per-tick log samples on the data channel.
    #[serde(default)]
    pub dump_data: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            trajectory_planner: TrajectoryPlannerConfig::default(),
            step_adaptation: StepAdaptationConfig::default(),
            dcm_mpc: DcmMpcConfig::default(),
            dcm_reactive: DcmReactiveConfig::default(),
            zmp_controller: ZmpControllerConfig::default(),
            inverse_kinematics: InverseKinematicsConfig::default(),
            com_task: ComTaskConfig::default(),
            feet_task: FeetTaskConfig::default(),
            zmp_task: ZmpTaskConfig::default(),
            contact_forces: ContactForcesConfig::default(),
            neck_task: NeckTaskConfig::default(),
            joint_regularization: JointRegularizationConfig::default(),
            torque_regularization: TorqueRegularizationConfig::default(),
            force_regularization: ForceRegularizationConfig::default(),
            rate_of_change: RateOfChangeConfig::default(),
            admittance: AdmittanceConfig::default(),
            wrench_mapping: WrenchMappingConfig::default(),
            use_mpc: false,
            use_qp_ik: false,
            use_step_adaptation: true,
            dump_data: false,
        }
    }
}

impl ControllerConfig {
    /// Validate the configuration. Returns `Err` on values the controller
    /// cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.sampling_time <= 0.0 {
            return Err(ConfigError::InvalidSamplingTime(self.general.sampling_time));
        }
        if self.contact_forces.friction_facets < 3 {
            return Err(ConfigError::InvalidValue {
                field: "contact_forces.friction_facets".into(),
                message: "a friction pyramid needs at least 3 facets".into(),
            });
        }
        if self.contact_forces.static_friction <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "contact_forces.static_friction".into(),
                message: "must be positive".into(),
            });
        }
        if self.contact_forces.foot_limits_x[0] >= self.contact_forces.foot_limits_x[1]
            || self.contact_forces.foot_limits_y[0] >= self.contact_forces.foot_limits_y[1]
        {
            return Err(ConfigError::InvalidValue {
                field: "contact_forces.foot_limits".into(),
                message: "lower bound must be below upper bound".into(),
            });
        }
        if self.contact_forces.minimal_normal_force <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "contact_forces.minimal_normal_force".into(),
                message: "must be positive".into(),
            });
        }
        if self.dcm_mpc.horizon == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dcm_mpc.horizon".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.trajectory_planner.merge_lookahead <= 2 {
            return Err(ConfigError::InvalidValue {
                field: "trajectory_planner.merge_lookahead".into(),
                message: "must leave room for the splice at countdown 2".into(),
            });
        }
        if self.trajectory_planner.planner_deadline
            >= self.trajectory_planner.merge_lookahead
        {
            return Err(ConfigError::InvalidValue {
                field: "trajectory_planner.planner_deadline".into(),
                message: "the planner budget must end before the splice".into(),
            });
        }
        let reg = &self.joint_regularization;
        let lens: Vec<usize> = [
            &reg.setpoint,
            &reg.weights,
            &reg.proportional_gains,
            &reg.derivative_gains,
        ]
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| v.len())
        .collect();
        if lens.windows(2).any(|w| w[0] != w[1]) {
            return Err(ConfigError::InvalidValue {
                field: "joint_regularization".into(),
                message: "per-joint vectors must share one length".into(),
            });
        }
        Ok(())
    }

    /// Control rate in Hz.
    #[must_use]
    pub fn control_hz(&self) -> f64 {
        1.0 / self.general.sampling_time
    }

    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = ControllerConfig::default();
        assert!(cfg.validate().is_ok());
        assert!((cfg.general.sampling_time - 0.016).abs() < f64::EPSILON);
        assert_eq!(cfg.trajectory_planner.merge_lookahead, 10);
        assert_eq!(cfg.trajectory_planner.planner_deadline, 8);
        assert!(!cfg.use_mpc);
        assert!(cfg.use_step_adaptation);
    }

    #[test]
    fn control_hz_from_sampling_time() {
        let cfg = ControllerConfig {
            general: GeneralConfig {
                sampling_time: 0.01,
                ..GeneralConfig::default()
            },
            ..ControllerConfig::default()
        };
        assert!((cfg.control_hz() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_sampling_time() {
        let cfg = ControllerConfig {
            general: GeneralConfig {
                sampling_time: 0.0,
                ..GeneralConfig::default()
            },
            ..ControllerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSamplingTime(_))
        ));
    }

    #[test]
    fn rejects_degenerate_friction_pyramid() {
        let cfg = ControllerConfig {
            contact_forces: ContactForcesConfig {
                friction_facets: 2,
                ..ContactForcesConfig::default()
            },
            ..ControllerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_foot_rectangle() {
        let cfg = ControllerConfig {
            contact_forces: ContactForcesConfig {
                foot_limits_x: [0.10, -0.06],
                ..ContactForcesConfig::default()
            },
            ..ControllerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_planner_deadline_past_splice() {
        let cfg = ControllerConfig {
            trajectory_planner: TrajectoryPlannerConfig {
                merge_lookahead: 10,
                planner_deadline: 10,
                ..TrajectoryPlannerConfig::default()
            },
            ..ControllerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_partial_file_uses_defaults() {
        let toml_str = r"
            [general]
            sampling_time = 0.01

            [zmp_controller]
            k_zmp = [1.0, 1.5]

            use_mpc = true
        ";
        let cfg: ControllerConfig = toml::from_str(toml_str).unwrap();
        assert!((cfg.general.sampling_time - 0.01).abs() < f64::EPSILON);
        assert!((cfg.zmp_controller.k_zmp[1] - 1.5).abs() < f64::EPSILON);
        // Untouched groups keep their defaults
        assert!((cfg.zmp_controller.k_com[0] - 4.0).abs() < f64::EPSILON);
        assert!((cfg.contact_forces.static_friction - 0.5).abs() < f64::EPSILON);
        assert!(cfg.use_mpc);
        assert!(!cfg.use_qp_ik);
    }

    #[test]
    fn toml_full_groups_deserialize() {
        let toml_str = r#"
            [general]
            sampling_time = 0.016
            name = "icub_walking"

            [contact_forces]
            static_friction = 0.33
            friction_facets = 8
            foot_limits_x = [-0.05, 0.12]
            minimal_normal_force = 15.0

            [step_adaptation]
            sigma_gain = 7.5
            zmp_tolerance = [0.06, 0.03]

            [neck_task]
            rotational_gains = [4.0, 20.0, 100.0]
            additional_rotation = 0.1

            [joint_regularization]
            setpoint = [0.0, 0.2, -0.1]
            weights = [1.0, 1.0, 2.0]
            proportional_gains = [10.0, 10.0, 10.0]
            derivative_gains = [2.0, 2.0, 2.0]
        "#;
        let cfg: ControllerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.general.name, "icub_walking");
        assert_eq!(cfg.contact_forces.friction_facets, 8);
        assert!((cfg.contact_forces.foot_limits_x[1] - 0.12).abs() < f64::EPSILON);
        assert!((cfg.step_adaptation.sigma_gain - 7.5).abs() < f64::EPSILON);
        assert!((cfg.neck_task.additional_rotation - 0.1).abs() < f64::EPSILON);
        assert_eq!(cfg.joint_regularization.setpoint.len(), 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = std::env::temp_dir().join("strider_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("controller.toml");
        std::fs::write(
            &path,
            r"
            [general]
            sampling_time = 0.016

            use_qp_ik = true
        ",
        )
        .unwrap();

        let cfg = ControllerConfig::from_file(&path).unwrap();
        assert!(cfg.use_qp_ik);

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn from_file_rejects_invalid() {
        let dir = std::env::temp_dir().join("strider_test_config_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(
            &path,
            r"
            [general]
            sampling_time = -1.0
        ",
        )
        .unwrap();

        assert!(ControllerConfig::from_file(&path).is_err());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn from_file_not_found() {
        assert!(ControllerConfig::from_file("/nonexistent/controller.toml").is_err());
    }
}
