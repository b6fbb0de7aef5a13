//! Per-tick orchestration.
//!
//! [`WalkingController`] owns the trajectory buffers, the balance cascade,
//! and the whole-body solvers, and wires them to the robot behind the
//! interface traits. Commands mutate only the FSM and the desired goal; the
//! heavy lifting happens inside [`update`](WalkingController::update), once
//! per control period.
//!
//! Walking tick order is fixed: feedback → FK snapshot → measured ZMP →
//! merge bookkeeping → buffer advance → step adaptation → DCM control →
//! ZMP–CoM control → whole-body QP → command out → clock advance.

use std::time::Duration;

use log::{error, info, warn};
use nalgebra::{DVector, Isometry3, Rotation3, Vector2, Vector3};

use strider_balance::{
    ConvexHull, DcmMpcController, DcmReactiveController, LipmReference, StepAdaptation,
    StepAdaptor, StepAdaptorInput, ZmpComController,
};
use strider_core::clock::ControlClock;
use strider_core::config::ControllerConfig;
use strider_core::error::{PlannerError, StriderError};
use strider_core::types::{
    lipm_omega, KinematicsSnapshot, RobotState, SupportPhase, Twist, GRAVITY,
};
use strider_trajectory::{
    modulated_step_timings, MergeAction, MergeScheduler, PlannerHandle, PlannerRequest,
    ReferenceBuffers, ReferenceSample, SwingTrajectory,
};
use strider_wbc::{
    AdmittanceController, AdmittanceInput, ContactWrenchMapper, FootReference, IkQpInput,
    TaskBasedTorqueSolver, TorqueQpInput, VelocityIkSolver, WrenchMapInput,
};

use crate::fsm::{WalkingFsm, WalkingState};
use crate::logging::{LogPublisher, LogSample};
use crate::robot::{
    measured_zmp, BaseEstimator, GainPhase, JointDriver, KinematicsEngine, RetargetingClient,
    WrenchSensors,
};

/// Driver read budget inside the tick.
const FEEDBACK_BUDGET: Duration = Duration::from_millis(10);

/// Norm of the desired DCM velocity below which the robot is standing.
const STANCE_VELOCITY_THRESHOLD: f64 = 1e-3;

/// The walking controller.
pub struct WalkingController {
    config: ControllerConfig,
    fsm: WalkingFsm,
    clock: ControlClock,

    driver: Box<dyn JointDriver>,
    wrench_sensors: Box<dyn WrenchSensors>,
    base_estimator: Option<Box<dyn BaseEstimator>>,
    kinematics: Box<dyn KinematicsEngine>,
    retargeting: Option<Box<dyn RetargetingClient>>,
    planner: PlannerHandle,

    buffers: ReferenceBuffers,
    merge: MergeScheduler,

    dcm_reactive: DcmReactiveController,
    dcm_mpc: DcmMpcController,
    zmp_com: ZmpComController,
    lipm: LipmReference,
    step_adaptor: StepAdaptor,

    torque_solver: TaskBasedTorqueSolver,
    ik_solver: VelocityIkSolver,
    admittance: AdmittanceController,
    wrench_mapper: ContactWrenchMapper,

    logger: Option<LogPublisher>,

    goal: Vector2<f64>,
    posture: DVector<f64>,
    commanded_positions: DVector<f64>,
    prepare_retry_used: bool,
    stop_zero_pending: bool,
    gain_phase: Option<GainPhase>,
}

impl WalkingController {
    /// Assemble the controller. Fails only on an invalid configuration.
    pub fn new(
        config: ControllerConfig,
        driver: Box<dyn JointDriver>,
        wrench_sensors: Box<dyn WrenchSensors>,
        base_estimator: Option<Box<dyn BaseEstimator>>,
        kinematics: Box<dyn KinematicsEngine>,
        retargeting: Option<Box<dyn RetargetingClient>>,
        planner: PlannerHandle,
        logger: Option<LogPublisher>,
    ) -> Result<Self, StriderError> {
        config.validate()?;

        let n_joints = driver.n_joints();
        let limits = driver.joint_limits();
        let dt = config.general.sampling_time;

        Ok(Self {
            fsm: WalkingFsm::new(),
            clock: ControlClock::new(dt),
            buffers: ReferenceBuffers::default(),
            merge: MergeScheduler::new(config.trajectory_planner.merge_lookahead),
            dcm_reactive: DcmReactiveController::new(&config.dcm_reactive),
            dcm_mpc: DcmMpcController::new(config.dcm_mpc.clone()),
            zmp_com: ZmpComController::new(&config.zmp_controller),
            lipm: LipmReference::new(),
            step_adaptor: StepAdaptor::new(
                config.step_adaptation.clone(),
                strider_balance::qp::DEFAULT_MAX_ITERS,
            ),
            torque_solver: TaskBasedTorqueSolver::new(&config, limits.clone()),
            ik_solver: VelocityIkSolver::new(&config, limits),
            admittance: AdmittanceController::new(&config, n_joints),
            wrench_mapper: ContactWrenchMapper::new(
                &config.wrench_mapping,
                &config.contact_forces,
            ),
            logger,
            goal: Vector2::zeros(),
            posture: DVector::zeros(n_joints),
            commanded_positions: DVector::zeros(n_joints),
            prepare_retry_used: false,
            stop_zero_pending: false,
            gain_phase: None,
            config,
            driver,
            wrench_sensors,
            base_estimator,
            kinematics,
            retargeting,
            planner,
        })
    }

    #[must_use]
    pub fn state(&self) -> WalkingState {
        self.fsm.state()
    }

    #[must_use]
    pub fn buffers(&self) -> &ReferenceBuffers {
        &self.buffers
    }

    #[must_use]
    pub fn merge_scheduler(&self) -> &MergeScheduler {
        &self.merge
    }

    #[must_use]
    pub fn clock(&self) -> &ControlClock {
        &self.clock
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    /// `prepareRobot`: prime the buffers around the measured stance and
    /// drive the joints to the initial posture.
    pub fn prepare_robot(&mut self) -> bool {
        if let Err(err) = self.fsm.prepare() {
            warn!("prepareRobot rejected: {err}");
            return false;
        }
        match self.prepare_inner() {
            Ok(()) => true,
            Err(err) => {
                error!("prepareRobot failed: {err}");
                self.fsm.fail();
                false
            }
        }
    }

    fn prepare_inner(&mut self) -> Result<(), StriderError> {
        let robot = self.read_feedback()?;
        let snapshot = self
            .kinematics
            .update(&robot, true)
            .map_err(StriderError::Feedback)?;

        // The first trajectory keeps both feet planted, so the robot does
        // not move while preparing.
        let horizon = self.config.dcm_mpc.horizon
            + self.config.trajectory_planner.merge_lookahead
            + 10;
        let bundle = strider_trajectory::standing_bundle(
            snapshot.left_foot_pose,
            snapshot.right_foot_pose,
            snapshot.com_position.z,
            horizon,
        );
        self.buffers = ReferenceBuffers::from_bundle(&bundle).map_err(StriderError::Planner)?;
        self.merge.clear();

        self.posture = robot.joint_positions.clone();
        self.commanded_positions = robot.joint_positions.clone();
        self.lipm
            .reset(Vector2::new(snapshot.com_position.x, snapshot.com_position.y));
        self.zmp_com.reset();
        self.dcm_reactive.reset();
        self.torque_solver.reset();
        self.prepare_retry_used = false;

        self.driver
            .send_positions(&self.posture)
            .map_err(StriderError::Feedback)?;
        info!("preparing: holding the measured posture");
        Ok(())
    }

    /// `startWalking`: enter the walking loop from Prepared or Paused.
    pub fn start_walking(&mut self) -> bool {
        if let Err(err) = self.fsm.start() {
            warn!("startWalking rejected: {err}");
            return false;
        }
        // Integrators restart from the measured state; buffers and gains are
        // whatever Prepared/Paused left behind.
        match self.restart_integrators() {
            Ok(()) => {
                info!("walking started");
                true
            }
            Err(err) => {
                error!("startWalking failed: {err}");
                self.fsm.fail();
                false
            }
        }
    }

    fn restart_integrators(&mut self) -> Result<(), StriderError> {
        let robot = self.read_feedback()?;
        let left_is_fixed = self.buffers.is_empty() || self.buffers.current().left_is_fixed_frame;
        let snapshot = self
            .kinematics
            .update(&robot, left_is_fixed)
            .map_err(StriderError::Feedback)?;
        self.lipm
            .reset(Vector2::new(snapshot.com_position.x, snapshot.com_position.y));
        self.zmp_com.reset();
        self.dcm_reactive.reset();
        self.commanded_positions = robot.joint_positions;
        Ok(())
    }

    /// `pauseWalking`: freeze the loop; buffers and gains are retained.
    pub fn pause_walking(&mut self) -> bool {
        match self.fsm.pause() {
            Ok(()) => {
                info!("walking paused");
                true
            }
            Err(err) => {
                warn!("pauseWalking rejected: {err}");
                false
            }
        }
    }

    /// `stopWalking`: clear the controllers; the last torque command is held
    /// for one tick and then zeroed.
    pub fn stop_walking(&mut self) -> bool {
        match self.fsm.stop() {
            Ok(()) => {
                self.clear_walking_state();
                info!("walking stopped");
                true
            }
            Err(err) => {
                warn!("stopWalking rejected: {err}");
                false
            }
        }
    }

    fn clear_walking_state(&mut self) {
        self.buffers.clear();
        self.merge.clear();
        self.zmp_com.reset();
        self.dcm_reactive.reset();
        self.torque_solver.reset();
        self.stop_zero_pending = true;
    }

    /// `setGoal`: update the desired unicycle position and schedule the
    /// replan through the merge discipline.
    pub fn set_goal(&mut self, x: f64, y: f64) -> bool {
        if !self.fsm.is_walking() {
            warn!("setGoal rejected: controller is not walking");
            return false;
        }
        if self.merge.merge_points().is_empty()
            && !self.buffers.current().support_phase().is_double()
        {
            warn!("setGoal rejected: trajectory exhausted outside double support");
            return false;
        }

        self.goal = Vector2::new(x, y);
        self.merge.schedule_replan();
        true
    }

    /// `setPlannerInput`: like `setGoal`, for the raw planner reference.
    pub fn set_planner_input(&mut self, x: f64, y: f64) -> bool {
        self.set_goal(x, y)
    }

    // -----------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------

    /// Run one control period. Returns the state after the tick.
    pub fn update(&mut self) -> WalkingState {
        match self.fsm.state() {
            WalkingState::Preparing => self.preparing_tick(),
            WalkingState::Walking => {
                // Planner misses are absorbed inside the tick; anything that
                // escapes is fatal and stops the robot.
                if let Err(err) = self.walking_tick() {
                    error!("fatal walking error: {err}");
                    self.fsm.fail();
                    self.clear_walking_state();
                }
            }
            WalkingState::Stopped => {
                if self.stop_zero_pending {
                    self.stop_zero_pending = false;
                    let zeros = DVector::zeros(self.driver.n_joints());
                    if let Err(err) = self.driver.send_torques(&zeros) {
                        error!("unable to zero the torque command: {err}");
                    }
                }
            }
            WalkingState::Configured | WalkingState::Prepared | WalkingState::Paused => {}
        }
        self.fsm.state()
    }

    fn preparing_tick(&mut self) {
        match self.driver.motion_done() {
            Ok(true) => {
                self.fsm.preparation_done();
                info!("preparation complete");
            }
            Ok(false) => {}
            Err(err) => {
                if self.prepare_retry_used {
                    error!("preparation failed twice: {err}");
                    self.fsm.fail();
                } else {
                    warn!("preparation poll failed, retrying: {err}");
                    self.prepare_retry_used = true;
                }
            }
        }
    }

    fn read_feedback(&mut self) -> Result<RobotState, StriderError> {
        let (joint_positions, joint_velocities) = self
            .driver
            .read_joint_state(FEEDBACK_BUDGET)
            .map_err(StriderError::Feedback)?;
        let (left_wrench, right_wrench) = self
            .wrench_sensors
            .read_wrenches()
            .map_err(StriderError::Feedback)?;
        let (base_pose, base_twist) = match &mut self.base_estimator {
            Some(estimator) => estimator.read_base().map_err(StriderError::Feedback)?,
            None => (Isometry3::identity(), Twist::zero()),
        };
        Ok(RobotState {
            joint_positions,
            joint_velocities,
            base_pose,
            base_twist,
            left_wrench,
            right_wrench,
        })
    }

    #[allow(clippy::too_many_lines)]
    fn walking_tick(&mut self) -> Result<(), StriderError> {
        let dt = self.config.general.sampling_time;

        // 1. Feedback and the kinematics snapshot
        let robot = self.read_feedback()?;
        let left_is_fixed = self.buffers.current().left_is_fixed_frame;
        let snapshot = self
            .kinematics
            .update(&robot, left_is_fixed)
            .map_err(StriderError::Feedback)?;

        // 2. Measured ZMP (with the vertical-force guard)
        let zmp_measured = measured_zmp(
            &robot.left_wrench,
            &robot.right_wrench,
            &snapshot.left_foot_pose,
            &snapshot.right_foot_pose,
        )
        .map_err(StriderError::Feedback)?;

        // 3. Merge bookkeeping: fire the planner, splice, or carry on
        match self.merge.poll() {
            MergeAction::None => {}
            MergeAction::RequestPlan { sample_offset } => {
                let request = self.build_planner_request(sample_offset);
                self.planner.request(request).map_err(StriderError::Planner)?;
            }
            MergeAction::Splice { sample_offset } => {
                match self.planner.try_take() {
                    Ok(Some(bundle)) => {
                        self.buffers
                            .splice(&bundle, sample_offset)
                            .map_err(StriderError::Planner)?;
                        self.merge.splice_done(&bundle.merge_points, sample_offset);
                        info!("new trajectory merged at offset {sample_offset}");
                    }
                    Ok(None) => {
                        warn!("planner missed the splice deadline, keeping the current trajectory");
                        self.merge.replan_missed();
                    }
                    Err(PlannerError::Disconnected) => {
                        return Err(StriderError::Planner(PlannerError::Disconnected));
                    }
                    Err(err) => {
                        // A failed plan is handled like a miss: hold the
                        // current trajectory and ask again.
                        warn!("planner returned an unusable bundle: {err}");
                        self.merge.replan_missed();
                    }
                }
            }
        }

        // 4. Advance the reference signals
        self.buffers.advance();
        self.merge.advance();

        let sample = self.buffers.current();
        let omega = lipm_omega(GRAVITY, sample.com_height);
        let support = sample.support_phase();
        self.apply_gain_phase(support);

        // 5. Step adaptation during single support
        let adapted_swing = if self.config.use_step_adaptation && !support.is_double() {
            self.adapt_step(&snapshot, &sample, support, omega, dt)
        } else {
            None
        };

        // 6. Outer loop: desired ZMP from the DCM controller
        let measured_dcm3 = snapshot.dcm(omega);
        let measured_dcm = Vector2::new(measured_dcm3.x, measured_dcm3.y);
        let desired_dcm3 = Vector3::new(
            sample.dcm_position.x,
            sample.dcm_position.y,
            sample.com_height,
        );
        let desired_dcm_velocity3 = Vector3::new(
            sample.dcm_velocity.x,
            sample.dcm_velocity.y,
            sample.com_height_velocity,
        );
        let desired_vrp;
        let desired_zmp = if self.config.use_mpc {
            desired_vrp = Vector3::zeros();
            let horizon = self.dcm_mpc.horizon();
            let reference = self.buffers.dcm_position_window(0, horizon);
            let polygons = self.support_polygons(horizon);
            self.dcm_mpc
                .solve(&measured_dcm, &reference, &polygons, omega, dt)
                .map_err(StriderError::Solver)?
        } else {
            let vrp = self.dcm_reactive.control(
                &desired_dcm3,
                &desired_dcm_velocity3,
                &measured_dcm3,
                omega,
                dt,
            );
            desired_vrp = vrp;
            Vector2::new(vrp.x, vrp.y)
        };

        // 7. Inner loop: CoM command from the ZMP-CoM controller on the
        //    LIPM reference
        let stance_phase = sample.dcm_velocity.norm() < STANCE_VELOCITY_THRESHOLD;
        self.zmp_com.set_phase(stance_phase);
        self.lipm.integrate(&sample.dcm_position, omega, dt);
        let com_measured = Vector2::new(snapshot.com_position.x, snapshot.com_position.y);
        let (com_position_cmd, com_velocity_cmd) = self.zmp_com.control(
            &zmp_measured,
            &com_measured,
            &desired_zmp,
            &self.lipm.com_position(),
            &self.lipm.com_velocity(),
            dt,
        );

        let com_position3 = Vector3::new(com_position_cmd.x, com_position_cmd.y, sample.com_height);
        let com_velocity3 = Vector3::new(
            com_velocity_cmd.x,
            com_velocity_cmd.y,
            sample.com_height_velocity,
        );

        // 8. Neck reference: the inverse of the mean foot yaw
        let neck_orientation = neck_reference(&sample);

        // 9. Feet references, with the adapted swing overriding its buffer
        let (left_reference, right_reference) =
            feet_references(&sample, support, adapted_swing.as_ref());

        // 10. Posture setpoint, possibly retargeted
        let posture = match self.retargeting.as_mut().and_then(|r| r.posture_override()) {
            Some(p) if p.len() == self.posture.len() => p,
            _ => self.posture.clone(),
        };

        // 11. Whole-body resolution and the outgoing command
        let mut desired_torques = None;
        let mut left_wrench_desired = None;
        let mut right_wrench_desired = None;
        if self.config.use_qp_ik {
            let solution = self.ik_solver.solve(&IkQpInput {
                snapshot: &snapshot,
                robot: &robot,
                left_foot: left_reference.clone(),
                right_foot: right_reference.clone(),
                com_velocity: com_velocity3,
                neck_orientation,
                joint_positions: posture.clone(),
            })?;
            self.commanded_positions += solution.joint_velocities * dt;
            self.driver
                .send_positions(&self.commanded_positions)
                .map_err(StriderError::Feedback)?;
        } else {
            // Desired CoM acceleration from the pendulum around the
            // commanded ZMP
            let com_acceleration = Vector3::new(
                omega * omega * (com_position_cmd.x - desired_zmp.x),
                omega * omega * (com_position_cmd.y - desired_zmp.y),
                0.0,
            );
            let mapped = self.wrench_mapper.map(&WrenchMapInput {
                snapshot: &snapshot,
                support,
                com_acceleration,
                left_weight_fraction: sample.left_weight_fraction,
                right_weight_fraction: sample.right_weight_fraction,
            })?;
            left_wrench_desired = mapped.left;
            right_wrench_desired = mapped.right;

            let admittance = self.admittance.solve(&AdmittanceInput {
                snapshot: &snapshot,
                robot: &robot,
                support,
                left_foot: left_reference.clone(),
                right_foot: right_reference.clone(),
                mapped_wrenches: mapped,
                neck_orientation,
                joint_positions: posture.clone(),
            })?;

            let solution = self.torque_solver.solve(&TorqueQpInput {
                snapshot: &snapshot,
                robot: &robot,
                support,
                left_foot: left_reference.clone(),
                right_foot: right_reference.clone(),
                com_position: com_position3,
                com_velocity: com_velocity3,
                com_acceleration,
                desired_zmp,
                measured_zmp: zmp_measured,
                neck_orientation,
                joint_positions: posture,
                joint_velocities: DVector::zeros(robot.n_joints()),
                joint_accelerations: admittance.joint_accelerations,
                left_weight_fraction: sample.left_weight_fraction,
                right_weight_fraction: sample.right_weight_fraction,
            })?;
            self.driver
                .send_torques(&solution.torques)
                .map_err(StriderError::Feedback)?;
            desired_torques = Some(solution.torques);
        }

        // 12. Best-effort logging
        if self.config.dump_data {
            if let Some(logger) = &mut self.logger {
                let neck_yaw_error = snapshot.neck_orientation.euler_angles().2
                    - neck_orientation.euler_angles().2;
                logger.publish(LogSample {
                    time: self.clock.secs_f64(),
                    measured_dcm: measured_dcm3,
                    desired_dcm: desired_dcm3,
                    desired_vrp,
                    measured_com: snapshot.com_position,
                    desired_com: com_position3,
                    measured_zmp: zmp_measured,
                    desired_zmp,
                    left_foot_measured: snapshot.left_foot_pose,
                    left_foot_desired: left_reference.pose,
                    right_foot_measured: snapshot.right_foot_pose,
                    right_foot_desired: right_reference.pose,
                    left_wrench_measured: robot.left_wrench,
                    right_wrench_measured: robot.right_wrench,
                    left_wrench_desired,
                    right_wrench_desired,
                    desired_torques,
                    neck_yaw_error,
                });
            }
        }

        // 13. Time marches on
        self.clock.tick();
        Ok(())
    }

    /// Build the planner request for the merge sample `offset` ahead.
    fn build_planner_request(&self, offset: usize) -> PlannerRequest {
        let offset = offset.min(self.buffers.len().saturating_sub(1));
        let merge_sample = self.buffers.sample_at(offset);
        let fixed_foot_pose = if merge_sample.left_is_fixed_frame {
            merge_sample.left_foot_pose
        } else {
            merge_sample.right_foot_pose
        };
        let step_timings = self
            .config
            .trajectory_planner
            .velocity_modulation
            .then(|| modulated_step_timings(self.goal.norm(), &self.config.trajectory_planner));

        #[allow(clippy::cast_precision_loss)]
        PlannerRequest {
            initial_time: self.clock.secs_f64()
                + offset as f64 * self.config.general.sampling_time,
            fixed_foot_pose,
            left_is_swinging: !merge_sample.left_is_fixed_frame,
            goal: self.goal,
            dcm_position: merge_sample.dcm_position,
            dcm_velocity: merge_sample.dcm_velocity,
            step_timings,
            terminal_step: self.goal.norm() < 1e-12,
        }
    }

    /// Run the step adaptor and re-draw the swing trajectory.
    fn adapt_step(
        &mut self,
        snapshot: &KinematicsSnapshot,
        sample: &ReferenceSample,
        support: SupportPhase,
        omega: f64,
        dt: f64,
    ) -> Option<(Isometry3<f64>, Twist, strider_core::types::SpatialAcceleration)> {
        let switch = self.buffers.samples_until_contact_switch();
        if switch >= self.buffers.len() {
            return None;
        }
        let landing_sample = self.buffers.sample_at(switch);

        let (stance_pose, swing_landing_pose, swing_pose_now, swing_twist_now) = match support {
            SupportPhase::Left => (
                sample.left_foot_pose,
                landing_sample.right_foot_pose,
                snapshot.right_foot_pose,
                snapshot.right_foot_twist,
            ),
            SupportPhase::Right => (
                sample.right_foot_pose,
                landing_sample.left_foot_pose,
                snapshot.left_foot_pose,
                snapshot.left_foot_twist,
            ),
            SupportPhase::Double => return None,
        };

        #[allow(clippy::cast_precision_loss)]
        let nominal_duration = switch as f64 * dt;
        let nominal_zmp = Vector2::new(
            swing_landing_pose.translation.x,
            swing_landing_pose.translation.y,
        );
        let measured_dcm3 = snapshot.dcm(omega);
        let input = StepAdaptorInput {
            nominal_zmp,
            nominal_duration,
            nominal_dcm_offset: landing_sample.dcm_position - nominal_zmp,
            current_dcm: Vector2::new(measured_dcm3.x, measured_dcm3.y),
            stance_zmp: Vector2::new(stance_pose.translation.x, stance_pose.translation.y),
            remaining_single_support: nominal_duration,
            omega,
        };

        let adaptation = match self.step_adaptor.adapt(&input) {
            Ok(adaptation) => adaptation,
            Err(err) => {
                warn!("step adaptation failed, keeping the nominal step: {err}");
                StepAdaptation::nominal(&input)
            }
        };

        let target = Vector3::new(
            adaptation.landing.x,
            adaptation.landing.y,
            swing_landing_pose.translation.z,
        );
        let target_yaw = swing_landing_pose.rotation.euler_angles().2;
        let swing = SwingTrajectory::new(
            &swing_pose_now,
            &swing_twist_now,
            target,
            target_yaw,
            self.config.trajectory_planner.step_height,
            adaptation.time_to_impact,
        );
        Some(swing.sample(dt))
    }

    /// Support polygon per MPC horizon sample from the buffered contacts.
    fn support_polygons(&self, horizon: usize) -> Vec<ConvexHull> {
        let limits_x = self.config.contact_forces.foot_limits_x;
        let limits_y = self.config.contact_forces.foot_limits_y;
        let last = self.buffers.len().saturating_sub(1);
        (0..horizon)
            .map(|k| {
                let sample = self.buffers.sample_at(k.min(last));
                ConvexHull::support_polygon(
                    sample.left_in_contact.then_some(&sample.left_foot_pose),
                    sample.right_in_contact.then_some(&sample.right_foot_pose),
                    limits_x,
                    limits_y,
                )
            })
            .collect()
    }

    fn apply_gain_phase(&mut self, support: SupportPhase) {
        let phase = match support {
            SupportPhase::Double => GainPhase::DoubleSupport,
            SupportPhase::Left => GainPhase::SwingRight,
            SupportPhase::Right => GainPhase::SwingLeft,
        };
        if self.gain_phase != Some(phase) {
            self.gain_phase = Some(phase);
            if let Err(err) = self.driver.set_gain_phase(phase) {
                warn!("gain schedule switch failed: {err}");
            }
        }
    }
}

/// Neck orientation: the inverse of the mean yaw of the two planned feet.
fn neck_reference(sample: &ReferenceSample) -> Rotation3<f64> {
    let yaw_left = sample.left_foot_pose.rotation.euler_angles().2;
    let yaw_right = sample.right_foot_pose.rotation.euler_angles().2;
    let mean_yaw = (yaw_left.sin() + yaw_right.sin()).atan2(yaw_left.cos() + yaw_right.cos());
    Rotation3::from_euler_angles(0.0, 0.0, mean_yaw).inverse()
}

/// Reference of each foot, substituting the adapted swing when present.
fn feet_references(
    sample: &ReferenceSample,
    support: SupportPhase,
    adapted_swing: Option<&(Isometry3<f64>, Twist, strider_core::types::SpatialAcceleration)>,
) -> (FootReference, FootReference) {
    let mut left = FootReference {
        pose: sample.left_foot_pose,
        twist: sample.left_foot_twist,
        acceleration: sample.left_foot_acceleration,
    };
    let mut right = FootReference {
        pose: sample.right_foot_pose,
        twist: sample.right_foot_twist,
        acceleration: sample.right_foot_acceleration,
    };
    if let Some((pose, twist, acceleration)) = adapted_swing {
        let adapted = FootReference {
            pose: *pose,
            twist: *twist,
            acceleration: *acceleration,
        };
        match support {
            SupportPhase::Left => right = adapted,
            SupportPhase::Right => left = adapted,
            SupportPhase::Double => {}
        }
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use nalgebra::{DMatrix, UnitQuaternion};

    use strider_core::error::FeedbackError;
    use strider_core::types::{JointLimits, SpatialAcceleration, Wrench};
    use strider_trajectory::{standing_bundle, FootstepPlanner, TrajectoryBundle};

    const N_JOINTS: usize = 4;
    const MASS: f64 = 30.0;

    #[derive(Default)]
    struct DriverLog {
        positions: Vec<DVector<f64>>,
        torques: Vec<DVector<f64>>,
        gain_phases: Vec<GainPhase>,
    }

    struct MockDriver {
        log: Arc<Mutex<DriverLog>>,
        motion_polls_needed: usize,
        polls: usize,
    }

    impl JointDriver for MockDriver {
        fn n_joints(&self) -> usize {
            N_JOINTS
        }

        fn joint_limits(&self) -> JointLimits {
            JointLimits::uniform(N_JOINTS, 2.0, 5.0, 60.0)
        }

        fn read_joint_state(
            &mut self,
            _budget: Duration,
        ) -> Result<(DVector<f64>, DVector<f64>), FeedbackError> {
            Ok((DVector::zeros(N_JOINTS), DVector::zeros(N_JOINTS)))
        }

        fn send_torques(&mut self, torques: &DVector<f64>) -> Result<(), FeedbackError> {
            self.log.lock().unwrap().torques.push(torques.clone());
            Ok(())
        }

        fn send_positions(&mut self, positions: &DVector<f64>) -> Result<(), FeedbackError> {
            self.log.lock().unwrap().positions.push(positions.clone());
            Ok(())
        }

        fn motion_done(&mut self) -> Result<bool, FeedbackError> {
            self.polls += 1;
            Ok(self.polls > self.motion_polls_needed)
        }

        fn set_gain_phase(&mut self, phase: GainPhase) -> Result<(), FeedbackError> {
            self.log.lock().unwrap().gain_phases.push(phase);
            Ok(())
        }
    }

    struct MockWrenches {
        shared: Arc<Mutex<(Wrench, Wrench)>>,
    }

    impl WrenchSensors for MockWrenches {
        fn read_wrenches(&mut self) -> Result<(Wrench, Wrench), FeedbackError> {
            Ok(*self.shared.lock().unwrap())
        }
    }

    struct MockKinematics;

    impl KinematicsEngine for MockKinematics {
        fn update(
            &mut self,
            _state: &RobotState,
            _left_is_fixed: bool,
        ) -> Result<KinematicsSnapshot, FeedbackError> {
            let nv = N_JOINTS + 6;
            let mut mass_matrix = DMatrix::zeros(nv, nv);
            for k in 0..3 {
                mass_matrix[(k, k)] = MASS;
            }
            for k in 3..6 {
                mass_matrix[(k, k)] = 2.0;
            }
            for j in 6..nv {
                mass_matrix[(j, j)] = 0.1;
            }
            let mut bias = DVector::zeros(nv);
            bias[2] = MASS * GRAVITY;

            let mut base_jacobian = DMatrix::zeros(6, nv);
            for k in 0..6 {
                base_jacobian[(k, k)] = 1.0;
            }
            let mut com_jacobian = DMatrix::zeros(3, nv);
            for k in 0..3 {
                com_jacobian[(k, k)] = 1.0;
            }
            let mut neck_jacobian = DMatrix::zeros(3, nv);
            for k in 0..3 {
                neck_jacobian[(k, 3 + k)] = 1.0;
            }

            Ok(KinematicsSnapshot {
                mass_matrix,
                bias_forces: bias,
                left_foot_pose: Isometry3::translation(0.0, 0.07, 0.0),
                right_foot_pose: Isometry3::translation(0.0, -0.07, 0.0),
                left_foot_twist: Twist::zero(),
                right_foot_twist: Twist::zero(),
                left_foot_jacobian: base_jacobian.clone(),
                right_foot_jacobian: base_jacobian,
                left_foot_bias_acceleration: SpatialAcceleration::zero(),
                right_foot_bias_acceleration: SpatialAcceleration::zero(),
                neck_orientation: UnitQuaternion::identity(),
                neck_angular_velocity: Vector3::zeros(),
                neck_jacobian,
                neck_bias_acceleration: Vector3::zeros(),
                com_position: Vector3::new(0.0, 0.0, 0.53),
                com_velocity: Vector3::zeros(),
                com_jacobian,
                com_bias_acceleration: Vector3::zeros(),
                angular_momentum: Vector3::zeros(),
                total_mass: MASS,
            })
        }
    }

    struct InstantPlanner;

    impl FootstepPlanner for InstantPlanner {
        fn plan(
            &mut self,
            _request: &PlannerRequest,
        ) -> Result<TrajectoryBundle, strider_core::error::PlannerError> {
            let mut bundle = standing_bundle(
                Isometry3::translation(0.0, 0.07, 0.0),
                Isometry3::translation(0.0, -0.07, 0.0),
                0.53,
                60,
            );
            bundle.merge_points = vec![0, 15, 30, 45];
            Ok(bundle)
        }
    }

    struct SlowPlanner {
        delay: Duration,
    }

    impl FootstepPlanner for SlowPlanner {
        fn plan(
            &mut self,
            request: &PlannerRequest,
        ) -> Result<TrajectoryBundle, strider_core::error::PlannerError> {
            thread::sleep(self.delay);
            InstantPlanner.plan(request)
        }
    }

    struct Fixture {
        controller: WalkingController,
        driver_log: Arc<Mutex<DriverLog>>,
        wrenches: Arc<Mutex<(Wrench, Wrench)>>,
    }

    fn balanced_wrench() -> Wrench {
        Wrench {
            force: Vector3::new(0.0, 0.0, 0.5 * MASS * GRAVITY),
            torque: Vector3::zeros(),
        }
    }

    fn fixture_with(config: ControllerConfig, planner: impl FootstepPlanner + 'static) -> Fixture {
        let driver_log = Arc::new(Mutex::new(DriverLog::default()));
        let wrenches = Arc::new(Mutex::new((balanced_wrench(), balanced_wrench())));
        let controller = WalkingController::new(
            config,
            Box::new(MockDriver {
                log: Arc::clone(&driver_log),
                motion_polls_needed: 1,
                polls: 0,
            }),
            Box::new(MockWrenches {
                shared: Arc::clone(&wrenches),
            }),
            None,
            Box::new(MockKinematics),
            None,
            PlannerHandle::spawn(planner),
            None,
        )
        .unwrap();
        Fixture {
            controller,
            driver_log,
            wrenches,
        }
    }

    fn ik_config() -> ControllerConfig {
        ControllerConfig {
            use_qp_ik: true,
            ..ControllerConfig::default()
        }
    }

    fn walk(fixture: &mut Fixture) {
        assert!(fixture.controller.prepare_robot());
        while fixture.controller.state() == WalkingState::Preparing {
            fixture.controller.update();
        }
        assert_eq!(fixture.controller.state(), WalkingState::Prepared);
        assert!(fixture.controller.start_walking());
    }

    #[test]
    fn prepare_reaches_prepared_and_holds_posture() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        assert!(fixture.controller.prepare_robot());
        assert_eq!(fixture.controller.state(), WalkingState::Preparing);

        fixture.controller.update();
        fixture.controller.update();
        assert_eq!(fixture.controller.state(), WalkingState::Prepared);

        // Exactly one position command, equal to the measured posture
        let log = fixture.driver_log.lock().unwrap();
        assert_eq!(log.positions.len(), 1);
        assert!(log.positions[0].iter().all(|&q| q.abs() < 1e-12));
    }

    #[test]
    fn start_is_rejected_before_prepare() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        assert!(!fixture.controller.start_walking());
        assert_eq!(fixture.controller.state(), WalkingState::Configured);
    }

    #[test]
    fn ik_walking_tick_streams_positions() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        walk(&mut fixture);

        let length = fixture.controller.buffers().len();
        for _ in 0..5 {
            assert_eq!(fixture.controller.update(), WalkingState::Walking);
            assert!(fixture.controller.buffers().is_aligned());
            assert_eq!(fixture.controller.buffers().len(), length);
        }
        // One prepare command plus one per walking tick
        assert_eq!(fixture.driver_log.lock().unwrap().positions.len(), 6);
        assert_eq!(fixture.controller.clock().tick_count(), 5);
    }

    #[test]
    fn torque_walking_tick_streams_torques() {
        let mut fixture = fixture_with(ControllerConfig::default(), InstantPlanner);
        walk(&mut fixture);

        for _ in 0..3 {
            assert_eq!(fixture.controller.update(), WalkingState::Walking);
        }
        let log = fixture.driver_log.lock().unwrap();
        assert_eq!(log.torques.len(), 3);
        // A balanced stance asks for next to no joint torque in the
        // decoupled test model
        assert!(log.torques[0].amax() < 1.0);
    }

    #[test]
    fn set_goal_requests_and_splices_a_plan() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        walk(&mut fixture);

        assert!(fixture.controller.set_goal(0.3, 0.0));
        assert!(fixture.controller.merge_scheduler().replan_pending());

        // First tick fires the planner request; give the worker time to plan
        fixture.controller.update();
        thread::sleep(Duration::from_millis(100));

        // The splice lands when the countdown reaches the splice offset
        for _ in 0..12 {
            fixture.controller.update();
        }
        assert_eq!(fixture.controller.state(), WalkingState::Walking);
        assert!(!fixture.controller.merge_scheduler().replan_pending());
        assert!(!fixture.controller.merge_scheduler().merge_points().is_empty());
        assert!(fixture.controller.buffers().is_aligned());
        assert!(fixture
            .controller
            .merge_scheduler()
            .is_consistent(fixture.controller.buffers().len()));
    }

    #[test]
    fn repeated_set_goal_is_idempotent() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        walk(&mut fixture);

        assert!(fixture.controller.set_goal(0.1, 0.0));
        let countdown = fixture.controller.merge_scheduler().countdown();
        assert!(fixture.controller.set_goal(0.3, 0.0));
        // The second goal in the same tick keeps the scheduled countdown
        assert_eq!(fixture.controller.merge_scheduler().countdown(), countdown);
    }

    #[test]
    fn set_goal_is_rejected_when_not_walking() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        assert!(!fixture.controller.set_goal(0.3, 0.0));
        walk(&mut fixture);
        assert!(fixture.controller.pause_walking());
        assert!(!fixture.controller.set_goal(0.3, 0.0));
    }

    #[test]
    fn planner_miss_holds_the_trajectory() {
        let mut fixture = fixture_with(
            ik_config(),
            SlowPlanner {
                delay: Duration::from_secs(2),
            },
        );
        walk(&mut fixture);
        let length = fixture.controller.buffers().len();

        assert!(fixture.controller.set_goal(0.3, 0.0));
        // Run past the splice deadline without giving the planner a chance
        for _ in 0..12 {
            assert_eq!(fixture.controller.update(), WalkingState::Walking);
        }
        // Trajectory held (tail duplicated), request re-armed
        assert_eq!(fixture.controller.buffers().len(), length);
        assert!(fixture.controller.merge_scheduler().replan_pending());
    }

    #[test]
    fn contact_force_loss_stops_within_one_tick() {
        let mut fixture = fixture_with(ControllerConfig::default(), InstantPlanner);
        walk(&mut fixture);
        assert_eq!(fixture.controller.update(), WalkingState::Walking);

        // Both sensors collapse: total vertical force under the guard
        *fixture.wrenches.lock().unwrap() = (Wrench::zero(), Wrench::zero());
        assert_eq!(fixture.controller.update(), WalkingState::Stopped);

        // The next tick zeroes the torque command
        let before = fixture.driver_log.lock().unwrap().torques.len();
        fixture.controller.update();
        let log = fixture.driver_log.lock().unwrap();
        assert_eq!(log.torques.len(), before + 1);
        assert!(log.torques.last().unwrap().iter().all(|&t| t.abs() < 1e-12));
    }

    #[test]
    fn pause_and_resume_keep_the_buffers() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        walk(&mut fixture);
        fixture.controller.update();
        let length = fixture.controller.buffers().len();

        assert!(fixture.controller.pause_walking());
        // Paused ticks are inert
        fixture.controller.update();
        assert_eq!(fixture.controller.buffers().len(), length);
        assert_eq!(fixture.controller.state(), WalkingState::Paused);

        assert!(fixture.controller.start_walking());
        assert_eq!(fixture.controller.update(), WalkingState::Walking);
        assert_eq!(fixture.controller.buffers().len(), length);
    }

    #[test]
    fn stop_clears_the_buffers() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        walk(&mut fixture);
        fixture.controller.update();

        assert!(fixture.controller.stop_walking());
        assert_eq!(fixture.controller.state(), WalkingState::Stopped);
        assert!(fixture.controller.buffers().is_empty());
        assert!(fixture.controller.merge_scheduler().merge_points().is_empty());
    }

    #[test]
    fn gain_phase_follows_the_support_schedule() {
        let mut fixture = fixture_with(ik_config(), InstantPlanner);
        walk(&mut fixture);
        fixture.controller.update();
        let log = fixture.driver_log.lock().unwrap();
        assert_eq!(log.gain_phases, vec![GainPhase::DoubleSupport]);
    }
}
