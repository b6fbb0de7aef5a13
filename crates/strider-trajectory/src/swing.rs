//! Adapted swing-foot trajectory.
//!
//! When the step adaptor moves the landing point or the impact time, the
//! remainder of the swing is re-drawn as cubic segments from the foot's
//! current pose: x, y, and yaw run in a single segment to the new target,
//! z rises to the apex and descends to the landing height. Endpoints carry
//! the foot's measured velocity so the hand-over is continuous.

use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};

use strider_core::types::{SpatialAcceleration, Twist};

/// Fraction of the remaining swing at which the apex is placed.
const APEX_FRACTION: f64 = 0.8;

/// One cubic Hermite segment `p(t)` over `[0, duration]`.
#[derive(Clone, Copy, Debug)]
struct CubicSegment {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
    duration: f64,
}

impl CubicSegment {
    /// Segment through `(p0, v0)` at `t = 0` and `(p1, v1)` at `t = duration`.
    fn hermite(p0: f64, v0: f64, p1: f64, v1: f64, duration: f64) -> Self {
        let t = duration.max(1e-6);
        let a0 = p0;
        let a1 = v0;
        let a2 = (3.0 * (p1 - p0) / t - 2.0 * v0 - v1) / t;
        let a3 = (2.0 * (p0 - p1) / t + v0 + v1) / (t * t);
        Self {
            a0,
            a1,
            a2,
            a3,
            duration: t,
        }
    }

    fn position(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.duration);
        self.a0 + t * (self.a1 + t * (self.a2 + t * self.a3))
    }

    fn velocity(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.duration);
        self.a1 + t * (2.0 * self.a2 + 3.0 * t * self.a3)
    }

    fn acceleration(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.duration);
        2.0 * self.a2 + 6.0 * t * self.a3
    }
}

/// Two chained segments for the vertical channel.
#[derive(Clone, Copy, Debug)]
enum VerticalProfile {
    /// Rise to the apex, then descend to the landing height.
    Arc {
        rise: CubicSegment,
        fall: CubicSegment,
    },
    /// Late in the swing: descend directly.
    Direct(CubicSegment),
}

impl VerticalProfile {
    fn evaluate(&self, t: f64) -> (f64, f64, f64) {
        match self {
            Self::Arc { rise, fall } => {
                if t <= rise.duration {
                    (rise.position(t), rise.velocity(t), rise.acceleration(t))
                } else {
                    let t = t - rise.duration;
                    (fall.position(t), fall.velocity(t), fall.acceleration(t))
                }
            }
            Self::Direct(seg) => (seg.position(t), seg.velocity(t), seg.acceleration(t)),
        }
    }
}

/// The re-drawn remainder of a swing.
#[derive(Clone, Debug)]
pub struct SwingTrajectory {
    x: CubicSegment,
    y: CubicSegment,
    yaw: CubicSegment,
    z: VerticalProfile,
    duration: f64,
}

impl SwingTrajectory {
    /// Re-draw the swing from the foot's current state.
    ///
    /// * `current_pose`, `current_twist` — measured swing-foot state now.
    /// * `target` — adapted landing position (the step adaptor's
    ///   `zmp + dcm offset`).
    /// * `target_yaw` — yaw of the planned footprint.
    /// * `apex_height` — swing apex above the ground.
    /// * `remaining_time` — adapted time to impact (s).
    #[must_use]
    pub fn new(
        current_pose: &Isometry3<f64>,
        current_twist: &Twist,
        target: Vector3<f64>,
        target_yaw: f64,
        apex_height: f64,
        remaining_time: f64,
    ) -> Self {
        let duration = remaining_time.max(1e-3);
        let p = current_pose.translation.vector;
        let v = current_twist.linear;

        let x = CubicSegment::hermite(p.x, v.x, target.x, 0.0, duration);
        let y = CubicSegment::hermite(p.y, v.y, target.y, 0.0, duration);

        let current_yaw = current_pose.rotation.euler_angles().2;
        // Unwrap the target onto the branch nearest the current yaw
        let yaw_error = (target_yaw - current_yaw + std::f64::consts::PI)
            .rem_euclid(2.0 * std::f64::consts::PI)
            - std::f64::consts::PI;
        let yaw = CubicSegment::hermite(
            current_yaw,
            current_twist.angular.z,
            current_yaw + yaw_error,
            0.0,
            duration,
        );

        let apex_time = APEX_FRACTION * duration;
        let z = if apex_height > p.z && apex_time > 0.05 {
            VerticalProfile::Arc {
                rise: CubicSegment::hermite(p.z, v.z, apex_height, 0.0, apex_time),
                fall: CubicSegment::hermite(
                    apex_height,
                    0.0,
                    target.z,
                    0.0,
                    duration - apex_time,
                ),
            }
        } else {
            VerticalProfile::Direct(CubicSegment::hermite(p.z, v.z, target.z, 0.0, duration))
        };

        Self {
            x,
            y,
            yaw,
            z,
            duration,
        }
    }

    /// Time to impact the trajectory was drawn for (s).
    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    /// Evaluate pose, twist, and spatial acceleration at `t` seconds from now.
    #[must_use]
    pub fn sample(&self, t: f64) -> (Isometry3<f64>, Twist, SpatialAcceleration) {
        let t = t.clamp(0.0, self.duration);
        let (z, vz, az) = self.z.evaluate(t);

        let position = Vector3::new(self.x.position(t), self.y.position(t), z);
        let yaw = self.yaw.position(t);
        let pose = Isometry3::from_parts(
            Translation3::from(position),
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_euler_angles(0.0, 0.0, yaw)),
        );
        let twist = Twist {
            linear: Vector3::new(self.x.velocity(t), self.y.velocity(t), vz),
            angular: Vector3::new(0.0, 0.0, self.yaw.velocity(t)),
        };
        let acceleration = SpatialAcceleration {
            linear: Vector3::new(self.x.acceleration(t), self.y.acceleration(t), az),
            angular: Vector3::new(0.0, 0.0, self.yaw.acceleration(t)),
        };
        (pose, twist, acceleration)
    }
}
