//! The planner's product: one aligned block of reference samples.

use nalgebra::{Isometry3, Vector2};

use strider_core::error::PlannerError;
use strider_core::types::{SpatialAcceleration, SupportPhase, Twist};

/// A freshly planned block of reference signals, sample-aligned across every
/// field. Produced by the footstep planner and spliced into the live
/// [`ReferenceBuffers`](crate::buffers::ReferenceBuffers) at a merge point.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryBundle {
    pub left_foot_poses: Vec<Isometry3<f64>>,
    pub right_foot_poses: Vec<Isometry3<f64>>,
    pub left_foot_twists: Vec<Twist>,
    pub right_foot_twists: Vec<Twist>,
    pub left_foot_accelerations: Vec<SpatialAcceleration>,
    pub right_foot_accelerations: Vec<SpatialAcceleration>,
    pub left_in_contact: Vec<bool>,
    pub right_in_contact: Vec<bool>,
    /// True when the left foot is the fixed (odometry) frame at that sample.
    pub left_is_fixed_frame: Vec<bool>,
    pub dcm_positions: Vec<Vector2<f64>>,
    pub dcm_velocities: Vec<Vector2<f64>>,
    pub zmp_positions: Vec<Vector2<f64>>,
    pub com_heights: Vec<f64>,
    pub com_height_velocities: Vec<f64>,
    /// Fraction of the weight carried by the left foot, in `[0, 1]`.
    pub left_weight_fractions: Vec<f64>,
    /// Fraction of the weight carried by the right foot, in `[0, 1]`.
    pub right_weight_fractions: Vec<f64>,
    /// Merge offsets relative to the bundle's first sample, ascending.
    /// The leading zero the planner emits is kept here; the splice drops it.
    pub merge_points: Vec<usize>,
}

impl TrajectoryBundle {
    /// Number of samples. Meaningful only for a [valid](Self::validate) bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dcm_positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dcm_positions.is_empty()
    }

    /// Check sample alignment, merge-point ordering, and support consistency.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let n = self.len();
        let aligned = [
            self.left_foot_poses.len(),
            self.right_foot_poses.len(),
            self.left_foot_twists.len(),
            self.right_foot_twists.len(),
            self.left_foot_accelerations.len(),
            self.right_foot_accelerations.len(),
            self.left_in_contact.len(),
            self.right_in_contact.len(),
            self.left_is_fixed_frame.len(),
            self.dcm_velocities.len(),
            self.zmp_positions.len(),
            self.com_heights.len(),
            self.com_height_velocities.len(),
            self.left_weight_fractions.len(),
            self.right_weight_fractions.len(),
        ]
        .iter()
        .all(|&len| len == n);
        if !aligned || n == 0 {
            return Err(PlannerError::BundleTooShort {
                expected: n.max(1),
                got: 0,
            });
        }

        for pair in self.merge_points.windows(2) {
            if pair[1] <= pair[0] {
                return Err(PlannerError::MergePointOutOfRange {
                    merge_point: pair[1],
                    len: n,
                });
            }
        }
        if let Some(&last) = self.merge_points.last() {
            if last >= n {
                return Err(PlannerError::MergePointOutOfRange {
                    merge_point: last,
                    len: n,
                });
            }
        }

        for k in 0..n {
            let phase = SupportPhase::from_contacts(self.left_in_contact[k], self.right_in_contact[k]);
            let (wl, wr) = (self.left_weight_fractions[k], self.right_weight_fractions[k]);
            let consistent = match phase {
                Some(SupportPhase::Double) => (wl + wr - 1.0).abs() < 1e-9,
                Some(SupportPhase::Left) => (wl - 1.0).abs() < 1e-9 && wr.abs() < 1e-9,
                Some(SupportPhase::Right) => (wr - 1.0).abs() < 1e-9 && wl.abs() < 1e-9,
                None => false,
            };
            if !consistent {
                return Err(PlannerError::InconsistentSupport { sample: k });
            }
        }
        Ok(())
    }
}

/// Build a standing-still bundle: both feet fixed, DCM and ZMP pinned at the
/// midpoint, full double support. Used by `prepare` so the robot does not
/// move before the first real plan, and by tests.
#[must_use]
pub fn standing_bundle(
    left_foot: Isometry3<f64>,
    right_foot: Isometry3<f64>,
    com_height: f64,
    samples: usize,
) -> TrajectoryBundle {
    let midpoint = Vector2::new(
        0.5 * (left_foot.translation.x + right_foot.translation.x),
        0.5 * (left_foot.translation.y + right_foot.translation.y),
    );
    TrajectoryBundle {
        left_foot_poses: vec![left_foot; samples],
        right_foot_poses: vec![right_foot; samples],
        left_foot_twists: vec![Twist::zero(); samples],
        right_foot_twists: vec![Twist::zero(); samples],
        left_foot_accelerations: vec![SpatialAcceleration::zero(); samples],
        right_foot_accelerations: vec![SpatialAcceleration::zero(); samples],
        left_in_contact: vec![true; samples],
        right_in_contact: vec![true; samples],
        left_is_fixed_frame: vec![true; samples],
        dcm_positions: vec![midpoint; samples],
        dcm_velocities: vec![Vector2::zeros(); samples],
        zmp_positions: vec![midpoint; samples],
        com_heights: vec![com_height; samples],
        com_height_velocities: vec![0.0; samples],
        left_weight_fractions: vec![0.5; samples],
        right_weight_fractions: vec![0.5; samples],
        merge_points: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feet() -> (Isometry3<f64>, Isometry3<f64>) {
        (
            Isometry3::translation(0.0, 0.07, 0.0),
            Isometry3::translation(0.0, -0.07, 0.0),
        )
    }

    #[test]
    fn standing_bundle_is_valid() {
        let (l, r) = feet();
        let bundle = standing_bundle(l, r, 0.53, 50);
        assert_eq!(bundle.len(), 50);
        assert!(bundle.validate().is_ok());
        // ZMP pinned at the midpoint of the feet
        assert!((bundle.zmp_positions[0].y - 0.0).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_misaligned_fields() {
        let (l, r) = feet();
        let mut bundle = standing_bundle(l, r, 0.53, 10);
        bundle.com_heights.pop();
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn validate_rejects_unsorted_merge_points() {
        let (l, r) = feet();
        let mut bundle = standing_bundle(l, r, 0.53, 10);
        bundle.merge_points = vec![4, 4];
        assert!(bundle.validate().is_err());
        bundle.merge_points = vec![6, 3];
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn validate_rejects_merge_point_past_end() {
        let (l, r) = feet();
        let mut bundle = standing_bundle(l, r, 0.53, 10);
        bundle.merge_points = vec![3, 10];
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn validate_rejects_inconsistent_weights() {
        let (l, r) = feet();
        let mut bundle = standing_bundle(l, r, 0.53, 10);
        // Single support on the left must carry the full weight on the left
        bundle.right_in_contact[3] = false;
        assert!(bundle.validate().is_err());
        bundle.left_weight_fractions[3] = 1.0;
        bundle.right_weight_fractions[3] = 0.0;
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn validate_rejects_flight_sample() {
        let (l, r) = feet();
        let mut bundle = standing_bundle(l, r, 0.53, 10);
        bundle.left_in_contact[5] = false;
        bundle.right_in_contact[5] = false;
        assert!(bundle.validate().is_err());
    }
}
