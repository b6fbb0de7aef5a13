//! Live reference buffers.
//!
//! Every signal lives in its own deque; all deques share one sample grid and
//! stay index-aligned at all times. The front of each buffer is "now".
//! Advancing pops one sample from every front and duplicates every back, so
//! past the planned horizon the references implicitly hold their last value.

use std::collections::VecDeque;

use nalgebra::{Isometry3, Vector2};

use strider_core::error::PlannerError;
use strider_core::types::{SpatialAcceleration, SupportPhase, Twist};

use crate::bundle::TrajectoryBundle;

/// The reference values at the front of every buffer ("now").
#[derive(Clone, Debug)]
pub struct ReferenceSample {
    pub left_foot_pose: Isometry3<f64>,
    pub right_foot_pose: Isometry3<f64>,
    pub left_foot_twist: Twist,
    pub right_foot_twist: Twist,
    pub left_foot_acceleration: SpatialAcceleration,
    pub right_foot_acceleration: SpatialAcceleration,
    pub left_in_contact: bool,
    pub right_in_contact: bool,
    pub left_is_fixed_frame: bool,
    pub dcm_position: Vector2<f64>,
    pub dcm_velocity: Vector2<f64>,
    pub zmp_position: Vector2<f64>,
    pub com_height: f64,
    pub com_height_velocity: f64,
    pub left_weight_fraction: f64,
    pub right_weight_fraction: f64,
}

impl ReferenceSample {
    /// Support phase of this sample. Planned samples always have at least one
    /// foot in contact (the bundle validation enforces it).
    #[must_use]
    pub fn support_phase(&self) -> SupportPhase {
        SupportPhase::from_contacts(self.left_in_contact, self.right_in_contact)
            .unwrap_or(SupportPhase::Double)
    }
}

/// Sample-aligned deques holding the reference signals for feet, DCM, ZMP,
/// CoM height, contact schedule, and weight split.
#[derive(Clone, Debug, Default)]
pub struct ReferenceBuffers {
    left_foot_poses: VecDeque<Isometry3<f64>>,
    right_foot_poses: VecDeque<Isometry3<f64>>,
    left_foot_twists: VecDeque<Twist>,
    right_foot_twists: VecDeque<Twist>,
    left_foot_accelerations: VecDeque<SpatialAcceleration>,
    right_foot_accelerations: VecDeque<SpatialAcceleration>,
    left_in_contact: VecDeque<bool>,
    right_in_contact: VecDeque<bool>,
    left_is_fixed_frame: VecDeque<bool>,
    dcm_positions: VecDeque<Vector2<f64>>,
    dcm_velocities: VecDeque<Vector2<f64>>,
    zmp_positions: VecDeque<Vector2<f64>>,
    com_heights: VecDeque<f64>,
    com_height_velocities: VecDeque<f64>,
    left_weight_fractions: VecDeque<f64>,
    right_weight_fractions: VecDeque<f64>,
}

/// Truncate `deque` to `offset` samples, then append the whole of `new`.
///
/// The bulk assignment behind every splice: the tail older than the merge
/// point is discarded and the fresh plan becomes the new suffix.
fn splice_into<T: Clone>(deque: &mut VecDeque<T>, new: &[T], offset: usize) {
    deque.truncate(offset);
    deque.extend(new.iter().cloned());
}

impl ReferenceBuffers {
    /// Initialize every buffer from a validated bundle.
    pub fn from_bundle(bundle: &TrajectoryBundle) -> Result<Self, PlannerError> {
        bundle.validate()?;
        let mut buffers = Self::default();
        buffers.splice(bundle, 0)?;
        Ok(buffers)
    }

    /// Shared buffer length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dcm_positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dcm_positions.is_empty()
    }

    /// True when every deque holds the same number of samples.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        let n = self.len();
        [
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
        .all(|&len| len == n)
    }

    /// Pop one sample from every front and duplicate every back.
    ///
    /// Keeps the buffer length constant: references past the planned horizon
    /// hold their last value.
    pub fn advance(&mut self) {
        // A single-sample buffer keeps its sample: pop-then-duplicate is a no-op.
        fn advance_one<T: Clone>(deque: &mut VecDeque<T>) {
            if deque.len() <= 1 {
                return;
            }
            deque.pop_front();
            let back = deque.back().cloned();
            if let Some(back) = back {
                deque.push_back(back);
            }
        }

        advance_one(&mut self.left_foot_poses);
        advance_one(&mut self.right_foot_poses);
        advance_one(&mut self.left_foot_twists);
        advance_one(&mut self.right_foot_twists);
        advance_one(&mut self.left_foot_accelerations);
        advance_one(&mut self.right_foot_accelerations);
        advance_one(&mut self.left_in_contact);
        advance_one(&mut self.right_in_contact);
        advance_one(&mut self.left_is_fixed_frame);
        advance_one(&mut self.dcm_positions);
        advance_one(&mut self.dcm_velocities);
        advance_one(&mut self.zmp_positions);
        advance_one(&mut self.com_heights);
        advance_one(&mut self.com_height_velocities);
        advance_one(&mut self.left_weight_fractions);
        advance_one(&mut self.right_weight_fractions);

        debug_assert!(self.is_aligned());
    }

    /// Splice a fresh bundle into every buffer at `offset` samples from now.
    ///
    /// The samples at indices `>= offset` are replaced by the bundle; the
    /// buffers grow or shrink to `offset + bundle.len()`.
    pub fn splice(&mut self, bundle: &TrajectoryBundle, offset: usize) -> Result<(), PlannerError> {
        bundle.validate()?;
        if offset > self.len() {
            return Err(PlannerError::MergePointOutOfRange {
                merge_point: offset,
                len: self.len(),
            });
        }

        splice_into(&mut self.left_foot_poses, &bundle.left_foot_poses, offset);
        splice_into(&mut self.right_foot_poses, &bundle.right_foot_poses, offset);
        splice_into(&mut self.left_foot_twists, &bundle.left_foot_twists, offset);
        splice_into(&mut self.right_foot_twists, &bundle.right_foot_twists, offset);
        splice_into(
            &mut self.left_foot_accelerations,
            &bundle.left_foot_accelerations,
            offset,
        );
        splice_into(
            &mut self.right_foot_accelerations,
            &bundle.right_foot_accelerations,
            offset,
        );
        splice_into(&mut self.left_in_contact, &bundle.left_in_contact, offset);
        splice_into(&mut self.right_in_contact, &bundle.right_in_contact, offset);
        splice_into(
            &mut self.left_is_fixed_frame,
            &bundle.left_is_fixed_frame,
            offset,
        );
        splice_into(&mut self.dcm_positions, &bundle.dcm_positions, offset);
        splice_into(&mut self.dcm_velocities, &bundle.dcm_velocities, offset);
        splice_into(&mut self.zmp_positions, &bundle.zmp_positions, offset);
        splice_into(&mut self.com_heights, &bundle.com_heights, offset);
        splice_into(
            &mut self.com_height_velocities,
            &bundle.com_height_velocities,
            offset,
        );
        splice_into(
            &mut self.left_weight_fractions,
            &bundle.left_weight_fractions,
            offset,
        );
        splice_into(
            &mut self.right_weight_fractions,
            &bundle.right_weight_fractions,
            offset,
        );

        debug_assert!(self.is_aligned());
        Ok(())
    }

    /// Drop every sample. Used on stop.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The reference values at "now".
    ///
    /// # Panics
    /// Panics on empty buffers; callers gate on [`is_empty`](Self::is_empty).
    #[must_use]
    pub fn current(&self) -> ReferenceSample {
        self.sample_at(0)
    }

    /// The reference values `offset` samples ahead of now.
    ///
    /// # Panics
    /// Panics when `offset >= len()`.
    #[must_use]
    pub fn sample_at(&self, offset: usize) -> ReferenceSample {
        ReferenceSample {
            left_foot_pose: self.left_foot_poses[offset],
            right_foot_pose: self.right_foot_poses[offset],
            left_foot_twist: self.left_foot_twists[offset],
            right_foot_twist: self.right_foot_twists[offset],
            left_foot_acceleration: self.left_foot_accelerations[offset],
            right_foot_acceleration: self.right_foot_accelerations[offset],
            left_in_contact: self.left_in_contact[offset],
            right_in_contact: self.right_in_contact[offset],
            left_is_fixed_frame: self.left_is_fixed_frame[offset],
            dcm_position: self.dcm_positions[offset],
            dcm_velocity: self.dcm_velocities[offset],
            zmp_position: self.zmp_positions[offset],
            com_height: self.com_heights[offset],
            com_height_velocity: self.com_height_velocities[offset],
            left_weight_fraction: self.left_weight_fractions[offset],
            right_weight_fraction: self.right_weight_fractions[offset],
        }
    }

    /// Desired DCM positions from `offset` for `count` samples, padding with
    /// the last planned sample. Feeds the MPC reference over its horizon.
    #[must_use]
    pub fn dcm_position_window(&self, offset: usize, count: usize) -> Vec<Vector2<f64>> {
        let last = *self
            .dcm_positions
            .back()
            .expect("dcm window requested on empty buffers");
        (0..count)
            .map(|k| {
                self.dcm_positions
                    .get(offset + k)
                    .copied()
                    .unwrap_or(last)
            })
            .collect()
    }

    /// Remaining samples until the first change of the contact schedule,
    /// starting from now. Gives the step adaptor its remaining swing time.
    #[must_use]
    pub fn samples_until_contact_switch(&self) -> usize {
        let first_left = self.left_in_contact.front().copied().unwrap_or(true);
        let first_right = self.right_in_contact.front().copied().unwrap_or(true);
        for k in 1..self.len() {
            if self.left_in_contact[k] != first_left || self.right_in_contact[k] != first_right {
                return k;
            }
        }
        self.len()
    }
}
