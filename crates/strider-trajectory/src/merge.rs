//! Merge-point bookkeeping and the two-phase replan countdown.
//!
//! A replan runs in two phases tied to one countdown. The countdown tracks
//! the live buffer offset of the pending merge sample, so it decrements in
//! lockstep with the buffer advance:
//!
//! 1. when the countdown reaches the planner lookahead, the planner is asked
//!    for a fresh bundle starting at the merge sample;
//! 2. when it reaches [`SPLICE_OFFSET`], the returned bundle is spliced into
//!    every buffer at that offset.
//!
//! If the plan is not ready at the splice deadline the buffers are held and
//! the countdown is re-armed at the lookahead.

use std::collections::VecDeque;

/// Buffer offset at which a pending bundle is spliced in.
pub const SPLICE_OFFSET: usize = 2;

/// What the orchestrator must do for the merge machinery this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeAction {
    /// Nothing pending.
    None,
    /// Hand the planner a request for a trajectory starting at this offset.
    RequestPlan { sample_offset: usize },
    /// Splice the planner's bundle into the buffers at this offset.
    Splice { sample_offset: usize },
}

/// Merge points of the live trajectory plus the replan countdown.
#[derive(Clone, Debug, Default)]
pub struct MergeScheduler {
    /// Ascending offsets (in samples from now) where a splice stays smooth.
    merge_points: VecDeque<usize>,
    /// Offset of the pending merge sample; `None` when no replan is pending.
    countdown: Option<usize>,
    /// Samples ahead at which the planner is invoked.
    lookahead: usize,
}

impl MergeScheduler {
    #[must_use]
    pub fn new(lookahead: usize) -> Self {
        Self {
            merge_points: VecDeque::new(),
            countdown: None,
            lookahead,
        }
    }

    /// Current merge points, front first.
    #[must_use]
    pub fn merge_points(&self) -> &VecDeque<usize> {
        &self.merge_points
    }

    /// True when a replan has been scheduled and not yet spliced.
    #[must_use]
    pub const fn replan_pending(&self) -> bool {
        self.countdown.is_some()
    }

    /// Offset of the pending merge sample, if any.
    #[must_use]
    pub const fn countdown(&self) -> Option<usize> {
        self.countdown
    }

    /// Schedule a replan for a new goal.
    ///
    /// Implements the merge discipline: splice at the next merge point when it
    /// is far enough away, at the one after it otherwise, and `lookahead`
    /// samples ahead when the trajectory has run out of merge points (only
    /// legal in double support; the caller checks). Calling again while a
    /// request is pending keeps the earlier countdown, except that a pending
    /// request is re-targeted when the next merge point is still far away.
    pub fn schedule_replan(&mut self) {
        if self.merge_points.is_empty() {
            if self.countdown.is_none() {
                self.countdown = Some(self.lookahead);
            }
            return;
        }

        let front = self.merge_points[0];
        if front > self.lookahead {
            self.countdown = Some(front);
        } else if self.countdown.is_some() {
            // Keep the pending countdown
        } else if self.merge_points.len() > 1 {
            self.countdown = Some(self.merge_points[1]);
        } else {
            self.countdown = Some(self.lookahead);
        }
    }

    /// Step the countdown and report what this tick must do.
    ///
    /// Call once per tick, before the buffers advance. The returned offset is
    /// the pending merge sample's current position in the buffers.
    pub fn poll(&mut self) -> MergeAction {
        let Some(countdown) = self.countdown else {
            return MergeAction::None;
        };

        let action = if countdown == self.lookahead {
            MergeAction::RequestPlan {
                sample_offset: countdown,
            }
        } else if countdown == SPLICE_OFFSET {
            MergeAction::Splice {
                sample_offset: countdown,
            }
        } else {
            MergeAction::None
        };

        // The splice keeps its offset until the orchestrator reports the
        // outcome; every other pending state tracks the buffer advance.
        if countdown != SPLICE_OFFSET {
            self.countdown = Some(countdown - 1);
        }
        action
    }

    /// Record a successful splice: clear the countdown and adopt the merge
    /// points of the fresh bundle, rebased to live buffer offsets.
    ///
    /// The planner's leading zero (its first sample is always a legal merge
    /// point) is dropped.
    pub fn splice_done(&mut self, bundle_merge_points: &[usize], splice_offset: usize) {
        self.countdown = None;
        self.merge_points = bundle_merge_points
            .iter()
            .filter(|&&p| p != 0)
            .map(|&p| p + splice_offset)
            .collect();
    }

    /// Record a planner miss at the splice deadline: hold the buffers and
    /// re-arm the request `lookahead` samples ahead.
    pub fn replan_missed(&mut self) {
        self.countdown = Some(self.lookahead);
    }

    /// Track one buffer advance: merge points shift one sample closer and a
    /// merge point reaching now is dropped.
    pub fn advance(&mut self) {
        for point in &mut self.merge_points {
            *point = point.saturating_sub(1);
        }
        if self.merge_points.front() == Some(&0) {
            self.merge_points.pop_front();
        }
    }

    /// Drop all scheduling state. Used on stop.
    pub fn clear(&mut self) {
        self.merge_points.clear();
        self.countdown = None;
    }

    /// True when the offsets are strictly increasing and inside the buffer.
    #[must_use]
    pub fn is_consistent(&self, buffer_len: usize) -> bool {
        self.merge_points
            .iter()
            .zip(self.merge_points.iter().skip(1))
            .all(|(a, b)| a < b)
            && self.merge_points.iter().all(|&p| p < buffer_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_merge_points_schedules_lookahead_ahead() {
        let mut sched = MergeScheduler::new(10);
        sched.schedule_replan();
        assert_eq!(sched.countdown(), Some(10));
    }

    #[test]
    fn far_merge_point_is_used_directly() {
        let mut sched = MergeScheduler::new(10);
        sched.splice_done(&[0, 35, 70], 0);
        sched.schedule_replan();
        assert_eq!(sched.countdown(), Some(35));
    }

    #[test]
    fn near_merge_point_falls_through_to_second() {
        let mut sched = MergeScheduler::new(10);
        sched.splice_done(&[0, 6, 41], 0);
        sched.schedule_replan();
        assert_eq!(sched.countdown(), Some(41));
    }

    #[test]
    fn near_single_merge_point_schedules_lookahead() {
        let mut sched = MergeScheduler::new(10);
        sched.splice_done(&[0, 6], 0);
        sched.schedule_replan();
        assert_eq!(sched.countdown(), Some(10));
    }

    #[test]
    fn repeated_schedule_is_idempotent() {
        let mut sched = MergeScheduler::new(10);
        sched.schedule_replan();
        let first = sched.countdown();
        sched.poll();
        sched.schedule_replan();
        // Second request while pending keeps the running countdown
        assert_eq!(sched.countdown(), first.map(|c| c - 1));
    }

    #[test]
    fn countdown_walks_request_then_splice() {
        let mut sched = MergeScheduler::new(10);
        sched.schedule_replan();

        // First poll fires the planner request at the lookahead offset
        assert_eq!(
            sched.poll(),
            MergeAction::RequestPlan { sample_offset: 10 }
        );
        assert_eq!(sched.countdown(), Some(9));
        // Countdown then walks down with the buffers
        for expected in (2..9).rev() {
            assert_eq!(sched.poll(), MergeAction::None);
            assert_eq!(sched.countdown(), Some(expected));
        }
        // Pending merge sample is 2 ahead: splice now
        assert_eq!(sched.poll(), MergeAction::Splice { sample_offset: 2 });
    }

    #[test]
    fn splice_waits_until_outcome_is_reported() {
        let mut sched = MergeScheduler::new(10);
        sched.schedule_replan();
        while sched.poll() != (MergeAction::Splice { sample_offset: 2 }) {}
        // Still pending: the orchestrator has not reported the outcome yet
        assert_eq!(sched.poll(), MergeAction::Splice { sample_offset: 2 });

        sched.splice_done(&[0, 17, 52], 2);
        assert!(!sched.replan_pending());
        assert_eq!(sched.merge_points().iter().copied().collect::<Vec<_>>(), vec![19, 54]);
        assert_eq!(sched.poll(), MergeAction::None);
    }

    #[test]
    fn miss_rearms_at_lookahead() {
        let mut sched = MergeScheduler::new(10);
        sched.schedule_replan();
        while sched.poll() != (MergeAction::Splice { sample_offset: 2 }) {}
        sched.replan_missed();
        assert_eq!(sched.countdown(), Some(10));
        // The next walk fires a fresh planner request
        assert_eq!(
            sched.poll(),
            MergeAction::RequestPlan { sample_offset: 10 }
        );
    }

    #[test]
    fn advance_decrements_and_drops_head() {
        let mut sched = MergeScheduler::new(10);
        sched.splice_done(&[0, 2, 30], 0);
        assert_eq!(sched.merge_points().len(), 2);
        sched.advance();
        assert_eq!(sched.merge_points()[0], 1);
        sched.advance();
        // Head reached zero and is dropped
        assert_eq!(sched.merge_points().len(), 1);
        assert_eq!(sched.merge_points()[0], 28);
    }

    #[test]
    fn consistency_check() {
        let mut sched = MergeScheduler::new(10);
        sched.splice_done(&[0, 12, 40], 0);
        assert!(sched.is_consistent(60));
        assert!(!sched.is_consistent(30));
    }

    #[test]
    fn clear_resets_everything() {
        let mut sched = MergeScheduler::new(10);
        sched.splice_done(&[0, 12], 0);
        sched.schedule_replan();
        sched.clear();
        assert!(!sched.replan_pending());
        assert!(sched.merge_points().is_empty());
    }
}
