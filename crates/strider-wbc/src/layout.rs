//! Decision-vector layout of the task-based torque QP.
//!
//! The layout is fixed and global:
//!
//! ```text
//! x = [ ν̇ (6 + nJ) | τ (nJ) | w_first (6) | w_second (6, double support) ]
//! ```
//!
//! In double support the left wrench block precedes the right one; in single
//! support only the stance foot owns a block and the swing foot has none.
//! Every task and constraint receives its column block from here instead of
//! keeping pointers into the solver.

use std::ops::Range;

use strider_core::types::SupportPhase;

/// Which foot a wrench block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Foot {
    Left,
    Right,
}

impl Foot {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// The stance foot of a single-support phase.
    #[must_use]
    pub const fn stance_of(phase: SupportPhase) -> Option<Self> {
        match phase {
            SupportPhase::Left => Some(Self::Left),
            SupportPhase::Right => Some(Self::Right),
            SupportPhase::Double => None,
        }
    }
}

/// Column layout for one support phase.
#[derive(Clone, Copy, Debug)]
pub struct DecisionLayout {
    n_joints: usize,
    support: SupportPhase,
}

impl DecisionLayout {
    #[must_use]
    pub const fn new(n_joints: usize, support: SupportPhase) -> Self {
        Self { n_joints, support }
    }

    #[must_use]
    pub const fn support(&self) -> SupportPhase {
        self.support
    }

    #[must_use]
    pub const fn n_joints(&self) -> usize {
        self.n_joints
    }

    /// Total number of decision variables.
    #[must_use]
    pub const fn n_vars(&self) -> usize {
        6 + self.n_joints + self.n_joints + 6 * self.support.contact_count()
    }

    /// Generalized acceleration `ν̇ = [base; joints]`.
    #[must_use]
    pub const fn generalized_acceleration(&self) -> Range<usize> {
        0..6 + self.n_joints
    }

    /// Base acceleration block of `ν̇`.
    #[must_use]
    pub const fn base_acceleration(&self) -> Range<usize> {
        0..6
    }

    /// Joint acceleration block of `ν̇`.
    #[must_use]
    pub const fn joint_acceleration(&self) -> Range<usize> {
        6..6 + self.n_joints
    }

    /// Joint torques.
    #[must_use]
    pub const fn torque(&self) -> Range<usize> {
        6 + self.n_joints..6 + 2 * self.n_joints
    }

    /// Contact wrench block of `foot`, `None` for a swing foot.
    #[must_use]
    pub fn wrench(&self, foot: Foot) -> Option<Range<usize>> {
        let base = 6 + 2 * self.n_joints;
        match (self.support, foot) {
            (SupportPhase::Double, Foot::Left) => Some(base..base + 6),
            (SupportPhase::Double, Foot::Right) => Some(base + 6..base + 12),
            (SupportPhase::Left, Foot::Left) | (SupportPhase::Right, Foot::Right) => {
                Some(base..base + 6)
            }
            _ => None,
        }
    }

    /// Wrench blocks of the feet in contact, left before right.
    #[must_use]
    pub fn contact_wrenches(&self) -> Vec<(Foot, Range<usize>)> {
        [Foot::Left, Foot::Right]
            .into_iter()
            .filter_map(|foot| self.wrench(foot).map(|cols| (foot, cols)))
            .collect()
    }
}
