//! Contact-wrench mapper.
//!
//! Distributes the desired centroidal wrench across the feet in contact:
//! the force is what the CoM command needs, `m (a_com_d + g e_z)`, and the
//! torque damps the centroidal angular momentum. A small QP picks per-foot
//! wrenches satisfying the same feasibility block as the torque QP, with the
//! regularization weighted by the commanded weight split so each foot tracks
//! its planned share of the load. The result feeds the torque QP as wrench
//! targets.

use nalgebra::{Vector2, Vector3};

use strider_balance::qp::DenseQp;
use strider_core::config::{ContactForcesConfig, WrenchMappingConfig};
use strider_core::error::SolverError;
use strider_core::types::{KinematicsSnapshot, SupportPhase, Wrench, GRAVITY};

use crate::contact::ForceFeasibility;
use crate::layout::Foot;
use crate::tasks::ConstraintLabel;

/// Per-tick inputs of the wrench mapper.
#[derive(Clone, Debug)]
pub struct WrenchMapInput<'a> {
    pub snapshot: &'a KinematicsSnapshot,
    pub support: SupportPhase,
    /// Desired CoM acceleration from the balance cascade.
    pub com_acceleration: Vector3<f64>,
    pub left_weight_fraction: f64,
    pub right_weight_fraction: f64,
}

/// Mapped wrench targets, `None` for a swing foot.
#[derive(Clone, Copy, Debug)]
pub struct MappedWrenches {
    pub left: Option<Wrench>,
    pub right: Option<Wrench>,
}

pub struct ContactWrenchMapper {
    scale: f64,
    offset: f64,
    angular_momentum_gain: f64,
    feasibility: ForceFeasibility,
    max_iters: u32,
}

impl ContactWrenchMapper {
    #[must_use]
    pub fn new(config: &WrenchMappingConfig, contact: &ContactForcesConfig) -> Self {
        Self {
            scale: config.regularization_scale,
            offset: config.regularization_offset,
            angular_momentum_gain: config.angular_momentum_gain,
            feasibility: ForceFeasibility::new(contact),
            max_iters: config.max_solver_iters,
        }
    }

    /// Solve the distribution for the current tick.
    pub fn map(&self, input: &WrenchMapInput<'_>) -> Result<MappedWrenches, SolverError> {
        let snapshot = input.snapshot;
        let feet: Vec<Foot> = match input.support {
            SupportPhase::Double => vec![Foot::Left, Foot::Right],
            SupportPhase::Left => vec![Foot::Left],
            SupportPhase::Right => vec![Foot::Right],
        };

        let n_vars = 6 * feet.len();
        let n_eq = 6;
        let n_ineq = self.feasibility.n_rows() * feet.len();
        let mut qp = DenseQp::new("wrench_map", n_vars, n_eq, n_ineq, self.max_iters);
        let mut labels: Vec<ConstraintLabel> = Vec::with_capacity(n_eq + n_ineq);

        // --- Centroidal wrench equalities ---
        // Force rows: Σ f_i = m (a_com_d + g e_z)
        // Torque rows: Σ (p_i - c) × f_i + τ_i = -k L
        let desired_force =
            snapshot.total_mass * (input.com_acceleration + Vector3::new(0.0, 0.0, GRAVITY));
        let desired_torque = -self.angular_momentum_gain * snapshot.angular_momentum;
        for (k, foot) in feet.iter().enumerate() {
            let cols = 6 * k;
            let lever = foot_position(snapshot, *foot) - snapshot.com_position;
            for axis in 0..3 {
                qp.constraints[(axis, cols + axis)] = 1.0;
            }
            let s = [
                [0.0, -lever.z, lever.y],
                [lever.z, 0.0, -lever.x],
                [-lever.y, lever.x, 0.0],
            ];
            for r in 0..3 {
                for c in 0..3 {
                    qp.constraints[(3 + r, cols + c)] = s[r][c];
                }
                qp.constraints[(3 + r, cols + 3 + r)] = 1.0;
            }
        }
        for axis in 0..3 {
            qp.bounds[axis] = desired_force[axis];
            qp.bounds[3 + axis] = desired_torque[axis];
            labels.push(ConstraintLabel::CentroidalWrench);
        }
        for _ in 0..3 {
            labels.push(ConstraintLabel::CentroidalWrench);
        }

        // --- Per-foot feasibility ---
        let mut row = n_eq;
        for (k, foot) in feet.iter().enumerate() {
            let rotation = match foot {
                Foot::Left => snapshot.left_foot_pose.rotation.to_rotation_matrix(),
                Foot::Right => snapshot.right_foot_pose.rotation.to_rotation_matrix(),
            };
            self.feasibility.fill(&mut qp, row, 6 * k..6 * k + 6, &rotation);
            for r in 0..self.feasibility.n_rows() {
                labels.push(self.feasibility.label(r));
            }
            row += self.feasibility.n_rows();
        }
        debug_assert_eq!(row, n_eq + n_ineq);

        // --- Weight-split regularization ---
        for (k, foot) in feet.iter().enumerate() {
            let fraction = match foot {
                Foot::Left => input.left_weight_fraction,
                Foot::Right => input.right_weight_fraction,
            };
            let weight = self.scale * fraction.abs() + self.offset;
            let share = fraction * snapshot.total_mass * GRAVITY;
            for w in 0..6 {
                let col = 6 * k + w;
                qp.hessian[(col, col)] += 2.0 * weight;
                if w == 2 {
                    qp.gradient[col] -= 2.0 * weight * share;
                }
            }
        }

        let solution = qp.solve()?;
        qp.check_solution(&solution.x, 1e-3, |r| {
            labels.get(r).map_or("unknown", |l| l.as_str())
        })?;

        let wrench_at = |k: usize| Wrench {
            force: Vector3::new(
                solution.x[6 * k],
                solution.x[6 * k + 1],
                solution.x[6 * k + 2],
            ),
            torque: Vector3::new(
                solution.x[6 * k + 3],
                solution.x[6 * k + 4],
                solution.x[6 * k + 5],
            ),
        };

        let mut mapped = MappedWrenches {
            left: None,
            right: None,
        };
        for (k, foot) in feet.iter().enumerate() {
            match foot {
                Foot::Left => mapped.left = Some(wrench_at(k)),
                Foot::Right => mapped.right = Some(wrench_at(k)),
            }
        }
        Ok(mapped)
    }
}

fn foot_position(snapshot: &KinematicsSnapshot, foot: Foot) -> Vector3<f64> {
    match foot {
        Foot::Left => snapshot.left_foot_pose.translation.vector,
        Foot::Right => snapshot.right_foot_pose.translation.vector,
    }
}

/// World-frame ZMP of a pair of mapped wrenches (diagnostics).
#[must_use]
pub fn mapped_zmp(
    mapped: &MappedWrenches,
    snapshot: &KinematicsSnapshot,
    min_normal_force: f64,
) -> Option<Vector2<f64>> {
    let mut weighted = Vector2::zeros();
    let mut total_fz = 0.0;
    for (wrench, pose) in [
        (mapped.left.as_ref(), &snapshot.left_foot_pose),
        (mapped.right.as_ref(), &snapshot.right_foot_pose),
    ] {
        if let Some(w) = wrench {
            if let Some(cop) = w.local_cop(min_normal_force) {
                weighted += Vector2::new(
                    pose.translation.x + cop.x,
                    pose.translation.y + cop.y,
                ) * w.force.z;
                total_fz += w.force.z;
            }
        }
    }
    (total_fz > min_normal_force).then(|| weighted / total_fz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torque_qp::test_model::{snapshot, MASS};
    use approx::assert_relative_eq;
    use strider_core::config::ControllerConfig;

    fn mapper() -> ContactWrenchMapper {
        let config = ControllerConfig::default();
        ContactWrenchMapper::new(&config.wrench_mapping, &config.contact_forces)
    }

    fn standing_input(snap: &KinematicsSnapshot) -> WrenchMapInput<'_> {
        WrenchMapInput {
            snapshot: snap,
            support: SupportPhase::Double,
            com_acceleration: Vector3::zeros(),
            left_weight_fraction: 0.5,
            right_weight_fraction: 0.5,
        }
    }

    #[test]
    fn double_support_splits_gravity_evenly() {
        let snap = snapshot();
        let mapped = mapper().map(&standing_input(&snap)).unwrap();
        let left = mapped.left.unwrap();
        let right = mapped.right.unwrap();

        assert_relative_eq!(left.force.z + right.force.z, MASS * GRAVITY, epsilon = 1e-3);
        assert_relative_eq!(left.force.z, right.force.z, epsilon = 0.5);
    }

    #[test]
    fn total_wrench_matches_desired_centroidal_wrench() {
        let snap = snapshot();
        let mut input = standing_input(&snap);
        input.com_acceleration = Vector3::new(0.5, 0.0, 0.0);
        let mapped = mapper().map(&input).unwrap();
        let left = mapped.left.unwrap();
        let right = mapped.right.unwrap();

        // Sum of forces = m (a + g)
        assert_relative_eq!(
            left.force.x + right.force.x,
            MASS * 0.5,
            epsilon = 1e-3
        );
        assert_relative_eq!(
            left.force.z + right.force.z,
            MASS * GRAVITY,
            epsilon = 1e-3
        );
    }

    #[test]
    fn uneven_split_loads_the_stance_side() {
        let snap = snapshot();
        let mut input = standing_input(&snap);
        input.left_weight_fraction = 0.9;
        input.right_weight_fraction = 0.1;
        let mapped = mapper().map(&input).unwrap();
        let left = mapped.left.unwrap();
        let right = mapped.right.unwrap();

        assert!(
            left.force.z > 3.0 * right.force.z,
            "left {} vs right {}",
            left.force.z,
            right.force.z
        );
    }

    #[test]
    fn single_support_sends_everything_to_the_stance_foot() {
        let snap = snapshot();
        let mut input = standing_input(&snap);
        input.support = SupportPhase::Right;
        input.left_weight_fraction = 0.0;
        input.right_weight_fraction = 1.0;
        let mapped = mapper().map(&input).unwrap();

        assert!(mapped.left.is_none());
        let right = mapped.right.unwrap();
        assert_relative_eq!(right.force.z, MASS * GRAVITY, epsilon = 1e-3);
    }

    #[test]
    fn mapped_wrenches_are_feasible() {
        let snap = snapshot();
        let config = ControllerConfig::default();
        let feasibility = ForceFeasibility::new(&config.contact_forces);
        let mapped = mapper().map(&standing_input(&snap)).unwrap();

        for wrench in [mapped.left.unwrap(), mapped.right.unwrap()] {
            assert!(feasibility.satisfied(&wrench.to_vector(), 1e-6));
        }
    }

    #[test]
    fn mapped_zmp_sits_between_even_feet() {
        let snap = snapshot();
        let mapped = mapper().map(&standing_input(&snap)).unwrap();
        let zmp = mapped_zmp(&mapped, &snap, 0.1).unwrap();
        assert_relative_eq!(zmp.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(zmp.y, 0.0, epsilon = 2e-2);
    }

    #[test]
    fn momentum_damping_counters_spin() {
        let mut snap = snapshot();
        snap.angular_momentum = Vector3::new(0.0, 0.0, 0.5);
        let mapped = mapper().map(&standing_input(&snap)).unwrap();
        let left = mapped.left.unwrap();
        let right = mapped.right.unwrap();

        // Torque rows demand Σ lever×f + τ = -k L: the yaw component comes
        // out negative to bleed off the momentum.
        let lever_l = snap.left_foot_pose.translation.vector - snap.com_position;
        let lever_r = snap.right_foot_pose.translation.vector - snap.com_position;
        let total = lever_l.cross(&left.force)
            + lever_r.cross(&right.force)
            + left.torque
            + right.torque;
        assert_relative_eq!(total.z, -0.5, epsilon = 1e-3);
    }
}
