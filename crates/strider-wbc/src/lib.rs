// strider-wbc: whole-body QP solvers for the strider walking controller.
//
// The torque pipeline runs admittance -> wrench mapping -> task-based torque
// QP; the kinematic pipeline runs the velocity-IK QP. Both share the contact
// feasibility rows and the decision-vector layout.

pub mod admittance;
pub mod contact;
pub mod ik_qp;
pub mod layout;
pub mod tasks;
pub mod torque_qp;
pub mod wrench_map;

pub use admittance::{AdmittanceController, AdmittanceInput, AdmittanceSolution};
pub use contact::{fill_zmp_rows, ForceFeasibility};
pub use ik_qp::{IkQpInput, IkSolution, VelocityIkSolver, IK_FEASIBILITY_TOLERANCE};
pub use layout::{DecisionLayout, Foot};
pub use tasks::{ConstraintLabel, TaskKind};
pub use torque_qp::{
    FootReference, TaskBasedTorqueSolver, TorqueQpInput, TorqueSolution,
    TORQUE_FEASIBILITY_TOLERANCE,
};
pub use wrench_map::{mapped_zmp, ContactWrenchMapper, MappedWrenches, WrenchMapInput};
