// strider-balance: the balance cascade of the strider walking controller.
//
// Outer to inner: DCM control (reactive or model-predictive) producing the
// desired ZMP, the ZMP-CoM loop producing the CoM command, the stable LIPM
// integrator producing the CoM reference, and the step adaptor re-placing
// and re-timing the upcoming footstep under disturbances.

pub mod cartesian_pid;
pub mod dcm_mpc;
pub mod dcm_reactive;
pub mod hull;
pub mod lipm;
pub mod qp;
pub mod step_adaptor;
pub mod zmp_com;

pub use cartesian_pid::{LinearPid, RotationalPid};
pub use dcm_mpc::DcmMpcController;
pub use dcm_reactive::DcmReactiveController;
pub use hull::{foot_corners, ConvexHull};
pub use lipm::LipmReference;
pub use qp::{DenseQp, QpSolution};
pub use step_adaptor::{StepAdaptation, StepAdaptor, StepAdaptorInput};
pub use zmp_com::ZmpComController;
