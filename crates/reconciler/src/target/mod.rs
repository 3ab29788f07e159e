//! Scalable targets: the external objects a `MachineAutoscaler` controls.
//!
//! Only target metadata is touched. Ownership, limits and capacity hints
//! are all annotations, read and written through [`MachineTarget`].

mod client;
mod machine_target;
mod migration;
mod registry;

use thiserror::Error;

pub use client::TargetClient;
pub use machine_target::MachineTarget;
pub use migration::TargetMigration;
pub use registry::TargetRegistry;

/// Owner marker, value `namespace/name` of the owning `MachineAutoscaler`.
pub const OWNER_ANNOTATION: &str = "autoscaling.openshift.io/machineautoscaler";

pub const MIN_SIZE_ANNOTATION: &str = "machine.openshift.io/cluster-api-autoscaler-node-group-min-size";

pub const MAX_SIZE_ANNOTATION: &str = "machine.openshift.io/cluster-api-autoscaler-node-group-max-size";

/// Finalizer held on a `MachineAutoscaler` while its target carries our markers.
pub const MACHINE_TARGET_FINALIZER: &str = "machinetarget.autoscaling.openshift.io";

/// Errors from target lookup and ownership operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("missing min or max annotation")]
    MissingAnnotations,

    #[error("already owned by another MachineAutoscaler")]
    AlreadyOwned,

    #[error("missing owner annotation")]
    MissingOwner,

    #[error("incorrectly formatted owner annotation")]
    BadOwner,

    #[error("unsupported MachineAutoscaler target")]
    UnsupportedTarget,

    #[error("invalid MachineAutoscaler target")]
    InvalidTarget,

    #[error("bad min annotation: {0}")]
    BadMin(String),

    #[error("bad max annotation: {0}")]
    BadMax(String),

    #[error("failed to check scale from zero annotations: could not parse integer: {0}")]
    BadCapacity(String),
}
