//! Reconcilers for the cluster autoscaler operator.
//!
//! Two reconcilers drive the store toward the state the autoscaler
//! resources ask for:
//!
//! - [`ClusterAutoscalerReconciler`] renders the singleton
//!   `ClusterAutoscaler` into its `Deployment` and the monitoring and
//!   network objects around it, writing only what differs.
//! - [`MachineAutoscalerReconciler`] claims a scalable target for each
//!   `MachineAutoscaler`, stamps its min/max markers, and releases the
//!   previous target when the reference moves.
//!
//! Both validate first, through the same validators [`AdmissionRouter`]
//! uses, and both are idempotent: a second pass over an unchanged object
//! performs no writes.
//!
//! [`StatusLoop`] runs beside them and publishes operator health on a
//! `ClusterOperator`, dampening transient failures.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use autoscaler_core::NamespacedName;
//! use autoscaler_reconciler::{AutoscalerConfig, ClusterAutoscalerReconciler, Reconcile};
//! use autoscaler_store::{Client, InMemoryObjectStore};
//!
//! let store = InMemoryObjectStore::new_arc();
//! let reconciler = ClusterAutoscalerReconciler::new(Client::new(store), AutoscalerConfig::default());
//! let outcome = reconciler.reconcile(&NamespacedName::new("", "default")).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod admission;
pub mod clusterautoscaler;
pub mod desired;
pub mod error;
pub mod machineautoscaler;
pub mod reconciler;
pub mod status;
pub mod sync;
pub mod target;
pub mod types;
pub mod validation;

pub use admission::{AdmissionResponse, AdmissionRouter};
pub use clusterautoscaler::{CLUSTER_AUTOSCALER_FINALIZER, ClusterAutoscalerReconciler};
pub use desired::{AutoscalerConfig, DesiredState, DesiredStateBuilder};
pub use error::{Error, Result};
pub use machineautoscaler::MachineAutoscalerReconciler;
pub use reconciler::Reconcile;
pub use status::{
    LoopStopper, StatusAggregator, StatusConfig, StatusLoop, StatusReport, StatusTrigger,
};
pub use sync::{Converge, Synchronizer};
pub use target::{
    MACHINE_TARGET_FINALIZER, MachineTarget, OWNER_ANNOTATION, TargetClient, TargetError,
    TargetMigration, TargetRegistry,
};
pub use types::{ReconcileAction, ReconcileOutcome, SyncOperation, SyncOutcome};
pub use validation::{
    ClusterAutoscalerValidator, MachineAutoscalerValidator, ValidationResponse,
};
