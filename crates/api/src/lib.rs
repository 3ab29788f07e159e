//! # autoscaler-api
//!
//! Typed resources the operator reads and writes. Each kind is a plain
//! serde struct implementing [`autoscaler_core::Resource`], so it can be
//! moved in and out of the object store.
//!
//! - [`autoscaling`]: `ClusterAutoscaler` and `MachineAutoscaler`
//! - [`apps`]: the `Deployment` that runs the autoscaler binary
//! - [`service`]: the metrics `Service`
//! - [`monitoring`]: `ServiceMonitor` and `PrometheusRule`
//! - [`networking`]: `NetworkPolicy`
//! - [`config`]: `ClusterOperator` status reporting

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use autoscaler_core::GroupVersionKind;

/// Implement `HasMetadata` and `Resource` for a struct with a `metadata` field.
macro_rules! resource {
    ($ty:ty, $group:expr, $version:expr, $kind:expr) => {
        resource!($ty, $group, $version, $kind, true);
    };
    ($ty:ty, $group:expr, $version:expr, $kind:expr, $namespaced:expr) => {
        impl autoscaler_core::HasMetadata for $ty {
            fn metadata(&self) -> &autoscaler_core::ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut autoscaler_core::ObjectMeta {
                &mut self.metadata
            }
        }

        impl autoscaler_core::Resource for $ty {
            const GROUP: &'static str = $group;
            const VERSION: &'static str = $version;
            const KIND: &'static str = $kind;
            const NAMESPACED: bool = $namespaced;
        }
    };
}

pub mod apps;
pub mod autoscaling;
pub mod config;
pub mod monitoring;
pub mod networking;
pub mod service;

pub use apps::Deployment;
pub use autoscaling::{ClusterAutoscaler, MachineAutoscaler};
pub use config::ClusterOperator;
pub use monitoring::{PrometheusRule, ServiceMonitor};
pub use networking::NetworkPolicy;
pub use service::Service;

/// Every kind defined in this crate.
pub fn builtin_kinds() -> Vec<GroupVersionKind> {
    use autoscaler_core::Resource;

    vec![
        ClusterAutoscaler::gvk(),
        MachineAutoscaler::gvk(),
        Deployment::gvk(),
        Service::gvk(),
        ServiceMonitor::gvk(),
        PrometheusRule::gvk(),
        NetworkPolicy::gvk(),
        ClusterOperator::gvk(),
    ]
}
