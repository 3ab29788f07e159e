//! Get-or-create, compare, apply.
//!
//! [`Synchronizer::apply`] fetches the observed object, creates it when
//! absent, and otherwise lets [`Converge`] fold the desired shape into it.
//! A write happens only when converging reports a change, so a second pass
//! over an unchanged spec performs no writes.

use autoscaler_api::apps::Deployment;
use autoscaler_api::monitoring::{PrometheusRule, ServiceMonitor};
use autoscaler_api::networking::NetworkPolicy;
use autoscaler_api::service::Service;
use autoscaler_core::{HasMetadata, ObjectMeta, Resource};
use autoscaler_store::Client;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{SyncOperation, SyncOutcome};

/// Folds a desired object into the observed one.
pub trait Converge: Resource {
    /// Overwrite the mutable parts of `existing` with `desired`.
    /// Returns whether anything changed.
    fn converge(existing: &mut Self, desired: &Self) -> bool;
}

/// Merge desired labels, annotations and owner references into `existing`,
/// keeping keys set by others.
fn converge_metadata(existing: &mut ObjectMeta, desired: &ObjectMeta) -> bool {
    let mut changed = false;
    for (key, value) in &desired.labels {
        if existing.labels.get(key) != Some(value) {
            existing.labels.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    for (key, value) in &desired.annotations {
        changed |= existing.set_annotation(key, value.clone());
    }
    for owner in &desired.owner_references {
        changed |= existing.add_owner_reference(owner.clone());
    }
    changed
}

fn replace<T: PartialEq + Clone>(existing: &mut T, desired: &T) -> bool {
    if existing == desired {
        return false;
    }
    existing.clone_from(desired);
    true
}

impl Converge for Deployment {
    fn converge(existing: &mut Self, desired: &Self) -> bool {
        let meta = converge_metadata(&mut existing.metadata, &desired.metadata);
        let spec = replace(&mut existing.spec, &desired.spec);
        meta || spec
    }
}

impl Converge for Service {
    /// The cluster IP is allocated once and kept.
    fn converge(existing: &mut Self, desired: &Self) -> bool {
        let meta = converge_metadata(&mut existing.metadata, &desired.metadata);
        let mut spec = desired.spec.clone();
        spec.cluster_ip.clone_from(&existing.spec.cluster_ip);
        let spec = replace(&mut existing.spec, &spec);
        meta || spec
    }
}

macro_rules! converge_spec {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Converge for $ty {
                fn converge(existing: &mut Self, desired: &Self) -> bool {
                    let meta = converge_metadata(&mut existing.metadata, &desired.metadata);
                    let spec = replace(&mut existing.spec, &desired.spec);
                    meta || spec
                }
            }
        )+
    };
}

converge_spec!(ServiceMonitor, PrometheusRule, NetworkPolicy);

/// Applies desired objects to the store.
#[derive(Clone)]
pub struct Synchronizer {
    client: Client,
}

impl Synchronizer {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create `desired` if absent, otherwise converge the observed object
    /// and write it back when it changed.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound` on the initial read.
    pub async fn apply<T: Converge>(&self, desired: &T) -> Result<SyncOutcome> {
        let key = desired.key();

        let Some(mut existing) = self
            .client
            .get_opt::<T>(desired.namespace(), desired.name())
            .await?
        else {
            self.client.create(desired).await?;
            info!(key = %key, "Created object");
            return Ok(SyncOutcome::new(key, SyncOperation::Created));
        };

        if !T::converge(&mut existing, desired) {
            debug!(key = %key, "Object up to date");
            return Ok(SyncOutcome::new(key, SyncOperation::Unchanged));
        }

        self.client.update(&existing).await?;
        info!(key = %key, "Updated object");
        Ok(SyncOutcome::new(key, SyncOperation::Updated))
    }

    /// Delete an object; one that is already gone is reported as absent.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound`.
    pub async fn remove<T: Resource>(&self, namespace: &str, name: &str) -> Result<SyncOutcome> {
        let key = T::key_for(namespace, name);
        match self.client.delete::<T>(namespace, name).await {
            Ok(()) => {
                info!(key = %key, "Deleted object");
                Ok(SyncOutcome::new(key, SyncOperation::Deleted))
            }
            Err(e) if e.is_not_found() => Ok(SyncOutcome::new(key, SyncOperation::Absent)),
            Err(e) => Err(e.into()),
        }
    }
}
