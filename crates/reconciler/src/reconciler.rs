//! The per-kind reconcile entry point.

use async_trait::async_trait;
use autoscaler_core::NamespacedName;

use crate::error::Result;
use crate::types::ReconcileOutcome;

/// Drives one object of a kind toward its desired state.
///
/// Callers guarantee at most one concurrent pass per key and may deliver
/// the same key more than once, so every pass must be idempotent.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Kind of the primary object, e.g. `ClusterAutoscaler`.
    fn kind(&self) -> &'static str;

    /// Run one pass for `key`. An object that no longer exists is not an
    /// error and yields an empty outcome.
    async fn reconcile(&self, key: &NamespacedName) -> Result<ReconcileOutcome>;
}
