//! Ownership hand-off when a `MachineAutoscaler` is pointed at a new target.
//!
//! `lastTargetRef` in the autoscaler's status records the target we last
//! bound. It only moves forward once the previous target has been
//! finalized or is confirmed gone, so a failed pass is retried from the
//! same state.

use autoscaler_api::MachineAutoscaler;
use autoscaler_api::autoscaling::ScalableTargetRef;
use autoscaler_core::{HasMetadata, NamespacedName, Resource};
use autoscaler_store::Client;
use tracing::{info, warn};

use super::TargetClient;
use crate::error::{Error, Result};
use crate::types::{ReconcileAction, ReconcileOutcome, SyncOperation, SyncOutcome};

pub struct TargetMigration {
    client: Client,
    targets: TargetClient,
}

impl TargetMigration {
    pub const fn new(client: Client, targets: TargetClient) -> Self {
        Self { client, targets }
    }

    /// A target was bound before and the spec now names a different one.
    pub fn target_changed(ma: &MachineAutoscaler) -> bool {
        ma.status
            .last_target_ref
            .as_ref()
            .is_some_and(|last| *last != ma.spec.scale_target_ref)
    }

    /// Finalize the previously bound target and record the new reference.
    ///
    /// Does nothing unless [`TargetMigration::target_changed`] holds.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound` while fetching or finalizing the
    /// old target, and any error writing the new `lastTargetRef`. The
    /// reference is left unchanged on failure.
    pub async fn handle_target_change(
        &self,
        ma: &mut MachineAutoscaler,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        if !Self::target_changed(ma) {
            return Ok(());
        }
        let Some(last) = ma.status.last_target_ref.clone() else {
            return Ok(());
        };

        info!(
            autoscaler = %ma.key(),
            from = %last,
            to = %ma.spec.scale_target_ref,
            "Target changed"
        );

        if let Some(sync) = self.finalize_reference(ma, &last).await? {
            outcome.record_sync(&sync);
        }

        let next = ma.spec.scale_target_ref.clone();
        self.set_last_target(ma, next, outcome).await
    }

    /// Finalize the target the spec currently names, if it exists and is
    /// not claimed by another autoscaler.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound`.
    pub async fn finalize_current(&self, ma: &MachineAutoscaler) -> Result<Option<SyncOutcome>> {
        self.finalize_reference(ma, &ma.spec.scale_target_ref).await
    }

    /// Persist `reference` as the last bound target.
    ///
    /// # Errors
    ///
    /// Store errors from the status write.
    pub async fn set_last_target(
        &self,
        ma: &mut MachineAutoscaler,
        reference: ScalableTargetRef,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        if ma.status.last_target_ref.as_ref() == Some(&reference) {
            return Ok(());
        }
        ma.status.last_target_ref = Some(reference);
        *ma = self.client.update(&*ma).await?;
        outcome.record(ReconcileAction::Update { key: ma.key() });
        Ok(())
    }

    async fn finalize_reference(
        &self,
        ma: &MachineAutoscaler,
        reference: &ScalableTargetRef,
    ) -> Result<Option<SyncOutcome>> {
        let target = match self.targets.get_opt(ma.namespace(), Some(reference)).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                info!(target = %reference, "Previous target absent, nothing to finalize");
                return Ok(None);
            }
            // A reference we cannot resolve never carried our markers.
            Err(Error::Target(e)) => {
                warn!(target = %reference, error = %e, "Skipping finalization of unresolvable target");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let owner = NamespacedName::new(ma.namespace(), ma.name());
        let sync = self.targets.finalize(&target, &owner).await?;
        if sync.operation == SyncOperation::Updated {
            info!(key = %sync.key, "Finalized target");
        }
        Ok(Some(sync))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use autoscaler_api::autoscaling::MachineAutoscalerSpec;
    use autoscaler_core::ObjectMeta;

    fn reference(name: &str) -> ScalableTargetRef {
        ScalableTargetRef::new("machine.openshift.io/v1beta1", "MachineSet", name)
    }

    fn autoscaler(current: &str, last: Option<&str>) -> MachineAutoscaler {
        let mut ma = MachineAutoscaler {
            metadata: ObjectMeta::named("ns", "ma"),
            spec: MachineAutoscalerSpec {
                min_replicas: 1,
                max_replicas: 2,
                scale_target_ref: reference(current),
            },
            ..MachineAutoscaler::default()
        };
        ma.status.last_target_ref = last.map(reference);
        ma
    }

    #[test]
    fn test_unbound_autoscaler_has_not_changed_target() {
        assert!(!TargetMigration::target_changed(&autoscaler("a", None)));
    }

    #[test]
    fn test_bound_to_same_target_has_not_changed() {
        assert!(!TargetMigration::target_changed(&autoscaler("a", Some("a"))));
    }

    #[test]
    fn test_new_reference_is_a_change() {
        assert!(TargetMigration::target_changed(&autoscaler("b", Some("a"))));
    }
}
