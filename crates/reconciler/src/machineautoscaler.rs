//! Reconciler binding each `MachineAutoscaler` to its scalable target.

use async_trait::async_trait;
use autoscaler_api::MachineAutoscaler;
use autoscaler_core::{HasMetadata, NamespacedName, Resource};
use autoscaler_store::Client;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::reconciler::Reconcile;
use crate::target::{MACHINE_TARGET_FINALIZER, TargetClient, TargetMigration};
use crate::types::{ReconcileAction, ReconcileOutcome};
use crate::validation::MachineAutoscalerValidator;

/// Owns target markers: who scales a target and within which bounds.
pub struct MachineAutoscalerReconciler {
    client: Client,
    validator: MachineAutoscalerValidator,
    targets: TargetClient,
    migration: TargetMigration,
}

impl MachineAutoscalerReconciler {
    pub fn new(client: Client, targets: TargetClient) -> Self {
        Self {
            validator: MachineAutoscalerValidator::new(),
            migration: TargetMigration::new(client.clone(), targets.clone()),
            targets,
            client,
        }
    }

    pub const fn targets(&self) -> &TargetClient {
        &self.targets
    }

    /// Finalize the current target and drop our finalizer.
    async fn handle_delete(&self, mut ma: MachineAutoscaler) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::new();

        if let Some(sync) = self.migration.finalize_current(&ma).await? {
            outcome.record_sync(&sync);
        }

        if ma.remove_finalizer(MACHINE_TARGET_FINALIZER) {
            self.client.update(&ma).await?;
            outcome.record(ReconcileAction::Update { key: ma.key() });
        }

        info!(autoscaler = %ma.key(), "Finalized MachineAutoscaler");
        Ok(outcome)
    }
}

#[async_trait]
impl Reconcile for MachineAutoscalerReconciler {
    fn kind(&self) -> &'static str {
        MachineAutoscaler::KIND
    }

    async fn reconcile(&self, key: &NamespacedName) -> Result<ReconcileOutcome> {
        debug!(key = %key, "Reconciling MachineAutoscaler");

        let Some(mut ma) = self
            .client
            .get_opt::<MachineAutoscaler>(&key.namespace, &key.name)
            .await?
        else {
            debug!(key = %key, "MachineAutoscaler not found");
            return Ok(ReconcileOutcome::new());
        };

        if ma.is_deleting() {
            return self.handle_delete(ma).await;
        }

        let mut outcome = ReconcileOutcome::new();

        self.validator
            .validate(&ma)
            .into_result(MachineAutoscaler::KIND)
            .inspect_err(|e| error!(key = %key, error = %e, "Rejecting invalid MachineAutoscaler"))?;

        // Release the previous target before touching the new one.
        self.migration
            .handle_target_change(&mut ma, &mut outcome)
            .await?;

        let reference = ma.spec.scale_target_ref.clone();
        let original = self
            .targets
            .get(ma.namespace(), Some(&reference))
            .await
            .inspect_err(|e| error!(key = %key, target = %reference, error = %e, "Error getting target"))?;

        let mut target = original.clone();
        let newly_owned = target
            .set_owner(key)
            .inspect_err(|e| error!(key = %key, target = %reference, error = %e, "Error setting target owner"))?;
        // Limits left by a previous owner are stale.
        if newly_owned {
            target.remove_limits();
        }

        let mut status_changed = false;
        if ma.status.last_target_ref.is_none() {
            ma.status.last_target_ref = Some(reference.clone());
            status_changed = true;
        }
        let finalizer_added = ma.add_finalizer(MACHINE_TARGET_FINALIZER);
        if status_changed || finalizer_added {
            ma = self.client.update(&ma).await?;
            outcome.record(ReconcileAction::Update { key: ma.key() });
        }

        TargetClient::apply_limits(&mut target, ma.spec.min_replicas, ma.spec.max_replicas)?;

        if target.has_gpu_capacity() {
            if let Some(warning) = target.gpu_accelerator_warning() {
                warn!(key = %key, target = %reference, "{warning}");
                outcome.warn(warning);
            }
        }

        let written = self.targets.write(&original, target).await?;
        outcome.record_sync(&written);

        info!(key = %key, target = %reference, writes = outcome.writes(), "Reconciled MachineAutoscaler");
        Ok(outcome)
    }
}
