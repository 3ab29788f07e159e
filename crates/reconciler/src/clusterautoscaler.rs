//! Reconciler for the `ClusterAutoscaler` singleton.

use async_trait::async_trait;
use autoscaler_api::ClusterAutoscaler;
use autoscaler_api::apps::Deployment;
use autoscaler_core::{HasMetadata, NamespacedName, ObjectKey, Resource};
use autoscaler_store::Client;
use tracing::{debug, info, warn};

use crate::desired::{AutoscalerConfig, DesiredState, DesiredStateBuilder};
use crate::error::Result;
use crate::reconciler::Reconcile;
use crate::sync::{Converge, Synchronizer};
use crate::types::{ReconcileAction, ReconcileOutcome};
use crate::validation::ClusterAutoscalerValidator;

/// Held on a `ClusterAutoscaler` until its workload has been deleted.
pub const CLUSTER_AUTOSCALER_FINALIZER: &str = "clusterautoscaler.autoscaling.openshift.io";

/// Renders a `ClusterAutoscaler` into its workload and auxiliary objects.
pub struct ClusterAutoscalerReconciler {
    client: Client,
    validator: ClusterAutoscalerValidator,
    builder: DesiredStateBuilder,
    sync: Synchronizer,
}

impl ClusterAutoscalerReconciler {
    pub fn new(client: Client, config: AutoscalerConfig) -> Self {
        Self {
            validator: ClusterAutoscalerValidator::new(config.name.clone()),
            builder: DesiredStateBuilder::new(config),
            sync: Synchronizer::new(client.clone()),
            client,
        }
    }

    pub const fn builder(&self) -> &DesiredStateBuilder {
        &self.builder
    }

    pub const fn validator(&self) -> &ClusterAutoscalerValidator {
        &self.validator
    }

    /// Delete the workload and release the autoscaler. Never creates.
    async fn handle_delete(&self, mut ca: ClusterAutoscaler) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::new();
        let config = self.builder.config();

        let removed = self
            .sync
            .remove::<Deployment>(&config.namespace, &AutoscalerConfig::workload_name(ca.name()))
            .await?;
        outcome.record_sync(&removed);

        if ca.remove_finalizer(CLUSTER_AUTOSCALER_FINALIZER) {
            self.client.update(&ca).await?;
            outcome.record(ReconcileAction::Update { key: ca.key() });
        }

        info!(autoscaler = %ca.name(), "Finalized ClusterAutoscaler");
        Ok(outcome)
    }

    /// Converge the auxiliary objects. Failures are recorded and do not
    /// stop the others.
    async fn sync_auxiliary(&self, desired: &DesiredState, outcome: &mut ReconcileOutcome) {
        self.sync_one(&desired.service, outcome).await;
        self.sync_one(&desired.service_monitor, outcome).await;
        self.sync_one(&desired.prometheus_rule, outcome).await;
        for policy in &desired.network_policies {
            self.sync_one(policy, outcome).await;
        }
    }

    async fn sync_one<T: Converge>(&self, desired: &T, outcome: &mut ReconcileOutcome) {
        match self.sync.apply(desired).await {
            Ok(sync) => outcome.record_sync(&sync),
            Err(e) => {
                let key: ObjectKey = desired.key();
                warn!(key = %key, error = %e, "Failed to converge auxiliary object");
                outcome.record_failure(key, e.to_string());
            }
        }
    }
}

#[async_trait]
impl Reconcile for ClusterAutoscalerReconciler {
    fn kind(&self) -> &'static str {
        ClusterAutoscaler::KIND
    }

    async fn reconcile(&self, key: &NamespacedName) -> Result<ReconcileOutcome> {
        debug!(key = %key, "Reconciling ClusterAutoscaler");

        let Some(mut ca) = self
            .client
            .get_opt::<ClusterAutoscaler>(&key.namespace, &key.name)
            .await?
        else {
            debug!(key = %key, "ClusterAutoscaler not found");
            return Ok(ReconcileOutcome::new());
        };

        if ca.is_deleting() {
            return self.handle_delete(ca).await;
        }

        let mut outcome = ReconcileOutcome::new();

        let warnings = self
            .validator
            .validate(&ca)
            .into_result(ClusterAutoscaler::KIND)
            .inspect_err(|e| warn!(key = %key, error = %e, "Rejecting invalid ClusterAutoscaler"))?;
        for warning in warnings {
            warn!(key = %key, warning = %warning, "ClusterAutoscaler validation warning");
            outcome.warn(warning);
        }

        if ca.add_finalizer(CLUSTER_AUTOSCALER_FINALIZER) {
            ca = self.client.update(&ca).await?;
            outcome.record(ReconcileAction::Update { key: ca.key() });
        }

        let desired = self.builder.build(&ca);

        let primary = self.sync.apply(&desired.deployment).await?;
        outcome.record_sync(&primary);

        self.sync_auxiliary(&desired, &mut outcome).await;

        if outcome.all_succeeded() {
            info!(key = %key, writes = outcome.writes(), "Reconciled ClusterAutoscaler");
        } else {
            warn!(
                key = %key,
                failed = outcome.actions_failed.len(),
                "Reconciled ClusterAutoscaler with auxiliary failures"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use autoscaler_api::autoscaling::{ClusterAutoscalerSpec, ResourceLimits, ResourceRange};
    use autoscaler_core::ObjectMeta;
    use autoscaler_store::InMemoryObjectStore;

    fn reconciler(store: &std::sync::Arc<InMemoryObjectStore>) -> ClusterAutoscalerReconciler {
        ClusterAutoscalerReconciler::new(Client::new(store.clone()), AutoscalerConfig::default())
    }

    fn autoscaler(name: &str, spec: ClusterAutoscalerSpec) -> ClusterAutoscaler {
        ClusterAutoscaler {
            metadata: ObjectMeta::named("", name),
            spec,
        }
    }

    #[tokio::test]
    async fn test_missing_autoscaler_is_a_noop() {
        let store = InMemoryObjectStore::new_arc();
        let outcome = reconciler(&store)
            .reconcile(&NamespacedName::new("", "default"))
            .await
            .unwrap();
        assert!(outcome.converged());
        assert_eq!(store.stats().writes(), 0);
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_before_any_write() {
        let store = InMemoryObjectStore::new_arc();
        let client = Client::new(store.clone());
        let spec = ClusterAutoscalerSpec {
            resource_limits: Some(ResourceLimits {
                cores: Some(ResourceRange::new(100, 10)),
                ..ResourceLimits::default()
            }),
            ..ClusterAutoscalerSpec::default()
        };
        client.create(&autoscaler("default", spec)).await.unwrap();
        let before = store.stats();

        let err = reconciler(&store)
            .reconcile(&NamespacedName::new("", "default"))
            .await
            .unwrap_err();

        assert!(matches!(err, crate::Error::Validation { .. }));
        assert_eq!(store.stats(), before);
    }

    #[tokio::test]
    async fn test_first_pass_creates_workload_and_auxiliaries() {
        let store = InMemoryObjectStore::new_arc();
        let client = Client::new(store.clone());
        client
            .create(&autoscaler("default", ClusterAutoscalerSpec::default()))
            .await
            .unwrap();

        let outcome = reconciler(&store)
            .reconcile(&NamespacedName::new("", "default"))
            .await
            .unwrap();

        // deployment, service, monitor, rule and five policies
        assert_eq!(outcome.counts(), (9, 1, 0));
        let deployment = client
            .get::<Deployment>("openshift-machine-api", "cluster-autoscaler-default")
            .await
            .unwrap();
        assert_eq!(deployment.owner_references().len(), 1);
    }
}
