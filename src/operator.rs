//! Operator wiring: one store, two reconcilers, admission and status.

use std::sync::Arc;

use autoscaler_api::autoscaling::GROUP;
use autoscaler_api::config::ObjectReference;
use autoscaler_reconciler::{
    AdmissionRouter, ClusterAutoscalerReconciler, LoopStopper, MachineAutoscalerReconciler,
    Reconcile, StatusAggregator, StatusLoop, TargetClient, TargetRegistry,
};
use autoscaler_store::{Client, ObjectStore, WatchEvent};
use itertools::Itertools;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use crate::config::OperatorConfig;
use crate::dispatch::{Dispatcher, EventMapper};
use crate::error::Result;

/// A fully wired operator over one object store.
pub struct Operator {
    config: OperatorConfig,
    client: Client,
    registry: Arc<TargetRegistry>,
    cluster: Arc<ClusterAutoscalerReconciler>,
    machine: Arc<MachineAutoscalerReconciler>,
    admission: Option<AdmissionRouter>,
    status: StatusLoop,
}

impl Operator {
    /// Discover target kinds and build every component.
    ///
    /// # Errors
    ///
    /// Returns error if the config names malformed target kinds or none of
    /// them resolve in the store.
    pub async fn new(config: OperatorConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let client = Client::new(store.clone());

        let registry = Arc::new(TargetRegistry::discover(config.target_kinds()?, store.as_ref()).await?);
        info!(
            kinds = %registry.supported().iter().join(", "),
            "Supported target kinds"
        );

        let cluster = Arc::new(ClusterAutoscalerReconciler::new(
            client.clone(),
            config.autoscaler_config(),
        ));
        let targets = TargetClient::new(client.clone(), registry.clone());
        let machine = Arc::new(MachineAutoscalerReconciler::new(client.clone(), targets));

        let admission = config
            .webhooks
            .enabled
            .then(|| AdmissionRouter::new(config.autoscaler.name.clone()));

        let aggregator = StatusAggregator::new(
            client.clone(),
            config.status_config(Self::related_objects(&config)),
        );
        let status = StatusLoop::new(aggregator);

        Ok(Self {
            config,
            client,
            registry,
            cluster,
            machine,
            admission,
            status,
        })
    }

    pub const fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub const fn client(&self) -> &Client {
        &self.client
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn cluster_reconciler(&self) -> Arc<dyn Reconcile> {
        self.cluster.clone()
    }

    pub fn machine_reconciler(&self) -> Arc<dyn Reconcile> {
        self.machine.clone()
    }

    /// The admission router, when webhooks are enabled.
    pub const fn admission(&self) -> Option<&AdmissionRouter> {
        self.admission.as_ref()
    }

    pub fn status_stopper(&self) -> LoopStopper {
        self.status.stopper()
    }

    /// Objects listed on the `ClusterOperator` for diagnostics: both
    /// autoscaler resources in the watch namespace, plus every namespace
    /// the operator touches.
    pub fn related_objects(config: &OperatorConfig) -> Vec<ObjectReference> {
        let resources = ["machineautoscalers", "clusterautoscalers"]
            .into_iter()
            .map(|resource| ObjectReference {
                group: GROUP.to_string(),
                resource: resource.to_string(),
                namespace: config.watch_namespace.clone(),
                name: String::new(),
            });

        let namespaces = [&config.watch_namespace, &config.autoscaler.namespace]
            .into_iter()
            .filter(|ns| !ns.is_empty())
            .unique()
            .map(|ns| ObjectReference {
                group: String::new(),
                resource: "namespaces".to_string(),
                namespace: String::new(),
                name: ns.clone(),
            });

        resources.chain(namespaces).collect()
    }

    /// Build the dispatcher feeding both reconcilers.
    pub fn dispatcher(&self) -> Dispatcher {
        let mapper = EventMapper::new(
            self.config.watch_namespace.clone(),
            self.registry.clone(),
            self.config.status.dependency.clone(),
        );
        Dispatcher::new(self.cluster_reconciler(), self.machine_reconciler(), mapper)
            .with_status_trigger(self.status.trigger())
    }

    /// Run the dispatcher and the status loop until `stop` flips to true.
    ///
    /// # Errors
    ///
    /// Returns error if the initial listing fails.
    pub async fn run(
        self,
        events: broadcast::Receiver<WatchEvent>,
        stop: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut dispatcher = self.dispatcher();
        dispatcher.enqueue_existing(&self.client).await?;

        let stopper = self.status.stopper();
        let mut status = self.status;
        let status_handle = tokio::spawn(async move { status.run().await });

        let result = dispatcher.run(events, stop).await;

        stopper.stop();
        match status_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Status loop failed"),
            Err(e) => error!(error = %e, "Status loop panicked"),
        }

        info!("Operator stopped");
        result
    }
}
