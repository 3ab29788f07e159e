//! Serial work queue from store watch events to reconcile passes.
//!
//! Events are mapped to the autoscaler they concern, deduplicated while
//! pending, and processed one at a time, so no key ever has two passes in
//! flight. A failed pass is requeued after a delay.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use autoscaler_api::{ClusterAutoscaler, ClusterOperator, Deployment, MachineAutoscaler};
use autoscaler_core::{HasMetadata, LabelSelector, NamespacedName, Object, Resource};
use autoscaler_reconciler::{MachineTarget, Reconcile, StatusTrigger, TargetRegistry};
use autoscaler_store::{Client, WatchEvent};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Default delay before a failed key is retried.
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// A reconcile request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkKey {
    ClusterAutoscaler(NamespacedName),
    MachineAutoscaler(NamespacedName),
}

impl std::fmt::Display for WorkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClusterAutoscaler(key) => write!(f, "{} {}", ClusterAutoscaler::KIND, key.name),
            Self::MachineAutoscaler(key) => write!(f, "{} {key}", MachineAutoscaler::KIND),
        }
    }
}

/// Maps a changed object to the keys that must be reconciled.
#[derive(Clone)]
pub struct EventMapper {
    watch_namespace: String,
    registry: Arc<TargetRegistry>,
    dependency: String,
}

impl EventMapper {
    pub fn new(
        watch_namespace: impl Into<String>,
        registry: Arc<TargetRegistry>,
        dependency: impl Into<String>,
    ) -> Self {
        Self {
            watch_namespace: watch_namespace.into(),
            registry,
            dependency: dependency.into(),
        }
    }

    fn watches(&self, namespace: &str) -> bool {
        self.watch_namespace.is_empty() || self.watch_namespace == namespace
    }

    /// Keys for `object`: the autoscaler itself, the controller owner of a
    /// generated object, or the owner named on a scalable target.
    pub fn map(&self, object: &Object) -> Option<WorkKey> {
        let key = object.key().ok()?;

        if key.is_kind(&ClusterAutoscaler::gvk()) {
            return Some(WorkKey::ClusterAutoscaler(key.namespaced_name()));
        }

        if key.is_kind(&MachineAutoscaler::gvk()) {
            return self
                .watches(&key.namespace)
                .then(|| WorkKey::MachineAutoscaler(key.namespaced_name()));
        }

        if let Some(owner) = object.controller_reference() {
            if owner.kind == ClusterAutoscaler::KIND {
                return Some(WorkKey::ClusterAutoscaler(NamespacedName::new(
                    "",
                    owner.name.clone(),
                )));
            }
        }

        let gvk = object.gvk().ok()?;
        if self.registry.is_supported(&gvk) {
            let target = MachineTarget::new(object.clone());
            return match target.owner() {
                Ok(owner) if self.watches(&owner.namespace) => {
                    Some(WorkKey::MachineAutoscaler(owner))
                }
                Ok(_) => None,
                Err(e) => {
                    debug!(key = %key, error = %e, "Target has no usable owner");
                    None
                }
            };
        }

        None
    }

    /// Whether a change to `object` can move the published status.
    pub fn affects_status(&self, object: &Object) -> bool {
        object.kind == ClusterAutoscaler::KIND
            || object.kind == Deployment::KIND
            || (object.kind == ClusterOperator::KIND && object.name() == self.dependency)
    }
}

/// Runs reconcile passes for mapped events, one at a time.
pub struct Dispatcher {
    cluster: Arc<dyn Reconcile>,
    machine: Arc<dyn Reconcile>,
    mapper: EventMapper,
    status: Option<StatusTrigger>,
    requeue_delay: Duration,
    queue: VecDeque<WorkKey>,
    pending: HashSet<WorkKey>,
    requeue_tx: mpsc::UnboundedSender<WorkKey>,
    requeue_rx: mpsc::UnboundedReceiver<WorkKey>,
}

impl Dispatcher {
    pub fn new(
        cluster: Arc<dyn Reconcile>,
        machine: Arc<dyn Reconcile>,
        mapper: EventMapper,
    ) -> Self {
        let (requeue_tx, requeue_rx) = mpsc::unbounded_channel();
        Self {
            cluster,
            machine,
            mapper,
            status: None,
            requeue_delay: DEFAULT_REQUEUE_DELAY,
            queue: VecDeque::new(),
            pending: HashSet::new(),
            requeue_tx,
            requeue_rx,
        }
    }

    /// Notify the status loop on relevant changes.
    #[must_use]
    pub fn with_status_trigger(mut self, trigger: StatusTrigger) -> Self {
        self.status = Some(trigger);
        self
    }

    #[must_use]
    pub const fn with_requeue_delay(mut self, delay: Duration) -> Self {
        self.requeue_delay = delay;
        self
    }

    /// Keys waiting to be processed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue a key unless it is already waiting.
    pub fn enqueue(&mut self, key: WorkKey) {
        if self.pending.insert(key.clone()) {
            self.queue.push_back(key);
        }
    }

    /// Queue every autoscaler currently in the store.
    ///
    /// # Errors
    ///
    /// Store errors from listing.
    pub async fn enqueue_existing(&mut self, client: &Client) -> Result<()> {
        let everything = LabelSelector::everything();
        for ca in client.list::<ClusterAutoscaler>(None, &everything).await? {
            self.enqueue(WorkKey::ClusterAutoscaler(NamespacedName::new("", ca.name())));
        }
        for ma in client.list::<MachineAutoscaler>(None, &everything).await? {
            if self.mapper.watches(ma.namespace()) {
                self.enqueue(WorkKey::MachineAutoscaler(NamespacedName::new(
                    ma.namespace(),
                    ma.name(),
                )));
            }
        }
        Ok(())
    }

    /// Map one watch event into the queue.
    pub fn observe(&mut self, event: &WatchEvent) {
        if self.mapper.affects_status(&event.object) {
            if let Some(trigger) = &self.status {
                if let Err(e) = trigger.notify() {
                    debug!(error = %e, "Status loop not accepting triggers");
                }
            }
        }
        if let Some(key) = self.mapper.map(&event.object) {
            debug!(key = %key, kind = ?event.kind, "Queued from event");
            self.enqueue(key);
        }
    }

    /// Process everything queued so far. Returns the number of passes run.
    pub async fn drain(&mut self) -> usize {
        let mut passes = 0;
        while let Some(key) = self.queue.pop_front() {
            self.pending.remove(&key);
            self.process(&key).await;
            passes += 1;
        }
        passes
    }

    async fn process(&self, key: &WorkKey) {
        let (reconciler, name) = match key {
            WorkKey::ClusterAutoscaler(name) => (&self.cluster, name),
            WorkKey::MachineAutoscaler(name) => (&self.machine, name),
        };

        match reconciler.reconcile(name).await {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    debug!(key = %key, warning = %warning, "Reconcile warning");
                }
                if !outcome.converged() {
                    debug!(key = %key, actions = %outcome.summary(), "Reconcile pass wrote");
                }
            }
            Err(e) => {
                warn!(
                    key = %key,
                    error = %e,
                    delay_ms = self.requeue_delay.as_millis(),
                    "Reconcile failed, requeueing"
                );
                let tx = self.requeue_tx.clone();
                let delay = self.requeue_delay;
                let key = key.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(key);
                });
            }
        }
    }

    /// Run until `stop` flips to true or the event stream closes.
    ///
    /// # Errors
    ///
    /// Never returns an error today; failed passes are requeued.
    pub async fn run(
        &mut self,
        mut events: broadcast::Receiver<WatchEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("Starting dispatcher");
        self.drain().await;

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        info!("Dispatcher stopped");
                        return Ok(());
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.observe(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Dispatcher lagged behind watch events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Watch stream closed, dispatcher exiting");
                        return Ok(());
                    }
                },
                Some(key) = self.requeue_rx.recv() => {
                    self.enqueue(key);
                }
            }
            self.drain().await;
        }
    }
}
