//! Single-worker status loop.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use super::{StatusAggregator, StatusReport};
use crate::error::{Error, Result};

/// Runs [`StatusAggregator::report_status`] on a timer and whenever a
/// watched object changes.
///
/// Ticks and triggers go through one `select!`, so reports never overlap.
pub struct StatusLoop {
    aggregator: StatusAggregator,
    interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    trigger_tx: mpsc::Sender<()>,
    stop_rx: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl StatusLoop {
    pub fn new(aggregator: StatusAggregator) -> Self {
        let interval = aggregator.config().interval;
        // One pending trigger is enough; the next report sees every change.
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            aggregator,
            interval,
            trigger_rx,
            trigger_tx,
            stop_rx,
            stop_tx,
        }
    }

    pub const fn aggregator(&self) -> &StatusAggregator {
        &self.aggregator
    }

    /// Run until stopped.
    ///
    /// # Errors
    ///
    /// Never returns an error today; report failures are logged and the
    /// loop keeps going.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            operator = %self.aggregator.config().operator_name,
            "Starting status loop"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.report_once().await;
                }
                Some(()) = self.trigger_rx.recv() => {
                    debug!("Status report triggered");
                    self.report_once().await;
                }
                _ = self.stop_rx.changed() => {
                    if *self.stop_rx.borrow() {
                        info!("Status loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run one report, logging rather than returning failures.
    pub async fn report_once(&mut self) -> Option<StatusReport> {
        match self.aggregator.report_status().await {
            Ok(report) => {
                debug!(?report, "Reported status");
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Failed to report status");
                None
            }
        }
    }

    /// Get a handle that requests an early report.
    pub fn trigger(&self) -> StatusTrigger {
        StatusTrigger {
            trigger_tx: self.trigger_tx.clone(),
        }
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// Handle to request a status report outside the timer.
#[derive(Clone)]
pub struct StatusTrigger {
    trigger_tx: mpsc::Sender<()>,
}

impl StatusTrigger {
    /// Queue a report. A report already pending absorbs this one.
    ///
    /// # Errors
    ///
    /// [`Error::LoopStopped`] once the loop has been dropped.
    pub fn notify(&self) -> Result<()> {
        match self.trigger_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => Err(Error::LoopStopped),
        }
    }
}

/// Handle to stop a status loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::status::StatusConfig;
    use autoscaler_api::ClusterOperator;
    use autoscaler_store::{Client, InMemoryObjectStore};

    fn status_loop(store: &std::sync::Arc<InMemoryObjectStore>, interval: Duration) -> StatusLoop {
        let config = StatusConfig {
            interval,
            ..StatusConfig::default()
        };
        StatusLoop::new(StatusAggregator::new(Client::new(store.clone()), config))
    }

    /// Given a running loop
    /// When stop() is called
    /// Then the loop exits cleanly
    #[tokio::test]
    async fn stop_signal_terminates_loop() {
        let store = InMemoryObjectStore::new_arc();
        let mut status = status_loop(&store, Duration::from_millis(20));
        let stopper = status.stopper();

        let handle = tokio::spawn(async move { status.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "Loop should stop within timeout");
        assert!(result.unwrap().unwrap().is_ok());
    }

    /// Given a loop with a long interval
    /// When a trigger arrives
    /// Then a report is published without waiting for the timer
    #[tokio::test]
    async fn trigger_publishes_report() {
        let store = InMemoryObjectStore::new_arc();
        let mut status = status_loop(&store, Duration::from_secs(3600));
        let trigger = status.trigger();
        let stopper = status.stopper();

        let handle = tokio::spawn(async move { status.run().await });
        // The first tick fires immediately; wait for it, then trigger.
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.notify().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stopper.stop();
        handle.await.unwrap().unwrap();

        let co = Client::new(store.clone())
            .get::<ClusterOperator>("", "cluster-autoscaler")
            .await
            .unwrap();
        assert!(!co.status.conditions.is_empty());
    }

    /// Given a dropped loop
    /// When a trigger is sent
    /// Then it reports the loop as stopped
    #[tokio::test]
    async fn trigger_after_drop_is_an_error() {
        let store = InMemoryObjectStore::new_arc();
        let status = status_loop(&store, Duration::from_secs(1));
        let trigger = status.trigger();
        drop(status);

        assert_eq!(trigger.notify(), Err(Error::LoopStopped));
    }
}
