//! ClusterOperator status reporting.
//!
//! [`StatusAggregator`] checks the dependency operator and the managed
//! autoscaler workload, folds the result into Available, Progressing and
//! Degraded conditions, and publishes them on the operator's
//! `ClusterOperator`. Degraded is dampened: a failing check must repeat
//! `degraded_threshold` times in a row before it is published.

mod r#loop;

use std::time::Duration;

use autoscaler_api::apps::Deployment;
use autoscaler_api::config::{
    ClusterOperatorStatus, Condition, ConditionStatus, ConditionType, ObjectReference,
    OperandVersion,
};
use autoscaler_api::{ClusterAutoscaler, ClusterOperator};
use autoscaler_core::HasMetadata;
use autoscaler_store::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::desired::{AutoscalerConfig, RELEASE_VERSION_ANNOTATION};
use crate::error::Result;

pub use r#loop::{LoopStopper, StatusLoop, StatusTrigger};

pub const REASON_AS_EXPECTED: &str = "AsExpected";
pub const REASON_MISSING_DEPENDENCY: &str = "MissingDependency";
pub const REASON_SYNCING_RESOURCES: &str = "SyncingResources";
pub const REASON_UNABLE_TO_CHECK_AUTOSCALERS: &str = "UnableToCheckAutoscalers";

/// Name of the operand version entry published when available.
pub const OPERATOR_VERSION_NAME: &str = "operator";

/// Settings for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Name of the `ClusterOperator` this operator publishes.
    pub operator_name: String,
    /// `ClusterOperator` that must be healthy before we can be.
    pub dependency: String,
    /// Name of the singleton `ClusterAutoscaler`.
    pub cluster_autoscaler_name: String,
    /// Namespace the autoscaler workload runs in.
    pub namespace: String,
    pub release_version: String,
    #[serde(skip)]
    pub related_objects: Vec<ObjectReference>,
    /// Consecutive failed checks before Degraded is published.
    pub degraded_threshold: u32,
    #[serde(with = "seconds")]
    pub interval: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            operator_name: "cluster-autoscaler".to_string(),
            dependency: "machine-api".to_string(),
            cluster_autoscaler_name: "default".to_string(),
            namespace: "openshift-machine-api".to_string(),
            release_version: "unknown".to_string(),
            related_objects: Vec::new(),
            degraded_threshold: 3,
            interval: Duration::from_secs(15),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// What a report published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReport {
    Available,
    Progressing,
    Degraded,
    /// A failed check below the threshold, published as Available.
    Dampened { failures: u32 },
}

/// Computes and publishes operator health.
///
/// Owned by a single worker, so the failure counter is plain state.
pub struct StatusAggregator {
    client: Client,
    config: StatusConfig,
    failures: u32,
}

impl StatusAggregator {
    pub const fn new(client: Client, config: StatusConfig) -> Self {
        Self {
            client,
            config,
            failures: 0,
        }
    }

    pub const fn config(&self) -> &StatusConfig {
        &self.config
    }

    /// Consecutive failed checks seen so far.
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Check health and publish it.
    ///
    /// # Errors
    ///
    /// Only a failure to write the `ClusterOperator`. Check failures are
    /// folded into the published conditions.
    pub async fn report_status(&mut self) -> Result<StatusReport> {
        match self.check_dependency().await {
            Ok(true) => {}
            Ok(false) => {
                return self
                    .degraded(REASON_MISSING_DEPENDENCY, format!("{} not ready", self.config.dependency))
                    .await;
            }
            Err(e) => {
                return self
                    .degraded(
                        REASON_MISSING_DEPENDENCY,
                        format!("error checking {} status: {e}", self.config.dependency),
                    )
                    .await;
            }
        }

        let version = self.config.release_version.clone();
        match self.check_cluster_autoscaler().await {
            Ok(true) => {
                self.available(REASON_AS_EXPECTED, format!("at version {version}"))
                    .await
            }
            Ok(false) => {
                self.progressing(REASON_SYNCING_RESOURCES, format!("updating to {version}"))
                    .await
            }
            Err(e) => {
                self.degraded(
                    REASON_UNABLE_TO_CHECK_AUTOSCALERS,
                    format!("error checking autoscaler status: {e}"),
                )
                .await
            }
        }
    }

    /// True when the dependency reports Available and not Degraded.
    ///
    /// # Errors
    ///
    /// Store errors, including `NotFound` for a missing dependency.
    pub async fn check_dependency(&self) -> Result<bool> {
        let dependency = self
            .client
            .get::<ClusterOperator>("", &self.config.dependency)
            .await?;
        Ok(dependency.is_status_true(&ConditionType::Available)
            && dependency.is_status_false(&ConditionType::Degraded))
    }

    /// True when no `ClusterAutoscaler` exists, or its workload runs the
    /// current release and has finished rolling out.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound`.
    pub async fn check_cluster_autoscaler(&self) -> Result<bool> {
        let name = &self.config.cluster_autoscaler_name;
        if self
            .client
            .get_opt::<ClusterAutoscaler>("", name)
            .await?
            .is_none()
        {
            debug!(name = %name, "No ClusterAutoscaler, nothing to wait for");
            return Ok(true);
        }

        let workload = AutoscalerConfig::workload_name(name);
        let Some(deployment) = self
            .client
            .get_opt::<Deployment>(&self.config.namespace, &workload)
            .await?
        else {
            debug!(deployment = %workload, "Autoscaler deployment not created yet");
            return Ok(false);
        };

        if deployment.annotation(RELEASE_VERSION_ANNOTATION)
            != Some(self.config.release_version.as_str())
        {
            debug!(deployment = %workload, "Autoscaler deployment not at release version");
            return Ok(false);
        }

        Ok(deployment.rollout_complete())
    }

    /// Publish Available and reset the failure counter.
    ///
    /// # Errors
    ///
    /// Store errors writing the `ClusterOperator`.
    pub async fn available(
        &mut self,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<StatusReport> {
        self.failures = 0;
        let status = ClusterOperatorStatus {
            conditions: vec![
                Condition::new(ConditionType::Available, ConditionStatus::True)
                    .with_reason(reason, message),
                Condition::new(ConditionType::Progressing, ConditionStatus::False),
                Condition::new(ConditionType::Degraded, ConditionStatus::False),
            ],
            versions: vec![OperandVersion {
                name: OPERATOR_VERSION_NAME.to_string(),
                version: self.config.release_version.clone(),
            }],
            related_objects: Vec::new(),
        };
        self.apply_status(status).await?;
        Ok(StatusReport::Available)
    }

    /// Publish Progressing and reset the failure counter.
    ///
    /// # Errors
    ///
    /// Store errors writing the `ClusterOperator`.
    pub async fn progressing(
        &mut self,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<StatusReport> {
        self.failures = 0;
        let status = ClusterOperatorStatus {
            conditions: vec![
                Condition::new(ConditionType::Available, ConditionStatus::True),
                Condition::new(ConditionType::Progressing, ConditionStatus::True)
                    .with_reason(reason, message),
                Condition::new(ConditionType::Degraded, ConditionStatus::False),
            ],
            ..ClusterOperatorStatus::default()
        };
        self.apply_status(status).await?;
        Ok(StatusReport::Progressing)
    }

    /// Count a failed check. Degraded is published once the count reaches
    /// the threshold; below it the operator stays Available and the
    /// message carries the failure.
    ///
    /// # Errors
    ///
    /// Store errors writing the `ClusterOperator`.
    pub async fn degraded(
        &mut self,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<StatusReport> {
        self.failures = self.failures.saturating_add(1);
        let message = message.into();
        let threshold = self.config.degraded_threshold;

        if self.failures < threshold {
            warn!(
                reason,
                failures = self.failures,
                threshold,
                message = %message,
                "Health check failed, not yet reporting degraded"
            );
            let status = ClusterOperatorStatus {
                conditions: vec![
                    Condition::new(ConditionType::Available, ConditionStatus::True).with_reason(
                        reason,
                        format!("{message} (failure {} of {threshold})", self.failures),
                    ),
                    Condition::new(ConditionType::Progressing, ConditionStatus::False),
                    Condition::new(ConditionType::Degraded, ConditionStatus::False),
                ],
                ..ClusterOperatorStatus::default()
            };
            self.apply_status(status).await?;
            return Ok(StatusReport::Dampened {
                failures: self.failures,
            });
        }

        warn!(reason, failures = self.failures, message = %message, "Reporting degraded");
        let status = ClusterOperatorStatus {
            conditions: vec![
                Condition::new(ConditionType::Available, ConditionStatus::True),
                Condition::new(ConditionType::Progressing, ConditionStatus::False),
                Condition::new(ConditionType::Degraded, ConditionStatus::True)
                    .with_reason(reason, message),
            ],
            ..ClusterOperatorStatus::default()
        };
        self.apply_status(status).await?;
        Ok(StatusReport::Degraded)
    }

    /// Write `status` to the operator's `ClusterOperator`, creating it if
    /// needed. Returns whether the stored status changed.
    ///
    /// Upgradeable is always True. Empty versions keep the published ones.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn apply_status(&self, mut status: ClusterOperatorStatus) -> Result<bool> {
        let name = &self.config.operator_name;
        let mut operator = match self.client.get_opt::<ClusterOperator>("", name).await? {
            Some(operator) => operator,
            None => {
                info!(name = %name, "Creating ClusterOperator");
                self.client.create(&ClusterOperator::named(name.clone())).await?
            }
        };

        status
            .conditions
            .push(Condition::new(ConditionType::Upgradeable, ConditionStatus::True));
        status.related_objects.clone_from(&self.config.related_objects);
        if status.versions.is_empty() {
            status.versions.clone_from(&operator.status.versions);
        }

        let now = Utc::now();
        merge_conditions(&operator.status.conditions, &mut status.conditions, now);

        if status.versions != operator.status.versions {
            if let Some(progressing) = status
                .conditions
                .iter_mut()
                .find(|c| c.condition_type == ConditionType::Progressing)
            {
                progressing.last_transition_time = Some(now);
            }
        }

        if status == operator.status {
            debug!(name = %name, "ClusterOperator status unchanged");
            return Ok(false);
        }

        operator.status = status;
        self.client.update(&operator).await?;
        info!(name = %name, "Updated ClusterOperator status");
        Ok(true)
    }
}

/// Stamp transition times on `required`: a condition whose status did not
/// change keeps its previous time, anything else gets `now`.
pub fn merge_conditions(existing: &[Condition], required: &mut [Condition], now: DateTime<Utc>) {
    for condition in required.iter_mut() {
        let previous = existing
            .iter()
            .find(|c| c.condition_type == condition.condition_type);
        condition.last_transition_time = match previous {
            Some(previous) if previous.status == condition.status => {
                previous.last_transition_time.or(Some(now))
            }
            _ => Some(now),
        };
    }
}
