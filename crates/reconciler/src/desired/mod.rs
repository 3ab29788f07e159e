//! Desired object graph for a `ClusterAutoscaler`.
//!
//! Everything here is a pure function of the autoscaler spec and the
//! static [`AutoscalerConfig`]: one primary `Deployment` plus the metrics
//! `Service`, `ServiceMonitor`, `PrometheusRule` and `NetworkPolicy`
//! objects around it.

mod args;
mod monitoring;
mod network;

use std::collections::BTreeMap;

use autoscaler_api::ClusterAutoscaler;
use autoscaler_api::apps::{
    Container, ContainerPort, Deployment, DeploymentSpec, PodSpec, PodTemplateSpec,
    ResourceRequirements, Toleration,
};
use autoscaler_api::monitoring::{PrometheusRule, ServiceMonitor};
use autoscaler_api::networking::NetworkPolicy;
use autoscaler_api::service::Service;
use autoscaler_core::{HasMetadata, LabelSelector, ObjectMeta, Resource};
use serde::{Deserialize, Serialize};

pub use args::{AutoscalerArg, autoscaler_args, resource_args, scale_down_args, scale_up_args};
pub use monitoring::{prometheus_rule, service, service_monitor};
pub use network::network_policies;

/// Annotation carrying the release the workload was rendered for.
pub const RELEASE_VERSION_ANNOTATION: &str = "release.openshift.io/version";

/// Marks the autoscaler pod as critical to the scheduler.
pub const CRITICAL_POD_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/critical-pod";

pub const METRICS_PORT: i32 = 8085;
pub const METRICS_PORT_NAME: &str = "metrics";

const APP_LABEL: &str = "k8s-app";
const APP_NAME: &str = "cluster-autoscaler";
const OWNER_LABEL: &str = "cluster-autoscaler";

const SERVICE_ACCOUNT: &str = "cluster-autoscaler";
const PRIORITY_CLASS: &str = "system-cluster-critical";
const MASTER_NODE_ROLE: &str = "node-role.kubernetes.io/master";
const CONTAINER_NAME: &str = "cluster-autoscaler";
const COMMAND: &str = "cluster-autoscaler";

/// Static settings the desired workload is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerConfig {
    /// The only accepted `ClusterAutoscaler` name.
    pub name: String,
    /// Namespace for the workload and its auxiliary objects.
    pub namespace: String,
    pub image: String,
    pub replicas: i32,
    pub cloud_provider: String,
    /// Used for `--v` when the spec sets no verbosity.
    pub verbosity: i32,
    pub extra_args: Vec<String>,
    pub release_version: String,
    pub webhooks_port: i32,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            namespace: "openshift-machine-api".to_string(),
            image: "quay.io/openshift/origin-cluster-autoscaler:v4.0".to_string(),
            replicas: 1,
            cloud_provider: "clusterapi".to_string(),
            verbosity: 1,
            extra_args: Vec::new(),
            release_version: "unknown".to_string(),
            webhooks_port: 8443,
        }
    }
}

impl AutoscalerConfig {
    /// Name shared by the workload and its auxiliary objects.
    pub fn workload_name(ca_name: &str) -> String {
        format!("cluster-autoscaler-{ca_name}")
    }
}

/// The full set of objects a `ClusterAutoscaler` should produce.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub deployment: Deployment,
    pub service: Service,
    pub service_monitor: ServiceMonitor,
    pub prometheus_rule: PrometheusRule,
    pub network_policies: Vec<NetworkPolicy>,
}

/// Renders [`DesiredState`] from a spec.
#[derive(Debug, Clone)]
pub struct DesiredStateBuilder {
    config: AutoscalerConfig,
}

impl DesiredStateBuilder {
    pub const fn new(config: AutoscalerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &AutoscalerConfig {
        &self.config
    }

    /// Render every object, each owned by `ca`.
    pub fn build(&self, ca: &ClusterAutoscaler) -> DesiredState {
        let mut state = DesiredState {
            deployment: self.deployment(ca),
            service: service(ca, &self.config),
            service_monitor: service_monitor(ca, &self.config),
            prometheus_rule: prometheus_rule(ca, &self.config),
            network_policies: network_policies(ca, &self.config),
        };

        let owner = ca.controller_owner_reference();
        state.deployment.add_owner_reference(owner.clone());
        state.service.add_owner_reference(owner.clone());
        state.service_monitor.add_owner_reference(owner.clone());
        state.prometheus_rule.add_owner_reference(owner.clone());
        for policy in &mut state.network_policies {
            policy.add_owner_reference(owner.clone());
        }

        state
    }

    /// The primary workload running the cluster-autoscaler binary.
    pub fn deployment(&self, ca: &ClusterAutoscaler) -> Deployment {
        let config = &self.config;
        let labels = workload_labels(ca);

        let metadata = ObjectMeta::named(
            config.namespace.clone(),
            AutoscalerConfig::workload_name(ca.name()),
        )
        .with_labels(labels.clone())
        .with_annotations([(RELEASE_VERSION_ANNOTATION, config.release_version.as_str())]);

        let template_metadata = ObjectMeta::default()
            .with_labels(labels.clone())
            .with_annotations([
                (CRITICAL_POD_ANNOTATION, ""),
                (RELEASE_VERSION_ANNOTATION, config.release_version.as_str()),
            ]);

        Deployment {
            metadata,
            spec: DeploymentSpec {
                replicas: Some(config.replicas),
                selector: LabelSelector::from_labels(labels),
                template: PodTemplateSpec {
                    metadata: template_metadata,
                    spec: self.pod_spec(ca),
                },
            },
            status: None,
        }
    }

    fn pod_spec(&self, ca: &ClusterAutoscaler) -> PodSpec {
        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: self.config.image.clone(),
            command: vec![COMMAND.to_string()],
            args: autoscaler_args(ca, &self.config),
            ports: vec![ContainerPort {
                name: METRICS_PORT_NAME.to_string(),
                container_port: METRICS_PORT,
                protocol: "TCP".to_string(),
            }],
            resources: ResourceRequirements {
                requests: BTreeMap::from([
                    ("cpu".to_string(), "10m".to_string()),
                    ("memory".to_string(), "20Mi".to_string()),
                ]),
                limits: BTreeMap::new(),
            },
        };

        PodSpec {
            service_account_name: SERVICE_ACCOUNT.to_string(),
            priority_class_name: PRIORITY_CLASS.to_string(),
            node_selector: BTreeMap::from([(MASTER_NODE_ROLE.to_string(), String::new())]),
            containers: vec![container],
            tolerations: vec![
                Toleration {
                    key: "CriticalAddonsOnly".to_string(),
                    operator: "Exists".to_string(),
                    effect: String::new(),
                },
                Toleration {
                    key: MASTER_NODE_ROLE.to_string(),
                    operator: "Exists".to_string(),
                    effect: "NoSchedule".to_string(),
                },
            ],
        }
    }
}

/// Labels identifying the workload of one `ClusterAutoscaler`.
pub fn workload_labels(ca: &ClusterAutoscaler) -> BTreeMap<String, String> {
    BTreeMap::from([
        (OWNER_LABEL.to_string(), ca.name().to_string()),
        (APP_LABEL.to_string(), APP_NAME.to_string()),
    ])
}

/// Labels shared by the metrics objects.
fn app_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), APP_NAME.to_string())])
}
