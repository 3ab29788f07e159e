//! Metrics exposure, scraping and alerting for the autoscaler workload.

use std::collections::BTreeMap;

use autoscaler_api::ClusterAutoscaler;
use autoscaler_api::monitoring::{
    Endpoint, NamespaceSelector, PrometheusRule, PrometheusRuleSpec, Rule, RuleGroup,
    ServiceMonitor, ServiceMonitorSpec,
};
use autoscaler_api::service::{Service, ServicePort, ServiceSpec};
use autoscaler_core::{HasMetadata, LabelSelector, ObjectMeta};

use super::{AutoscalerConfig, METRICS_PORT, METRICS_PORT_NAME, app_labels};

const BEARER_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SCRAPE_INTERVAL: &str = "30s";
const RULE_GROUP: &str = "general.rules";

fn metadata(ca: &ClusterAutoscaler, config: &AutoscalerConfig) -> ObjectMeta {
    ObjectMeta::named(
        config.namespace.clone(),
        AutoscalerConfig::workload_name(ca.name()),
    )
    .with_labels(app_labels())
}

/// ClusterIP service in front of the metrics port.
pub fn service(ca: &ClusterAutoscaler, config: &AutoscalerConfig) -> Service {
    Service {
        metadata: metadata(ca, config),
        spec: ServiceSpec {
            service_type: "ClusterIP".to_string(),
            cluster_ip: String::new(),
            selector: app_labels(),
            ports: vec![ServicePort {
                name: METRICS_PORT_NAME.to_string(),
                port: METRICS_PORT,
                target_port: METRICS_PORT_NAME.to_string(),
                protocol: "TCP".to_string(),
            }],
            session_affinity: "None".to_string(),
        },
    }
}

pub fn service_monitor(ca: &ClusterAutoscaler, config: &AutoscalerConfig) -> ServiceMonitor {
    ServiceMonitor {
        metadata: metadata(ca, config),
        spec: ServiceMonitorSpec {
            endpoints: vec![Endpoint {
                bearer_token_file: BEARER_TOKEN_FILE.to_string(),
                interval: SCRAPE_INTERVAL.to_string(),
                port: METRICS_PORT_NAME.to_string(),
                scheme: "http".to_string(),
            }],
            namespace_selector: NamespaceSelector {
                match_names: vec![config.namespace.clone()],
            },
            selector: LabelSelector::from_labels(app_labels()),
        },
    }
}

/// Alerts on unschedulable pods, unsafe cluster state and excessive
/// unregistered node cleanup.
pub fn prometheus_rule(ca: &ClusterAutoscaler, config: &AutoscalerConfig) -> PrometheusRule {
    let service = AutoscalerConfig::workload_name(ca.name());

    let rules = vec![
        alert(
            "ClusterAutoscalerUnschedulablePods",
            format!("cluster_autoscaler_unschedulable_pods_count{{service=\"{service}\"}} > 0"),
            Some("20m"),
            "Cluster Autoscaler has {{ $value }} unschedulable pods",
        ),
        alert(
            "ClusterAutoscalerNotSafeToScale",
            format!("cluster_autoscaler_cluster_safe_to_autoscale{{service=\"{service}\"}} != 1"),
            Some("15m"),
            "Cluster Autoscaler is reporting that the cluster is not ready for scaling",
        ),
        alert(
            "ClusterAutoscalerExcessiveUnregisteredNodeCleanup",
            "rate(cluster_autoscaler_old_unregistered_nodes_removed_count[6h]) > 1".to_string(),
            None,
            "Cluster Autoscaler has removed more than 1 unregistered node in the last 6 hours",
        ),
    ];

    PrometheusRule {
        metadata: ObjectMeta::named(config.namespace.clone(), service)
            .with_labels([("prometheus", "k8s"), ("role", "alert-rules")]),
        spec: PrometheusRuleSpec {
            groups: vec![RuleGroup {
                name: RULE_GROUP.to_string(),
                rules,
            }],
        },
    }
}

fn alert(name: &str, expr: String, for_duration: Option<&str>, message: &str) -> Rule {
    Rule {
        alert: name.to_string(),
        expr,
        for_duration: for_duration.map(str::to_string),
        labels: BTreeMap::from([("severity".to_string(), "warning".to_string())]),
        annotations: BTreeMap::from([("message".to_string(), message.to_string())]),
    }
}
