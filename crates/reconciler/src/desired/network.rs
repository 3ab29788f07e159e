//! Network policies isolating the autoscaler pods.

use autoscaler_api::ClusterAutoscaler;
use autoscaler_api::networking::{
    EgressRule, IngressRule, NetworkPolicy, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use autoscaler_core::{HasMetadata, LabelSelector, ObjectMeta};

use super::{AutoscalerConfig, METRICS_PORT, workload_labels};

const DNS_PORT: i32 = 5353;
const API_SERVER_PORT: i32 = 6443;

/// Default-deny plus the allow rules the autoscaler needs: DNS and API
/// server egress, webhook and metrics ingress.
pub fn network_policies(ca: &ClusterAutoscaler, config: &AutoscalerConfig) -> Vec<NetworkPolicy> {
    let base = AutoscalerConfig::workload_name(ca.name());
    let policy = |suffix: &str, spec: NetworkPolicySpec| NetworkPolicy {
        metadata: ObjectMeta::named(config.namespace.clone(), format!("{base}-{suffix}")),
        spec: NetworkPolicySpec {
            pod_selector: LabelSelector::from_labels(workload_labels(ca)),
            ..spec
        },
    };

    let dns_peer = NetworkPolicyPeer {
        namespace_selector: Some(LabelSelector::from_labels([(
            "kubernetes.io/metadata.name",
            "openshift-dns",
        )])),
        pod_selector: Some(LabelSelector::from_labels([(
            "dns.operator.openshift.io/daemonset-dns",
            "default",
        )])),
    };

    vec![
        policy(
            "default-deny",
            NetworkPolicySpec {
                policy_types: policy_types(&["Egress", "Ingress"]),
                ..NetworkPolicySpec::default()
            },
        ),
        policy(
            "allow-egress-to-dns",
            NetworkPolicySpec {
                policy_types: policy_types(&["Egress"]),
                egress: vec![EgressRule {
                    to: vec![dns_peer],
                    ports: vec![NetworkPolicyPort::tcp(DNS_PORT), NetworkPolicyPort::udp(DNS_PORT)],
                }],
                ..NetworkPolicySpec::default()
            },
        ),
        policy(
            "allow-egress-to-api-server",
            NetworkPolicySpec {
                policy_types: policy_types(&["Egress"]),
                egress: vec![EgressRule {
                    to: Vec::new(),
                    ports: vec![NetworkPolicyPort::tcp(API_SERVER_PORT)],
                }],
                ..NetworkPolicySpec::default()
            },
        ),
        policy(
            "allow-ingress-to-webhooks",
            NetworkPolicySpec {
                policy_types: policy_types(&["Ingress"]),
                ingress: vec![IngressRule {
                    from: Vec::new(),
                    ports: vec![NetworkPolicyPort::tcp(config.webhooks_port)],
                }],
                ..NetworkPolicySpec::default()
            },
        ),
        policy(
            "allow-ingress-to-metrics",
            NetworkPolicySpec {
                policy_types: policy_types(&["Ingress"]),
                ingress: vec![IngressRule {
                    from: Vec::new(),
                    ports: vec![NetworkPolicyPort::tcp(METRICS_PORT)],
                }],
                ..NetworkPolicySpec::default()
            },
        ),
    ]
}

fn policy_types(types: &[&str]) -> Vec<String> {
    types.iter().map(|t| (*t).to_string()).collect()
}
