//! Command line of the cluster-autoscaler workload.

use std::fmt;

use autoscaler_api::ClusterAutoscaler;
use autoscaler_api::autoscaling::{CordonMode, Expander, ResourceLimits, ScaleDownConfig, ScaleUpConfig};
use itertools::Itertools;
use tracing::warn;

use super::AutoscalerConfig;

const LEADER_ELECT_LEASE_DURATION: &str = "137s";
const LEADER_ELECT_RENEW_DEADLINE: &str = "107s";
const LEADER_ELECT_RETRY_PERIOD: &str = "26s";

/// Zero disables bulk soft tainting of empty nodes.
const MAX_BULK_SOFT_TAINT_COUNT: i32 = 0;

/// A cluster-autoscaler flag, rendered bare or with a value or range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoscalerArg {
    LogToStderr,
    RecordDuplicatedEvents,
    CloudProvider,
    Namespace,
    LeaderElectLeaseDuration,
    LeaderElectRenewDeadline,
    LeaderElectRetryPeriod,
    MaxBulkSoftTaintCount,
    ScanInterval,
    MaxGracefulTerminationSec,
    MaxNodeProvisionTime,
    ExpendablePodsPriorityCutoff,
    MaxNodesTotal,
    CoresTotal,
    MemoryTotal,
    GpuTotal,
    ScaleDownEnabled,
    ScaleDownDelayAfterAdd,
    ScaleDownDelayAfterDelete,
    ScaleDownDelayAfterFailure,
    ScaleDownUnneededTime,
    ScaleDownUtilizationThreshold,
    CordonNodeBeforeTerminating,
    NewPodScaleUpDelay,
    BalanceSimilarNodeGroups,
    IgnoreDaemonsetsUtilization,
    SkipNodesWithLocalStorage,
    BalancingIgnoreLabel,
    Verbosity,
    Expander,
}

impl AutoscalerArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LogToStderr => "--logtostderr",
            Self::RecordDuplicatedEvents => "--record-duplicated-events",
            Self::CloudProvider => "--cloud-provider",
            Self::Namespace => "--namespace",
            Self::LeaderElectLeaseDuration => "--leader-elect-lease-duration",
            Self::LeaderElectRenewDeadline => "--leader-elect-renew-deadline",
            Self::LeaderElectRetryPeriod => "--leader-elect-retry-period",
            Self::MaxBulkSoftTaintCount => "--max-bulk-soft-taint-count",
            Self::ScanInterval => "--scan-interval",
            Self::MaxGracefulTerminationSec => "--max-graceful-termination-sec",
            Self::MaxNodeProvisionTime => "--max-node-provision-time",
            Self::ExpendablePodsPriorityCutoff => "--expendable-pods-priority-cutoff",
            Self::MaxNodesTotal => "--max-nodes-total",
            Self::CoresTotal => "--cores-total",
            Self::MemoryTotal => "--memory-total",
            Self::GpuTotal => "--gpu-total",
            Self::ScaleDownEnabled => "--scale-down-enabled",
            Self::ScaleDownDelayAfterAdd => "--scale-down-delay-after-add",
            Self::ScaleDownDelayAfterDelete => "--scale-down-delay-after-delete",
            Self::ScaleDownDelayAfterFailure => "--scale-down-delay-after-failure",
            Self::ScaleDownUnneededTime => "--scale-down-unneeded-time",
            Self::ScaleDownUtilizationThreshold => "--scale-down-utilization-threshold",
            Self::CordonNodeBeforeTerminating => "--cordon-node-before-terminating",
            Self::NewPodScaleUpDelay => "--new-pod-scale-up-delay",
            Self::BalanceSimilarNodeGroups => "--balance-similar-node-groups",
            Self::IgnoreDaemonsetsUtilization => "--ignore-daemonsets-utilization",
            Self::SkipNodesWithLocalStorage => "--skip-nodes-with-local-storage",
            Self::BalancingIgnoreLabel => "--balancing-ignore-label",
            Self::Verbosity => "--v",
            Self::Expander => "--expander",
        }
    }

    pub fn value(self, value: impl fmt::Display) -> String {
        format!("{self}={value}")
    }

    pub fn range(self, min: i32, max: i32) -> String {
        format!("{self}={min}:{max}")
    }

    pub fn type_range(self, kind: &str, min: i32, max: i32) -> String {
        format!("{self}={kind}:{min}:{max}")
    }
}

impl fmt::Display for AutoscalerArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments for the cluster-autoscaler container.
///
/// The baseline comes first and is always present. Each optional field
/// contributes at most one token, list fields one per element, and the
/// configured extra arguments close the list.
pub fn autoscaler_args(ca: &ClusterAutoscaler, config: &AutoscalerConfig) -> Vec<String> {
    let spec = &ca.spec;

    let mut args = vec![
        AutoscalerArg::LogToStderr.to_string(),
        AutoscalerArg::RecordDuplicatedEvents.to_string(),
        AutoscalerArg::CloudProvider.value(&config.cloud_provider),
        AutoscalerArg::Namespace.value(&config.namespace),
        AutoscalerArg::LeaderElectLeaseDuration.value(LEADER_ELECT_LEASE_DURATION),
        AutoscalerArg::LeaderElectRenewDeadline.value(LEADER_ELECT_RENEW_DEADLINE),
        AutoscalerArg::LeaderElectRetryPeriod.value(LEADER_ELECT_RETRY_PERIOD),
        AutoscalerArg::MaxBulkSoftTaintCount.value(MAX_BULK_SOFT_TAINT_COUNT),
    ];

    args.extend(
        spec.scan_interval
            .as_ref()
            .map(|v| AutoscalerArg::ScanInterval.value(v)),
    );
    args.extend(
        spec.max_pod_grace_period
            .map(|v| AutoscalerArg::MaxGracefulTerminationSec.value(v)),
    );
    args.extend(
        spec.max_node_provision_time
            .as_ref()
            .filter(|v| !v.is_empty())
            .map(|v| AutoscalerArg::MaxNodeProvisionTime.value(v)),
    );
    args.extend(
        spec.pod_priority_threshold
            .map(|v| AutoscalerArg::ExpendablePodsPriorityCutoff.value(v)),
    );

    if let Some(limits) = &spec.resource_limits {
        args.extend(resource_args(limits));
    }
    if let Some(scale_down) = &spec.scale_down {
        args.extend(scale_down_args(scale_down));
    }
    if let Some(scale_up) = &spec.scale_up {
        args.extend(scale_up_args(scale_up));
    }

    args.extend(
        spec.balance_similar_node_groups
            .map(|v| AutoscalerArg::BalanceSimilarNodeGroups.value(v)),
    );
    args.extend(
        spec.ignore_daemonsets_utilization
            .map(|v| AutoscalerArg::IgnoreDaemonsetsUtilization.value(v)),
    );
    args.extend(
        spec.skip_nodes_with_local_storage
            .map(|v| AutoscalerArg::SkipNodesWithLocalStorage.value(v)),
    );
    args.extend(
        spec.balancing_ignored_labels
            .iter()
            .map(|label| AutoscalerArg::BalancingIgnoreLabel.value(label)),
    );

    args.push(AutoscalerArg::Verbosity.value(spec.log_verbosity.unwrap_or(config.verbosity)));

    args.extend(expander_arg(&spec.expanders));
    args.extend(config.extra_args.iter().cloned());

    args
}

/// Resource totals, cores and memory as ranges, one token per GPU type.
pub fn resource_args(limits: &ResourceLimits) -> Vec<String> {
    let mut args = Vec::new();

    args.extend(
        limits
            .max_nodes_total
            .map(|v| AutoscalerArg::MaxNodesTotal.value(v)),
    );
    args.extend(
        limits
            .cores
            .map(|r| AutoscalerArg::CoresTotal.range(r.min, r.max)),
    );
    args.extend(
        limits
            .memory
            .map(|r| AutoscalerArg::MemoryTotal.range(r.min, r.max)),
    );
    args.extend(
        limits
            .gpus
            .iter()
            .map(|g| AutoscalerArg::GpuTotal.type_range(&g.gpu_type, g.min, g.max)),
    );

    args
}

/// A disabled scale-down emits only the switch; its other knobs are ignored.
pub fn scale_down_args(config: &ScaleDownConfig) -> Vec<String> {
    if !config.enabled {
        return vec![AutoscalerArg::ScaleDownEnabled.value(false)];
    }

    let optional = [
        (AutoscalerArg::ScaleDownDelayAfterAdd, &config.delay_after_add),
        (AutoscalerArg::ScaleDownDelayAfterDelete, &config.delay_after_delete),
        (AutoscalerArg::ScaleDownDelayAfterFailure, &config.delay_after_failure),
        (AutoscalerArg::ScaleDownUnneededTime, &config.unneeded_time),
        (
            AutoscalerArg::ScaleDownUtilizationThreshold,
            &config.utilization_threshold,
        ),
    ];

    std::iter::once(AutoscalerArg::ScaleDownEnabled.value(true))
        .chain(
            optional
                .into_iter()
                .filter_map(|(arg, value)| value.as_ref().map(|v| arg.value(v))),
        )
        .chain(config.cordon_node_before_terminating.map(|mode| {
            AutoscalerArg::CordonNodeBeforeTerminating.value(mode == CordonMode::Enabled)
        }))
        .collect()
}

pub fn scale_up_args(config: &ScaleUpConfig) -> Vec<String> {
    config
        .new_pod_scale_up_delay
        .iter()
        .map(|v| AutoscalerArg::NewPodScaleUpDelay.value(v))
        .collect()
}

/// One comma-joined `--expander` token in declared order. Unknown values
/// are dropped; no token is emitted when nothing known remains.
fn expander_arg(expanders: &[Expander]) -> Option<String> {
    let flags = expanders
        .iter()
        .filter_map(|expander| {
            let flag = expander.flag();
            if flag.is_none() {
                warn!(expander = %expander, "Skipping unknown expander");
            }
            flag
        })
        .join(",");

    (!flags.is_empty()).then(|| AutoscalerArg::Expander.value(flags))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use autoscaler_api::autoscaling::{ClusterAutoscalerSpec, GpuLimit, ResourceRange};
    use autoscaler_core::ObjectMeta;

    fn config() -> AutoscalerConfig {
        AutoscalerConfig {
            namespace: "test-namespace".to_string(),
            cloud_provider: "testProvider".to_string(),
            ..AutoscalerConfig::default()
        }
    }

    fn autoscaler(spec: ClusterAutoscalerSpec) -> ClusterAutoscaler {
        ClusterAutoscaler {
            metadata: ObjectMeta::named("", "default"),
            spec,
        }
    }

    fn baseline() -> Vec<String> {
        vec![
            "--logtostderr".to_string(),
            "--record-duplicated-events".to_string(),
            "--cloud-provider=testProvider".to_string(),
            "--namespace=test-namespace".to_string(),
            "--leader-elect-lease-duration=137s".to_string(),
            "--leader-elect-renew-deadline=107s".to_string(),
            "--leader-elect-retry-period=26s".to_string(),
            "--max-bulk-soft-taint-count=0".to_string(),
        ]
    }

    #[test]
    fn test_empty_spec_yields_baseline_and_verbosity() {
        let args = autoscaler_args(&autoscaler(ClusterAutoscalerSpec::default()), &config());

        let mut expected = baseline();
        expected.push("--v=1".to_string());
        assert_eq!(args, expected);
    }

    #[test]
    fn test_spec_verbosity_wins_over_config() {
        let spec = ClusterAutoscalerSpec {
            log_verbosity: Some(4),
            ..ClusterAutoscalerSpec::default()
        };
        let args = autoscaler_args(&autoscaler(spec), &config());
        assert!(args.contains(&"--v=4".to_string()));
        assert!(!args.contains(&"--v=1".to_string()));
    }

    #[test]
    fn test_full_spec_ordering() {
        let spec = ClusterAutoscalerSpec {
            scan_interval: Some("10s".to_string()),
            max_pod_grace_period: Some(60),
            max_node_provision_time: Some("30m".to_string()),
            pod_priority_threshold: Some(-10),
            resource_limits: Some(ResourceLimits {
                max_nodes_total: Some(24),
                cores: Some(ResourceRange::new(8, 128)),
                memory: Some(ResourceRange::new(4, 256)),
                gpus: vec![
                    GpuLimit {
                        gpu_type: "nvidia.com/gpu".to_string(),
                        min: 0,
                        max: 16,
                    },
                    GpuLimit {
                        gpu_type: "amd.com/gpu".to_string(),
                        min: 1,
                        max: 2,
                    },
                ],
            }),
            scale_down: Some(ScaleDownConfig {
                enabled: true,
                delay_after_add: Some("10s".to_string()),
                delay_after_delete: Some("20s".to_string()),
                delay_after_failure: Some("30s".to_string()),
                unneeded_time: Some("5m".to_string()),
                utilization_threshold: Some("0.4".to_string()),
                cordon_node_before_terminating: Some(CordonMode::Enabled),
            }),
            scale_up: Some(ScaleUpConfig {
                new_pod_scale_up_delay: Some("10s".to_string()),
            }),
            balance_similar_node_groups: Some(true),
            ignore_daemonsets_utilization: Some(false),
            skip_nodes_with_local_storage: Some(true),
            balancing_ignored_labels: vec!["a".to_string(), "b".to_string()],
            log_verbosity: None,
            expanders: vec![Expander::Priority, Expander::LeastWaste],
        };

        let args = autoscaler_args(&autoscaler(spec), &config());

        let mut expected = baseline();
        expected.extend(
            [
                "--scan-interval=10s",
                "--max-graceful-termination-sec=60",
                "--max-node-provision-time=30m",
                "--expendable-pods-priority-cutoff=-10",
                "--max-nodes-total=24",
                "--cores-total=8:128",
                "--memory-total=4:256",
                "--gpu-total=nvidia.com/gpu:0:16",
                "--gpu-total=amd.com/gpu:1:2",
                "--scale-down-enabled=true",
                "--scale-down-delay-after-add=10s",
                "--scale-down-delay-after-delete=20s",
                "--scale-down-delay-after-failure=30s",
                "--scale-down-unneeded-time=5m",
                "--scale-down-utilization-threshold=0.4",
                "--cordon-node-before-terminating=true",
                "--new-pod-scale-up-delay=10s",
                "--balance-similar-node-groups=true",
                "--ignore-daemonsets-utilization=false",
                "--skip-nodes-with-local-storage=true",
                "--balancing-ignore-label=a",
                "--balancing-ignore-label=b",
                "--v=1",
                "--expander=priority,least-waste",
            ]
            .map(str::to_string),
        );
        assert_eq!(args, expected);
    }

    #[test]
    fn test_disabled_scale_down_ignores_other_knobs() {
        let args = scale_down_args(&ScaleDownConfig {
            enabled: false,
            delay_after_add: Some("10s".to_string()),
            cordon_node_before_terminating: Some(CordonMode::Disabled),
            ..ScaleDownConfig::default()
        });
        assert_eq!(args, vec!["--scale-down-enabled=false".to_string()]);
    }

    #[test]
    fn test_cordon_disabled_renders_false() {
        let args = scale_down_args(&ScaleDownConfig {
            enabled: true,
            cordon_node_before_terminating: Some(CordonMode::Disabled),
            ..ScaleDownConfig::default()
        });
        assert_eq!(
            args,
            vec![
                "--scale-down-enabled=true".to_string(),
                "--cordon-node-before-terminating=false".to_string()
            ]
        );
    }

    #[test]
    fn test_unknown_expanders_are_dropped() {
        let expanders = vec![
            Expander::Random,
            Expander::Unknown("most-pods".to_string()),
            Expander::LeastWaste,
        ];
        assert_eq!(
            expander_arg(&expanders),
            Some("--expander=random,least-waste".to_string())
        );
        assert_eq!(
            expander_arg(&[Expander::Unknown("x".to_string())]),
            None
        );
    }

    #[test]
    fn test_extra_args_close_the_list() {
        let config = AutoscalerConfig {
            extra_args: vec!["--foo=bar".to_string()],
            ..config()
        };
        let args = autoscaler_args(&autoscaler(ClusterAutoscalerSpec::default()), &config);
        assert_eq!(args.last().map(String::as_str), Some("--foo=bar"));
    }
}
