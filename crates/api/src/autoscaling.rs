//! `autoscaling.openshift.io` kinds.

use std::fmt;

use autoscaler_core::ObjectMeta;
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "autoscaling.openshift.io";

/// Cluster-wide autoscaler policy. A singleton: only one name is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterAutoscaler {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ClusterAutoscalerSpec,
}

resource!(ClusterAutoscaler, GROUP, "v1", "ClusterAutoscaler", false);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAutoscalerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<ResourceLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down: Option<ScaleDownConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_up: Option<ScaleUpConfig>,
    /// Pods below this priority are expendable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_priority_threshold: Option<i32>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pod_grace_period: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_node_provision_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_similar_node_groups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_daemonsets_utilization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_nodes_with_local_storage: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub balancing_ignored_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_verbosity: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expanders: Vec<Expander>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes_total: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<ResourceRange>,
    /// Gigabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<ResourceRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<GpuLimit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRange {
    #[serde(default)]
    pub min: i32,
    #[serde(default)]
    pub max: i32,
}

impl ResourceRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuLimit {
    #[serde(rename = "type")]
    pub gpu_type: String,
    #[serde(default)]
    pub min: i32,
    #[serde(default)]
    pub max: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleDownConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after_add: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unneeded_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cordon_node_before_terminating: Option<CordonMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CordonMode {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleUpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_pod_scale_up_delay: Option<String>,
}

/// Node group selection strategy. Unrecognised names are kept so they can
/// be reported instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Expander {
    LeastWaste,
    Priority,
    Random,
    Unknown(String),
}

impl Expander {
    /// Command line flag value, `None` for unknown expanders.
    pub const fn flag(&self) -> Option<&'static str> {
        match self {
            Self::LeastWaste => Some("least-waste"),
            Self::Priority => Some("priority"),
            Self::Random => Some("random"),
            Self::Unknown(_) => None,
        }
    }
}

impl From<String> for Expander {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LeastWaste" => Self::LeastWaste,
            "Priority" => Self::Priority,
            "Random" => Self::Random,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Expander> for String {
    fn from(value: Expander) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Expander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeastWaste => write!(f, "LeastWaste"),
            Self::Priority => write!(f, "Priority"),
            Self::Random => write!(f, "Random"),
            Self::Unknown(other) => write!(f, "{other}"),
        }
    }
}

/// Per-target scaling bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineAutoscaler {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: MachineAutoscalerSpec,
    #[serde(default)]
    pub status: MachineAutoscalerStatus,
}

resource!(MachineAutoscaler, GROUP, "v1beta1", "MachineAutoscaler");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineAutoscalerSpec {
    #[serde(default)]
    pub min_replicas: i32,
    #[serde(default)]
    pub max_replicas: i32,
    #[serde(default)]
    pub scale_target_ref: ScalableTargetRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineAutoscalerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_target_ref: Option<ScalableTargetRef>,
}

/// Weak reference to a scalable object in the same namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalableTargetRef {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

impl ScalableTargetRef {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ScalableTargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.api_version, self.kind, self.name)
    }
}
