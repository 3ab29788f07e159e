//! `config.openshift.io/v1` ClusterOperator, the status object the
//! operator publishes its health on.

use std::fmt;

use autoscaler_core::ObjectMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterOperator {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: ClusterOperatorStatus,
}

resource!(
    ClusterOperator,
    "config.openshift.io",
    "v1",
    "ClusterOperator",
    false
);

impl ClusterOperator {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named("", name),
            status: ClusterOperatorStatus::default(),
        }
    }

    /// True when the condition is present with status `True`.
    pub fn is_status_true(&self, condition: &ConditionType) -> bool {
        self.status
            .condition(condition)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// True when the condition is present with status `False`.
    pub fn is_status_false(&self, condition: &ConditionType) -> bool {
        self.status
            .condition(condition)
            .is_some_and(|c| c.status == ConditionStatus::False)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<OperandVersion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_objects: Vec<ObjectReference>,
}

impl ClusterOperatorStatus {
    pub fn condition(&self, condition: &ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| &c.condition_type == condition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(condition_type: ConditionType, status: ConditionStatus) -> Self {
        Self {
            condition_type,
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.reason = reason.into();
        self.message = message.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    Available,
    Progressing,
    Degraded,
    Upgradeable,
    Other(String),
}

impl From<String> for ConditionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Available" => Self::Available,
            "Progressing" => Self::Progressing,
            "Degraded" => Self::Degraded,
            "Upgradeable" => Self::Upgradeable,
            _ => Self::Other(value),
        }
    }
}

impl From<ConditionType> for String {
    fn from(value: ConditionType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "Available"),
            Self::Progressing => write!(f, "Progressing"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Upgradeable => write!(f, "Upgradeable"),
            Self::Other(other) => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandVersion {
    pub name: String,
    pub version: String,
}

/// Pointer to an object relevant to debugging the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    #[serde(default)]
    pub group: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}
