//! `apps/v1` Deployment, reduced to the fields the operator manages.

use std::collections::BTreeMap;

use autoscaler_core::{LabelSelector, ObjectMeta};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,
}

resource!(Deployment, "apps", "v1", "Deployment");

impl Deployment {
    /// Rollout finished: the controller has seen the latest generation,
    /// every replica runs the current template and at least one is up.
    pub fn rollout_complete(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        let desired = self.spec.replicas.unwrap_or(1);
        status.observed_generation >= self.metadata.generation
            && status.updated_replicas == desired
            && status.available_replicas > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub selector: LabelSelector,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub updated_replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub effect: String,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn deployment(generation: i64, status: Option<DeploymentStatus>) -> Deployment {
        let mut d = Deployment::default();
        d.metadata.generation = generation;
        d.spec.replicas = Some(1);
        d.status = status;
        d
    }

    #[test]
    fn test_rollout_incomplete_without_status() {
        assert!(!deployment(1, None).rollout_complete());
    }

    #[test]
    fn test_rollout_complete_requires_all_three_conditions() {
        let done = DeploymentStatus {
            observed_generation: 2,
            replicas: 1,
            updated_replicas: 1,
            available_replicas: 1,
        };
        assert!(deployment(2, Some(done.clone())).rollout_complete());

        let stale = DeploymentStatus {
            observed_generation: 1,
            ..done.clone()
        };
        assert!(!deployment(2, Some(stale)).rollout_complete());

        let updating = DeploymentStatus {
            updated_replicas: 0,
            ..done.clone()
        };
        assert!(!deployment(2, Some(updating)).rollout_complete());

        let unavailable = DeploymentStatus {
            available_replicas: 0,
            ..done
        };
        assert!(!deployment(2, Some(unavailable)).rollout_complete());
    }

    #[test]
    fn test_pod_template_metadata_has_no_name() {
        let mut template = PodTemplateSpec::default();
        template.metadata.labels.insert("a".into(), "b".into());
        let json = serde_json::to_value(&template.metadata).unwrap();
        assert_eq!(json, serde_json::json!({ "labels": { "a": "b" } }));
    }
}
