//! Core `v1` Service.

use std::collections::BTreeMap;

use autoscaler_core::ObjectMeta;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
}

resource!(Service, "", "v1", "Service");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub service_type: String,
    /// Assigned once and never changed by the operator.
    #[serde(rename = "clusterIP", default, skip_serializing_if = "String::is_empty")]
    pub cluster_ip: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_affinity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub port: i32,
    /// Named container port.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_service_field_names() {
        let mut svc = Service::default();
        svc.spec.service_type = "ClusterIP".into();
        svc.spec.cluster_ip = "10.0.0.1".into();
        let json = serde_json::to_value(&svc.spec).unwrap();
        assert_eq!(json["type"], "ClusterIP");
        assert_eq!(json["clusterIP"], "10.0.0.1");
    }
}
