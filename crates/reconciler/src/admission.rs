//! Admission review for autoscaler resources.
//!
//! The transport is external; this module only decides. A request is
//! routed by path, decoded, and run through the same validators the
//! reconcilers use.

use autoscaler_api::{ClusterAutoscaler, MachineAutoscaler};
use autoscaler_core::{HasMetadata, Object, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::validation::{ClusterAutoscalerValidator, MachineAutoscalerValidator, ValidationResponse};

pub const CLUSTER_AUTOSCALER_PATH: &str = "/validate-clusterautoscalers";
pub const MACHINE_AUTOSCALER_PATH: &str = "/validate-machineautoscalers";

/// Verdict on one admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionResponse {
    pub allowed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AdmissionResponse {
    pub fn allowed(reason: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            warnings,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            warnings: Vec::new(),
        }
    }

    fn from_validation(kind: &str, response: ValidationResponse) -> Self {
        match response.aggregate() {
            Some(message) => Self {
                allowed: false,
                reason: message,
                warnings: response.warnings,
            },
            None => Self::allowed(format!("{kind} valid"), response.warnings),
        }
    }
}

/// Routes admission requests to the validator for their kind.
#[derive(Debug, Clone)]
pub struct AdmissionRouter {
    cluster: ClusterAutoscalerValidator,
    machine: MachineAutoscalerValidator,
}

impl AdmissionRouter {
    pub fn new(cluster_autoscaler_name: impl Into<String>) -> Self {
        Self {
            cluster: ClusterAutoscalerValidator::new(cluster_autoscaler_name),
            machine: MachineAutoscalerValidator::new(),
        }
    }

    /// Paths this router answers on.
    pub const fn paths() -> [&'static str; 2] {
        [CLUSTER_AUTOSCALER_PATH, MACHINE_AUTOSCALER_PATH]
    }

    /// Review a raw request body posted to `path`.
    pub fn review(&self, path: &str, body: &Value) -> AdmissionResponse {
        let response = match path {
            CLUSTER_AUTOSCALER_PATH => {
                Self::review_as::<ClusterAutoscaler>(body, |ca| self.cluster.validate(ca))
            }
            MACHINE_AUTOSCALER_PATH => {
                Self::review_as::<MachineAutoscaler>(body, |ma| self.machine.validate(ma))
            }
            other => AdmissionResponse::denied(format!("no admission handler for path {other}")),
        };
        info!(path, allowed = response.allowed, reason = %response.reason, "Admission review");
        response
    }

    /// Review a stored object, routed by its kind.
    pub fn review_object(&self, object: &Object) -> AdmissionResponse {
        let path = if object.kind == ClusterAutoscaler::KIND {
            CLUSTER_AUTOSCALER_PATH
        } else if object.kind == MachineAutoscaler::KIND {
            MACHINE_AUTOSCALER_PATH
        } else {
            return AdmissionResponse::denied(format!(
                "kind {} is not subject to admission",
                object.kind
            ));
        };
        match serde_json::to_value(object) {
            Ok(body) => self.review(path, &body),
            Err(e) => AdmissionResponse::denied(e.to_string()),
        }
    }

    fn review_as<T>(body: &Value, validate: impl FnOnce(&T) -> ValidationResponse) -> AdmissionResponse
    where
        T: Resource + DeserializeOwned,
    {
        let resource: T = match serde_json::from_value(body.clone()) {
            Ok(resource) => resource,
            Err(e) => {
                debug!(kind = T::KIND, error = %e, "Failed to decode admission request");
                return AdmissionResponse::denied(e.to_string());
            }
        };
        debug!(kind = T::KIND, name = resource.name(), "Validating");
        AdmissionResponse::from_validation(T::KIND, validate(&resource))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> AdmissionRouter {
        AdmissionRouter::new("default")
    }

    #[test]
    fn test_valid_cluster_autoscaler_is_allowed() {
        let body = json!({
            "apiVersion": "autoscaling.openshift.io/v1",
            "kind": "ClusterAutoscaler",
            "metadata": { "name": "default" },
            "spec": { "resourceLimits": { "cores": { "min": 0, "max": 10 } } }
        });

        let response = router().review(CLUSTER_AUTOSCALER_PATH, &body);

        assert!(response.allowed);
        assert_eq!(response.reason, "ClusterAutoscaler valid");
    }

    #[test]
    fn test_gpu_type_warning_does_not_deny() {
        let body = json!({
            "metadata": { "name": "default" },
            "spec": { "resourceLimits": { "gpus": [{ "type": "nvidia.com/gpu", "min": 0, "max": 4 }] } }
        });

        let response = router().review(CLUSTER_AUTOSCALER_PATH, &body);

        assert!(response.allowed);
        assert_eq!(response.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_machine_autoscaler_is_denied() {
        let body = json!({
            "metadata": { "name": "ma", "namespace": "ns" },
            "spec": {
                "minReplicas": 4,
                "maxReplicas": 2,
                "scaleTargetRef": { "apiVersion": "machine.openshift.io/v1beta1", "kind": "MachineSet", "name": "ms" }
            }
        });

        let response = router().review(MACHINE_AUTOSCALER_PATH, &body);

        assert!(!response.allowed);
        assert_eq!(response.reason, "max replicas must be greater than or equal to min");
    }

    #[test]
    fn test_undecodable_body_is_denied() {
        let body = json!({ "metadata": { "name": "default" }, "spec": { "scanInterval": 10 } });
        let response = router().review(CLUSTER_AUTOSCALER_PATH, &body);
        assert!(!response.allowed);
        assert!(!response.reason.is_empty());
    }

    #[test]
    fn test_unknown_path_is_denied() {
        let response = router().review("/validate-widgets", &json!({}));
        assert!(!response.allowed);
    }
}
