//! Validation of `ClusterAutoscaler` and `MachineAutoscaler` resources.
//!
//! Validators are pure and shared by the reconcile and admission paths.
//! Errors deny the resource; warnings are reported but never deny.

use autoscaler_api::autoscaling::{
    ClusterAutoscaler, GpuLimit, MachineAutoscaler, ResourceLimits, ResourceRange,
    ScaleDownConfig,
};
use autoscaler_core::{HasMetadata, parse_duration, validate_label_value};
use itertools::Itertools;

use crate::error::{Error, Result};

/// Appended to every GPU label warning.
pub const GPU_LABEL_HELP: &str = "This is not an error but may cause issues when using GPU resource limits with the Cluster Autoscaler. For more information on the proper use of these values, please see https://access.redhat.com/solutions/6055181";

/// Errors and warnings found while validating one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResponse {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResponse {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The errors folded into one message, `None` when valid.
    pub fn aggregate(&self) -> Option<String> {
        (!self.errors.is_empty()).then(|| aggregate_message(&self.errors))
    }

    /// # Errors
    ///
    /// Returns `Validation` carrying the aggregate message when invalid.
    pub fn into_result(self, kind: &str) -> Result<Vec<String>> {
        match self.aggregate() {
            Some(message) => Err(Error::validation(kind, message)),
            None => Ok(self.warnings),
        }
    }
}

/// Join messages the way an aggregate error prints: a single message as is,
/// several as a bracketed, de-duplicated list.
pub fn aggregate_message(messages: &[String]) -> String {
    match messages {
        [] => String::new(),
        [single] => single.clone(),
        many => format!("[{}]", many.iter().unique().join(", ")),
    }
}

/// Validates the cluster-wide autoscaler singleton.
#[derive(Debug, Clone)]
pub struct ClusterAutoscalerValidator {
    name: String,
}

impl ClusterAutoscalerValidator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self, ca: &ClusterAutoscaler) -> ValidationResponse {
        let mut response = ValidationResponse::default();

        if ca.name() != self.name {
            response.errors.push(format!(
                "Name {:?} is invalid, only {:?} is allowed",
                ca.name(),
                self.name
            ));
        }

        if let Some(limits) = &ca.spec.resource_limits {
            response.errors.extend(validate_resource_limits(limits));
            response.warnings.extend(gpu_type_warnings(&limits.gpus));
        }

        response.errors.extend(validate_timing(ca));

        if let Some(scale_down) = &ca.spec.scale_down {
            response.errors.extend(validate_scale_down(scale_down));
        }

        response
    }
}

fn validate_resource_limits(limits: &ResourceLimits) -> Vec<String> {
    let mut errors = Vec::new();

    if limits.max_nodes_total.is_some_and(|max| max < 0) {
        errors.push("ResourceLimits.MaxNodesTotal must be greater than 0".to_string());
    }

    if let Some(cores) = &limits.cores {
        let range = validate_range(cores);
        if !range.is_empty() {
            errors.push(format!("ResourceLimits.Cores: {}", aggregate_message(&range)));
        }
    }

    if let Some(memory) = &limits.memory {
        let range = validate_range(memory);
        if !range.is_empty() {
            errors.push(format!("ResourceLimits.Memory: {}", aggregate_message(&range)));
        }
    }

    for gpu in &limits.gpus {
        let range = validate_range(&ResourceRange::new(gpu.min, gpu.max));
        if !range.is_empty() {
            errors.push(format!(
                "ResourceLimits.GPUS.{}: {}",
                gpu.gpu_type,
                aggregate_message(&range)
            ));
        }
    }

    errors
}

/// Range rules: both bounds non-negative, max not below min.
pub fn validate_range(range: &ResourceRange) -> Vec<String> {
    let mut errors = Vec::new();
    if range.min < 0 || range.max < 0 {
        errors.push("Min and Max must be greater than zero".to_string());
    }
    if range.max < range.min {
        errors.push("Max must be greater than or equal to Min".to_string());
    }
    errors
}

/// Top-level and scale-up durations, passed verbatim as arguments.
fn validate_timing(ca: &ClusterAutoscaler) -> Vec<String> {
    let scale_up_delay = ca
        .spec
        .scale_up
        .as_ref()
        .and_then(|scale_up| scale_up.new_pod_scale_up_delay.as_deref());

    [
        ("ScanInterval", ca.spec.scan_interval.as_deref()),
        ("MaxNodeProvisionTime", ca.spec.max_node_provision_time.as_deref()),
        ("ScaleUp.NewPodScaleUpDelay", scale_up_delay),
    ]
    .into_iter()
    .filter_map(|(field, value)| {
        parse_duration(value?)
            .err()
            .map(|e| format!("{field}: {e}"))
    })
    .collect()
}

fn validate_scale_down(scale_down: &ScaleDownConfig) -> Vec<String> {
    let durations = [
        ("DelayAfterAdd", &scale_down.delay_after_add),
        ("DelayAfterDelete", &scale_down.delay_after_delete),
        ("DelayAfterFailure", &scale_down.delay_after_failure),
        ("UnneededTime", &scale_down.unneeded_time),
    ];

    let mut errors = durations
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value.as_deref()?;
            parse_duration(value)
                .err()
                .map(|e| format!("ScaleDown.{field}: {e}"))
        })
        .collect_vec();

    if let Some(threshold) = &scale_down.utilization_threshold {
        errors.extend(validate_utilization_threshold(threshold));
    }

    errors
}

/// The threshold must parse as a float strictly between 0 and 1.
pub fn validate_utilization_threshold(value: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let parsed = value.parse::<f64>();
    if parsed.is_err() {
        errors.push(
            "ScaleDown.UtilizationThreshold must be a string representing float value."
                .to_string(),
        );
    }
    let threshold = parsed.unwrap_or(0.0);
    if threshold.is_nan() || threshold <= 0.0 || threshold >= 1.0 {
        errors
            .push("ScaleDown.UtilizationThreshold must be a value between 0 and 1.".to_string());
    }
    errors
}

fn gpu_type_warnings(gpus: &[GpuLimit]) -> Vec<String> {
    gpus.iter()
        .filter_map(|gpu| {
            let errs = validate_label_value(&gpu.gpu_type);
            (!errs.is_empty()).then(|| {
                format!(
                    "Poorly formed value for ResourceLimits.GPUS.Type {}, errors: {}.\
                     This is not an error but could cause resource leaks.\
                     For more information on the proper use of these values, please see https://access.redhat.com/solutions/6055181",
                    gpu.gpu_type,
                    errs.join(",")
                )
            })
        })
        .collect()
}

/// Warning for an accelerator label value, `None` when the value is usable.
pub fn gpu_accelerator_label_warning(value: &str) -> Option<String> {
    let warning = if value.is_empty() {
        "GPU accelerator label is empty. ".to_string()
    } else {
        let errs = validate_label_value(value);
        if errs.is_empty() {
            return None;
        }
        format!(
            "GPU accelerator label contains a poorly formed value: {value}, errors: {}. ",
            errs.join(",")
        )
    };
    Some(warning + GPU_LABEL_HELP)
}

/// Validates per-target scaling bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineAutoscalerValidator;

impl MachineAutoscalerValidator {
    pub const fn new() -> Self {
        Self
    }

    pub fn validate(&self, ma: &MachineAutoscaler) -> ValidationResponse {
        let mut response = ValidationResponse::default();
        let (min, max) = (ma.spec.min_replicas, ma.spec.max_replicas);

        if min < 0 || max < 0 {
            response
                .errors
                .push("min and max replicas must be greater than 0".to_string());
        }
        if max < min {
            response
                .errors
                .push("max replicas must be greater than or equal to min".to_string());
        }

        response
    }
}
