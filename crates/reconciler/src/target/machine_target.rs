//! Metadata state machine for a single scalable target.

use autoscaler_core::{
    HasMetadata, MIB, NamespacedName, Object, ObjectKey, ObjectMeta, format_decimal_si,
    parse_integer_quantity,
};

use super::{MAX_SIZE_ANNOTATION, MIN_SIZE_ANNOTATION, OWNER_ANNOTATION, TargetError};
use crate::validation::{GPU_LABEL_HELP, gpu_accelerator_label_warning};

/// Capacity hint set by infrastructure providers on GPU-backed targets.
pub const GPU_CAPACITY_ANNOTATION: &str = "machine.openshift.io/GPU";

/// Node label the cluster autoscaler uses to wait for GPU drivers.
pub const GPU_ACCELERATOR_LABEL: &str = "cluster-api/accelerator";

const TEMPLATE_LABELS_PATH: [&str; 5] = ["spec", "template", "spec", "metadata", "labels"];

const CPU_KEY_DEPRECATED: &str = "machine.openshift.io/vCPU";
const MEMORY_KEY_DEPRECATED: &str = "machine.openshift.io/memoryMb";
const GPU_COUNT_KEY_DEPRECATED: &str = GPU_CAPACITY_ANNOTATION;
const MAX_PODS_KEY_DEPRECATED: &str = "machine.openshift.io/maxPods";

const CPU_KEY: &str = "capacity.cluster-autoscaler.kubernetes.io/cpu";
const MEMORY_KEY: &str = "capacity.cluster-autoscaler.kubernetes.io/memory";
const GPU_COUNT_KEY: &str = "capacity.cluster-autoscaler.kubernetes.io/gpu-count";
const GPU_TYPE_KEY: &str = "capacity.cluster-autoscaler.kubernetes.io/gpu-type";
const MAX_PODS_KEY: &str = "capacity.cluster-autoscaler.kubernetes.io/maxPods";

const GPU_NVIDIA_TYPE: &str = "nvidia.com/gpu";

/// A target object seen through its metadata only.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineTarget {
    object: Object,
}

impl MachineTarget {
    pub const fn new(object: Object) -> Self {
        Self { object }
    }

    pub const fn object(&self) -> &Object {
        &self.object
    }

    pub fn into_object(self) -> Object {
        self.object
    }

    pub fn kind(&self) -> &str {
        &self.object.kind
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace(), self.name())
    }

    /// # Errors
    ///
    /// Returns an error when the object's `apiVersion` is malformed.
    pub fn key(&self) -> autoscaler_core::Result<ObjectKey> {
        self.object.key()
    }

    /// True when the limits differ from `min`/`max`, cannot be read, or a
    /// GPU-backed target lacks the accelerator label.
    pub fn needs_update(&self, min: i32, max: i32) -> bool {
        let limits_differ = self
            .limits()
            .map_or(true, |(current_min, current_max)| {
                current_min != min || current_max != max
            });
        limits_differ || (self.has_gpu_capacity() && self.gpu_accelerator_label().is_none())
    }

    pub fn set_limits(&mut self, min: i32, max: i32) -> bool {
        let min_changed = self.set_annotation(MIN_SIZE_ANNOTATION, min.to_string());
        let max_changed = self.set_annotation(MAX_SIZE_ANNOTATION, max.to_string());
        min_changed || max_changed
    }

    pub fn remove_limits(&mut self) -> bool {
        self.remove_annotations(&[MIN_SIZE_ANNOTATION, MAX_SIZE_ANNOTATION])
    }

    /// # Errors
    ///
    /// `MissingAnnotations` if either marker is absent, `BadMin`/`BadMax`
    /// if a marker is not an integer.
    pub fn limits(&self) -> Result<(i32, i32), TargetError> {
        let (Some(min), Some(max)) = (
            self.annotation(MIN_SIZE_ANNOTATION),
            self.annotation(MAX_SIZE_ANNOTATION),
        ) else {
            return Err(TargetError::MissingAnnotations);
        };
        let min = min
            .parse::<i32>()
            .map_err(|_| TargetError::BadMin(min.to_string()))?;
        let max = max
            .parse::<i32>()
            .map_err(|_| TargetError::BadMax(max.to_string()))?;
        Ok((min, max))
    }

    /// Claim the target for `owner`. Returns `true` when the marker was
    /// newly written and `false` when it already named `owner`.
    ///
    /// # Errors
    ///
    /// `AlreadyOwned` when another owner holds the target. The existing
    /// marker is left untouched.
    pub fn set_owner(&mut self, owner: &NamespacedName) -> Result<bool, TargetError> {
        let owner = owner.to_string();
        match self.annotation(OWNER_ANNOTATION) {
            Some(current) if current == owner => Ok(false),
            Some(_) => Err(TargetError::AlreadyOwned),
            None => Ok(self.set_annotation(OWNER_ANNOTATION, owner)),
        }
    }

    pub fn remove_owner(&mut self) -> bool {
        self.remove_annotations(&[OWNER_ANNOTATION])
    }

    /// # Errors
    ///
    /// `MissingOwner` without a marker, `BadOwner` when it is not `ns/name`.
    pub fn owner(&self) -> Result<NamespacedName, TargetError> {
        let value = self
            .annotation(OWNER_ANNOTATION)
            .ok_or(TargetError::MissingOwner)?;
        NamespacedName::parse(value).ok_or(TargetError::BadOwner)
    }

    /// Strip our limit and owner markers. Idempotent.
    pub fn finalize(&mut self) -> bool {
        let limits = self.remove_limits();
        let owner = self.remove_owner();
        limits || owner
    }

    /// The GPU capacity hint is present and at least one.
    pub fn has_gpu_capacity(&self) -> bool {
        self.annotation(GPU_CAPACITY_ANNOTATION)
            .and_then(|v| parse_integer_quantity(v).ok())
            .is_some_and(|count| count >= 1)
    }

    /// Accelerator label on the machine template, if set.
    pub fn gpu_accelerator_label(&self) -> Option<String> {
        self.object
            .nested_string_map(&TEMPLATE_LABELS_PATH)?
            .remove(GPU_ACCELERATOR_LABEL)
    }

    /// Warning for a missing, empty or malformed accelerator label.
    pub fn gpu_accelerator_warning(&self) -> Option<String> {
        match self.gpu_accelerator_label() {
            None => Some(format!(
                "GPU accelerator label not found on {} {}. {GPU_LABEL_HELP}",
                self.kind(),
                self.name()
            )),
            Some(value) => gpu_accelerator_label_warning(&value),
        }
    }

    /// Copy each deprecated capacity annotation to its upstream key when the
    /// upstream key is missing. Returns whether anything was added.
    ///
    /// # Errors
    ///
    /// `BadCapacity` when the deprecated memory value is not an integer.
    pub fn update_scale_from_zero_annotations(&mut self) -> Result<bool, TargetError> {
        let mut additions: Vec<(&str, String)> = Vec::new();

        if let Some(cpu) = self.present(CPU_KEY_DEPRECATED) {
            if self.present(CPU_KEY).is_none() {
                additions.push((CPU_KEY, cpu));
            }
        }

        if let Some(memory) = self.present(MEMORY_KEY_DEPRECATED) {
            if self.present(MEMORY_KEY).is_none() {
                let mebibytes = memory
                    .parse::<i64>()
                    .map_err(|e| TargetError::BadCapacity(e.to_string()))?;
                let bytes = mebibytes
                    .checked_mul(MIB)
                    .ok_or_else(|| TargetError::BadCapacity(memory.clone()))?;
                additions.push((MEMORY_KEY, format_decimal_si(bytes)));
            }
        }

        if let Some(gpu) = self.present(GPU_COUNT_KEY_DEPRECATED) {
            if self.present(GPU_COUNT_KEY).is_none() {
                additions.push((GPU_COUNT_KEY, gpu));
            }
            if self.present(GPU_TYPE_KEY).is_none() {
                additions.push((GPU_TYPE_KEY, GPU_NVIDIA_TYPE.to_string()));
            }
        }

        if let Some(max_pods) = self.present(MAX_PODS_KEY_DEPRECATED) {
            if self.present(MAX_PODS_KEY).is_none() {
                additions.push((MAX_PODS_KEY, max_pods));
            }
        }

        Ok(additions
            .into_iter()
            .fold(false, |changed, (key, value)| {
                self.set_annotation(key, value) || changed
            }))
    }

    /// Non-empty annotation value.
    fn present(&self, key: &str) -> Option<String> {
        self.annotation(key)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl HasMetadata for MachineTarget {
    fn metadata(&self) -> &ObjectMeta {
        &self.object.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.object.metadata
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use autoscaler_core::GroupVersionKind;
    use serde_json::json;

    fn machine_set() -> MachineTarget {
        let gvk = GroupVersionKind::new("machine.openshift.io", "v1beta1", "MachineSet");
        MachineTarget::new(Object::new(&gvk, ObjectMeta::named("ns", "workers")))
    }

    fn owner() -> NamespacedName {
        NamespacedName::new("ns", "ma")
    }

    #[test]
    fn test_set_owner_claims_once() {
        let mut target = machine_set();
        assert_eq!(target.set_owner(&owner()), Ok(true));
        assert_eq!(target.set_owner(&owner()), Ok(false));
        assert_eq!(target.owner(), Ok(owner()));
    }

    #[test]
    fn test_second_claimant_is_rejected_without_overwrite() {
        let mut target = machine_set();
        target.set_owner(&owner()).unwrap();
        let other = NamespacedName::new("ns", "other");
        assert_eq!(target.set_owner(&other), Err(TargetError::AlreadyOwned));
        assert_eq!(target.annotation(OWNER_ANNOTATION), Some("ns/ma"));
    }

    #[test]
    fn test_owner_errors() {
        let mut target = machine_set();
        assert_eq!(target.owner(), Err(TargetError::MissingOwner));
        target.set_annotation(OWNER_ANNOTATION, "no-separator");
        assert_eq!(target.owner(), Err(TargetError::BadOwner));
    }

    #[test]
    fn test_limits_round_trip() {
        let mut target = machine_set();
        assert_eq!(target.limits(), Err(TargetError::MissingAnnotations));
        assert!(target.needs_update(1, 3));

        assert!(target.set_limits(1, 3));
        assert!(!target.set_limits(1, 3));
        assert_eq!(target.limits(), Ok((1, 3)));
        assert!(!target.needs_update(1, 3));
        assert!(target.needs_update(1, 4));
    }

    #[test]
    fn test_unparsable_limits() {
        let mut target = machine_set();
        target.set_annotation(MIN_SIZE_ANNOTATION, "one");
        target.set_annotation(MAX_SIZE_ANNOTATION, "3");
        assert_eq!(target.limits(), Err(TargetError::BadMin("one".into())));
        assert!(target.needs_update(1, 3));

        target.set_annotation(MIN_SIZE_ANNOTATION, "1");
        target.set_annotation(MAX_SIZE_ANNOTATION, "x");
        assert_eq!(target.limits(), Err(TargetError::BadMax("x".into())));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut target = machine_set();
        target.set_owner(&owner()).unwrap();
        target.set_limits(1, 2);
        target.set_annotation("unrelated", "kept");

        assert!(target.finalize());
        assert!(!target.finalize());
        assert_eq!(target.metadata().annotations.len(), 1);
    }

    #[test]
    fn test_gpu_capacity_without_label_needs_update() {
        let mut target = machine_set();
        target.set_limits(1, 2);
        target.set_annotation(GPU_CAPACITY_ANNOTATION, "1");
        assert!(target.has_gpu_capacity());
        assert!(target.needs_update(1, 2));
        assert!(
            target
                .gpu_accelerator_warning()
                .unwrap()
                .starts_with("GPU accelerator label not found on MachineSet workers. ")
        );

        target.object.set_field(
            &TEMPLATE_LABELS_PATH,
            json!({ "cluster-api/accelerator": "nvidia-t4" }),
        );
        assert!(!target.needs_update(1, 2));
        assert!(target.gpu_accelerator_warning().is_none());
    }

    #[test]
    fn test_zero_gpu_capacity_is_ignored() {
        let mut target = machine_set();
        target.set_annotation(GPU_CAPACITY_ANNOTATION, "0");
        assert!(!target.has_gpu_capacity());
    }

    #[test]
    fn test_scale_from_zero_copies_deprecated_keys() {
        let mut target = machine_set();
        target.set_annotation(CPU_KEY_DEPRECATED, "4");
        target.set_annotation(MEMORY_KEY_DEPRECATED, "1024");
        target.set_annotation(GPU_COUNT_KEY_DEPRECATED, "1");
        target.set_annotation(MAX_PODS_KEY_DEPRECATED, "110");

        assert_eq!(target.update_scale_from_zero_annotations(), Ok(true));
        assert_eq!(target.annotation(CPU_KEY), Some("4"));
        assert_eq!(target.annotation(MEMORY_KEY), Some("1073741824"));
        assert_eq!(target.annotation(GPU_COUNT_KEY), Some("1"));
        assert_eq!(target.annotation(GPU_TYPE_KEY), Some("nvidia.com/gpu"));
        assert_eq!(target.annotation(MAX_PODS_KEY), Some("110"));

        assert_eq!(target.update_scale_from_zero_annotations(), Ok(false));
    }

    #[test]
    fn test_scale_from_zero_keeps_existing_upstream_values() {
        let mut target = machine_set();
        target.set_annotation(CPU_KEY_DEPRECATED, "4");
        target.set_annotation(CPU_KEY, "8");
        assert_eq!(target.update_scale_from_zero_annotations(), Ok(false));
        assert_eq!(target.annotation(CPU_KEY), Some("8"));
    }

    #[test]
    fn test_scale_from_zero_rejects_bad_memory() {
        let mut target = machine_set();
        target.set_annotation(MEMORY_KEY_DEPRECATED, "lots");
        assert!(matches!(
            target.update_scale_from_zero_annotations(),
            Err(TargetError::BadCapacity(_))
        ));
    }
}
