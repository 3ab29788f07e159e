//! Live set of target kinds a `MachineAutoscaler` may reference.

use autoscaler_api::autoscaling::ScalableTargetRef;
use autoscaler_core::GroupVersionKind;
use autoscaler_store::ObjectStore;
use futures::future::join_all;
use tracing::{info, warn};

use super::TargetError;
use crate::error::{Error, Result};

/// Supported target kinds, pruned once at startup to those the store can
/// resolve and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegistry {
    supported: Vec<GroupVersionKind>,
}

impl TargetRegistry {
    /// Candidates checked when configuration names none.
    pub fn default_kinds() -> Vec<GroupVersionKind> {
        vec![
            GroupVersionKind::new("cluster.k8s.io", "v1beta1", "MachineDeployment"),
            GroupVersionKind::new("cluster.k8s.io", "v1beta1", "MachineSet"),
            GroupVersionKind::new("machine.openshift.io", "v1beta1", "MachineDeployment"),
            GroupVersionKind::new("machine.openshift.io", "v1beta1", "MachineSet"),
        ]
    }

    /// Registry over exactly these kinds, without consulting a store.
    pub const fn from_kinds(supported: Vec<GroupVersionKind>) -> Self {
        Self { supported }
    }

    /// Keep the candidates the store can resolve.
    ///
    /// # Errors
    ///
    /// Returns `NoSupportedTargets` when none remain.
    pub async fn discover(
        candidates: Vec<GroupVersionKind>,
        store: &dyn ObjectStore,
    ) -> Result<Self> {
        let resolved = join_all(candidates.iter().map(|gvk| store.can_resolve(gvk))).await;
        let mut supported = Vec::with_capacity(candidates.len());

        for (gvk, resolved) in candidates.into_iter().zip(resolved) {
            match resolved {
                Ok(true) => supported.push(gvk),
                Ok(false) => {
                    info!(gvk = %gvk, "Removing support for unregistered target type");
                }
                Err(e) => {
                    warn!(gvk = %gvk, error = %e, "Removing support for target type that failed to resolve");
                }
            }
        }

        if supported.is_empty() {
            return Err(Error::NoSupportedTargets);
        }

        info!(kinds = supported.len(), "Target registry ready");
        Ok(Self { supported })
    }

    pub fn supported(&self) -> &[GroupVersionKind] {
        &self.supported
    }

    pub fn is_supported(&self, gvk: &GroupVersionKind) -> bool {
        self.supported.contains(gvk)
    }

    /// Resolve a reference to a supported kind.
    ///
    /// # Errors
    ///
    /// `InvalidTarget` for a missing reference or empty name,
    /// `UnsupportedTarget` for a kind outside the live set.
    pub fn validate_reference(
        &self,
        reference: Option<&ScalableTargetRef>,
    ) -> std::result::Result<GroupVersionKind, TargetError> {
        let reference = reference
            .filter(|r| !r.name.is_empty())
            .ok_or(TargetError::InvalidTarget)?;

        GroupVersionKind::from_api_version(&reference.api_version, reference.kind.clone())
            .ok()
            .filter(|gvk| self.is_supported(gvk))
            .ok_or(TargetError::UnsupportedTarget)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use autoscaler_store::InMemoryObjectStore;

    fn machine_set_ref(name: &str) -> ScalableTargetRef {
        ScalableTargetRef::new("machine.openshift.io/v1beta1", "MachineSet", name)
    }

    #[tokio::test]
    async fn test_discover_prunes_unresolvable_kinds() {
        let machine_set = GroupVersionKind::new("machine.openshift.io", "v1beta1", "MachineSet");
        let store = InMemoryObjectStore::with_kinds([machine_set.clone()]).await;

        let registry = TargetRegistry::discover(TargetRegistry::default_kinds(), store.as_ref())
            .await
            .unwrap();

        assert_eq!(registry.supported(), &[machine_set]);
    }

    #[tokio::test]
    async fn test_discover_fails_when_nothing_resolves() {
        let store = InMemoryObjectStore::new_arc();
        let err = TargetRegistry::discover(TargetRegistry::default_kinds(), store.as_ref())
            .await
            .unwrap_err();
        assert_eq!(err, Error::NoSupportedTargets);
    }

    #[test]
    fn test_validate_reference() {
        let registry = TargetRegistry::from_kinds(TargetRegistry::default_kinds());

        assert!(registry.validate_reference(Some(&machine_set_ref("ms"))).is_ok());
        assert_eq!(
            registry.validate_reference(None),
            Err(TargetError::InvalidTarget)
        );
        assert_eq!(
            registry.validate_reference(Some(&machine_set_ref(""))),
            Err(TargetError::InvalidTarget)
        );
        assert_eq!(
            registry.validate_reference(Some(&ScalableTargetRef::new("apps/v1", "Deployment", "d"))),
            Err(TargetError::UnsupportedTarget)
        );
        assert_eq!(
            registry.validate_reference(Some(&ScalableTargetRef::new("a/b/c", "MachineSet", "d"))),
            Err(TargetError::UnsupportedTarget)
        );
    }
}
