//! Store access for scalable targets.

use std::sync::Arc;

use autoscaler_api::autoscaling::ScalableTargetRef;
use autoscaler_core::{HasMetadata, NamespacedName, ObjectKey};
use autoscaler_store::Client;
use tracing::{debug, info, warn};

use super::{MachineTarget, OWNER_ANNOTATION, TargetRegistry};
use crate::error::Result;
use crate::types::{SyncOperation, SyncOutcome};

/// Fetches and writes targets of the kinds the registry supports.
#[derive(Clone)]
pub struct TargetClient {
    client: Client,
    registry: Arc<TargetRegistry>,
}

impl TargetClient {
    pub const fn new(client: Client, registry: Arc<TargetRegistry>) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Fetch the target a reference points at within `namespace`.
    ///
    /// # Errors
    ///
    /// `InvalidTarget`/`UnsupportedTarget` for a bad reference, otherwise
    /// store errors unchanged (including `NotFound`).
    pub async fn get(
        &self,
        namespace: &str,
        reference: Option<&ScalableTargetRef>,
    ) -> Result<MachineTarget> {
        let gvk = self.registry.validate_reference(reference)?;
        let name = reference.map_or("", |r| r.name.as_str());
        let key = ObjectKey::for_gvk(&gvk, namespace, name);
        let object = self.client.get_object(&key).await?;
        Ok(MachineTarget::new(object))
    }

    /// Like [`TargetClient::get`] with `NotFound` mapped to `None`.
    ///
    /// # Errors
    ///
    /// Every error other than `NotFound`.
    pub async fn get_opt(
        &self,
        namespace: &str,
        reference: Option<&ScalableTargetRef>,
    ) -> Result<Option<MachineTarget>> {
        match self.get(namespace, reference).await {
            Ok(target) => Ok(Some(target)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `updated` if it differs from the fetched `original`.
    ///
    /// # Errors
    ///
    /// Store errors from the update, including `NotFound` and `Conflict`.
    pub async fn write(&self, original: &MachineTarget, updated: MachineTarget) -> Result<SyncOutcome> {
        let key = updated.key()?;
        if *original == updated {
            return Ok(SyncOutcome::new(key, SyncOperation::Unchanged));
        }
        self.client.update_object(updated.into_object()).await?;
        debug!(key = %key, "Updated target");
        Ok(SyncOutcome::new(key, SyncOperation::Updated))
    }

    /// Remove `owner`'s markers from `target`. A target deleted in the
    /// meantime counts as finalized, and so does one claimed by another
    /// autoscaler, which is left untouched.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound`.
    pub async fn finalize(
        &self,
        target: &MachineTarget,
        owner: &NamespacedName,
    ) -> Result<SyncOutcome> {
        let key = target.key()?;
        if let Some(current) = target.annotation(OWNER_ANNOTATION) {
            if current != owner.to_string() {
                info!(
                    key = %key,
                    owner = %current,
                    autoscaler = %owner,
                    "Target owned by another autoscaler, leaving markers in place"
                );
                return Ok(SyncOutcome::new(key, SyncOperation::Unchanged));
            }
        }

        let mut finalized = target.clone();
        finalized.finalize();

        match self.write(target, finalized).await {
            Err(e) if e.is_not_found() => {
                warn!(key = %key, "Target vanished before finalization");
                Ok(SyncOutcome::new(key, SyncOperation::Absent))
            }
            other => other,
        }
    }

    /// Bring limits and scale-from-zero hints on `target` up to date in
    /// memory. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// `BadCapacity` when a deprecated capacity hint is malformed.
    pub fn apply_limits(
        target: &mut MachineTarget,
        min: i32,
        max: i32,
    ) -> std::result::Result<bool, super::TargetError> {
        let limits = target.needs_update(min, max) && target.set_limits(min, max);
        let capacity = target.update_scale_from_zero_annotations()?;
        Ok(limits || capacity)
    }
}
