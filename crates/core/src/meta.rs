//! Object metadata and the capability interface over it.
//!
//! Everything the reconcilers touch on an object they do not own goes
//! through [`HasMetadata`]: annotations, labels, owner references,
//! finalizers and the deletion timestamp.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference from a dependent object to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Standard object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl ObjectMeta {
    /// Metadata with just a namespace and name.
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn with_annotations<K, V>(mut self, annotations: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.annotations
            .extend(annotations.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Narrow capability interface over object metadata.
///
/// Mutators return whether anything changed so callers can skip writes.
pub trait HasMetadata {
    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn namespace(&self) -> &str {
        &self.metadata().namespace
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata().annotations.get(key).map(String::as_str)
    }

    fn set_annotation(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let annotations = &mut self.metadata_mut().annotations;
        if annotations.get(key) == Some(&value) {
            return false;
        }
        annotations.insert(key.to_string(), value);
        true
    }

    /// Remove every listed annotation, reporting whether any were present.
    fn remove_annotations(&mut self, keys: &[&str]) -> bool {
        let annotations = &mut self.metadata_mut().annotations;
        keys.iter()
            .fold(false, |modified, key| annotations.remove(*key).is_some() || modified)
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.metadata().labels.get(key).map(String::as_str)
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata().finalizers.iter().any(|f| f == finalizer)
    }

    fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.metadata_mut().finalizers.push(finalizer.to_string());
        true
    }

    fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let finalizers = &mut self.metadata_mut().finalizers;
        let before = finalizers.len();
        finalizers.retain(|f| f != finalizer);
        finalizers.len() != before
    }

    fn is_deleting(&self) -> bool {
        self.metadata().deletion_timestamp.is_some()
    }

    fn owner_references(&self) -> &[OwnerReference] {
        &self.metadata().owner_references
    }

    /// Add `owner` unless a reference with the same kind and name exists.
    fn add_owner_reference(&mut self, owner: OwnerReference) -> bool {
        let refs = &mut self.metadata_mut().owner_references;
        if refs
            .iter()
            .any(|r| r.kind == owner.kind && r.name == owner.name)
        {
            return false;
        }
        refs.push(owner);
        true
    }

    /// The owner reference flagged as controller, if any.
    fn controller_reference(&self) -> Option<&OwnerReference> {
        self.owner_references().iter().find(|r| r.controller)
    }
}

impl HasMetadata for ObjectMeta {
    fn metadata(&self) -> &ObjectMeta {
        self
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        self
    }
}

/// Equality-based label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}
