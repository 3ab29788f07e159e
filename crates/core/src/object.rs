//! Dynamic objects and the typed resource trait.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::gvk::{GroupVersionKind, ObjectKey};
use crate::meta::{HasMetadata, ObjectMeta, OwnerReference};

/// An object of any kind: type information, metadata and an opaque body.
///
/// This is the unit the store persists. Typed resources convert to and
/// from it through [`Resource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Everything else, usually `spec` and `status`.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Object {
    /// An empty object of the given type.
    pub fn new(gvk: &GroupVersionKind, metadata: ObjectMeta) -> Self {
        Self {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
            metadata,
            data: Map::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidApiVersion` when `apiVersion` cannot be parsed.
    pub fn gvk(&self) -> Result<GroupVersionKind> {
        GroupVersionKind::from_api_version(&self.api_version, self.kind.clone())
    }

    /// # Errors
    ///
    /// Returns `InvalidApiVersion` when `apiVersion` cannot be parsed.
    pub fn key(&self) -> Result<ObjectKey> {
        let gvk = self.gvk()?;
        Ok(ObjectKey::for_gvk(
            &gvk,
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
        ))
    }

    /// Look up a nested field by path, e.g. `["spec", "template"]`.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.data.get(*first)?, |value, segment| value.get(*segment))
    }

    /// A nested map of strings, e.g. template labels. Non-string values
    /// make the whole map unreadable.
    pub fn nested_string_map(
        &self,
        path: &[&str],
    ) -> Option<std::collections::BTreeMap<String, String>> {
        self.field(path)?
            .as_object()?
            .iter()
            .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }

    /// Replace the value at `path`, creating intermediate maps as needed.
    /// Returns whether the stored value changed.
    pub fn set_field(&mut self, path: &[&str], value: Value) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let mut current = &mut self.data;
        for segment in parents {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry {
                Value::Object(map) => current = map,
                _ => return false,
            }
        }
        if current.get(*last) == Some(&value) {
            return false;
        }
        current.insert((*last).to_string(), value);
        true
    }
}

impl HasMetadata for Object {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// A statically typed resource kind.
///
/// Implementors are plain serde structs with a `metadata` field; the
/// `apiVersion` and `kind` fields are supplied by the trait constants.
pub trait Resource: HasMetadata + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const GROUP: &'static str;
    const VERSION: &'static str;
    const KIND: &'static str;
    const NAMESPACED: bool = true;

    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new(Self::GROUP, Self::VERSION, Self::KIND)
    }

    fn api_version() -> String {
        Self::gvk().api_version()
    }

    /// Key for an object of this kind. Cluster-scoped kinds drop the namespace.
    fn key_for(namespace: &str, name: &str) -> ObjectKey {
        let namespace = if Self::NAMESPACED { namespace } else { "" };
        ObjectKey::new(Self::GROUP, Self::KIND, namespace, name)
    }

    fn key(&self) -> ObjectKey {
        Self::key_for(self.namespace(), self.name())
    }

    /// Controller reference pointing at this object.
    fn controller_owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: Self::api_version(),
            kind: Self::KIND.to_string(),
            name: self.name().to_string(),
            uid: self.metadata().uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }

    /// # Errors
    ///
    /// Returns `ConversionFailed` if the value does not serialize to a map.
    fn to_object(&self) -> Result<Object> {
        let mut value =
            serde_json::to_value(self).map_err(|e| Error::conversion_failed(Self::KIND, e))?;
        let Value::Object(map) = &mut value else {
            return Err(Error::conversion_failed(Self::KIND, "not a JSON object"));
        };
        map.insert("apiVersion".to_string(), Value::String(Self::api_version()));
        map.insert("kind".to_string(), Value::String(Self::KIND.to_string()));
        serde_json::from_value(value).map_err(|e| Error::conversion_failed(Self::KIND, e))
    }

    /// # Errors
    ///
    /// Returns `KindMismatch` for an object of another kind and
    /// `ConversionFailed` when the body does not match the typed shape.
    fn from_object(object: Object) -> Result<Self> {
        if object.kind != Self::KIND {
            return Err(Error::kind_mismatch(Self::KIND, object.kind));
        }
        let value =
            serde_json::to_value(object).map_err(|e| Error::conversion_failed(Self::KIND, e))?;
        serde_json::from_value(value).map_err(|e| Error::conversion_failed(Self::KIND, e))
    }
}
