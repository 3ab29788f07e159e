//! Type and object identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies a resource type at a specific API version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group, empty for the core group.
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Parse an `apiVersion` string (`group/version` or bare `version`)
    /// together with a kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidApiVersion` when the string is empty or has more
    /// than one `/` separator or an empty segment.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Result<Self> {
        let mut parts = api_version.split('/');
        let (group, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(version), None, None) if !version.is_empty() => ("", version),
            (Some(group), Some(version), None) if !group.is_empty() && !version.is_empty() => {
                (group, version)
            }
            _ => return Err(Error::InvalidApiVersion(api_version.to_string())),
        };
        Ok(Self::new(group, version, kind))
    }

    /// The `apiVersion` string for this type.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Storage identity of an object. Versions are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub group: String,
    pub kind: String,
    /// Empty for cluster-scoped objects.
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key for an object of the given type.
    pub fn for_gvk(
        gvk: &GroupVersionKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(gvk.group.clone(), gvk.kind.clone(), namespace, name)
    }

    /// Whether this key addresses an object of the given type.
    pub fn is_kind(&self, gvk: &GroupVersionKind) -> bool {
        self.group == gvk.group && self.kind == gvk.kind
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}.{}", self.kind, self.group)?;
        }
        if self.namespace.is_empty() {
            write!(f, " {}", self.name)
        } else {
            write!(f, " {}/{}", self.namespace, self.name)
        }
    }
}

/// A `namespace/name` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse the `namespace/name` form. Exactly one separator is accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(name), None) => Some(Self::new(namespace, name)),
            _ => None,
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grouped_api_version() {
        let gvk = GroupVersionKind::from_api_version("machine.openshift.io/v1beta1", "MachineSet");
        assert_eq!(
            gvk.ok(),
            Some(GroupVersionKind::new("machine.openshift.io", "v1beta1", "MachineSet"))
        );
    }

    #[test]
    fn test_parse_core_api_version() {
        let gvk = GroupVersionKind::from_api_version("v1", "Service");
        assert_eq!(gvk.map(|g| g.group.is_empty()).ok(), Some(true));
    }

    #[test]
    fn test_reject_malformed_api_versions() {
        for bad in ["", "/v1", "apps/", "a/b/c"] {
            assert!(
                GroupVersionKind::from_api_version(bad, "Kind").is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_api_version_round_trip() {
        let gvk = GroupVersionKind::new("apps", "v1", "Deployment");
        assert_eq!(gvk.api_version(), "apps/v1");
        assert_eq!(gvk.to_string(), "apps/v1, Kind=Deployment");
    }

    #[test]
    fn test_object_key_display() {
        let key = ObjectKey::new("apps", "Deployment", "ns", "ca");
        assert_eq!(key.to_string(), "Deployment.apps ns/ca");

        let cluster = ObjectKey::new("", "Node", "", "n1");
        assert_eq!(cluster.to_string(), "Node n1");
    }

    #[test]
    fn test_namespaced_name_parse() {
        assert_eq!(
            NamespacedName::parse("ns/name"),
            Some(NamespacedName::new("ns", "name"))
        );
        assert_eq!(NamespacedName::parse("no-separator"), None);
        assert_eq!(NamespacedName::parse("a/b/c"), None);
    }
}
