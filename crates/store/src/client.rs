//! Typed access to an [`ObjectStore`].

use std::sync::Arc;

use autoscaler_core::{LabelSelector, Object, ObjectKey, Resource};

use crate::error::{Error, Result};
use crate::store::ObjectStore;

/// Converts between typed resources and stored objects.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn ObjectStore>,
}

impl Client {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// # Errors
    ///
    /// Returns `NotFound` when absent, `Conversion` when the stored body
    /// does not match `T`.
    pub async fn get<T: Resource>(&self, namespace: &str, name: &str) -> Result<T> {
        let object = self.store.get(&T::key_for(namespace, name)).await?;
        Ok(T::from_object(object)?)
    }

    /// Like [`Client::get`] with `NotFound` mapped to `None`.
    ///
    /// # Errors
    ///
    /// Propagates every store error other than `NotFound`.
    pub async fn get_opt<T: Resource>(&self, namespace: &str, name: &str) -> Result<Option<T>> {
        match self.get(namespace, name).await {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// # Errors
    ///
    /// Returns `AlreadyExists` or a conversion error.
    pub async fn create<T: Resource>(&self, resource: &T) -> Result<T> {
        let created = self.store.create(resource.to_object()?).await?;
        Ok(T::from_object(created)?)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Conflict` or a conversion error.
    pub async fn update<T: Resource>(&self, resource: &T) -> Result<T> {
        let updated = self.store.update(resource.to_object()?).await?;
        Ok(T::from_object(updated)?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` when absent.
    pub async fn delete<T: Resource>(&self, namespace: &str, name: &str) -> Result<()> {
        self.store.delete(&T::key_for(namespace, name)).await
    }

    /// # Errors
    ///
    /// Propagates store and conversion errors.
    pub async fn list<T: Resource>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<T>> {
        self.store
            .list(&T::gvk(), namespace, selector)
            .await?
            .into_iter()
            .map(|object| T::from_object(object).map_err(Error::from))
            .collect()
    }

    /// # Errors
    ///
    /// Returns `NotFound` when absent.
    pub async fn get_object(&self, key: &ObjectKey) -> Result<Object> {
        self.store.get(key).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Conflict`.
    pub async fn update_object(&self, object: Object) -> Result<Object> {
        self.store.update(object).await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryObjectStore;
    use autoscaler_core::{HasMetadata, ObjectMeta};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ConfigMap {
        metadata: ObjectMeta,
        #[serde(default)]
        data: std::collections::BTreeMap<String, String>,
    }

    impl HasMetadata for ConfigMap {
        fn metadata(&self) -> &ObjectMeta {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut ObjectMeta {
            &mut self.metadata
        }
    }

    impl Resource for ConfigMap {
        const GROUP: &'static str = "";
        const VERSION: &'static str = "v1";
        const KIND: &'static str = "ConfigMap";
    }

    fn client() -> Client {
        Client::new(InMemoryObjectStore::new_arc())
    }

    #[tokio::test]
    async fn test_typed_round_trip_through_store() {
        let client = client();
        let mut cm = ConfigMap {
            metadata: ObjectMeta::named("ns", "settings"),
            data: std::collections::BTreeMap::new(),
        };
        cm.data.insert("k".to_string(), "v".to_string());

        let created = client.create(&cm).await.unwrap();
        assert_eq!(created.data, cm.data);
        assert!(!created.metadata.resource_version.is_empty());

        let fetched: ConfigMap = client.get("ns", "settings").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_opt_maps_not_found() {
        let client = client();
        let missing: Option<ConfigMap> = client.get_opt("ns", "missing").await.unwrap();
        assert!(missing.is_none());
    }
}
