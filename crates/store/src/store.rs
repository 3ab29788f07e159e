//! Object store trait and implementations.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use autoscaler_core::{GroupVersionKind, HasMetadata, LabelSelector, Object, ObjectKey};
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Capacity of the watch broadcast channel.
const WATCH_CAPACITY: usize = 1024;

/// Trait for object storage backends.
///
/// Mirrors the semantics of a Kubernetes-style API server: optimistic
/// concurrency through resource versions, finalizer-gated deletion and
/// per-kind resolvability.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, failing with `NotFound` when absent.
    async fn get(&self, key: &ObjectKey) -> Result<Object>;

    /// Create an object, failing with `AlreadyExists` when present.
    async fn create(&self, object: Object) -> Result<Object>;

    /// Replace an object. A non-empty resource version must match the
    /// stored one or the call fails with `Conflict`.
    async fn update(&self, object: Object) -> Result<Object>;

    /// Delete an object. Objects carrying finalizers are only marked with
    /// a deletion timestamp.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;

    /// List objects of a kind, optionally within one namespace.
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>>;

    /// Whether the backend serves the given type.
    async fn can_resolve(&self, gvk: &GroupVersionKind) -> Result<bool>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn get(&self, key: &ObjectKey) -> Result<Object> {
        (**self).get(key).await
    }

    async fn create(&self, object: Object) -> Result<Object> {
        (**self).create(object).await
    }

    async fn update(&self, object: Object) -> Result<Object> {
        (**self).update(object).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        (**self).delete(key).await
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>> {
        (**self).list(gvk, namespace, selector).await
    }

    async fn can_resolve(&self, gvk: &GroupVersionKind) -> Result<bool> {
        (**self).can_resolve(gvk).await
    }
}

/// Kind of change observed on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
}

/// Change notification published by [`InMemoryObjectStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub object: Object,
}

/// Counters of write calls, for asserting idempotence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl StoreStats {
    pub const fn writes(&self) -> u64 {
        self.creates
            .saturating_add(self.updates)
            .saturating_add(self.deletes)
    }
}

/// In-memory object store.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<ObjectKey, Object>>,
    kinds: RwLock<HashSet<GroupVersionKind>>,
    next_version: AtomicU64,
    creates: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    /// Create an empty store that resolves no kinds.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            objects: RwLock::new(BTreeMap::new()),
            kinds: RwLock::new(HashSet::new()),
            next_version: AtomicU64::new(1),
            creates: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            events,
        }
    }

    /// Create a new store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a store that resolves the given kinds.
    pub async fn with_kinds(kinds: impl IntoIterator<Item = GroupVersionKind>) -> Arc<Self> {
        let store = Self::new_arc();
        store.register_kinds(kinds).await;
        store
    }

    /// Make kinds resolvable.
    pub async fn register_kinds(&self, kinds: impl IntoIterator<Item = GroupVersionKind>) {
        self.kinds.write().await.extend(kinds);
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the write counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Every stored object, ordered by key.
    pub async fn snapshot(&self) -> Vec<Object> {
        self.objects.read().await.values().cloned().collect()
    }

    fn next_resource_version(&self) -> String {
        self.next_version.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn publish(&self, kind: WatchEventKind, object: Object) {
        // No receivers is fine.
        let _ = self.events.send(WatchEvent { kind, object });
    }

    fn key_of(object: &Object) -> Result<ObjectKey> {
        if object.metadata.name.is_empty() {
            return Err(Error::invalid(format!("{} has no name", object.kind)));
        }
        Ok(object.key()?)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &ObjectKey) -> Result<Object> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key.clone()))
    }

    async fn create(&self, mut object: Object) -> Result<Object> {
        let key = Self::key_of(&object)?;
        self.creates.fetch_add(1, Ordering::Relaxed);

        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(Error::already_exists(key));
        }

        let meta = object.metadata_mut();
        if meta.uid.is_empty() {
            meta.uid = Uuid::new_v4().to_string();
        }
        meta.resource_version = self.next_resource_version();
        meta.generation = 1;
        meta.creation_timestamp = Some(Utc::now());
        meta.deletion_timestamp = None;

        objects.insert(key, object.clone());
        drop(objects);

        self.publish(WatchEventKind::Added, object.clone());
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object> {
        let key = Self::key_of(&object)?;
        self.updates.fetch_add(1, Ordering::Relaxed);

        let mut objects = self.objects.write().await;
        let existing = objects
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(key.clone()))?;

        let given = object.metadata.resource_version.clone();
        if !given.is_empty() && given != existing.metadata.resource_version {
            return Err(Error::conflict(
                key,
                given,
                existing.metadata.resource_version,
            ));
        }

        // Server-owned fields are never taken from the caller.
        let meta = object.metadata_mut();
        meta.uid.clone_from(&existing.metadata.uid);
        meta.creation_timestamp = existing.metadata.creation_timestamp;
        meta.deletion_timestamp = existing.metadata.deletion_timestamp;
        meta.resource_version
            .clone_from(&existing.metadata.resource_version);
        meta.generation = existing.metadata.generation;

        if object == existing {
            return Ok(existing);
        }

        if object.data.get("spec") != existing.data.get("spec") {
            object.metadata.generation = existing.metadata.generation.saturating_add(1);
        }
        object.metadata.resource_version = self.next_resource_version();

        if object.is_deleting() && object.metadata.finalizers.is_empty() {
            objects.remove(&key);
            drop(objects);
            self.publish(WatchEventKind::Deleted, object.clone());
            return Ok(object);
        }

        objects.insert(key, object.clone());
        drop(objects);

        self.publish(WatchEventKind::Modified, object.clone());
        Ok(object)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);

        let mut objects = self.objects.write().await;
        let Some(existing) = objects.get_mut(key) else {
            return Err(Error::not_found(key.clone()));
        };

        if existing.metadata.finalizers.is_empty() {
            let removed = objects.remove(key);
            drop(objects);
            if let Some(object) = removed {
                self.publish(WatchEventKind::Deleted, object);
            }
            return Ok(());
        }

        if existing.metadata.deletion_timestamp.is_some() {
            return Ok(());
        }
        existing.metadata.deletion_timestamp = Some(Utc::now());
        existing.metadata.resource_version = self.next_resource_version();
        let marked = existing.clone();
        drop(objects);

        self.publish(WatchEventKind::Modified, marked);
        Ok(())
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.is_kind(gvk))
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace == ns))
            .filter(|(_, object)| selector.matches(&object.metadata.labels))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn can_resolve(&self, gvk: &GroupVersionKind) -> Result<bool> {
        Ok(self.kinds.read().await.contains(gvk))
    }
}

/// A wrapper that adds tracing to an object store.
pub struct TracingObjectStore<S: ObjectStore> {
    inner: S,
}

impl<S: ObjectStore> TracingObjectStore<S> {
    /// Create a new tracing object store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for TracingObjectStore<S> {
    async fn get(&self, key: &ObjectKey) -> Result<Object> {
        tracing::trace!(key = %key, "Getting object");
        self.inner.get(key).await
    }

    async fn create(&self, object: Object) -> Result<Object> {
        tracing::debug!(
            kind = %object.kind,
            namespace = %object.metadata.namespace,
            name = %object.metadata.name,
            "Creating object"
        );
        let result = self.inner.create(object).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Create failed");
        }
        result
    }

    async fn update(&self, object: Object) -> Result<Object> {
        tracing::debug!(
            kind = %object.kind,
            namespace = %object.metadata.namespace,
            name = %object.metadata.name,
            resource_version = %object.metadata.resource_version,
            "Updating object"
        );
        let result = self.inner.update(object).await;
        match result {
            Ok(ref updated) => {
                tracing::trace!(resource_version = %updated.metadata.resource_version, "Object updated");
            }
            Err(ref e) => tracing::debug!(error = %e, "Update failed"),
        }
        result
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        tracing::debug!(key = %key, "Deleting object");
        self.inner.delete(key).await
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>> {
        tracing::trace!(gvk = %gvk, namespace = ?namespace, "Listing objects");
        self.inner.list(gvk, namespace, selector).await
    }

    async fn can_resolve(&self, gvk: &GroupVersionKind) -> Result<bool> {
        let resolved = self.inner.can_resolve(gvk).await;
        tracing::debug!(gvk = %gvk, resolved = ?resolved.as_ref().ok(), "Resolving kind");
        resolved
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use autoscaler_core::ObjectMeta;
    use serde_json::json;

    fn deployment_gvk() -> GroupVersionKind {
        GroupVersionKind::new("apps", "v1", "Deployment")
    }

    fn deployment(name: &str) -> Object {
        let mut object = Object::new(&deployment_gvk(), ObjectMeta::named("ns", name));
        object.set_field(&["spec"], json!({ "replicas": 1 }));
        object
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("apps", "Deployment", "ns", name)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryObjectStore::new();
        let created = store.create(deployment("a")).await.unwrap();
        assert!(!created.metadata.uid.is_empty());
        assert_eq!(created.metadata.generation, 1);

        let fetched = store.get(&key("a")).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_twice_is_already_exists() {
        let store = InMemoryObjectStore::new();
        store.create(deployment("a")).await.unwrap();
        let err = store.create(deployment("a")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        assert!(store.get(&key("missing")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemoryObjectStore::new();
        let created = store.create(deployment("a")).await.unwrap();

        let mut first = created.clone();
        first.set_field(&["spec", "replicas"], json!(2));
        store.update(first).await.unwrap();

        let mut stale = created;
        stale.set_field(&["spec", "replicas"], json!(3));
        assert!(store.update(stale).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_spec_change_bumps_generation() {
        let store = InMemoryObjectStore::new();
        let mut object = store.create(deployment("a")).await.unwrap();

        object.set_annotation("note", "x");
        let object = store.update(object).await.unwrap();
        assert_eq!(object.metadata.generation, 1);

        let mut object = object;
        object.set_field(&["spec", "replicas"], json!(5));
        let object = store.update(object).await.unwrap();
        assert_eq!(object.metadata.generation, 2);
    }

    #[tokio::test]
    async fn test_noop_update_keeps_resource_version() {
        let store = InMemoryObjectStore::new();
        let created = store.create(deployment("a")).await.unwrap();
        let updated = store.update(created.clone()).await.unwrap();
        assert_eq!(
            updated.metadata.resource_version,
            created.metadata.resource_version
        );
    }

    #[tokio::test]
    async fn test_delete_with_finalizer_marks_then_update_removes() {
        let store = InMemoryObjectStore::new();
        let mut object = deployment("a");
        object.add_finalizer("example.io/finalizer");
        store.create(object).await.unwrap();

        store.delete(&key("a")).await.unwrap();
        let marked = store.get(&key("a")).await.unwrap();
        assert!(marked.is_deleting());

        let mut finalized = marked;
        finalized.remove_finalizer("example.io/finalizer");
        store.update(finalized).await.unwrap();
        assert!(store.get(&key("a")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        assert!(store.delete(&key("a")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_selector() {
        let store = InMemoryObjectStore::new();
        let mut labelled = deployment("a");
        labelled
            .metadata
            .labels
            .insert("app".to_string(), "x".to_string());
        store.create(labelled).await.unwrap();
        store.create(deployment("b")).await.unwrap();

        let all = store
            .list(&deployment_gvk(), Some("ns"), &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let selected = store
            .list(
                &deployment_gvk(),
                None,
                &LabelSelector::from_labels([("app", "x")]),
            )
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);

        let other_ns = store
            .list(&deployment_gvk(), Some("other"), &LabelSelector::everything())
            .await
            .unwrap();
        assert!(other_ns.is_empty());
    }

    #[tokio::test]
    async fn test_can_resolve_registered_kinds_only() {
        let store = InMemoryObjectStore::with_kinds([deployment_gvk()]).await;
        assert!(store.can_resolve(&deployment_gvk()).await.unwrap());
        assert!(
            !store
                .can_resolve(&GroupVersionKind::new("apps", "v1", "StatefulSet"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_watch_receives_changes() {
        let store = InMemoryObjectStore::new();
        let mut rx = store.subscribe();
        store.create(deployment("a")).await.unwrap();
        store.delete(&key("a")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, WatchEventKind::Added);
        assert_eq!(rx.recv().await.unwrap().kind, WatchEventKind::Deleted);
    }

    #[tokio::test]
    async fn test_stats_count_write_calls() {
        let store = InMemoryObjectStore::new();
        let created = store.create(deployment("a")).await.unwrap();
        store.update(created).await.unwrap();
        store.delete(&key("a")).await.unwrap();
        let stats = store.stats();
        assert_eq!(stats.writes(), 3);
    }

    #[tokio::test]
    async fn test_tracing_store_delegates() {
        let store = TracingObjectStore::new(InMemoryObjectStore::new());
        store.create(deployment("a")).await.unwrap();
        assert!(store.get(&key("a")).await.is_ok());
        assert_eq!(store.inner().stats().creates, 1);
    }
}
