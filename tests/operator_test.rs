//! Operator end-to-end tests - BDD style
//!
//! Following BDD naming convention: given_<context>_when_<action>_then_<outcome>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use autoscaler_api::apps::Deployment;
use autoscaler_api::autoscaling::{ClusterAutoscalerSpec, MachineAutoscalerSpec, ScalableTargetRef};
use autoscaler_api::{ClusterAutoscaler, MachineAutoscaler};
use autoscaler_core::{GroupVersionKind, HasMetadata, NamespacedName, Object, ObjectKey, ObjectMeta};
use autoscaler_operator::{Operator, OperatorConfig, WorkKey};
use autoscaler_reconciler::OWNER_ANNOTATION;
use autoscaler_reconciler::target::{MAX_SIZE_ANNOTATION, MIN_SIZE_ANNOTATION};
use autoscaler_store::{Client, InMemoryObjectStore, ObjectStore, WatchEvent, WatchEventKind};

const NAMESPACE: &str = "openshift-machine-api";

fn machine_set() -> GroupVersionKind {
    GroupVersionKind::new("machine.openshift.io", "v1beta1", "MachineSet")
}

async fn seeded_store() -> Arc<InMemoryObjectStore> {
    let store = InMemoryObjectStore::with_kinds(
        autoscaler_api::builtin_kinds()
            .into_iter()
            .chain([machine_set()]),
    )
    .await;

    let client = Client::new(store.clone());
    client
        .create(&ClusterAutoscaler {
            metadata: ObjectMeta::named("", "default"),
            spec: ClusterAutoscalerSpec::default(),
        })
        .await
        .unwrap();
    client
        .create(&MachineAutoscaler {
            metadata: ObjectMeta::named(NAMESPACE, "workers"),
            spec: MachineAutoscalerSpec {
                min_replicas: 1,
                max_replicas: 4,
                scale_target_ref: ScalableTargetRef::new(
                    "machine.openshift.io/v1beta1",
                    "MachineSet",
                    "workers-a",
                ),
            },
            ..MachineAutoscaler::default()
        })
        .await
        .unwrap();
    store
        .create(Object::new(&machine_set(), ObjectMeta::named(NAMESPACE, "workers-a")))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn given_seeded_store_when_draining_existing_work_then_everything_converges() {
    // GIVEN: An operator over a store holding both autoscalers and a target
    let store = seeded_store().await;
    let operator = Operator::new(OperatorConfig::default(), store.clone())
        .await
        .unwrap();
    let mut dispatcher = operator.dispatcher();

    // WHEN: Queueing what exists and draining
    dispatcher.enqueue_existing(operator.client()).await.unwrap();
    let passes = dispatcher.drain().await;

    // THEN: Both autoscalers were reconciled
    assert_eq!(passes, 2);
    let deployment = operator
        .client()
        .get_opt::<Deployment>(NAMESPACE, "cluster-autoscaler-default")
        .await
        .unwrap();
    assert!(deployment.is_some());

    // AND: The target carries the limits and the owner annotation
    let target = store
        .get(&ObjectKey::for_gvk(&machine_set(), NAMESPACE, "workers-a"))
        .await
        .unwrap();
    assert_eq!(target.annotation(MIN_SIZE_ANNOTATION), Some("1"));
    assert_eq!(target.annotation(MAX_SIZE_ANNOTATION), Some("4"));
    assert_eq!(
        target.annotation(OWNER_ANNOTATION),
        Some(format!("{NAMESPACE}/workers").as_str())
    );

    // AND: A second round writes nothing
    let before = store.stats();
    dispatcher.enqueue_existing(operator.client()).await.unwrap();
    dispatcher.drain().await;
    assert_eq!(store.stats(), before);
}

#[tokio::test]
async fn given_target_edit_when_observed_then_owning_autoscaler_is_queued() {
    // GIVEN: A converged operator
    let store = seeded_store().await;
    let operator = Operator::new(OperatorConfig::default(), store.clone())
        .await
        .unwrap();
    let mut dispatcher = operator.dispatcher();
    dispatcher.enqueue_existing(operator.client()).await.unwrap();
    dispatcher.drain().await;

    // WHEN: Someone strips the limits from the target
    let mut target = store
        .get(&ObjectKey::for_gvk(&machine_set(), NAMESPACE, "workers-a"))
        .await
        .unwrap();
    target.metadata.annotations.remove(MIN_SIZE_ANNOTATION);
    let updated = store.update(target).await.unwrap();
    dispatcher.observe(&WatchEvent {
        kind: WatchEventKind::Modified,
        object: updated,
    });

    // THEN: The owning MachineAutoscaler is queued and restores the limits
    assert_eq!(dispatcher.pending(), 1);
    dispatcher.drain().await;
    let target = store
        .get(&ObjectKey::for_gvk(&machine_set(), NAMESPACE, "workers-a"))
        .await
        .unwrap();
    assert_eq!(target.annotation(MIN_SIZE_ANNOTATION), Some("1"));
}

#[tokio::test]
async fn given_unwatched_namespace_when_listing_existing_then_machine_autoscaler_is_skipped() {
    let store = seeded_store().await;
    let config = OperatorConfig {
        watch_namespace: "elsewhere".to_string(),
        ..OperatorConfig::default()
    };
    let operator = Operator::new(config, store.clone()).await.unwrap();
    let mut dispatcher = operator.dispatcher();

    dispatcher.enqueue_existing(operator.client()).await.unwrap();

    assert_eq!(dispatcher.pending(), 1);
    dispatcher.drain().await;
    let ma_key = WorkKey::MachineAutoscaler(NamespacedName::new(NAMESPACE, "workers"));
    assert_eq!(ma_key.to_string(), format!("MachineAutoscaler {NAMESPACE}/workers"));
    let target = store
        .get(&ObjectKey::for_gvk(&machine_set(), NAMESPACE, "workers-a"))
        .await
        .unwrap();
    assert!(target.annotation(OWNER_ANNOTATION).is_none());
}
