use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::schema::{FieldPath, MessageValue, Value};
use crate::storage::mem::{MemoryKeyValueStore, MemoryValueStore};
use crate::storage::{DeleteOptions, PutOptions, ValueStore};
use crate::test_utils::{SampleConfig, SampleLimits, SampleTls};
use crate::tracker::{merge_defaults_loader, DefaultingConfigTracker};

use super::Controller;

struct Fixture {
    controller: Controller<SampleConfig>,
    active: MemoryValueStore<SampleConfig>,
    _shutdown: watch::Sender<()>,
}

async fn fixture() -> Fixture {
    fixture_with_active(MemoryValueStore::new()).await
}

async fn fixture_with_active(active: MemoryValueStore<SampleConfig>) -> Fixture {
    let tracker = DefaultingConfigTracker::new(
        Arc::new(MemoryValueStore::new()),
        Arc::new(active.clone()),
        merge_defaults_loader(SampleConfig::default()),
    );
    let controller = Controller::new(&tracker).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    controller.start(shutdown_rx).await.unwrap();
    Fixture {
        controller,
        active,
        _shutdown: shutdown_tx,
    }
}

fn path(p: &str) -> FieldPath {
    FieldPath::parse(p).unwrap()
}

async fn recv(stream: &mut mpsc::Receiver<Option<Value>>) -> Option<Value> {
    tokio::time::timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("timed out waiting for a reactive update")
        .expect("reactive channel closed")
}

async fn expect_silence(stream: &mut mpsc::Receiver<Option<Value>>) {
    let outcome = tokio::time::timeout(Duration::from_millis(50), stream.recv()).await;
    assert!(outcome.is_err(), "unexpected update: {:?}", outcome);
}

#[tokio::test]
async fn test_identical_paths_return_the_same_node() {
    let fx = fixture().await;
    let a = fx.controller.reactive(path("name"));
    let b = fx.controller.reactive(path("name"));
    assert!(Arc::ptr_eq(&a, &b));

    let c = fx.controller.reactive(path("limits.rate"));
    assert!(!Arc::ptr_eq(&a, &c));
}

#[tokio::test]
async fn test_watch_before_value_is_set() {
    let fx = fixture().await;
    let name = fx.controller.reactive(path("name"));
    let rate = fx.controller.reactive(path("limits.rate"));
    let mut name_watch = name.watch();
    let mut rate_watch = rate.watch();
    let mut rate_watch_2 = rate.watch();

    fx.active
        .put(
            SampleConfig {
                name: Some("foo".to_owned()),
                limits: Some(SampleLimits {
                    rate: Some(1234),
                    ..Default::default()
                }),
                ..Default::default()
            },
            PutOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(recv(&mut name_watch).await, Some(Value::String("foo".to_owned())));
    assert_eq!(recv(&mut rate_watch).await, Some(Value::Int64(1234)));
    assert_eq!(recv(&mut rate_watch_2).await, Some(Value::Int64(1234)));
}

#[tokio::test]
async fn test_watch_after_value_is_set_receives_current() {
    let fx = fixture().await;
    fx.active
        .put(
            SampleConfig {
                name: Some("foo".to_owned()),
                ..Default::default()
            },
            PutOptions::new(),
        )
        .await
        .unwrap();

    let node = fx.controller.reactive(path("name"));
    let mut watch = node.watch();
    assert_eq!(recv(&mut watch).await, Some(Value::String("foo".to_owned())));
}

#[tokio::test]
async fn test_starts_from_existing_value() {
    // The active store already has a value before the controller starts.
    let active = MemoryValueStore::new();
    active
        .put(
            SampleConfig {
                name: Some("preexisting".to_owned()),
                ..Default::default()
            },
            PutOptions::new(),
        )
        .await
        .unwrap();

    let fx = fixture_with_active(active).await;
    let node = fx.controller.reactive(path("name"));
    let mut watch = node.watch();
    assert_eq!(
        recv(&mut watch).await,
        Some(Value::String("preexisting".to_owned()))
    );
}

#[tokio::test]
async fn test_only_changed_paths_are_notified() {
    let fx = fixture().await;
    let mut name_watch = fx.controller.reactive(path("name")).watch();
    let mut endpoint_watch = fx.controller.reactive(path("endpoint")).watch();
    let mut rate_watch = fx.controller.reactive(path("limits.rate")).watch();
    let mut limits_watch = fx.controller.reactive(path("limits")).watch();
    let mut tls_watch = fx.controller.reactive(path("tls")).watch();

    let first = SampleConfig {
        name: Some("a".to_owned()),
        endpoint: Some("https://one.example.com".to_owned()),
        limits: Some(SampleLimits {
            rate: Some(1),
            burst: Some(2),
            ..Default::default()
        }),
        tls: Some(SampleTls {
            insecure: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    };
    fx.active.put(first.clone(), PutOptions::new()).await.unwrap();

    let _ = recv(&mut name_watch).await;
    let _ = recv(&mut endpoint_watch).await;
    let _ = recv(&mut rate_watch).await;
    let _ = recv(&mut limits_watch).await;
    let _ = recv(&mut tls_watch).await;

    // Change name and limits.rate only.
    let mut second = first.clone();
    second.name = Some("b".to_owned());
    second.limits.as_mut().unwrap().rate = Some(10);
    fx.active.put(second, PutOptions::new()).await.unwrap();

    assert_eq!(recv(&mut name_watch).await, Some(Value::String("b".to_owned())));
    assert_eq!(recv(&mut rate_watch).await, Some(Value::Int64(10)));
    // The parent sub-message observed the descendant mutation.
    let limits_value = recv(&mut limits_watch).await.unwrap();
    assert_eq!(
        limits_value,
        Value::Message(
            MessageValue::new()
                .with("rate", Value::Int64(10))
                .with("burst", Value::Int64(2))
        )
    );
    // Untouched fields stay silent.
    expect_silence(&mut endpoint_watch).await;
    expect_silence(&mut tls_watch).await;
}

#[tokio::test]
async fn test_delete_drives_nodes_to_unset() {
    let fx = fixture().await;
    let name = fx.controller.reactive(path("name"));
    let rate = fx.controller.reactive(path("limits.rate"));
    let mut name_watch = name.watch();
    let mut rate_watch = rate.watch();

    fx.active
        .put(
            SampleConfig {
                name: Some("x".to_owned()),
                limits: Some(SampleLimits {
                    rate: Some(5),
                    ..Default::default()
                }),
                ..Default::default()
            },
            PutOptions::new(),
        )
        .await
        .unwrap();
    let _ = recv(&mut name_watch).await;
    let _ = recv(&mut rate_watch).await;

    fx.active.delete(DeleteOptions::new()).await.unwrap();
    assert_eq!(recv(&mut name_watch).await, None);
    assert_eq!(recv(&mut rate_watch).await, None);
    assert_eq!(name.value(), None);
    assert_eq!(rate.value(), None);
}

#[tokio::test]
async fn test_version_counter_bumps_only_on_change() {
    let fx = fixture().await;
    let node = fx.controller.reactive(path("name"));
    assert_eq!(node.version(), 0);

    let spec = SampleConfig {
        name: Some("v".to_owned()),
        endpoint: Some("https://a.example.com".to_owned()),
        ..Default::default()
    };
    fx.active.put(spec.clone(), PutOptions::new()).await.unwrap();
    let mut watch = node.watch();
    let _ = recv(&mut watch).await;
    assert_eq!(node.version(), 1);

    // A commit that does not change this field leaves the version alone.
    let mut unrelated = spec.clone();
    unrelated.endpoint = Some("https://b.example.com".to_owned());
    fx.active.put(unrelated, PutOptions::new()).await.unwrap();
    expect_silence(&mut watch).await;
    assert_eq!(node.version(), 1);

    let mut renamed = spec;
    renamed.name = Some("w".to_owned());
    fx.active.put(renamed, PutOptions::new()).await.unwrap();
    let _ = recv(&mut watch).await;
    assert_eq!(node.version(), 2);
}

#[tokio::test]
async fn test_unknown_path_does_not_halt_the_update_loop() {
    let fx = fixture().await;
    let bogus = fx.controller.reactive(path("no.such.field"));
    let mut bogus_watch = bogus.watch();
    let mut name_watch = fx.controller.reactive(path("name")).watch();

    fx.active
        .put(
            SampleConfig {
                name: Some("still-works".to_owned()),
                ..Default::default()
            },
            PutOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        recv(&mut name_watch).await,
        Some(Value::String("still-works".to_owned()))
    );
    expect_silence(&mut bogus_watch).await;
}

#[tokio::test]
async fn test_keyed_tracker_is_rejected() {
    let tracker = DefaultingConfigTracker::new_keyed(
        Arc::new(MemoryValueStore::<SampleConfig>::new()),
        Arc::new(MemoryKeyValueStore::new()),
        merge_defaults_loader(SampleConfig::default()),
    );
    assert!(Controller::new(&tracker).is_err());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let fx = fixture().await;
    let (_tx, rx) = watch::channel(());
    assert!(fx.controller.start(rx).await.is_err());
}

#[tokio::test]
async fn test_shutdown_closes_watcher_channels() {
    let active = MemoryValueStore::new();
    let tracker = DefaultingConfigTracker::new(
        Arc::new(MemoryValueStore::<SampleConfig>::new()),
        Arc::new(active.clone()),
        merge_defaults_loader(SampleConfig::default()),
    );
    let controller = Controller::new(&tracker).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    controller.start(shutdown_rx).await.unwrap();

    let mut stream = controller.reactive(path("name")).watch();
    drop(shutdown_tx);

    let closed = tokio::time::timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("timed out waiting for channel close");
    assert!(closed.is_none());
}
