//! The graph scenario against a persistent RocksDB backend

use std::collections::HashMap;
use tempfile::TempDir;
use widegraph::attrs;
use widegraph::backend::{Backend, ColumnFamilyKind, RocksBackend};
use widegraph::config::GraphConfig;
use widegraph::graph::{GraphStore, Value};
use widegraph::AnyBackend;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn test_knows_scenario_on_rocksdb() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let store = GraphStore::new(RocksBackend::open(temp_dir.path()).unwrap());

    let mut alice = store
        .create_node("person", "alice", attrs! { "age" => 30 })
        .unwrap();
    let bob = store.create_node("person", "bob", attrs! {}).unwrap();
    store
        .create_relationship("knows", &alice, &bob, None, attrs! { "since" => 2020 })
        .unwrap();

    let outgoing = store.get_outgoing_by_type(&alice, "knows", 100).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].target.key(), "bob");
    assert_eq!(outgoing[0].get("since"), Some(&Value::Int(2020)));
    assert_eq!(store.has_relationship(&bob, "alice", "knows").unwrap().len(), 1);

    alice.set("age", 31);
    store.save_node(&alice).unwrap();
    let incoming = store.get_incoming_by_type(&bob, "knows", 100).unwrap();
    assert_eq!(incoming[0].source.get("age"), Some(&Value::Int(31)));

    store.delete_node(&alice).unwrap();
    assert!(store.get_incoming_by_type(&bob, "knows", 100).unwrap().is_empty());
    assert!(store.has_relationship(&bob, "alice", "knows").unwrap().is_empty());
}

#[test]
fn test_graph_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = GraphStore::new(RocksBackend::open(temp_dir.path()).unwrap());
        let alice = store.create_node("person", "alice", attrs! {}).unwrap();
        let bob = store.create_node("person", "bob", attrs! {}).unwrap();
        store
            .create_relationship("knows", &alice, &bob, Some("k"), attrs! {})
            .unwrap();
        store.backend().flush().unwrap();
    }

    let store = GraphStore::new(RocksBackend::open(temp_dir.path()).unwrap());
    assert_eq!(
        store.backend().column_family("outbound").unwrap(),
        ColumnFamilyKind::Super
    );
    assert_eq!(
        store.backend().column_family("person").unwrap(),
        ColumnFamilyKind::Standard
    );

    let alice = store.get_node("person", "alice").unwrap();
    let knows = store.get_outgoing_by_type(&alice, "knows", 100).unwrap();
    assert_eq!(knows.len(), 1);
    assert_eq!(knows[0].key, "k");

    let people: Vec<String> = store
        .instances_of("person", 100)
        .unwrap()
        .iter()
        .map(|n| n.key().to_string())
        .collect();
    assert_eq!(people, vec!["alice", "bob"]);
}

#[test]
fn test_shared_index_column_on_rocksdb() {
    let temp_dir = TempDir::new().unwrap();
    let store = GraphStore::new(RocksBackend::open(temp_dir.path()).unwrap());
    let alice = store.create_node("person", "alice", attrs! {}).unwrap();
    let bob = store.create_node("person", "bob", attrs! {}).unwrap();
    assert_eq!(store.get_node("person", "bob").unwrap(), bob);

    let forward = store
        .create_relationship("knows", &alice, &bob, Some("ab"), attrs! {})
        .unwrap();
    let backward = store
        .create_relationship("knows", &bob, &alice, Some("ba"), attrs! {})
        .unwrap();
    store.remove_relationship(&backward).unwrap();
    assert_eq!(store.has_relationship(&alice, "bob", "knows").unwrap(), vec![forward.clone()]);

    store.remove_relationship(&forward).unwrap();
    assert!(store.has_relationship(&alice, "bob", "knows").unwrap().is_empty());
    assert!(store.has_relationship(&bob, "alice", "knows").unwrap().is_empty());
}

#[test]
fn test_open_from_settings() {
    let temp_dir = TempDir::new().unwrap();
    let settings: HashMap<String, String> = [
        ("widegraph.backend", "rocksdb".to_string()),
        ("widegraph.path", temp_dir.path().join("graph").display().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let store = GraphConfig::from_settings(&settings, "widegraph.")
        .unwrap()
        .open()
        .unwrap();
    assert!(matches!(store.backend(), AnyBackend::Rocks(_)));

    let widget = store.create_node("widget", "w1", attrs! { "ok" => true }).unwrap();
    assert_eq!(store.get_node("widget", "w1").unwrap(), widget);
}
