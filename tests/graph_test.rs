//! End-to-end graph behaviour on the in-memory backend
//!
//! Covers relationship visibility from both endpoints, node deletion,
//! denormalized copies after `save_node`, and the scan and index edge cases.

use widegraph::attrs;
use widegraph::backend::MemoryBackend;
use widegraph::graph::{GraphError, GraphStore, Node, Value};

fn store() -> GraphStore<MemoryBackend> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    GraphStore::new(MemoryBackend::new())
}

fn person(store: &GraphStore<MemoryBackend>, key: &str) -> Node {
    store
        .create_node("person", key, attrs! { "name" => key })
        .unwrap()
}

#[test]
fn test_knows_scenario() {
    let store = store();
    let alice = person(&store, "alice");
    let bob = person(&store, "bob");
    store
        .create_relationship("knows", &alice, &bob, None, attrs! { "since" => 2020 })
        .unwrap();

    let outgoing = store.get_outgoing_by_type(&alice, "knows", 100).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].target.key(), "bob");
    assert_eq!(outgoing[0].get("since"), Some(&Value::Int(2020)));

    let incoming = store.get_incoming_by_type(&bob, "knows", 100).unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].source.key(), "alice");
    assert_eq!(incoming[0].key, outgoing[0].key);
    assert_eq!(incoming[0].attributes, outgoing[0].attributes);

    store.delete_node(&alice).unwrap();
    assert!(store.get_incoming_by_type(&bob, "knows", 100).unwrap().is_empty());
    assert!(matches!(
        store.get_node("person", "alice"),
        Err(GraphError::NodeNotFound { .. })
    ));
}

#[test]
fn test_relationship_visible_from_both_ends() {
    let store = store();
    let alice = person(&store, "alice");
    let bob = person(&store, "bob");
    let rel = store
        .create_relationship("knows", &alice, &bob, Some("k1"), attrs! {})
        .unwrap();

    assert!(store
        .get_outgoing_by_type(&alice, "knows", 100)
        .unwrap()
        .contains(&rel));
    assert!(store
        .get_incoming_by_type(&bob, "knows", 100)
        .unwrap()
        .contains(&rel));

    let from_alice = store.has_relationship(&alice, "bob", "knows").unwrap();
    assert_eq!(from_alice, vec![rel.clone()]);
    let from_bob = store.has_relationship(&bob, "alice", "knows").unwrap();
    assert_eq!(from_bob, vec![rel]);

    assert!(store.has_relationship(&alice, "bob", "likes").unwrap().is_empty());
}

#[test]
fn test_delete_node_clears_counterpart_and_index() {
    let store = store();
    let alice = person(&store, "alice");
    let bob = person(&store, "bob");
    let carol = person(&store, "carol");
    store.create_relationship("knows", &alice, &bob, None, attrs! {}).unwrap();
    store.create_relationship("knows", &carol, &alice, None, attrs! {}).unwrap();

    store.delete_node(&alice).unwrap();

    assert!(store.get_incoming(&bob, 100).unwrap().iter().all(|r| r.rel_type != "knows"));
    assert!(store.get_outgoing(&carol, 100).unwrap().is_empty());
    assert!(store.has_relationship(&bob, "alice", "knows").unwrap().is_empty());
    assert!(store.has_relationship(&carol, "alice", "knows").unwrap().is_empty());

    // Removed from the type index as well
    let people: Vec<String> = store
        .instances_of("person", 100)
        .unwrap()
        .iter()
        .map(|n| n.key().to_string())
        .collect();
    assert_eq!(people, vec!["bob".to_string(), "carol".to_string()]);
}

#[test]
fn test_delete_self_loop_node() {
    let store = store();
    let ouroboros = person(&store, "ouroboros");
    store
        .create_relationship("eats", &ouroboros, &ouroboros, None, attrs! {})
        .unwrap();
    assert_eq!(store.has_relationship(&ouroboros, "ouroboros", "eats").unwrap().len(), 1);

    store.delete_node(&ouroboros).unwrap();
    assert!(store.get_outgoing(&ouroboros, 100).unwrap().is_empty());
    assert!(store.get_incoming(&ouroboros, 100).unwrap().is_empty());
    assert!(store.has_relationship(&ouroboros, "ouroboros", "eats").unwrap().is_empty());
}

#[test]
fn test_save_node_refreshes_embedded_copies() {
    let store = store();
    let mut alice = person(&store, "alice");
    let bob = person(&store, "bob");
    let carol = person(&store, "carol");
    store.create_relationship("knows", &alice, &bob, None, attrs! {}).unwrap();
    store.create_relationship("follows", &carol, &alice, None, attrs! {}).unwrap();

    alice.set("city", "Lisbon");
    store.save_node(&alice).unwrap();

    let seen_by_bob = store.get_incoming_by_type(&bob, "knows", 100).unwrap();
    assert_eq!(seen_by_bob[0].source.get("city"), Some(&Value::from("Lisbon")));
    let seen_by_carol = store.get_outgoing_by_type(&carol, "follows", 100).unwrap();
    assert_eq!(seen_by_carol[0].target.get("city"), Some(&Value::from("Lisbon")));

    // The other endpoint's copy is untouched
    assert_eq!(seen_by_carol[0].source.get("name"), Some(&Value::from("carol")));

    let instances = store.instances_of("person", 100).unwrap();
    let copy = instances.iter().find(|n| n.key() == "alice").unwrap();
    assert_eq!(copy.get("city"), Some(&Value::from("Lisbon")));
}

#[test]
fn test_save_node_removes_stale_copies() {
    let store = store();
    let mut alice = store
        .create_node("person", "alice", attrs! { "name" => "alice", "nickname" => "al" })
        .unwrap();
    let bob = person(&store, "bob");
    store.create_relationship("knows", &alice, &bob, None, attrs! {}).unwrap();

    alice.remove("nickname");
    store.save_node(&alice).unwrap();

    let seen_by_bob = store.get_incoming_by_type(&bob, "knows", 100).unwrap();
    assert!(seen_by_bob[0].source.get("nickname").is_none());
    assert_eq!(seen_by_bob[0].source.get("name"), Some(&Value::from("alice")));
    assert!(store.get_node("person", "alice").unwrap().get("nickname").is_none());
}

#[test]
fn test_type_scan_does_not_leak() {
    let store = store();
    let a = person(&store, "a");
    let b = person(&store, "b");
    for rel_type in ["friend", "friend_of", "friend`", "friendly", "fr"] {
        store
            .create_relationship(rel_type, &a, &b, Some("1"), attrs! {})
            .unwrap();
    }

    for rel_type in ["friend", "friend_of", "friend`", "friendly", "fr"] {
        let found = store.get_outgoing_by_type(&a, rel_type, 100).unwrap();
        assert_eq!(found.len(), 1, "scan of {}", rel_type);
        assert_eq!(found[0].rel_type, rel_type);
    }
}

#[test]
fn test_ids_starting_with_digits_are_listed() {
    let store = store();
    let a = person(&store, "a");
    let b = person(&store, "b");
    for id in ["0", "9abc", "_x", "~"] {
        store.create_relationship("knows", &a, &b, Some(id), attrs! {}).unwrap();
    }
    assert_eq!(store.get_outgoing_by_type(&a, "knows", 100).unwrap().len(), 4);
}

#[test]
fn test_parallel_relationship_keeps_newer_marker() {
    let store = store();
    let alice = person(&store, "alice");
    let bob = person(&store, "bob");
    let older = store
        .create_relationship("knows", &alice, &bob, Some("old"), attrs! {})
        .unwrap();
    let newer = store
        .create_relationship("knows", &alice, &bob, Some("new"), attrs! {})
        .unwrap();

    store.remove_relationship(&older).unwrap();

    assert_eq!(store.has_relationship(&alice, "bob", "knows").unwrap(), vec![newer.clone()]);
    assert_eq!(store.has_relationship(&bob, "alice", "knows").unwrap(), vec![newer]);
}

#[test]
fn test_delete_node_repoints_shared_index() {
    let store = store();
    let alice = person(&store, "alice");
    let bob = person(&store, "bob");
    let robot = store.create_node("robot", "bob", attrs! {}).unwrap();
    let human = store.create_relationship("knows", &alice, &bob, Some("h"), attrs! {}).unwrap();
    store.create_relationship("knows", &alice, &robot, Some("r"), attrs! {}).unwrap();

    // Both partners share the key "bob", so they share alice's index column
    store.delete_node(&robot).unwrap();
    assert_eq!(store.has_relationship(&alice, "bob", "knows").unwrap(), vec![human]);
}

#[test]
fn test_relationship_counts_are_honoured() {
    let store = store();
    let hub = person(&store, "hub");
    for i in 0..150 {
        let spoke = store
            .create_reference_node("person", &format!("spoke{:03}", i), attrs! {})
            .unwrap();
        store.create_relationship("links", &hub, &spoke, None, attrs! {}).unwrap();
    }
    assert_eq!(store.get_outgoing(&hub, 100).unwrap().len(), 100);
    assert_eq!(store.get_outgoing_by_type(&hub, "links", 1000).unwrap().len(), 150);

    // Deletion is not capped
    store.delete_node(&hub).unwrap();
    assert!(store.get_outgoing(&hub, 1000).unwrap().is_empty());
}

#[test]
fn test_typed_attributes_survive_storage() {
    let store = store();
    let when = chrono::NaiveDate::from_ymd_opt(2011, 3, 9)
        .and_then(|d| d.and_hms_opt(14, 5, 59))
        .unwrap();
    let created = store
        .create_node(
            "event",
            "launch",
            attrs! {
                "at" => when,
                "attendees" => 1200,
                "budget" => 1.5e6,
                "public" => false,
                "big" => i128::MAX,
                "title" => "Launch ☃",
            },
        )
        .unwrap();
    let fetched = store.get_node("event", "launch").unwrap();
    assert_eq!(fetched, created);
}

#[test]
fn test_failed_batch_writes_nothing() {
    let store = store();
    let alice = person(&store, "alice");
    let result: Result<(), GraphError> = store.batch(|s| {
        s.create_node("person", "ghost", attrs! {})?;
        s.create_relationship("haunts", &alice, &alice, None, attrs! { "rel_key" => "bad" })?;
        Ok(())
    });
    assert!(matches!(result, Err(GraphError::ReservedName(_))));
    assert!(store.get_node("person", "ghost").is_err());
    assert!(store.get_outgoing_by_type(&alice, "haunts", 100).unwrap().is_empty());
}
