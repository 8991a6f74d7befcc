//! Racing mutations through the coordinator: single winners, ordered
//! cascades, lock overflow and lease takeover.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use cellstore_core::resource::CollectionKind;
use cellstore_core::{
    CoreError, Depth, DocumentKey, DocumentStore, IfMatch, InMemoryDocumentStore,
    InMemoryLockManager, InMemoryResourceStore, LockConfig, LockError, LockKind, LockManager,
    MutationCoordinator, MutationOutcome, PropfindEntry, ResourceKey, ResourceKind,
    ResourceStore,
};
use serde_json::{json, Map, Value};

type Coordinator =
    MutationCoordinator<InMemoryLockManager, InMemoryDocumentStore, InMemoryResourceStore>;

const THREADS: usize = 8;

fn coordinator() -> Coordinator {
    MutationCoordinator::new(
        Arc::new(InMemoryLockManager::new()),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryResourceStore::new()),
        &LockConfig::default(),
    )
}

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

fn key(path: &str) -> ResourceKey {
    ResourceKey::from_path(path)
}

/// `cell/box/col` holding `count` files named `f0..`.
fn collection(coordinator: &Coordinator, count: usize) {
    coordinator
        .create_resource(&key("cell"), ResourceKind::Cell)
        .unwrap();
    coordinator
        .create_resource(&key("cell/box"), ResourceKind::Box)
        .unwrap();
    coordinator
        .create_resource(&key("cell/box/col"), ResourceKind::Collection(CollectionKind::Dav))
        .unwrap();
    for i in 0..count {
        coordinator
            .put_file(&key(&format!("cell/box/col/f{}", i)), "text/plain", vec![b'x'], None)
            .unwrap();
    }
}

/// Run `op(i)` on `THREADS` threads released together; results in thread order.
fn race<T: Send>(op: impl Fn(usize) -> T + Sync) -> Vec<T> {
    let barrier = Barrier::new(THREADS);
    thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let barrier = &barrier;
                let op = &op;
                s.spawn(move || {
                    barrier.wait();
                    op(i)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect()
    })
}

fn codes(results: &[Result<MutationOutcome, CoreError>]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        let code = match result {
            Ok(MutationOutcome::Created(_)) => "created",
            Ok(MutationOutcome::Replaced(_)) => "replaced",
            Ok(MutationOutcome::Updated(_)) => "updated",
            Ok(MutationOutcome::Deleted { .. }) => "deleted",
            Err(err) => err.code(),
        };
        *counts.entry(code).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn racing_creates_have_one_winner() {
    let c = coordinator();
    let target = DocumentKey::new("Sales", "s1");
    let results = race(|i| c.create_entity(&target, body(json!({ "writer": i }))));

    let counts = codes(&results);
    assert_eq!(counts.get("created"), Some(&1));
    assert_eq!(counts.get("ALREADY_EXISTS"), Some(&(THREADS - 1)));
    assert_eq!(c.documents().get(&target).unwrap().unwrap().version, 1);
}

#[test]
fn racing_deletes_have_one_winner() {
    let c = coordinator();
    let target = DocumentKey::new("Sales", "s1");
    c.create_entity(&target, body(json!({ "n": 1 }))).unwrap();

    let results = race(|_| c.delete_entity(&target, &IfMatch::Any));
    let counts = codes(&results);
    assert_eq!(counts.get("deleted"), Some(&1));
    assert_eq!(counts.get("NOT_FOUND"), Some(&(THREADS - 1)));
}

#[test]
fn conditional_updates_against_one_etag_have_one_winner() {
    let c = coordinator();
    let target = DocumentKey::new("Sales", "s1");
    let tag = c
        .create_entity(&target, body(json!({ "n": 0 })))
        .unwrap()
        .etag()
        .unwrap();

    let results = race(|i| c.update_entity(&target, body(json!({ "n": i })), &IfMatch::Tag(tag)));
    let counts = codes(&results);
    assert_eq!(counts.get("updated"), Some(&1));
    assert_eq!(counts.get("PRECONDITION_FAILED"), Some(&(THREADS - 1)));
    assert_eq!(c.documents().get(&target).unwrap().unwrap().version, 2);
}

#[test]
fn unconditional_merges_are_serialized() {
    let c = coordinator();
    let target = DocumentKey::new("Sales", "s1");
    c.create_entity(&target, Map::new()).unwrap();

    let results = race(|i| {
        c.merge_entity(&target, body(json!({ format!("f{}", i): i })), &IfMatch::Any)
    });
    assert!(results.iter().all(Result::is_ok));

    let doc = c.documents().get(&target).unwrap().unwrap();
    assert_eq!(doc.version, 1 + THREADS as u64);
    assert_eq!(doc.body.len(), THREADS);
}

#[test]
fn opposing_link_orders_do_not_deadlock() {
    let c = coordinator();
    let a = DocumentKey::new("Sales", "a");
    let b = DocumentKey::new("Product", "b");
    c.create_entity(&a, Map::new()).unwrap();
    c.create_entity(&b, Map::new()).unwrap();

    let results = race(|i| {
        for _ in 0..50 {
            if i % 2 == 0 {
                c.link_entities(&a, &b)?;
                c.unlink_entities(&a, &b)?;
            } else {
                c.link_entities(&b, &a)?;
                c.unlink_entities(&b, &a)?;
            }
        }
        Ok::<_, CoreError>(())
    });
    assert!(results.iter().all(Result::is_ok));
}

#[test]
fn entity_set_delete_races_member_deletes() {
    let c = coordinator();
    for i in 0..20 {
        c.create_entity(&DocumentKey::new("Sales", format!("s{:02}", i)), Map::new())
            .unwrap();
    }

    let results = race(|i| {
        if i == 0 {
            c.delete_entity_set("Sales")
        } else {
            c.delete_entity(&DocumentKey::new("Sales", format!("s{:02}", i)), &IfMatch::Any)
        }
    });
    let removed: usize = results
        .iter()
        .map(|r| match r {
            Ok(MutationOutcome::Deleted { removed }) => *removed,
            Ok(other) => panic!("unexpected {:?}", other),
            Err(err) => {
                assert_eq!(err.code(), "NOT_FOUND");
                0
            }
        })
        .sum();
    assert_eq!(removed, 20);
    assert!(c.documents().keys("Sales").unwrap().is_empty());
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn racing_moves_onto_one_destination() {
    let c = coordinator();
    collection(&c, THREADS);

    let results = race(|i| {
        c.move_resource(
            &key(&format!("cell/box/col/f{}", i)),
            &key("cell/box/col/target"),
            true,
            None,
        )
    });
    let counts = codes(&results);
    assert_eq!(counts.get("created"), Some(&1));
    assert_eq!(counts.get("replaced"), Some(&(THREADS - 1)));
    assert_eq!(c.resources().children(&key("cell/box/col")).unwrap().len(), 1);
}

#[test]
fn racing_moves_without_overwrite() {
    let c = coordinator();
    collection(&c, THREADS);

    let results = race(|i| {
        c.move_resource(
            &key(&format!("cell/box/col/f{}", i)),
            &key("cell/box/col/target"),
            false,
            None,
        )
    });
    let counts = codes(&results);
    assert_eq!(counts.get("created"), Some(&1));
    assert_eq!(counts.get("PRECONDITION_FAILED"), Some(&(THREADS - 1)));
}

#[test]
fn cascade_delete_races_child_deletes() {
    let c = coordinator();
    collection(&c, THREADS - 1);

    let results = race(|i| {
        if i == 0 {
            c.delete_resource(&key("cell/box/col"), true, None)
        } else {
            c.delete_resource(&key(&format!("cell/box/col/f{}", i - 1)), false, None)
        }
    });
    let removed: usize = results
        .iter()
        .map(|r| match r {
            Ok(MutationOutcome::Deleted { removed }) => *removed,
            Ok(other) => panic!("unexpected {:?}", other),
            Err(err) => {
                assert_eq!(err.code(), "NOT_FOUND");
                0
            }
        })
        .sum();
    // the collection itself plus every file, each counted once
    assert_eq!(removed, THREADS);
    assert!(c.resources().get(&key("cell/box/col")).unwrap().is_none());
    assert!(c.resources().children(&key("cell/box")).unwrap().is_empty());
}

#[test]
fn propfind_during_deletes_never_fails() {
    let c = coordinator();
    collection(&c, 200);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                c.delete_resource(&key(&format!("cell/box/col/f{}", i)), false, None)
                    .unwrap();
            }
        });
        for _ in 0..50 {
            let entries = c.propfind(&key("cell/box/col"), Depth::One).unwrap();
            assert!(matches!(entries[0], PropfindEntry::Found(_)));
            for entry in &entries[1..] {
                match entry {
                    PropfindEntry::Found(node) => assert!(node.key.name().starts_with('f')),
                    PropfindEntry::Vanished(k) => assert!(k.name().starts_with('f')),
                }
            }
        }
    });
    assert_eq!(c.propfind(&key("cell/box/col"), Depth::One).unwrap().len(), 1);
}

#[test]
fn racing_puts_create_once() {
    let c = coordinator();
    collection(&c, 0);

    let results = race(|i| {
        c.put_file(&key("cell/box/col/doc"), "text/plain", vec![i as u8], None)
    });
    let counts = codes(&results);
    assert_eq!(counts.get("created"), Some(&1));
    assert_eq!(counts.get("replaced"), Some(&(THREADS - 1)));
    let node = c.resources().get(&key("cell/box/col/doc")).unwrap().unwrap();
    assert_eq!(node.version, THREADS as u64);
}

// ============================================================================
// Overflow and lease
// ============================================================================

#[test]
fn held_lock_overflows_with_a_short_timeout() {
    let c = coordinator().with_timeout(Duration::from_millis(50));
    let target = DocumentKey::new("Sales", "s1");
    let guard = c
        .locks()
        .acquire(&target.lock_key(), LockKind::Structural, Duration::ZERO)
        .unwrap();

    let err = thread::scope(|s| {
        s.spawn(|| c.create_entity(&target, Map::new()))
            .join()
            .unwrap()
            .unwrap_err()
    });
    assert_eq!(err.code(), "LOCK_OVERFLOW");
    assert_eq!(err.http_status(), 503);
    assert!(err.is_retryable());
    assert!(c.documents().get(&target).unwrap().is_none());

    drop(guard);
    assert!(c.create_entity(&target, Map::new()).is_ok());
}

#[test]
fn waiters_proceed_once_the_holder_releases() {
    let c = coordinator();
    let target = DocumentKey::new("Sales", "s1");
    let guard = c
        .locks()
        .acquire(&target.lock_key(), LockKind::Content, Duration::ZERO)
        .unwrap();

    thread::scope(|s| {
        let waiter = s.spawn(|| c.create_entity(&target, Map::new()));
        thread::sleep(Duration::from_millis(30));
        guard.release().unwrap();
        assert!(matches!(waiter.join().unwrap(), Ok(MutationOutcome::Created(_))));
    });
}

#[test]
fn expired_lease_is_taken_over() {
    let locks = InMemoryLockManager::with_lease(Duration::from_millis(20));
    let target = key("cell/box/col");
    let first = locks
        .acquire(&target, LockKind::Structural, Duration::ZERO)
        .unwrap();
    assert!(first.ensure_held().is_ok());

    let second = locks
        .acquire(&target, LockKind::Structural, Duration::from_secs(2))
        .unwrap();
    assert_ne!(first.token(), second.token());
    assert!(matches!(first.ensure_held(), Err(LockError::Expired { .. })));
    assert!(!first.release().unwrap());
    assert!(second.ensure_held().is_ok());
}
