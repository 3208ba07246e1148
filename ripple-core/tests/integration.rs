//! Integration Tests for the Reactive Engine
//!
//! These tests verify that observation, dependency tracking and list
//! interception work together correctly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_core::observer::{self, observe_value};
use ripple_core::reactive::{ReactiveContext, Watcher};
use ripple_core::{observe, ArrayMethods, List, Record, Value};
use serde_json::json;

fn state(doc: serde_json::Value) -> Record {
    observe(&Value::from(doc)).as_record().cloned().unwrap()
}

fn field(record: &Record, key: &str) -> Value {
    record.get(key).unwrap_or_default()
}

/// Test that wrapping is idempotent and a write notifies exactly the
/// computations that read the field.
#[test]
fn wrapping_is_idempotent_and_notification_is_exact() {
    let raw = Value::from(json!({ "a": 1, "b": 2 }));
    let first = observe_value(&raw).unwrap();
    let again = observe(&observe(&raw));
    assert!(Arc::ptr_eq(&first, &again.observer().unwrap()));

    let record = raw.as_record().cloned().unwrap();
    let ra = record.clone();
    let reads_a = Watcher::new(move || field(&ra, "a"));
    let rb = record.clone();
    let reads_b = Watcher::new(move || field(&rb, "b"));

    record.set("a", Value::from(10));
    assert_eq!(reads_a.run_count(), 2);
    assert_eq!(reads_b.run_count(), 1);
    assert_eq!(reads_a.value(), Value::from(10));
}

/// Test that elements inserted into an observed list are themselves
/// reactive.
#[test]
fn inserted_list_elements_are_reactive() {
    let root = state(json!({ "items": [] }));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let r = root.clone();
    let seen_clone = seen.clone();
    let _watcher = Watcher::new(move || {
        let items = field(&r, "items");
        let done = items
            .as_list()
            .and_then(|list| list.get(0))
            .and_then(|first| first.as_record().and_then(|rec| rec.get("done")))
            .unwrap_or_default();
        seen_clone.lock().push(done.clone());
        done
    });

    let items = root.get_untracked("items").unwrap().as_list().cloned().unwrap();
    let todo = Value::from(json!({ "done": false }));
    items.push(vec![todo.clone()]);
    todo.as_record().unwrap().set("done", Value::from(true));

    assert_eq!(
        *seen.lock(),
        vec![Value::Null, Value::from(false), Value::from(true)]
    );
}

/// Test that writing an equal value never notifies.
#[test]
fn equal_writes_do_not_notify() {
    let record = state(json!({ "n": 1, "s": "x" }));
    record.set("nan", Value::Number(f64::NAN));
    record.define_reactive("nan", Value::Number(f64::NAN));

    let r = record.clone();
    let watcher = Watcher::new(move || {
        field(&r, "n");
        field(&r, "s");
        field(&r, "nan")
    });

    record.set("n", Value::from(1));
    record.set("s", Value::from("x"));
    record.set("nan", Value::Number(f64::NAN));
    assert_eq!(watcher.run_count(), 1);

    record.set("n", Value::from(2));
    assert_eq!(watcher.run_count(), 2);
}

/// Test that reads inside a nested evaluation are attributed to the inner
/// computation only.
#[test]
fn nested_evaluation_attributes_reads_correctly() {
    let record = state(json!({ "a": 1, "b": 2, "c": 3 }));
    let ob = record.observer().unwrap();

    let rc = record.clone();
    let inner = Watcher::new(move || field(&rc, "c"));

    let r = record.clone();
    let inner_clone = inner.clone();
    let outer = Watcher::new(move || {
        let a = field(&r, "a");
        assert_eq!(ReactiveContext::depth(), 1);
        inner_clone.evaluate();
        let b = field(&r, "b");
        Value::from(vec![a, b])
    });

    let dep = |key: &str| ob.field_dep(key).unwrap();
    assert!(dep("a").has_subscriber(outer.id()));
    assert!(dep("b").has_subscriber(outer.id()));
    assert!(!dep("c").has_subscriber(outer.id()));
    assert!(dep("c").has_subscriber(inner.id()));
    assert!(!ReactiveContext::is_active());
}

/// Test that a computed value read inside another computation hands its
/// dependencies to the reader.
#[test]
fn computed_dependencies_propagate_to_reader() {
    let record = state(json!({ "count": 2 }));
    let r = record.clone();
    let doubled = Watcher::lazy(move || {
        let n = field(&r, "count").as_f64().unwrap_or(0.0);
        Value::Number(n * 2.0)
    });

    let d = doubled.clone();
    let reader = Watcher::new(move || d.value());
    assert_eq!(reader.value(), Value::Number(4.0));

    record.set("count", Value::from(5));
    assert_eq!(reader.run_count(), 2);
    assert_eq!(reader.value(), Value::Number(10.0));
    assert_eq!(doubled.run_count(), 2);
}

/// Test that a computed read after its input is refreshed before the reader
/// re-runs, even when the reader subscribed to the input first.
#[test]
fn computed_is_fresh_when_reader_subscribed_first() {
    let record = state(json!({ "count": 1 }));
    let r = record.clone();
    let doubled = Watcher::lazy(move || {
        let n = field(&r, "count").as_f64().unwrap_or(0.0);
        Value::Number(n * 2.0)
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (r, d, s) = (record.clone(), doubled.clone(), seen.clone());
    let reader = Watcher::new(move || {
        let count = field(&r, "count");
        let double = d.value();
        s.lock().push((count.clone(), double.clone()));
        Value::from(vec![count, double])
    });

    let dep = record.observer().unwrap().field_dep("count").unwrap();
    assert_eq!(dep.subscriber_ids().first(), Some(&reader.id()));

    record.set("count", Value::from(5));
    assert_eq!(
        seen.lock().last().cloned(),
        Some((Value::from(5), Value::Number(10.0)))
    );
}

/// Test that a dependency the computation stopped reading drops it.
#[test]
fn stale_subscriptions_are_removed() {
    let record = state(json!({ "flag": true, "a": 1, "b": 2 }));
    let ob = record.observer().unwrap();

    let r = record.clone();
    let watcher = Watcher::new(move || {
        if field(&r, "flag").as_bool().unwrap_or(false) {
            field(&r, "a")
        } else {
            field(&r, "b")
        }
    });
    assert!(ob.field_dep("a").unwrap().has_subscriber(watcher.id()));

    record.set("flag", Value::from(false));
    assert!(!ob.field_dep("a").unwrap().has_subscriber(watcher.id()));
    assert!(ob.field_dep("b").unwrap().has_subscriber(watcher.id()));

    let runs = watcher.run_count();
    record.set("a", Value::from(100));
    assert_eq!(watcher.run_count(), runs);
}

/// Test that dropping a watcher releases it from every dependency.
#[test]
fn dropped_watchers_are_pruned() {
    let record = state(json!({ "a": 1 }));
    let dep = record.observer().unwrap().field_dep("a").unwrap();
    {
        let r = record.clone();
        let _watcher = Watcher::new(move || field(&r, "a"));
        assert_eq!(dep.subscriber_count(), 1);
    }
    assert_eq!(dep.subscriber_count(), 0);
    record.set("a", Value::from(2));
}

/// Test that a callback sees the new and previous value.
#[test]
fn callbacks_receive_new_and_old_values() {
    let record = state(json!({ "name": "a" }));
    let changes = Arc::new(Mutex::new(Vec::new()));

    let r = record.clone();
    let c = changes.clone();
    let _watcher = Watcher::with_callback(
        move || field(&r, "name"),
        move |new, old| c.lock().push((new.to_string(), old.to_string())),
    );

    record.set("name", Value::from("b"));
    record.set("name", Value::from("c"));
    assert_eq!(
        *changes.lock(),
        vec![("b".to_owned(), "a".to_owned()), ("c".to_owned(), "b".to_owned())]
    );
}

/// Test that a watcher writing to its own input does not loop.
#[test]
fn self_triggering_watcher_terminates() {
    let record = state(json!({ "n": 0 }));
    let r = record.clone();
    let watcher = Watcher::new(move || {
        let n = field(&r, "n").as_f64().unwrap_or(0.0);
        r.set("n", Value::Number(n + 1.0));
        Value::Number(n)
    });

    assert_eq!(watcher.run_count(), 1);
    assert_eq!(record.get_untracked("n"), Some(Value::from(1)));
}

/// Test that frozen and cyclic structures are handled without panicking.
#[test]
fn frozen_and_cyclic_values_are_safe() {
    let frozen: Record = [("a", Value::from(1))].into_iter().collect();
    frozen.freeze();
    let outer = state(json!({}));
    observer::set(&outer, "frozen", Value::Record(frozen.clone()));
    assert!(frozen.observer().is_none());

    let list = List::from(vec![Value::from(1)]);
    list.freeze();
    assert_eq!(list.push(vec![Value::from(2)]), 1);
    assert!(observe_value(&Value::List(list)).is_none());

    let a = Record::new();
    let b = Record::new();
    a.set("b", Value::Record(b.clone()));
    b.set("a", Value::Record(a.clone()));
    let ob = observe_value(&Value::Record(a.clone())).unwrap();
    assert_eq!(ob.field_names(), vec!["b"]);
    assert!(b.observer().is_some());
}

/// Test that a list containing itself can be read, sorted and mutated under
/// tracking.
#[test]
fn self_containing_list_is_safe_to_track() {
    let root = state(json!({ "items": [2, 1] }));
    let items = root.get_untracked("items").unwrap().as_list().cloned().unwrap();
    items.push(vec![Value::List(items.clone())]);

    let r = root.clone();
    let watcher = Watcher::new(move || field(&r, "items"));
    assert_eq!(watcher.run_count(), 1);

    items.sort(None);
    assert_eq!(watcher.run_count(), 2);
    assert_eq!(items.len(), 3);
}

/// Test that every structural list operation notifies and returns what the
/// native operation returns.
#[test]
fn list_operations_notify_and_return_native_results() {
    let root = state(json!({ "items": [3, 1, 2] }));
    let runs = Arc::new(AtomicUsize::new(0));

    let r = root.clone();
    let runs_clone = runs.clone();
    let _watcher = Watcher::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        field(&r, "items")
    });

    let items = root.get_untracked("items").unwrap().as_list().cloned().unwrap();
    assert_eq!(items.push(vec![Value::from(4)]), 4);
    assert_eq!(items.pop(), Some(Value::from(4)));
    assert_eq!(items.splice(0, Some(1), vec![]), vec![Value::from(3)]);
    assert!(items.reverse().ptr_eq(&items));
    assert_eq!(runs.load(Ordering::SeqCst), 5);
}

/// Test that reactive `del` notifies readers of the parent field.
#[test]
fn reactive_delete_notifies() {
    let root = state(json!({ "user": { "name": "x", "age": 3 } }));
    let r = root.clone();
    let watcher = Watcher::new(move || {
        let user = field(&r, "user");
        Value::from(user.as_record().map_or(0, |u| u.len() as i32))
    });
    assert_eq!(watcher.value(), Value::from(2));

    let user = root.get_untracked("user").unwrap().as_record().cloned().unwrap();
    observer::del(&user, "age");
    assert_eq!(watcher.value(), Value::from(1));
}
