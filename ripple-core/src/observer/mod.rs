//! Observer
//!
//! Turns plain records and lists into observable state.
//!
//! # Concepts
//!
//! Observing a record walks every field present at that moment and gives it
//! its own [`Dep`]. From then on [`Record::get`] records reads on that
//! dependency and [`Record::set`] notifies it. Field values are observed
//! recursively, so nested records are reactive too.
//!
//! Observing a list observes every element and switches the list's
//! structural operations to the interceptor in [`array`].
//!
//! Every observed value also carries one dependency of its own. It is
//! notified on structural change (list mutation, reactive `set`/`del` on a
//! record) and is read whenever the value is read through a parent field, so
//! a computation that reads `state.items` re-runs on `items.push(..)`.
//!
//! # Limitations
//!
//! Only fields present when the record is observed are intercepted. A field
//! assigned later is a plain field unless added through
//! [`define_reactive`] or [`set`].

pub mod array;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::debug;
use crate::reactive::Dep;
use crate::value::{List, Record, Value};

pub use array::{ArrayMethods, INTERCEPTED_METHODS};

/// Per-value reactive metadata, attached once to a record or list.
pub struct Observer {
    dep: Arc<Dep>,
    fields: RwLock<IndexMap<String, Arc<Dep>>>,
    root_count: AtomicUsize,
}

impl Observer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            dep: Dep::new(),
            fields: RwLock::new(IndexMap::new()),
            root_count: AtomicUsize::new(0),
        })
    }

    /// The value's own dependency, notified on structural change.
    pub fn dep(&self) -> &Arc<Dep> {
        &self.dep
    }

    /// The dependency behind an intercepted record field.
    pub fn field_dep(&self, key: &str) -> Option<Arc<Dep>> {
        self.fields.read().get(key).cloned()
    }

    /// Names of intercepted fields, in interception order. Empty for lists.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Number of instances using this value as their root state.
    pub fn root_count(&self) -> usize {
        self.root_count.load(Ordering::SeqCst)
    }

    pub(crate) fn add_root(&self) {
        self.root_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn remove_root(&self) {
        let _ = self
            .root_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    fn intercept(&self, key: &str) -> Arc<Dep> {
        self.fields
            .write()
            .entry(key.to_owned())
            .or_insert_with(Dep::new)
            .clone()
    }

    fn release(&self, key: &str) {
        self.fields.write().shift_remove(key);
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep)
            .field("fields", &self.field_names())
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Make `value` reactive and return it.
///
/// Scalars, opaque host objects and frozen values come back untouched.
/// Observing an already observed value is a no-op, and the returned handle
/// is always the handle that was passed in.
pub fn observe(value: &Value) -> Value {
    observe_value(value);
    value.clone()
}

/// Like [`observe`], but returns the attached observer.
pub fn observe_value(value: &Value) -> Option<Arc<Observer>> {
    match value {
        Value::Record(record) => observe_record(record),
        Value::List(list) => observe_list(list),
        _ => None,
    }
}

/// Observe `record` as the root state of an instance.
pub(crate) fn observe_root(record: &Record) -> Option<Arc<Observer>> {
    let ob = observe_record(record)?;
    ob.add_root();
    Some(ob)
}

fn observe_record(record: &Record) -> Option<Arc<Observer>> {
    if let Some(ob) = record.observer() {
        return Some(ob);
    }
    if record.is_frozen() {
        return None;
    }

    // Attach before walking so a record that contains itself terminates.
    let ob = record.attach_observer(Observer::new());
    for (key, child) in record.entries() {
        ob.intercept(&key);
        observe_value(&child);
    }
    Some(ob)
}

fn observe_list(list: &List) -> Option<Arc<Observer>> {
    if let Some(ob) = list.observer() {
        return Some(ob);
    }
    if list.is_frozen() {
        return None;
    }

    let ob = list.attach_observer(Observer::new());
    observe_all(&list.to_vec());
    Some(ob)
}

/// Observe every element of `items`.
pub(crate) fn observe_all(items: &[Value]) {
    for item in items {
        observe_value(item);
    }
}

/// Called after a tracked field read: the reader also depends on the
/// child's own dependency, and on every nested list element's.
pub(crate) fn depend_child(value: &Value) {
    let Some(ob) = value.observer() else {
        return;
    };
    ob.dep().record_read();
    if let Value::List(list) = value {
        depend_array(list);
    }
}

/// Lists do not intercept index reads, so a computation that read a list
/// depends on every nested structure inside it. Lists reachable from
/// themselves are visited once.
pub(crate) fn depend_array(list: &List) {
    depend_array_inner(list, &mut HashSet::new());
}

fn depend_array_inner(list: &List, seen: &mut HashSet<usize>) {
    if !seen.insert(list.addr()) {
        return;
    }
    for item in list.to_vec() {
        if let Some(ob) = item.observer() {
            ob.dep().record_read();
        }
        if let Value::List(inner) = &item {
            depend_array_inner(inner, seen);
        }
    }
}

/// Define `key` on `record` as a reactive field.
///
/// The record is observed first if it was not already. Frozen records are
/// skipped silently. Does not notify; see [`set`] for that.
pub fn define_reactive(record: &Record, key: &str, value: Value) {
    if record.is_frozen() {
        tracing::debug!(key, "skipping reactive field on frozen record");
        return;
    }
    let Some(ob) = observe_record(record) else {
        return;
    };

    ob.intercept(key);
    observe_value(&value);
    record.insert_raw(key, value);
}

/// Assign a field, adding it reactively if it does not exist yet.
///
/// Existing fields take the normal write path. New fields on an observed
/// record become reactive and the record's own dependency is notified, so
/// computations that enumerate the record see the addition.
pub fn set(record: &Record, key: &str, value: Value) {
    if record.contains_key(key) {
        record.set(key, value);
        return;
    }

    let Some(ob) = record.observer() else {
        record.set(key, value);
        return;
    };

    if ob.root_count() > 0 {
        debug::warn(
            "Avoid adding reactive properties to an instance's root state at runtime - \
             declare it upfront in the data option.",
            None,
        );
        return;
    }

    define_reactive(record, key, value);
    ob.dep().notify();
}

/// Delete a field and notify the record's own dependency.
pub fn del(record: &Record, key: &str) {
    if record.is_frozen() || !record.contains_key(key) {
        return;
    }

    let ob = record.observer();
    if ob.as_ref().is_some_and(|ob| ob.root_count() > 0) {
        debug::warn(
            "Avoid deleting properties on an instance's root state - just set it to null.",
            None,
        );
        return;
    }

    record.remove_raw(key);
    if let Some(ob) = ob {
        ob.release(key);
        ob.dep().notify();
    }
}
