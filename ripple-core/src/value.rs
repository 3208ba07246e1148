//! Value Model
//!
//! Dynamic structured data that the observer can make reactive.
//!
//! - Scalars (`Null`, `Bool`, `Number`, `String`) are plain values.
//! - `Record` is an ordered string-keyed map behind a shared handle.
//! - `List` is an ordered collection behind a shared handle.
//! - `Opaque` carries a host object that is never made reactive.
//!
//! Handles are cheap to clone and compare by identity: two `Record`s are the
//! same record only if they share an allocation. Each structured handle has a
//! write-once slot for its [`Observer`], which is how wrapping stays
//! idempotent.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::observer::{self, Observer};
use crate::reactive::ReactiveContext;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Record(Record),
    List(List),
    Opaque(Opaque),
}

impl Value {
    /// Change-detection equality.
    ///
    /// Scalars compare by value, with `NaN` equal to itself so that writing
    /// `NaN` over `NaN` is not a change. Handles compare by identity.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether this value is eligible for observation.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Record(_) | Value::List(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// The observer attached to this value, if it has been made reactive.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        match self {
            Value::Record(r) => r.observer(),
            Value::List(l) => l.observer(),
            _ => None,
        }
    }

    /// Short type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Untracked JSON snapshot. Cycles and opaque values become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, seen: &mut HashSet<usize>) -> serde_json::Value {
        match self {
            Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n)
                if n.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(n) =>
            {
                serde_json::Value::Number(serde_json::Number::from(*n as i64))
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Record(r) => {
                if !seen.insert(r.addr()) {
                    return serde_json::Value::Null;
                }
                let map = r
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json_inner(seen)))
                    .collect();
                seen.remove(&r.addr());
                serde_json::Value::Object(map)
            }
            Value::List(l) => {
                if !seen.insert(l.addr()) {
                    return serde_json::Value::Null;
                }
                let items = l.to_vec().iter().map(|v| v.to_json_inner(seen)).collect();
                seen.remove(&l.addr());
                serde_json::Value::Array(items)
            }
        }
    }
}

/// Handles compare by identity; scalars by value (`NaN != NaN`).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Record(_) => f.write_str("[object Record]"),
            Value::List(l) => f.write_str(&l.join(&mut HashSet::new())),
            Value::Opaque(_) => f.write_str("[opaque]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Record(r) => write!(f, "Record({})", Value::Record(r.clone()).to_json()),
            Value::List(l) => write!(f, "List({})", Value::List(l.clone()).to_json()),
            Value::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Value::List(l)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(List::from(items))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect::<Vec<_>>().into())
            }
            serde_json::Value::Object(map) => {
                Value::Record(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Opaque
// ----------------------------------------------------------------------------

/// A host object carried through the value model but never observed.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ----------------------------------------------------------------------------
// Record
// ----------------------------------------------------------------------------

struct RecordInner {
    fields: RwLock<IndexMap<String, Value>>,
    observer: OnceLock<Arc<Observer>>,
    frozen: AtomicBool,
}

/// An ordered string-keyed map behind a shared handle.
///
/// Before observation, `get` and `set` are plain map operations. Once the
/// record is observed, every field present at that moment is intercepted:
/// reads are tracked and writes notify. Fields added later stay plain unless
/// they go through [`Record::define_reactive`] or [`observer::set`].
#[derive(Clone)]
pub struct Record(Arc<RecordInner>);

impl Record {
    pub fn new() -> Self {
        Self(Arc::new(RecordInner {
            fields: RwLock::new(IndexMap::new()),
            observer: OnceLock::new(),
            frozen: AtomicBool::new(false),
        }))
    }

    /// Read a field, recording the read for the active computation.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.0.fields.read().get(key).cloned()?;

        if ReactiveContext::is_active() {
            if let Some(dep) = self.observer().and_then(|ob| ob.field_dep(key)) {
                dep.record_read();
                observer::depend_child(&value);
            }
        }

        Some(value)
    }

    /// Read a field without tracking.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.0.fields.read().get(key).cloned()
    }

    /// Write a field.
    ///
    /// For an intercepted field, a write of the same value is a no-op;
    /// otherwise the new value is observed and the field's dependency
    /// notified. Writes to a frozen record are ignored.
    pub fn set(&self, key: &str, value: Value) {
        if self.is_frozen() {
            tracing::debug!(key, "ignoring write to frozen record");
            return;
        }

        let dep = self.observer().and_then(|ob| ob.field_dep(key));
        {
            let mut fields = self.0.fields.write();
            if dep.is_some() {
                if let Some(current) = fields.get(key) {
                    if current.same(&value) {
                        return;
                    }
                }
            }
            fields.insert(key.to_owned(), value.clone());
        }

        if let Some(dep) = dep {
            observer::observe(&value);
            dep.notify();
        }
    }

    /// Add `key` as a reactive field, observing the record first if needed.
    pub fn define_reactive(&self, key: &str, value: Value) {
        observer::define_reactive(self, key, value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.fields.read().keys().cloned().collect()
    }

    /// Untracked snapshot of all fields.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .fields
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.read().is_empty()
    }

    /// Freeze the record. Frozen records are never observed and ignore writes.
    pub fn freeze(&self) {
        self.0.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::SeqCst)
    }

    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.0.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Attach `observer` unless one is already attached; returns the winner.
    pub(crate) fn attach_observer(&self, observer: Arc<Observer>) -> Arc<Observer> {
        self.0.observer.get_or_init(|| observer).clone()
    }

    pub(crate) fn insert_raw(&self, key: &str, value: Value) {
        self.0.fields.write().insert(key.to_owned(), value);
    }

    pub(crate) fn remove_raw(&self, key: &str) -> Option<Value> {
        self.0.fields.write().shift_remove(key)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let record = Record::new();
        {
            let mut fields = record.0.fields.write();
            for (k, v) in iter {
                fields.insert(k.into(), v);
            }
        }
        record
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Record(self.clone()), f)
    }
}

// ----------------------------------------------------------------------------
// List
// ----------------------------------------------------------------------------

struct ListInner {
    items: RwLock<Vec<Value>>,
    observer: OnceLock<Arc<Observer>>,
    frozen: AtomicBool,
}

/// An ordered collection behind a shared handle.
///
/// Structural mutation goes through [`ArrayMethods`](crate::observer::ArrayMethods):
/// once the list is observed, every mutation observes inserted elements and
/// notifies the list's dependency.
#[derive(Clone)]
pub struct List(Arc<ListInner>);

impl List {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.read().is_empty()
    }

    /// Read an element. Index reads are not tracked.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.read().get(index).cloned()
    }

    /// Untracked snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.read().clone()
    }

    /// Subscribe the active computation to structural changes of this list.
    ///
    /// Reading a list through an observed record field does this
    /// implicitly; a free-standing list needs it spelled out.
    pub fn track(&self) {
        if let Some(ob) = self.observer() {
            ob.dep().record_read();
            observer::depend_array(self);
        }
    }

    /// Write the element at `index`, growing the list with nulls if needed.
    ///
    /// Goes through `splice`, so on an observed list the write is tracked
    /// even beyond the current length.
    pub fn set(&self, index: usize, value: Value) {
        use crate::observer::ArrayMethods;

        if self.is_frozen() || self.get(index).is_some_and(|current| current.same(&value)) {
            return;
        }
        {
            let mut items = self.0.items.write();
            if index > items.len() {
                items.resize(index, Value::Null);
            }
        }
        self.splice(index as isize, Some(1), vec![value]);
    }

    /// Freeze the list. Frozen lists are never observed and ignore mutation.
    pub fn freeze(&self) {
        self.0.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::SeqCst)
    }

    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.0.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn attach_observer(&self, observer: Arc<Observer>) -> Arc<Observer> {
        self.0.observer.get_or_init(|| observer).clone()
    }

    /// Run `f` on the raw element vector.
    pub(crate) fn with_items_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        f(&mut self.0.items.write())
    }

    pub(crate) fn replace_items(&self, items: Vec<Value>) {
        *self.0.items.write() = items;
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Comma-joined display form. A list nested inside itself joins as the
    /// empty string.
    fn join(&self, seen: &mut HashSet<usize>) -> String {
        if !seen.insert(self.addr()) {
            return String::new();
        }
        let items: Vec<String> = self
            .to_vec()
            .iter()
            .map(|item| match item {
                Value::List(inner) => inner.join(seen),
                other => other.to_string(),
            })
            .collect();
        seen.remove(&self.addr());
        items.join(",")
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        Self(Arc::new(ListInner {
            items: RwLock::new(items),
            observer: OnceLock::new(),
            frozen: AtomicBool::new(false),
        }))
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        List::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::List(self.clone()), f)
    }
}
