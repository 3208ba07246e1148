//! Watcher Implementation
//!
//! A Watcher is the concrete computation that dependencies notify. It comes
//! in two flavors:
//!
//! - **Eager** watchers evaluate on creation and re-run synchronously each
//!   time a dependency notifies. An optional callback receives the new and
//!   previous value after every re-run.
//! - **Lazy** watchers back computed values. A notification only marks them
//!   dirty; the next read re-evaluates.
//!
//! # Dependency Bookkeeping
//!
//! Every evaluation collects the dependencies it reads into a fresh set.
//! Afterwards, dependencies that were read last time but not this time are
//! told to drop the watcher. A computation that stops reading a field stops
//! being notified for it.
//!
//! # Re-entrancy
//!
//! A watcher notified while it is already evaluating does not run again.
//! Writes a computation makes to its own inputs therefore cannot loop.

use std::collections::HashSet;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::subscriber::{Subscriber, SubscriberId};
use crate::value::Value;

/// The function a watcher evaluates.
pub type Getter = Arc<dyn Fn() -> Value + Send + Sync>;

/// Invoked with `(new, old)` after an eager watcher re-runs.
pub type Callback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

type DepList = SmallVec<[Arc<Dep>; 4]>;

struct WatcherState {
    deps: DepList,
    dep_ids: HashSet<DepId>,
    new_deps: DepList,
    new_dep_ids: HashSet<DepId>,
    value: Value,
    dirty: bool,
    active: bool,
    run_count: usize,
}

struct WatcherInner {
    id: SubscriberId,
    me: Weak<WatcherInner>,
    getter: Getter,
    callback: Option<Callback>,
    lazy: bool,
    running: AtomicBool,
    state: Mutex<WatcherState>,
}

/// Sets a flag for the duration of a scope and restores the previous value.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        let previous = flag.swap(true, Ordering::SeqCst);
        Self { flag, previous }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

impl WatcherInner {
    /// Evaluate the getter with this watcher as the active computation.
    fn get(&self) -> Value {
        let Some(me) = self.me.upgrade() else {
            return Value::Null;
        };

        let value = {
            let _running = RunningGuard::enter(&self.running);
            let _ctx = ReactiveContext::enter(me);
            (self.getter)()
        };

        self.cleanup_deps();
        self.state.lock().run_count += 1;
        value
    }

    /// Swap in the dependencies collected by the last evaluation and drop
    /// subscriptions that were not read again.
    fn cleanup_deps(&self) {
        let stale: Vec<Arc<Dep>> = {
            let mut state = self.state.lock();
            let new_deps = mem::take(&mut state.new_deps);
            let new_dep_ids = mem::take(&mut state.new_dep_ids);
            let old_deps = mem::replace(&mut state.deps, new_deps);
            state.dep_ids = new_dep_ids;
            old_deps
                .into_iter()
                .filter(|dep| !state.dep_ids.contains(&dep.id()))
                .collect()
        };

        for dep in stale {
            dep.unsubscribe(self.id);
        }
    }

    fn run(&self) {
        if !self.state.lock().active {
            return;
        }
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!(watcher = ?self.id, "recursive update detected, skipping re-run");
            return;
        }

        let value = self.get();
        let old = {
            let mut state = self.state.lock();
            state.dirty = false;
            mem::replace(&mut state.value, value.clone())
        };

        if let Some(callback) = &self.callback {
            // Structured values may have been mutated in place, so they
            // always count as changed.
            if !value.same(&old) || value.is_structured() {
                let _running = RunningGuard::enter(&self.running);
                let _quiet = ReactiveContext::untracked();
                callback(&value, &old);
            }
        }
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(&self, dep: &Arc<Dep>) -> bool {
        let mut state = self.state.lock();
        if !state.active || !state.new_dep_ids.insert(dep.id()) {
            return false;
        }
        state.new_deps.push(Arc::clone(dep));
        !state.dep_ids.contains(&dep.id())
    }

    fn is_lazy(&self) -> bool {
        self.lazy
    }

    fn update(&self) {
        if self.lazy {
            self.state.lock().dirty = true;
        } else {
            self.run();
        }
    }
}

/// A reactive computation.
///
/// # Example
///
/// ```rust,ignore
/// let state = observe(&Value::from(json!({ "count": 1 })));
/// let record = state.as_record().unwrap().clone();
///
/// let doubled = Watcher::lazy(move || {
///     let n = record.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
///     Value::Number(n * 2.0)
/// });
/// assert_eq!(doubled.value(), Value::Number(2.0));
/// ```
#[derive(Clone)]
pub struct Watcher(Arc<WatcherInner>);

impl Watcher {
    fn build(getter: Getter, callback: Option<Callback>, lazy: bool) -> Self {
        let inner = Arc::new_cyclic(|me| WatcherInner {
            id: SubscriberId::new(),
            me: me.clone(),
            getter,
            callback,
            lazy,
            running: AtomicBool::new(false),
            state: Mutex::new(WatcherState {
                deps: SmallVec::new(),
                dep_ids: HashSet::new(),
                new_deps: SmallVec::new(),
                new_dep_ids: HashSet::new(),
                value: Value::Null,
                dirty: lazy,
                active: true,
                run_count: 0,
            }),
        });

        if !lazy {
            let value = inner.get();
            inner.state.lock().value = value;
        }

        Self(inner)
    }

    /// Create an eager watcher. The getter runs immediately.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::build(Arc::new(getter), None, false)
    }

    /// Create an eager watcher whose callback receives `(new, old)` after
    /// each re-run that changed the value.
    pub fn with_callback<F, C>(getter: F, callback: C) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        Self::build(Arc::new(getter), Some(Arc::new(callback)), false)
    }

    /// Create a lazy watcher. Nothing runs until [`Watcher::value`].
    pub fn lazy<F>(getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::build(Arc::new(getter), None, true)
    }

    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    pub fn is_lazy(&self) -> bool {
        self.0.lazy
    }

    /// The current value.
    ///
    /// Lazy watchers re-evaluate here if a dependency changed since the last
    /// read. When read from inside another computation, that computation
    /// inherits this watcher's dependencies.
    pub fn value(&self) -> Value {
        if self.0.lazy && self.is_dirty() {
            self.evaluate();
        }
        if self.0.lazy && ReactiveContext::is_active() {
            self.depend();
        }
        self.0.state.lock().value.clone()
    }

    /// Re-evaluate now, regardless of the dirty flag.
    pub fn evaluate(&self) {
        let value = self.0.get();
        let mut state = self.0.state.lock();
        state.value = value;
        state.dirty = false;
    }

    /// Re-run an eager watcher as if a dependency had notified it.
    pub fn run(&self) {
        self.0.run();
    }

    /// Record a read of every dependency of this watcher on behalf of the
    /// active computation.
    pub fn depend(&self) {
        let deps: DepList = self.0.state.lock().deps.clone();
        for dep in &deps {
            dep.record_read();
        }
    }

    /// Unsubscribe from every dependency. The watcher never runs again.
    pub fn teardown(&self) {
        let deps = {
            let mut state = self.0.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            state.dep_ids.clear();
            mem::take(&mut state.deps)
        };
        for dep in deps {
            dep.unsubscribe(self.0.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.state.lock().active
    }

    pub fn is_dirty(&self) -> bool {
        self.0.state.lock().dirty
    }

    /// Number of completed evaluations.
    pub fn run_count(&self) -> usize {
        self.0.state.lock().run_count
    }

    /// Number of dependencies read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.0.state.lock().deps.len()
    }

    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.0.state.lock().dep_ids.contains(&dep.id())
    }

    /// This watcher as a type-erased subscriber, for manual registration.
    pub fn as_subscriber(&self) -> Arc<dyn Subscriber> {
        self.0.clone()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.0.id)
            .field("lazy", &self.0.lazy)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn eager_watcher_runs_on_creation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Value::Null
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn lazy_watcher_waits_for_first_read() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::lazy(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Value::Number(42.0)
        });

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(watcher.is_dirty());

        assert_eq!(watcher.value(), Value::Number(42.0));
        assert_eq!(watcher.value(), Value::Number(42.0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!watcher.is_dirty());
    }

    #[test]
    fn watcher_subscribes_to_dependencies_it_reads() {
        let dep = Dep::new();
        let dep_clone = dep.clone();

        let watcher = Watcher::new(move || {
            dep_clone.record_read();
            Value::Null
        });

        assert!(dep.has_subscriber(watcher.id()));
        assert!(watcher.depends_on(&dep));

        dep.notify();
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn lazy_watcher_marks_dirty_on_notify() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::lazy(move || {
            dep_clone.record_read();
            Value::Bool(true)
        });

        watcher.value();
        assert!(!watcher.is_dirty());
        dep.notify();
        assert!(watcher.is_dirty());
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn reads_are_deduplicated_within_one_evaluation() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || {
            dep_clone.record_read();
            dep_clone.record_read();
            Value::Null
        });

        assert_eq!(watcher.dependency_count(), 1);
        assert_eq!(dep.subscriber_count(), 1);
    }

    #[test]
    fn teardown_unsubscribes() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || {
            dep_clone.record_read();
            Value::Null
        });

        watcher.teardown();
        assert!(!watcher.is_active());
        assert_eq!(dep.subscriber_count(), 0);

        watcher.run();
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn self_notification_does_not_recurse() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || {
            dep_clone.record_read();
            dep_clone.notify();
            Value::Null
        });

        assert_eq!(watcher.run_count(), 1);
        dep.notify();
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn dropping_watcher_releases_subscription() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || {
            dep_clone.record_read();
            Value::Null
        });
        assert_eq!(dep.subscriber_count(), 1);

        drop(watcher);
        assert_eq!(dep.subscriber_count(), 0);
    }
}
