//! Dependency
//!
//! A `Dep` is the subscriber registry for one observable slot: one per
//! observed record field, plus one per observed record or list for
//! structural changes.
//!
//! Subscribers are held weakly. A dependency never keeps a computation alive;
//! entries whose computation has been dropped are pruned the next time the
//! dependency notifies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Unique identifier for a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registry of computations interested in one observable slot.
pub struct Dep {
    id: DepId,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl Dep {
    /// Create a new dependency with no subscribers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: DepId::next(),
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    pub fn id(&self) -> DepId {
        self.id
    }

    /// Register `subscriber`. Registering twice is a no-op.
    pub fn subscribe(&self, subscriber: &Arc<dyn Subscriber>) {
        let id = subscriber.id();
        self.subscribers
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::downgrade(subscriber));
    }

    /// Remove a subscriber. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    /// Record a read of this slot by the active computation, if there is one.
    ///
    /// Registration is mutual: the computation remembers this dependency so
    /// it can drop subscriptions it no longer reads after re-evaluation.
    pub fn record_read(self: &Arc<Self>) {
        if let Some(target) = ReactiveContext::current() {
            if target.add_dep(self) {
                self.subscribe(&target);
            }
        }
    }

    /// Notify every subscriber registered at the time of the call.
    ///
    /// The subscriber set is snapshotted first and the lock released, so
    /// subscribers are free to re-subscribe (here or elsewhere) while they
    /// re-run.
    ///
    /// Lazy subscribers are marked dirty before any eager subscriber runs,
    /// so an eager re-run never reads a computed value that is still cached
    /// from before the change.
    pub fn notify(&self) {
        let snapshot: Vec<Arc<dyn Subscriber>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|_, weak| weak.strong_count() > 0);
            subscribers.values().filter_map(Weak::upgrade).collect()
        };

        tracing::trace!(dep = self.id.0, subscribers = snapshot.len(), "notify");

        let (lazy, eager): (Vec<_>, Vec<_>) =
            snapshot.into_iter().partition(|subscriber| subscriber.is_lazy());
        for subscriber in lazy.iter().chain(&eager) {
            subscriber.update();
        }
    }

    /// IDs of live subscribers, in registration order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers
            .lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.subscribers
            .lock()
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
