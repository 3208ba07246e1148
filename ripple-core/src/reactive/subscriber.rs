//! Subscriber types for the reactive system.
//!
//! A Subscriber is any computation that depends on reactive values: watchers,
//! computed values and render functions driven by an external scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Dependencies key their subscriber sets by this ID, which is what prevents
/// a computation from being registered (and notified) twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be notified when one of its dependencies changes.
pub trait Subscriber: Send + Sync {
    /// The subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// Remember that the current evaluation read `dep`.
    ///
    /// Returns `true` when `dep` should add this subscriber to its own set,
    /// i.e. the dependency was not already subscribed during the previous
    /// evaluation.
    fn add_dep(&self, dep: &Arc<Dep>) -> bool;

    /// Called by [`Dep::notify`] when a dependency changed.
    fn update(&self);

    /// Lazy subscribers only mark themselves dirty on update. [`Dep::notify`]
    /// updates them before any eager subscriber re-runs.
    fn is_lazy(&self) -> bool {
        false
    }
}
