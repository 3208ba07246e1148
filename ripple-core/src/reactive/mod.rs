//! Reactive Primitives
//!
//! This module implements dependency tracking: dependencies, the active
//! computation stack, and watchers.
//!
//! # Concepts
//!
//! ## Dependencies
//!
//! A [`Dep`] belongs to one observable slot (a record field, or a whole
//! record or list). Reading the slot inside a computation subscribes the
//! computation; changing the slot notifies every subscriber.
//!
//! ## Watchers
//!
//! A [`Watcher`] is a computation. Eager watchers re-run synchronously when
//! notified; lazy watchers (computed values) mark themselves dirty and
//! recompute on the next read.
//!
//! # Implementation Notes
//!
//! The active computation lives on a thread-local stack
//! ([`ReactiveContext`]), pushed and popped by a scoped guard so nested
//! evaluations attribute reads to the innermost computation and restore the
//! outer one afterwards. Dependencies hold subscribers weakly; watchers hold
//! their dependencies strongly and drop the ones they stop reading.

mod context;
mod dep;
mod subscriber;
mod watcher;

pub use context::ReactiveContext;
pub use dep::{Dep, DepId};
pub use subscriber::{Subscriber, SubscriberId};
pub use watcher::{Callback, Getter, Watcher};
