//! Collection Interceptor
//!
//! Index assignment on a list cannot see structural change, so the seven
//! mutating operations are routed through an explicit capability trait.
//! [`List`] implements [`ArrayMethods`] by dispatching to one of two
//! implementations:
//!
//! - [`Native`] performs the raw operation on the element vector.
//! - [`Intercepted`] wraps `Native`: it runs the native operation, observes
//!   the inserted elements, notifies the list's dependency and hands back
//!   the native result unchanged.
//!
//! The choice is made per list: only lists with an attached observer go
//! through the interceptor.

use std::cmp::Ordering;
use std::sync::Arc;

use super::{observe_all, Observer};
use crate::value::{List, Value};

/// Names of the intercepted operations.
pub const INTERCEPTED_METHODS: [&str; 7] =
    ["push", "pop", "shift", "unshift", "splice", "sort", "reverse"];

/// Comparator accepted by [`ArrayMethods::sort`].
pub type Compare<'a> = &'a mut dyn FnMut(&Value, &Value) -> Ordering;

/// The structural operations of an ordered collection.
pub trait ArrayMethods {
    /// Append `items`; returns the new length.
    fn push(&self, items: Vec<Value>) -> usize;

    /// Remove and return the last element.
    fn pop(&self) -> Option<Value>;

    /// Remove and return the first element.
    fn shift(&self) -> Option<Value>;

    /// Insert `items` at the front; returns the new length.
    fn unshift(&self, items: Vec<Value>) -> usize;

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// A negative `start` counts from the end; `None` removes everything
    /// from `start` on. Returns the removed elements.
    fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Vec<Value>;

    /// Sort in place; returns the list. Without a comparator elements are
    /// ordered by their display strings.
    fn sort(&self, compare: Option<Compare<'_>>) -> List;

    /// Reverse in place; returns the list.
    fn reverse(&self) -> List;
}

/// Raw operations on the element vector.
pub struct Native<'a>(&'a List);

impl<'a> Native<'a> {
    pub fn new(list: &'a List) -> Self {
        Self(list)
    }

    fn frozen(&self, method: &str) -> bool {
        let frozen = self.0.is_frozen();
        if frozen {
            tracing::debug!(method, "ignoring mutation of frozen list");
        }
        frozen
    }
}

impl ArrayMethods for Native<'_> {
    fn push(&self, items: Vec<Value>) -> usize {
        if self.frozen("push") {
            return self.0.len();
        }
        self.0.with_items_mut(|v| {
            v.extend(items);
            v.len()
        })
    }

    fn pop(&self) -> Option<Value> {
        if self.frozen("pop") {
            return None;
        }
        self.0.with_items_mut(Vec::pop)
    }

    fn shift(&self) -> Option<Value> {
        if self.frozen("shift") {
            return None;
        }
        self.0
            .with_items_mut(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
    }

    fn unshift(&self, items: Vec<Value>) -> usize {
        if self.frozen("unshift") {
            return self.0.len();
        }
        self.0.with_items_mut(|v| {
            v.splice(0..0, items).for_each(drop);
            v.len()
        })
    }

    fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Vec<Value> {
        if self.frozen("splice") {
            return Vec::new();
        }
        self.0.with_items_mut(|v| {
            let len = v.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                (start as usize).min(len)
            };
            let count = delete_count.map_or(len - start, |n| n.min(len - start));
            v.splice(start..start + count, items).collect()
        })
    }

    fn sort(&self, compare: Option<Compare<'_>>) -> List {
        if self.frozen("sort") {
            return self.0.clone();
        }
        // Sort a copy so the comparator may read the list without deadlock.
        let mut items = self.0.to_vec();
        match compare {
            Some(compare) => items.sort_by(|a, b| compare(a, b)),
            None => items.sort_by_cached_key(|v| v.to_string()),
        }
        self.0.replace_items(items);
        self.0.clone()
    }

    fn reverse(&self) -> List {
        if self.frozen("reverse") {
            return self.0.clone();
        }
        self.0.with_items_mut(|v| v.reverse());
        self.0.clone()
    }
}

/// Decorator that makes the native operations reactive.
pub struct Intercepted<'a> {
    native: Native<'a>,
    observer: Arc<Observer>,
}

impl<'a> Intercepted<'a> {
    pub fn new(list: &'a List, observer: Arc<Observer>) -> Self {
        Self {
            native: Native(list),
            observer,
        }
    }

    fn changed(&self, method: &str, inserted: &[Value]) {
        observe_all(inserted);
        tracing::trace!(method, inserted = inserted.len(), "list mutated");
        self.observer.dep().notify();
    }
}

impl ArrayMethods for Intercepted<'_> {
    fn push(&self, items: Vec<Value>) -> usize {
        let inserted = items.clone();
        let result = self.native.push(items);
        self.changed("push", &inserted);
        result
    }

    fn pop(&self) -> Option<Value> {
        let result = self.native.pop();
        self.changed("pop", &[]);
        result
    }

    fn shift(&self) -> Option<Value> {
        let result = self.native.shift();
        self.changed("shift", &[]);
        result
    }

    fn unshift(&self, items: Vec<Value>) -> usize {
        let inserted = items.clone();
        let result = self.native.unshift(items);
        self.changed("unshift", &inserted);
        result
    }

    fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Vec<Value> {
        let inserted = items.clone();
        let result = self.native.splice(start, delete_count, items);
        self.changed("splice", &inserted);
        result
    }

    fn sort(&self, compare: Option<Compare<'_>>) -> List {
        let result = self.native.sort(compare);
        self.changed("sort", &[]);
        result
    }

    fn reverse(&self) -> List {
        let result = self.native.reverse();
        self.changed("reverse", &[]);
        result
    }
}

impl List {
    fn methods(&self) -> Box<dyn ArrayMethods + '_> {
        match self.observer() {
            Some(observer) => Box::new(Intercepted::new(self, observer)),
            None => Box::new(Native::new(self)),
        }
    }
}

impl ArrayMethods for List {
    fn push(&self, items: Vec<Value>) -> usize {
        self.methods().push(items)
    }

    fn pop(&self) -> Option<Value> {
        self.methods().pop()
    }

    fn shift(&self) -> Option<Value> {
        self.methods().shift()
    }

    fn unshift(&self, items: Vec<Value>) -> usize {
        self.methods().unshift(items)
    }

    fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Vec<Value> {
        self.methods().splice(start, delete_count, items)
    }

    fn sort(&self, compare: Option<Compare<'_>>) -> List {
        self.methods().sort(compare)
    }

    fn reverse(&self) -> List {
        self.methods().reverse()
    }
}
