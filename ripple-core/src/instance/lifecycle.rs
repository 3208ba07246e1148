//! Lifecycle
//!
//! Parent/root wiring, the parent listener table, hook invocation and
//! teardown. Hooks always run untracked so that creating or destroying an
//! instance inside a computation never subscribes that computation.

use std::sync::atomic::Ordering;

use super::Instance;
use crate::reactive::ReactiveContext;

/// Link `vm` to its parent and root.
///
/// An abstract instance is not listed among its parent's children, and a
/// child skips abstract ancestors when registering itself.
pub(crate) fn init_lifecycle(vm: &Instance) {
    let options = vm.options();
    let parent = options.parent();

    if let Some(p) = &parent {
        if !options.is_abstract() {
            let mut target = p.clone();
            while target.options().is_abstract() {
                match target.parent() {
                    Some(next) => target = next,
                    None => break,
                }
            }
            target.0.children.lock().push(vm.clone());
        }
    }

    let root = match &parent {
        Some(p) => {
            let _ = vm.0.parent.set(p.downgrade());
            p.root().downgrade()
        }
        None => vm.downgrade(),
    };
    let _ = vm.0.root.set(root);
}

/// Register the listeners the parent attached to this component.
pub(crate) fn init_events(vm: &Instance) {
    let Some(listeners) = vm.options().parent_listeners() else {
        return;
    };
    for (event, listener) in listeners {
        vm.on_arc(event, listener.clone());
    }
}

/// Run the merged hook list for `hook`, then emit `hook:<name>`.
///
/// Hooks run untracked, so state read inside a hook never subscribes an
/// enclosing computation.
pub fn call_hook(vm: &Instance, hook: &str) {
    let _untracked = ReactiveContext::untracked();
    let hooks = vm.options().hooks(hook).to_vec();
    tracing::trace!(uid = vm.uid(), hook, count = hooks.len(), "calling hook");
    for f in &hooks {
        f(vm);
    }
    vm.emit(&format!("hook:{hook}"), &[]);
}

impl Instance {
    /// Tear the instance down.
    ///
    /// Runs `beforeDestroy`, detaches from the parent, tears down every
    /// watcher, destroys children, runs `destroyed` and drops all event
    /// listeners. Calling it twice is a no-op.
    pub fn destroy(&self) {
        if self.0.being_destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        call_hook(self, "beforeDestroy");

        if let Some(parent) = self.parent() {
            if !parent.0.being_destroyed.load(Ordering::SeqCst) && !self.options().is_abstract() {
                parent.0.children.lock().retain(|child| !child.ptr_eq(self));
            }
        }

        let watchers: Vec<_> = self.0.watchers.lock().drain(..).collect();
        for watcher in watchers {
            watcher.teardown();
        }
        let (computed, data) = {
            let state = self.0.state.read();
            (state.computed.values().cloned().collect::<Vec<_>>(), state.data.clone())
        };
        for watcher in computed {
            watcher.teardown();
        }
        if let Some(ob) = data.observer() {
            ob.remove_root();
        }

        let children = std::mem::take(&mut *self.0.children.lock());
        for child in children {
            child.destroy();
        }

        self.0.destroyed.store(true, Ordering::SeqCst);
        call_hook(self, "destroyed");
        self.0.events.lock().clear();
        tracing::debug!(uid = self.uid(), "instance destroyed");
    }
}
