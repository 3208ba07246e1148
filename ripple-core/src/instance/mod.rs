//! Component Instances
//!
//! [`Instance::new`] settles an instance's options and then initializes it
//! in a fixed order:
//!
//! 1. relationships (parent, root, children)
//! 2. parent listeners
//! 3. `beforeCreate`
//! 4. injections
//! 5. state: props, methods, data, computed, watch
//! 6. provide
//! 7. `created`
//!
//! Injected values exist before state is built, and provided values are
//! computed only after state exists, so each may refer to the other.
//!
//! Options are settled one of two ways. A root instance resolves its
//! definition and merges the caller's options over the result. A child
//! instance created from a placeholder vnode skips both: it reads through to
//! the definition's current options and copies a fixed set of fields from
//! the vnode.

mod init;
mod inject;
mod lifecycle;
mod state;
mod vnode;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::options::{Definition, Hook, Listener, Listeners, OptionValue, Options, RenderFn};
use crate::reactive::Watcher;
use crate::value::{Record, Value};

pub use init::{init_internal_component, CreateOptions, InternalComponentOptions};
pub use inject::{init_injections, init_provide, resolve_inject};
pub use lifecycle::call_hook;
pub use vnode::{VNode, VNodeComponentOptions};

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

/// Settled options of one instance.
///
/// Lookups check the instance's own options first and then the shared
/// options they fall back to.
#[derive(Clone, Default)]
pub struct InstanceOptions {
    own: Options,
    base: Option<Arc<Options>>,
    pub(crate) parent: Option<WeakInstance>,
    pub(crate) parent_vnode: Option<VNode>,
    pub(crate) props_data: Option<Record>,
    pub(crate) parent_listeners: Option<Listeners>,
    pub(crate) render_children: Vec<VNode>,
    pub(crate) component_tag: Option<String>,
}

impl InstanceOptions {
    /// Fully merged options with no fallback.
    pub fn merged(options: Options) -> Self {
        Self {
            own: options,
            ..Self::default()
        }
    }

    /// Empty own options reading through to `base`.
    pub fn derived(base: Arc<Options>) -> Self {
        Self {
            base: Some(base),
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.own
            .get(key)
            .or_else(|| self.base.as_ref().and_then(|base| base.get(key)))
    }

    pub fn own(&self) -> &Options {
        &self.own
    }

    /// The shared options this instance reads through to.
    pub fn base(&self) -> Option<&Arc<Options>> {
        self.base.as_ref()
    }

    pub fn name(&self) -> Option<String> {
        self.get("name")
            .and_then(OptionValue::as_value)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn map(&self, key: &str) -> Option<&Arc<Options>> {
        self.get(key).and_then(OptionValue::as_map)
    }

    pub fn hooks(&self, hook: &str) -> &[Hook] {
        match self.get(hook) {
            Some(OptionValue::Hooks(hooks)) => hooks,
            _ => &[],
        }
    }

    pub fn render(&self) -> Option<&RenderFn> {
        match self.get("render") {
            Some(OptionValue::Render(render)) => Some(render),
            _ => None,
        }
    }

    pub fn static_render_fns(&self) -> &[RenderFn] {
        match self.get("staticRenderFns") {
            Some(OptionValue::StaticRenderFns(fns)) => fns,
            _ => &[],
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.get("abstract")
            .and_then(OptionValue::as_value)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn parent(&self) -> Option<Instance> {
        self.parent.as_ref().and_then(WeakInstance::upgrade)
    }

    pub fn parent_vnode(&self) -> Option<&VNode> {
        self.parent_vnode.as_ref()
    }

    /// Props passed by the parent. Falls back to the `propsData` option.
    pub fn props_data(&self) -> Option<Record> {
        self.props_data.clone().or_else(|| {
            self.get("propsData")
                .and_then(OptionValue::as_value)
                .and_then(Value::as_record)
                .cloned()
        })
    }

    pub fn parent_listeners(&self) -> Option<&Listeners> {
        self.parent_listeners.as_ref()
    }

    pub fn render_children(&self) -> &[VNode] {
        &self.render_children
    }

    pub fn component_tag(&self) -> Option<String> {
        self.component_tag.clone()
    }
}

#[derive(Default)]
pub(crate) struct State {
    pub props: Record,
    pub data: Record,
    pub injected: Record,
    pub methods: IndexMap<String, crate::options::Method>,
    pub computed: IndexMap<String, Watcher>,
}

pub(crate) struct InstanceInner {
    uid: u64,
    definition: Definition,
    options: OnceLock<InstanceOptions>,
    parent: OnceLock<WeakInstance>,
    root: OnceLock<WeakInstance>,
    children: Mutex<Vec<Instance>>,
    events: Mutex<IndexMap<String, Vec<Listener>>>,
    state: RwLock<State>,
    watchers: Mutex<Vec<Watcher>>,
    provided: RwLock<Option<Record>>,
    being_destroyed: AtomicBool,
    destroyed: AtomicBool,
}

/// A component instance. Cloning is cheap and preserves identity.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

/// Non-owning instance handle.
#[derive(Clone)]
pub struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance)
    }
}

fn empty_options() -> &'static InstanceOptions {
    static EMPTY: OnceLock<InstanceOptions> = OnceLock::new();
    EMPTY.get_or_init(InstanceOptions::default)
}

impl Instance {
    fn alloc(definition: &Definition) -> Self {
        Self(Arc::new(InstanceInner {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            definition: definition.clone(),
            options: OnceLock::new(),
            parent: OnceLock::new(),
            root: OnceLock::new(),
            children: Mutex::new(Vec::new()),
            events: Mutex::new(IndexMap::new()),
            state: RwLock::new(State::default()),
            watchers: Mutex::new(Vec::new()),
            provided: RwLock::new(None),
            being_destroyed: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }))
    }

    pub fn uid(&self) -> u64 {
        self.0.uid
    }

    /// The definition this instance was created from.
    pub fn definition(&self) -> &Definition {
        &self.0.definition
    }

    /// Settled options. Empty while the options are still being merged.
    pub fn options(&self) -> &InstanceOptions {
        self.0.options.get().unwrap_or_else(|| empty_options())
    }

    pub fn parent(&self) -> Option<Instance> {
        self.0.parent.get().and_then(WeakInstance::upgrade)
    }

    pub fn root(&self) -> Instance {
        self.0
            .root
            .get()
            .and_then(WeakInstance::upgrade)
            .unwrap_or_else(|| self.clone())
    }

    pub fn is_root(&self) -> bool {
        self.root().ptr_eq(self)
    }

    pub fn children(&self) -> Vec<Instance> {
        self.0.children.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Arc::downgrade(&self.0))
    }

    /// Read a reactive state field: props, then data, then computed, then
    /// injected values. Tracked when read inside a computation.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (props, data, computed, injected) = {
            let state = self.0.state.read();
            (
                state.props.clone(),
                state.data.clone(),
                state.computed.get(key).cloned(),
                state.injected.clone(),
            )
        };

        if props.contains_key(key) {
            return props.get(key);
        }
        if data.contains_key(key) {
            return data.get(key);
        }
        if let Some(watcher) = computed {
            return Some(watcher.value());
        }
        injected.get(key)
    }

    /// Write a reactive state field.
    pub fn set(&self, key: &str, value: Value) {
        let (props, data, is_computed, injected) = {
            let state = self.0.state.read();
            (
                state.props.clone(),
                state.data.clone(),
                state.computed.contains_key(key),
                state.injected.clone(),
            )
        };

        if data.contains_key(key) {
            data.set(key, value);
        } else if props.contains_key(key) {
            crate::debug::warn(
                format_args!(
                    "Avoid mutating a prop directly since the value will be overwritten \
                     whenever the parent component re-renders. Prop being mutated: \"{key}\""
                ),
                Some(self),
            );
            props.set(key, value);
        } else if is_computed {
            crate::debug::warn(
                format_args!("Computed property \"{key}\" was assigned to but it has no setter."),
                Some(self),
            );
        } else if injected.contains_key(key) {
            crate::debug::warn(
                format_args!("Avoid mutating an injected value directly. Injection being mutated: \"{key}\""),
                Some(self),
            );
            injected.set(key, value);
        } else {
            crate::debug::warn(format_args!("Property \"{key}\" is not defined on the instance."), Some(self));
        }
    }

    /// Call a method by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        let method = self.0.state.read().methods.get(name).cloned()?;
        Some(method(self, args))
    }

    /// The root data record.
    pub fn data(&self) -> Record {
        self.0.state.read().data.clone()
    }

    /// The props record.
    pub fn props(&self) -> Record {
        self.0.state.read().props.clone()
    }

    /// The watcher backing a computed property.
    pub fn computed_watcher(&self, key: &str) -> Option<Watcher> {
        self.0.state.read().computed.get(key).cloned()
    }

    /// Values this instance provides to its descendants.
    pub fn provided(&self) -> Option<Record> {
        self.0.provided.read().clone()
    }

    /// Resolve a component registered on this instance's options.
    pub fn resolve_component(&self, name: &str) -> Option<Definition> {
        match self.options().map("components")?.lookup(name)? {
            OptionValue::Component(component) => component.definition(),
            _ => None,
        }
    }

    /// Add an event listener.
    pub fn on<F>(&self, event: &str, listener: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_arc(event, Arc::new(listener));
    }

    pub(crate) fn on_arc(&self, event: &str, listener: Listener) {
        self.0
            .events
            .lock()
            .entry(event.to_owned())
            .or_default()
            .push(listener);
    }

    /// Invoke every listener for `event`; returns how many ran.
    pub fn emit(&self, event: &str, args: &[Value]) -> usize {
        let listeners = self.0.events.lock().get(event).cloned().unwrap_or_default();
        for listener in &listeners {
            listener(args);
        }
        listeners.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("uid", &self.uid())
            .field("name", &crate::debug::format_component_name(Some(self)))
            .field("children", &self.0.children.lock().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
