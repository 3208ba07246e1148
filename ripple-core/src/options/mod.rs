//! Component Configuration
//!
//! A component is described by an [`Options`] map: option name to
//! [`OptionValue`]. Options are merged field by field (see [`merge`]) along
//! the definition inheritance chain, and the result is cached per
//! [`Definition`] (see [`resolve`]).
//!
//! Resolved options are immutable and shared as `Arc<Options>`. Changing a
//! definition's options always installs a new `Arc`, so identity comparison
//! is enough to tell whether anything changed.

mod definition;
pub mod merge;
pub mod resolve;

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::instance::{Instance, VNode};
use crate::value::{Record, Value};

pub use definition::{ComponentRef, Definition, WeakDefinition};
pub use merge::{merge_options, register_strategy, Strategy};
pub use resolve::resolve_constructor_options;

/// A method: called with the instance and the call arguments.
pub type Method = Arc<dyn Fn(&Instance, &[Value]) -> Value + Send + Sync>;

/// A lifecycle hook.
pub type Hook = Arc<dyn Fn(&Instance) + Send + Sync>;

/// A `data` or `provide` factory, called once per instance.
pub type DataFn = Arc<dyn Fn(&Instance) -> Record + Send + Sync>;

/// A computed getter.
pub type ComputedFn = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

/// A watch handler, called with `(instance, new, old)`.
pub type WatchHandler = Arc<dyn Fn(&Instance, &Value, &Value) + Send + Sync>;

/// A render function. Carried through options, never invoked here.
pub type RenderFn = Arc<dyn Fn(&Instance) -> VNode + Send + Sync>;

/// An event listener.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Event name to listener.
pub type Listeners = IndexMap<String, Listener>;

/// Hooks merged by concatenation, parent first.
pub const LIFECYCLE_HOOKS: [&str; 12] = [
    "beforeCreate",
    "created",
    "beforeMount",
    "mounted",
    "beforeUpdate",
    "updated",
    "beforeDestroy",
    "destroyed",
    "activated",
    "deactivated",
    "errorCaptured",
    "serverPrefetch",
];

/// Singular asset kinds; the registries are the plural option names.
pub const ASSET_TYPES: [&str; 3] = ["component", "directive", "filter"];

/// Declaration of one prop.
#[derive(Clone, Default)]
pub struct PropOptions {
    pub default: Option<Value>,
    pub required: bool,
}

/// Declaration of one injected key.
#[derive(Clone)]
pub struct InjectOptions {
    /// Provided key to look up.
    pub from: String,
    pub default: Option<Value>,
}

/// The value of one option field.
#[derive(Clone)]
pub enum OptionValue {
    /// Plain data: `name`, `el`, `propsData`, `abstract`, a directive...
    Value(Value),
    /// `data` or `provide` factory.
    Data(DataFn),
    /// A lifecycle hook list.
    Hooks(SmallVec<[Hook; 2]>),
    /// A nested map: a registry, `props`, `methods`, `computed`, `watch`,
    /// `inject`, or `extends`.
    Map(Arc<Options>),
    Method(Method),
    Computed(ComputedFn),
    Watch(Vec<WatchHandler>),
    Prop(PropOptions),
    Inject(InjectOptions),
    Component(ComponentRef),
    Render(RenderFn),
    StaticRenderFns(Arc<[RenderFn]>),
    Mixins(Arc<[Arc<Options>]>),
}

impl OptionValue {
    /// Identity comparison, used to detect late modification.
    pub fn same(&self, other: &OptionValue) -> bool {
        use OptionValue::*;
        match (self, other) {
            (Value(a), Value(b)) => a.same(b),
            (Data(a), Data(b)) => Arc::ptr_eq(a, b),
            (Hooks(a), Hooks(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            (Map(a), Map(b)) => Arc::ptr_eq(a, b),
            (Method(a), Method(b)) => Arc::ptr_eq(a, b),
            (Computed(a), Computed(b)) => Arc::ptr_eq(a, b),
            (Watch(a), Watch(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            (Prop(a), Prop(b)) => {
                a.required == b.required
                    && match (&a.default, &b.default) {
                        (Some(x), Some(y)) => x.same(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (Inject(a), Inject(b)) => {
                a.from == b.from
                    && match (&a.default, &b.default) {
                        (Some(x), Some(y)) => x.same(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (Component(a), Component(b)) => a.same(b),
            (Render(a), Render(b)) => Arc::ptr_eq(a, b),
            (StaticRenderFns(a), StaticRenderFns(b)) => Arc::ptr_eq(a, b),
            (Mixins(a), Mixins(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::Value(_) => "value",
            OptionValue::Data(_) => "data factory",
            OptionValue::Hooks(_) => "hooks",
            OptionValue::Map(_) => "map",
            OptionValue::Method(_) => "method",
            OptionValue::Computed(_) => "computed",
            OptionValue::Watch(_) => "watch handlers",
            OptionValue::Prop(_) => "prop",
            OptionValue::Inject(_) => "inject",
            OptionValue::Component(_) => "component",
            OptionValue::Render(_) => "render function",
            OptionValue::StaticRenderFns(_) => "static render functions",
            OptionValue::Mixins(_) => "mixins",
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            OptionValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Arc<Options>> {
        match self {
            OptionValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl std::fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Value(v) => write!(f, "Value({v:?})"),
            OptionValue::Map(m) => write!(f, "Map({m:?})"),
            OptionValue::Hooks(h) => write!(f, "Hooks({})", h.len()),
            OptionValue::Watch(w) => write!(f, "Watch({})", w.len()),
            OptionValue::Component(c) => write!(f, "{c:?}"),
            other => f.write_str(other.kind_name()),
        }
    }
}

/// An ordered option map.
#[derive(Clone, Default)]
pub struct Options(IndexMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue) -> Option<OptionValue> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The declared component name.
    pub fn name(&self) -> Option<String> {
        self.get("name")
            .and_then(OptionValue::as_value)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// A nested map option such as `methods` or `components`.
    pub fn map(&self, key: &str) -> Option<&Arc<Options>> {
        self.get(key).and_then(OptionValue::as_map)
    }

    /// The hook list for a lifecycle hook; empty if none.
    pub fn hooks(&self, hook: &str) -> &[Hook] {
        match self.get(hook) {
            Some(OptionValue::Hooks(hooks)) => hooks,
            _ => &[],
        }
    }

    /// Mutable access to a nested map, created if missing.
    ///
    /// Shared maps are cloned before mutation, so other holders of the same
    /// `Arc` never observe the change.
    pub fn map_mut(&mut self, key: &str) -> &mut Options {
        let slot = self
            .0
            .entry(key.to_owned())
            .or_insert_with(|| OptionValue::Map(Arc::default()));
        loop {
            if let OptionValue::Map(map) = slot {
                return Arc::make_mut(map);
            }
            *slot = OptionValue::Map(Arc::default());
        }
    }

    /// Look up an asset by id, then camelized id, then PascalCase id.
    pub fn resolve_asset(&self, kind: &str, id: &str) -> Option<&OptionValue> {
        self.map(&format!("{kind}s"))?.lookup(id)
    }

    /// Registry lookup with the same case variants as [`Options::resolve_asset`].
    pub fn lookup(&self, id: &str) -> Option<&OptionValue> {
        if let Some(found) = self.get(id) {
            return Some(found);
        }
        let camel = camelize(id);
        if let Some(found) = self.get(&camel) {
            return Some(found);
        }
        self.get(&capitalize(&camel))
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn with(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn name_as(self, name: &str) -> Self {
        self.with("name", OptionValue::Value(Value::from(name)))
    }

    pub fn data<F>(self, factory: F) -> Self
    where
        F: Fn(&Instance) -> Record + Send + Sync + 'static,
    {
        self.with("data", OptionValue::Data(Arc::new(factory)))
    }

    /// Plain data object. Only valid for root instances.
    pub fn data_object(self, data: Record) -> Self {
        self.with("data", OptionValue::Value(Value::Record(data)))
    }

    pub fn method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.map_mut("methods")
            .insert(name, OptionValue::Method(Arc::new(method)));
        self
    }

    pub fn computed<F>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&Instance) -> Value + Send + Sync + 'static,
    {
        self.map_mut("computed")
            .insert(name, OptionValue::Computed(Arc::new(getter)));
        self
    }

    pub fn watch<F>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(&Instance, &Value, &Value) + Send + Sync + 'static,
    {
        let handler: WatchHandler = Arc::new(handler);
        let watch = self.map_mut("watch");
        match watch.0.get_mut(path) {
            Some(OptionValue::Watch(handlers)) => handlers.push(handler),
            _ => {
                watch.insert(path, OptionValue::Watch(vec![handler]));
            }
        }
        self
    }

    pub fn hook<F>(self, hook: &str, f: F) -> Self
    where
        F: Fn(&Instance) + Send + Sync + 'static,
    {
        self.hook_arc(hook, Arc::new(f))
    }

    /// Append an existing hook, keeping its identity.
    pub fn hook_arc(mut self, hook: &str, f: Hook) -> Self {
        match self.0.get_mut(hook) {
            Some(OptionValue::Hooks(hooks)) => hooks.push(f),
            _ => {
                let mut hooks = SmallVec::new();
                hooks.push(f);
                self.insert(hook, OptionValue::Hooks(hooks));
            }
        }
        self
    }

    pub fn prop(mut self, name: &str, prop: PropOptions) -> Self {
        self.map_mut("props").insert(name, OptionValue::Prop(prop));
        self
    }

    /// Inject `key`, looked up under `from` (or `key` itself).
    pub fn inject(mut self, key: &str, from: Option<&str>, default: Option<Value>) -> Self {
        let inject = InjectOptions {
            from: from.unwrap_or(key).to_owned(),
            default,
        };
        self.map_mut("inject").insert(key, OptionValue::Inject(inject));
        self
    }

    pub fn provide<F>(self, factory: F) -> Self
    where
        F: Fn(&Instance) -> Record + Send + Sync + 'static,
    {
        self.with("provide", OptionValue::Data(Arc::new(factory)))
    }

    pub fn component(mut self, name: &str, definition: &Definition) -> Self {
        self.map_mut("components").insert(
            name,
            OptionValue::Component(ComponentRef::Definition(definition.clone())),
        );
        self
    }

    pub fn render<F>(self, render: F) -> Self
    where
        F: Fn(&Instance) -> VNode + Send + Sync + 'static,
    {
        self.with("render", OptionValue::Render(Arc::new(render)))
    }

    pub fn extends(self, base: Options) -> Self {
        self.with("extends", OptionValue::Map(Arc::new(base)))
    }

    pub fn mixins(self, mixins: Vec<Options>) -> Self {
        let mixins: Arc<[Arc<Options>]> = mixins.into_iter().map(Arc::new).collect();
        self.with("mixins", OptionValue::Mixins(mixins))
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

/// `todo-item` -> `todoItem`.
pub(crate) fn camelize(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut upper = false;
    for c in id.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_nested_maps() {
        let options = Options::new()
            .name_as("todo")
            .method("a", |_, _| Value::Null)
            .method("b", |_, _| Value::Null)
            .watch("x", |_, _, _| {})
            .watch("x", |_, _, _| {});

        assert_eq!(options.name().as_deref(), Some("todo"));
        assert_eq!(options.map("methods").unwrap().len(), 2);
        match options.map("watch").unwrap().get("x") {
            Some(OptionValue::Watch(handlers)) => assert_eq!(handlers.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn map_mut_does_not_touch_shared_maps() {
        let shared = Options::new().method("a", |_, _| Value::Null);
        let mut copy = shared.clone();
        copy.map_mut("methods")
            .insert("b", OptionValue::Value(Value::Null));

        assert_eq!(shared.map("methods").unwrap().len(), 1);
        assert_eq!(copy.map("methods").unwrap().len(), 2);
    }

    #[test]
    fn map_mut_replaces_non_map_values() {
        let mut options = Options::new().with("methods", OptionValue::Value(Value::Null));
        options
            .map_mut("methods")
            .insert("a", OptionValue::Value(Value::from(1)));
        assert_eq!(options.map("methods").map(|m| m.len()), Some(1));
    }

    #[test]
    fn same_compares_by_identity() {
        let hook: Hook = Arc::new(|_| {});
        let a = Options::new().hook_arc("created", hook.clone());
        let b = Options::new().hook_arc("created", hook);
        let c = Options::new().hook("created", |_| {});

        assert!(a.get("created").unwrap().same(b.get("created").unwrap()));
        assert!(!a.get("created").unwrap().same(c.get("created").unwrap()));
    }

    #[test]
    fn assets_resolve_through_case_variants() {
        let mut options = Options::new();
        options
            .map_mut("directives")
            .insert("FocusTrap", OptionValue::Value(Value::from("trap")));

        assert!(options.resolve_asset("directive", "focus-trap").is_some());
        assert!(options.resolve_asset("directive", "FocusTrap").is_some());
        assert!(options.resolve_asset("directive", "other").is_none());
    }

    #[test]
    fn camelize_handles_dashes() {
        assert_eq!(camelize("todo-list-item"), "todoListItem");
        assert_eq!(capitalize("todoList"), "TodoList");
    }
}
