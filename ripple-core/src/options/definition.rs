//! Component Definitions
//!
//! A [`Definition`] is a component constructor: its declared options, a
//! link to the definition it extends, and the caches the resolver uses.
//! [`Definition::extend`] creates a subclass; the registration API
//! (`component`, `directive`, `filter`, `mixin`) replaces a definition's
//! options with a new `Arc`, which is what later resolutions detect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::merge::merge_options;
use super::resolve::resolve_constructor_options;
use super::{OptionValue, Options, ASSET_TYPES};
use crate::debug;

static NEXT_CID: AtomicU64 = AtomicU64::new(0);

struct DefinitionInner {
    cid: u64,
    super_def: Option<Definition>,
    /// Live effective options.
    options: RwLock<Arc<Options>>,
    /// Super options seen by the last resolution.
    super_options: RwLock<Option<Arc<Options>>>,
    /// Options declared by `extend`, plus late modifications.
    extend_options: RwLock<Arc<Options>>,
    /// Snapshot used to detect late modification of `options`.
    sealed_options: RwLock<Arc<Options>>,
}

/// A component constructor: an option set plus an optional super definition.
///
/// Cloning is cheap and preserves identity.
#[derive(Clone)]
pub struct Definition(Arc<DefinitionInner>);

/// Non-owning handle used for self-registration.
#[derive(Clone)]
pub struct WeakDefinition(Weak<DefinitionInner>);

impl WeakDefinition {
    pub fn upgrade(&self) -> Option<Definition> {
        self.0.upgrade().map(Definition)
    }
}

/// A registered component.
#[derive(Clone)]
pub enum ComponentRef {
    Definition(Definition),
    /// A definition registered into its own options. Held weakly so the
    /// definition does not keep itself alive.
    Recursive(WeakDefinition),
}

impl ComponentRef {
    pub fn definition(&self) -> Option<Definition> {
        match self {
            ComponentRef::Definition(def) => Some(def.clone()),
            ComponentRef::Recursive(weak) => weak.upgrade(),
        }
    }

    pub fn same(&self, other: &ComponentRef) -> bool {
        match (self.target(), other.target()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn target(&self) -> Option<*const DefinitionInner> {
        match self {
            ComponentRef::Definition(def) => Some(Arc::as_ptr(&def.0)),
            ComponentRef::Recursive(weak) => Some(weak.0.as_ptr()),
        }
    }
}

impl std::fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.definition() {
            Some(def) => write!(f, "Component({})", def.cid()),
            None => f.write_str("Component(dropped)"),
        }
    }
}

impl Definition {
    fn build(super_def: Option<Definition>, options: Arc<Options>, extend_options: Arc<Options>) -> Self {
        Self(Arc::new(DefinitionInner {
            cid: NEXT_CID.fetch_add(1, Ordering::Relaxed),
            super_def,
            super_options: RwLock::new(None),
            sealed_options: RwLock::new(options.clone()),
            options: RwLock::new(options),
            extend_options: RwLock::new(extend_options),
        }))
    }

    /// A new base definition with empty asset registries.
    pub fn root() -> Self {
        let mut options = Options::new();
        for kind in ASSET_TYPES {
            options.map_mut(&format!("{kind}s"));
        }
        let options = Arc::new(options);
        Self::build(None, options.clone(), options)
    }

    /// Create a sub-definition whose options are this definition's options
    /// merged with `extend_options`.
    pub fn extend(&self, extend_options: Options) -> Definition {
        let super_options = self.options();
        let name = extend_options.name().or_else(|| super_options.name());
        if let Some(name) = &name {
            if let Err(err) = debug::validate_component_name(name) {
                debug::warn(err, None);
            }
        }

        let sub = Self::build(
            Some(self.clone()),
            Arc::new(Options::new()),
            Arc::new(extend_options),
        );
        let mut options = merge_options(&super_options, &sub.extend_options(), None);
        if let Some(name) = &name {
            options.map_mut("components").insert(
                name.as_str(),
                OptionValue::Component(ComponentRef::Recursive(sub.downgrade())),
            );
        }

        let options = Arc::new(options);
        *sub.0.super_options.write() = Some(super_options);
        sub.store_resolved(options);
        tracing::debug!(cid = sub.cid(), super_cid = self.cid(), ?name, "extended definition");
        sub
    }

    pub fn cid(&self) -> u64 {
        self.0.cid
    }

    pub fn super_definition(&self) -> Option<&Definition> {
        self.0.super_def.as_ref()
    }

    /// The root of the inheritance chain.
    pub fn base(&self) -> Definition {
        let mut def = self;
        while let Some(parent) = def.super_definition() {
            def = parent;
        }
        def.clone()
    }

    /// The live options, without resolving against the super chain.
    pub fn options(&self) -> Arc<Options> {
        self.0.options.read().clone()
    }

    /// Resolve against the super chain; see [`resolve_constructor_options`].
    pub fn resolve_options(&self) -> Arc<Options> {
        resolve_constructor_options(self)
    }

    pub fn super_options(&self) -> Option<Arc<Options>> {
        self.0.super_options.read().clone()
    }

    pub fn extend_options(&self) -> Arc<Options> {
        self.0.extend_options.read().clone()
    }

    pub fn sealed_options(&self) -> Arc<Options> {
        self.0.sealed_options.read().clone()
    }

    /// Replace the live options with a modified copy.
    pub fn update_options(&self, f: impl FnOnce(&mut Options)) {
        let mut next = (*self.options()).clone();
        f(&mut next);
        *self.0.options.write() = Arc::new(next);
    }

    /// Register a component globally on this definition.
    pub fn component(&self, name: &str, definition: &Definition) -> &Self {
        if let Err(err) = debug::validate_component_name(name) {
            debug::warn(err, None);
        }
        self.register_asset("component", name, OptionValue::Component(ComponentRef::Definition(definition.clone())))
    }

    /// Extend the base definition with `options` and register the result.
    pub fn define_component(&self, name: &str, options: Options) -> Definition {
        let options = match options.name() {
            Some(_) => options,
            None => options.name_as(name),
        };
        let definition = self.base().extend(options);
        self.component(name, &definition);
        definition
    }

    pub fn get_component(&self, name: &str) -> Option<Definition> {
        match self.options().resolve_asset("component", name)? {
            OptionValue::Component(component) => component.definition(),
            _ => None,
        }
    }

    pub fn directive(&self, name: &str, directive: OptionValue) -> &Self {
        self.register_asset("directive", name, directive)
    }

    pub fn filter(&self, name: &str, filter: OptionValue) -> &Self {
        self.register_asset("filter", name, filter)
    }

    /// Merge `mixin` into this definition's options.
    ///
    /// Installs a new options object, so every sub-definition re-resolves on
    /// its next resolution.
    pub fn mixin(&self, mixin: Options) -> &Self {
        let merged = merge_options(&self.options(), &mixin, None);
        *self.0.options.write() = Arc::new(merged);
        self
    }

    pub fn ptr_eq(&self, other: &Definition) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakDefinition {
        WeakDefinition(Arc::downgrade(&self.0))
    }

    fn register_asset(&self, kind: &str, name: &str, value: OptionValue) -> &Self {
        self.update_options(|options| {
            options.map_mut(&format!("{kind}s")).insert(name, value);
        });
        tracing::debug!(cid = self.cid(), kind, name, "registered asset");
        self
    }

    pub(crate) fn set_super_options(&self, options: Arc<Options>) {
        *self.0.super_options.write() = Some(options);
    }

    pub(crate) fn update_extend_options(&self, f: impl FnOnce(&mut Options)) {
        let mut next = (*self.extend_options()).clone();
        f(&mut next);
        *self.0.extend_options.write() = Arc::new(next);
    }

    /// Install resolved options and seal them.
    pub(crate) fn store_resolved(&self, options: Arc<Options>) {
        *self.0.sealed_options.write() = options.clone();
        *self.0.options.write() = options;
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("cid", &self.cid())
            .field("name", &self.options().name())
            .field("super", &self.super_definition().map(Definition::cid))
            .finish()
    }
}
