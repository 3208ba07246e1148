//! Option Merging
//!
//! [`merge_options`] combines a parent option map with a child option map,
//! field by field. Each field name selects a strategy:
//!
//! | Fields | Strategy |
//! |--------|----------|
//! | lifecycle hooks | concatenate, parent first, duplicates removed |
//! | `components`, `directives`, `filters` | union, child wins |
//! | `props`, `methods`, `inject`, `computed` | union, child wins |
//! | `watch` | per-key concatenation |
//! | `data`, `provide` | deferred factory merge |
//! | `el`, `propsData` | child wins, instance creation only |
//! | anything else | child wins |
//!
//! Custom strategies registered with [`register_strategy`] take precedence.
//! A strategy that fails falls back to child-wins with a warning.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::{DataFn, OptionValue, Options, LIFECYCLE_HOOKS};
use crate::debug;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::observer;
use crate::value::{Record, Value};

/// A field merge strategy: `(parent, child, instance, key)` to the merged
/// value, or `None` to leave the field out.
pub type Strategy = Arc<
    dyn Fn(Option<&OptionValue>, Option<&OptionValue>, Option<&Instance>, &str) -> Result<Option<OptionValue>>
        + Send
        + Sync,
>;

type BuiltinStrategy =
    fn(Option<&OptionValue>, Option<&OptionValue>, Option<&Instance>, &str) -> Result<Option<OptionValue>>;

static CUSTOM_STRATEGIES: OnceLock<RwLock<HashMap<String, Strategy>>> = OnceLock::new();

fn custom_strategies() -> &'static RwLock<HashMap<String, Strategy>> {
    CUSTOM_STRATEGIES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a merge strategy for a custom option field.
pub fn register_strategy<F>(key: &str, strategy: F)
where
    F: Fn(Option<&OptionValue>, Option<&OptionValue>, Option<&Instance>, &str) -> Result<Option<OptionValue>>
        + Send
        + Sync
        + 'static,
{
    custom_strategies()
        .write()
        .insert(key.to_owned(), Arc::new(strategy));
}

/// Merge `child` into `parent`.
///
/// `extends` and `mixins` on the child are applied to the parent first and
/// do not appear in the result. `vm` is the instance being created, if any.
pub fn merge_options(parent: &Options, child: &Options, vm: Option<&Instance>) -> Options {
    if let Some(components) = child.map("components") {
        check_components(components, vm);
    }

    let mut base: Option<Options> = None;
    if let Some(extends) = child.map("extends") {
        base = Some(merge_options(parent, extends, vm));
    }
    if let Some(OptionValue::Mixins(mixins)) = child.get("mixins") {
        for mixin in mixins.iter() {
            let merged = merge_options(base.as_ref().unwrap_or(parent), mixin, vm);
            base = Some(merged);
        }
    }
    let parent = base.as_ref().unwrap_or(parent);

    let mut out = Options::new();
    let keys = parent
        .keys()
        .chain(child.keys().filter(|k| !parent.contains_key(k)));
    for key in keys {
        if key == "extends" || key == "mixins" {
            continue;
        }
        if let Some(value) = merge_field(key, parent.get(key), child.get(key), vm) {
            out.insert(key.clone(), value);
        }
    }
    out
}

fn merge_field(
    key: &str,
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    vm: Option<&Instance>,
) -> Option<OptionValue> {
    // Clone out of the registry so no lock is held while the strategy runs.
    let custom = custom_strategies().read().get(key).cloned();
    let result = match custom {
        Some(strategy) => strategy(parent, child, vm, key),
        None => builtin_strategy(key)(parent, child, vm, key),
    };

    match result {
        Ok(value) => value,
        Err(err) => {
            debug::warn(format_args!("{err}; falling back to child value"), vm);
            child.or(parent).cloned()
        }
    }
}

fn builtin_strategy(key: &str) -> BuiltinStrategy {
    match key {
        _ if LIFECYCLE_HOOKS.contains(&key) => merge_hooks,
        "components" | "directives" | "filters" => merge_maps,
        "props" | "methods" | "inject" | "computed" => merge_maps,
        "watch" => merge_watch,
        "data" => merge_data_option,
        "provide" => merge_provide,
        "el" | "propsData" => merge_creation_only,
        _ => default_strategy,
    }
}

fn type_error(key: &str, expected: &'static str, found: &OptionValue) -> Error {
    Error::OptionType {
        key: key.to_owned(),
        expected,
        found: found.kind_name(),
    }
}

/// Child wins when present.
pub fn default_strategy(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    _vm: Option<&Instance>,
    _key: &str,
) -> Result<Option<OptionValue>> {
    Ok(child.or(parent).cloned())
}

fn merge_creation_only(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    vm: Option<&Instance>,
    key: &str,
) -> Result<Option<OptionValue>> {
    if vm.is_none() && child.is_some() {
        debug::warn(
            format_args!("option \"{key}\" can only be used during instance creation"),
            None,
        );
    }
    default_strategy(parent, child, vm, key)
}

/// Concatenate hook lists, parent first, dropping repeated hooks.
pub fn merge_hooks(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    _vm: Option<&Instance>,
    key: &str,
) -> Result<Option<OptionValue>> {
    let hooks_of = |value: Option<&OptionValue>| match value {
        None => Ok(None),
        Some(OptionValue::Hooks(hooks)) => Ok(Some(hooks.clone())),
        Some(other) => Err(type_error(key, "hooks", other)),
    };

    match (hooks_of(parent)?, hooks_of(child)?) {
        (None, None) => Ok(None),
        (Some(hooks), None) | (None, Some(hooks)) => Ok(Some(OptionValue::Hooks(hooks))),
        (Some(parent), Some(child)) => {
            let mut merged: SmallVec<[_; 2]> = SmallVec::with_capacity(parent.len() + child.len());
            for hook in parent.into_iter().chain(child) {
                if !merged.iter().any(|h| Arc::ptr_eq(h, &hook)) {
                    merged.push(hook);
                }
            }
            Ok(Some(OptionValue::Hooks(merged)))
        }
    }
}

/// Union of two maps, child entries winning on collision.
///
/// When only one side exists it is returned as-is, keeping its identity.
pub fn merge_maps(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    _vm: Option<&Instance>,
    key: &str,
) -> Result<Option<OptionValue>> {
    let map_of = |value: Option<&OptionValue>| match value {
        None => Ok(None),
        Some(OptionValue::Map(map)) => Ok(Some(map.clone())),
        Some(other) => Err(type_error(key, "map", other)),
    };

    match (map_of(parent)?, map_of(child)?) {
        (None, None) => Ok(None),
        (Some(map), None) | (None, Some(map)) => Ok(Some(OptionValue::Map(map))),
        (Some(parent), Some(child)) => {
            let mut merged = (*parent).clone();
            for (name, value) in child.iter() {
                merged.insert(name.clone(), value.clone());
            }
            Ok(Some(OptionValue::Map(Arc::new(merged))))
        }
    }
}

/// Watchers for the same path accumulate instead of overriding.
pub fn merge_watch(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    vm: Option<&Instance>,
    key: &str,
) -> Result<Option<OptionValue>> {
    let (Some(OptionValue::Map(parent)), Some(OptionValue::Map(child))) = (parent, child) else {
        return merge_maps(parent, child, vm, key);
    };

    let mut merged = (**parent).clone();
    for (path, handlers) in child.iter() {
        let combined = match (merged.get(path), handlers) {
            (Some(OptionValue::Watch(existing)), OptionValue::Watch(added)) => {
                OptionValue::Watch(existing.iter().chain(added).cloned().collect())
            }
            (_, OptionValue::Watch(_)) => handlers.clone(),
            (_, other) => return Err(type_error(key, "watch handlers", other)),
        };
        merged.insert(path.clone(), combined);
    }
    Ok(Some(OptionValue::Map(Arc::new(merged))))
}

fn merge_data_option(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    vm: Option<&Instance>,
    key: &str,
) -> Result<Option<OptionValue>> {
    if vm.is_none() {
        if let Some(child) = child {
            if !matches!(child, OptionValue::Data(_)) {
                debug::warn(
                    "The \"data\" option should be a function that returns a per-instance \
                     value in component definitions.",
                    None,
                );
                return Ok(parent.cloned());
            }
        }
    }
    merge_data_or_fn(parent, child, key)
}

fn merge_provide(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    _vm: Option<&Instance>,
    key: &str,
) -> Result<Option<OptionValue>> {
    merge_data_or_fn(parent, child, key)
}

/// Both sides become factories; the merged factory runs both per instance
/// and merges the child's record over the parent's.
fn merge_data_or_fn(
    parent: Option<&OptionValue>,
    child: Option<&OptionValue>,
    key: &str,
) -> Result<Option<OptionValue>> {
    match (parent, child) {
        (None, None) => Ok(None),
        (Some(only), None) | (None, Some(only)) => as_factory(only, key).map(|f| Some(OptionValue::Data(f))),
        (Some(parent), Some(child)) => {
            let parent = as_factory(parent, key)?;
            let child = as_factory(child, key)?;
            let merged: DataFn = Arc::new(move |vm: &Instance| merge_data(child(vm), &parent(vm)));
            Ok(Some(OptionValue::Data(merged)))
        }
    }
}

fn as_factory(value: &OptionValue, key: &str) -> Result<DataFn> {
    match value {
        OptionValue::Data(factory) => Ok(factory.clone()),
        OptionValue::Value(Value::Record(record)) => {
            let record = record.clone();
            Ok(Arc::new(move |_: &Instance| record.clone()))
        }
        other => Err(type_error(key, "data factory or record", other)),
    }
}

/// Copy fields of `from` missing in `to`, recursing into nested records.
pub fn merge_data(to: Record, from: &Record) -> Record {
    for (key, from_value) in from.entries() {
        match to.get_untracked(&key) {
            None => observer::set(&to, &key, from_value),
            Some(Value::Record(to_inner)) => {
                if let Value::Record(from_inner) = &from_value {
                    if !to_inner.ptr_eq(from_inner) {
                        merge_data(to_inner, from_inner);
                    }
                }
            }
            Some(_) => {}
        }
    }
    to
}

fn check_components(components: &Options, vm: Option<&Instance>) {
    for name in components.keys() {
        if let Err(err) = debug::validate_component_name(name) {
            debug::warn(err, vm);
        }
    }
}
