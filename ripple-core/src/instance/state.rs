//! Instance State
//!
//! Builds the reactive state of an instance from its settled options:
//! props from the parent's data, methods, the observed data record, lazy
//! computed watchers and user watchers on dot paths.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{Instance, WeakInstance};
use crate::debug;
use crate::observer::observe_root;
use crate::options::{OptionValue, WatchHandler};
use crate::reactive::{ReactiveContext, Watcher};
use crate::value::{Record, Value};

/// Build props, methods, data, computed and watchers, in that order.
pub(crate) fn init_state(vm: &Instance) {
    init_props(vm);
    init_methods(vm);
    init_data(vm);
    init_computed(vm);
    init_watch(vm);
}

fn init_props(vm: &Instance) {
    let Some(declared) = vm.options().map("props").cloned() else {
        return;
    };
    let props_data = vm.options().props_data();
    let props = Record::new();

    for (key, declaration) in declared.iter() {
        let OptionValue::Prop(prop) = declaration else {
            continue;
        };
        let passed = props_data.as_ref().and_then(|data| data.get_untracked(key));
        if passed.is_none() && prop.required {
            debug::warn(format_args!("Missing required prop: \"{key}\""), Some(vm));
        }
        let value = passed
            .or_else(|| prop.default.clone())
            .unwrap_or_default();
        props.define_reactive(key, value);
    }
    vm.0.state.write().props = props;
}

fn init_methods(vm: &Instance) {
    let Some(declared) = vm.options().map("methods").cloned() else {
        return;
    };
    let props = vm.props();
    let mut methods = IndexMap::new();

    for (key, value) in declared.iter() {
        let OptionValue::Method(method) = value else {
            debug::warn(
                format_args!(
                    "Method \"{key}\" has type \"{}\" in the component definition.",
                    value.kind_name()
                ),
                Some(vm),
            );
            continue;
        };
        if props.contains_key(key) {
            debug::warn(
                format_args!("Method \"{key}\" has already been defined as a prop."),
                Some(vm),
            );
        }
        methods.insert(key.clone(), method.clone());
    }
    vm.0.state.write().methods = methods;
}

fn init_data(vm: &Instance) {
    let data = match vm.options().get("data") {
        None => Record::new(),
        Some(OptionValue::Data(factory)) => {
            let _untracked = ReactiveContext::untracked();
            factory(vm)
        }
        Some(OptionValue::Value(Value::Record(record))) => record.clone(),
        Some(other) => {
            debug::warn(
                format_args!("data functions should return a record, found {}.", other.kind_name()),
                Some(vm),
            );
            Record::new()
        }
    };

    {
        let state = vm.0.state.read();
        for key in data.keys() {
            if state.methods.contains_key(&key) {
                debug::warn(
                    format_args!("Method \"{key}\" has already been defined as a data property."),
                    Some(vm),
                );
            }
            if state.props.contains_key(&key) {
                debug::warn(
                    format_args!(
                        "The data property \"{key}\" is already declared as a prop. \
                         Use prop default value instead."
                    ),
                    Some(vm),
                );
            }
        }
    }

    observe_root(&data);
    vm.0.state.write().data = data;
}

fn init_computed(vm: &Instance) {
    let Some(declared) = vm.options().map("computed").cloned() else {
        return;
    };
    let mut computed = IndexMap::new();

    for (key, value) in declared.iter() {
        let OptionValue::Computed(getter) = value else {
            debug::warn(format_args!("Getter is missing for computed property \"{key}\"."), Some(vm));
            continue;
        };
        {
            let state = vm.0.state.read();
            if state.data.contains_key(key) {
                debug::warn(
                    format_args!("The computed property \"{key}\" is already defined in data."),
                    Some(vm),
                );
                continue;
            }
            if state.props.contains_key(key) {
                debug::warn(
                    format_args!("The computed property \"{key}\" is already defined as a prop."),
                    Some(vm),
                );
                continue;
            }
        }

        let weak = vm.downgrade();
        let getter = getter.clone();
        let watcher = Watcher::lazy(move || match weak.upgrade() {
            Some(vm) => getter(&vm),
            None => Value::Null,
        });
        computed.insert(key.clone(), watcher);
    }
    vm.0.state.write().computed = computed;
}

fn init_watch(vm: &Instance) {
    let Some(declared) = vm.options().map("watch").cloned() else {
        return;
    };
    for (path, handlers) in declared.iter() {
        let OptionValue::Watch(handlers) = handlers else {
            continue;
        };
        for handler in handlers {
            vm.watch_arc(path, handler.clone());
        }
    }
}

/// Split a dot path into segments; `None` if any segment is not a plain
/// identifier.
fn parse_path(path: &str) -> Option<Vec<String>> {
    let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
    let valid = segments.iter().all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    });
    valid.then_some(segments)
}

fn read_path(vm: &WeakInstance, segments: &[String]) -> Value {
    let Some(vm) = vm.upgrade() else {
        return Value::Null;
    };
    let Some((first, rest)) = segments.split_first() else {
        return Value::Null;
    };
    let mut value = vm.get(first).unwrap_or_default();
    for segment in rest {
        value = match &value {
            Value::Record(record) => record.get(segment).unwrap_or_default(),
            Value::List(list) => {
                list.track();
                segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| list.get(index))
                    .unwrap_or_default()
            }
            _ => return Value::Null,
        };
    }
    value
}

impl Instance {
    /// Watch a dot path on this instance's state.
    ///
    /// `handler` runs with `(instance, new, old)` whenever the value at
    /// `path` changes. The watcher is torn down with the instance.
    pub fn watch<F>(&self, path: &str, handler: F) -> Watcher
    where
        F: Fn(&Instance, &Value, &Value) + Send + Sync + 'static,
    {
        self.watch_arc(path, Arc::new(handler))
    }

    fn watch_arc(&self, path: &str, handler: WatchHandler) -> Watcher {
        let segments = match parse_path(path) {
            Some(segments) => segments,
            None => {
                debug::warn(
                    format_args!(
                        "Failed watching path: \"{path}\". Watcher only accepts simple dot-delimited paths."
                    ),
                    Some(self),
                );
                Vec::new()
            }
        };

        let getter_vm = self.downgrade();
        let callback_vm = self.downgrade();
        let watcher = Watcher::with_callback(
            move || read_path(&getter_vm, &segments),
            move |new, old| {
                if let Some(vm) = callback_vm.upgrade() {
                    handler(&vm, new, old);
                }
            },
        );
        self.0.watchers.lock().push(watcher.clone());
        watcher
    }
}
