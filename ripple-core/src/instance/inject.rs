//! Provide / Inject
//!
//! An instance's `inject` keys are looked up along its ancestors' provided
//! records, starting at the parent. Injected values are defined reactively
//! on the instance before its state is built; its own `provide` runs after.

use indexmap::IndexMap;

use super::Instance;
use crate::debug;
use crate::options::OptionValue;
use crate::reactive::ReactiveContext;
use crate::value::{Record, Value};

/// Look up every declared injection on `vm`'s ancestors.
///
/// Each key is searched from the nearest ancestor outward; a key nobody
/// provides takes its default, or is skipped with a warning.
pub fn resolve_inject(vm: &Instance) -> IndexMap<String, Value> {
    let mut result = IndexMap::new();
    let Some(inject) = vm.options().map("inject") else {
        return result;
    };

    for (key, declaration) in inject.iter() {
        let OptionValue::Inject(declaration) = declaration else {
            debug::warn(
                format_args!("Invalid injection declaration for \"{key}\"."),
                Some(vm),
            );
            continue;
        };

        let mut source = vm.parent();
        let mut found = None;
        while let Some(ancestor) = source {
            if let Some(provided) = ancestor.provided() {
                if let Some(value) = provided.get_untracked(&declaration.from) {
                    found = Some(value);
                    break;
                }
            }
            source = ancestor.parent();
        }

        match found.or_else(|| declaration.default.clone()) {
            Some(value) => {
                result.insert(key.clone(), value);
            }
            None => debug::warn(format_args!("Injection \"{key}\" not found"), Some(vm)),
        }
    }
    result
}

/// Expose resolved injections as reactive fields on `vm`.
pub fn init_injections(vm: &Instance) {
    let resolved = resolve_inject(vm);
    if resolved.is_empty() {
        return;
    }

    let injected = Record::new();
    for (key, value) in resolved {
        injected.define_reactive(&key, value);
    }
    tracing::trace!(uid = vm.uid(), count = injected.len(), "injections resolved");
    vm.0.state.write().injected = injected;
}

/// Evaluate the `provide` option. Runs after state, so the factory can read
/// the instance's data.
pub fn init_provide(vm: &Instance) {
    let provided = match vm.options().get("provide") {
        None => return,
        Some(OptionValue::Data(factory)) => {
            let _untracked = ReactiveContext::untracked();
            factory(vm)
        }
        Some(OptionValue::Value(Value::Record(record))) => record.clone(),
        Some(other) => {
            debug::warn(
                format_args!("The \"provide\" option must be a record or factory, found {}.", other.kind_name()),
                Some(vm),
            );
            return;
        }
    };
    *vm.0.provided.write() = Some(provided);
}
