//! Configuration Resolver
//!
//! Resolution walks the definition chain to the root and merges each
//! definition's declared options over its super's resolved options. The
//! result is cached per definition, keyed by the identity of the super
//! options it was computed from: as long as the super chain hands back the
//! same `Arc`, resolution costs one pointer comparison per level.
//!
//! When the super options did change, the definition is re-merged. Options
//! attached to the definition after it was created (late registrations)
//! are detected by comparing the live options with the sealed snapshot and
//! carried into the new result.

use std::sync::Arc;

use super::definition::{ComponentRef, Definition};
use super::merge::merge_options;
use super::{OptionValue, Options};

/// Resolve the effective options of `definition`.
pub fn resolve_constructor_options(definition: &Definition) -> Arc<Options> {
    let options = definition.options();
    let Some(super_def) = definition.super_definition() else {
        return options;
    };

    let super_options = resolve_constructor_options(super_def);
    let cached = definition.super_options();
    if cached.is_some_and(|cached| Arc::ptr_eq(&cached, &super_options)) {
        tracing::trace!(cid = definition.cid(), "resolution cache hit");
        return options;
    }

    tracing::debug!(cid = definition.cid(), "super options changed, re-resolving");
    definition.set_super_options(super_options.clone());

    if let Some(modified) = resolve_modified_options(definition) {
        tracing::debug!(
            cid = definition.cid(),
            fields = modified.len(),
            "carrying late-modified options"
        );
        definition.update_extend_options(|extend| {
            for (key, value) in modified.iter() {
                extend.insert(key.clone(), value.clone());
            }
        });
    }

    let mut merged = merge_options(&super_options, &definition.extend_options(), None);
    if let Some(name) = merged.name() {
        merged.map_mut("components").insert(
            name,
            OptionValue::Component(ComponentRef::Recursive(definition.downgrade())),
        );
    }

    let merged = Arc::new(merged);
    definition.store_resolved(merged.clone());
    merged
}

/// Fields of the live options that are missing from, or differ from, the
/// sealed snapshot.
pub fn resolve_modified_options(definition: &Definition) -> Option<Options> {
    let latest = definition.options();
    let sealed = definition.sealed_options();
    if Arc::ptr_eq(&latest, &sealed) {
        return None;
    }

    let mut modified = Options::new();
    for (key, value) in latest.iter() {
        let unchanged = sealed.get(key).is_some_and(|old| old.same(value));
        if !unchanged {
            modified.insert(key.clone(), value.clone());
        }
    }
    (!modified.is_empty()).then_some(modified)
}
