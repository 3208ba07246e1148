//! Development diagnostics: warnings and component naming.

use std::fmt::Display;

use crate::config::config;
use crate::error::{Error, Result};
use crate::instance::Instance;

/// Tags that can never name a component.
const BUILTIN_TAGS: [&str; 2] = ["slot", "component"];

/// Emit a development warning, attributed to `vm` when given.
///
/// Does nothing outside dev mode or when the configuration is silent.
pub fn warn(message: impl Display, vm: Option<&Instance>) {
    let config = config();
    if !config.dev_mode || config.silent {
        return;
    }
    match vm {
        Some(vm) => tracing::warn!(component = %format_component_name(Some(vm)), "{message}"),
        None => tracing::warn!("{message}"),
    }
}

/// `<Root>`, `<Anonymous>`, or the classified component name in brackets.
pub fn format_component_name(vm: Option<&Instance>) -> String {
    let Some(vm) = vm else {
        return "<Anonymous>".to_owned();
    };
    if vm.is_root() {
        return "<Root>".to_owned();
    }
    let options = vm.options();
    match options.name().or_else(|| options.component_tag()) {
        Some(name) => format!("<{}>", classify(&name)),
        None => "<Anonymous>".to_owned(),
    }
}

/// `my-comp` / `my_comp` -> `MyComp`.
pub fn classify(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// Check that `name` can be used to register a component.
pub fn validate_component_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidComponentName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() => {}
        _ => return Err(invalid("must start with a letter")),
    }
    if !chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_')) {
        return Err(invalid("may only contain letters, digits, '-', '.' and '_'"));
    }

    let lower = name.to_ascii_lowercase();
    if BUILTIN_TAGS.contains(&lower.as_str()) || config().is_reserved_tag(name) {
        return Err(invalid("built-in or reserved tag"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_kebab_and_snake_case() {
        assert_eq!(classify("my-comp"), "MyComp");
        assert_eq!(classify("todo_item"), "TodoItem");
        assert_eq!(classify("App"), "App");
    }

    #[test]
    fn rejects_bad_component_names() {
        assert!(validate_component_name("todo-item").is_ok());
        assert!(validate_component_name("v1.card").is_ok());
        assert!(validate_component_name("1abc").is_err());
        assert!(validate_component_name("").is_err());
        assert!(validate_component_name("a b").is_err());
        assert!(validate_component_name("Slot").is_err());
        assert!(validate_component_name("component").is_err());
    }

    #[test]
    fn anonymous_without_instance() {
        assert_eq!(format_component_name(None), "<Anonymous>");
    }
}
