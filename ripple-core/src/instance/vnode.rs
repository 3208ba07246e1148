//! Virtual nodes, as far as instance creation sees them.

use std::fmt;

use crate::options::{Definition, Listeners};
use crate::value::Record;

/// A node produced by a render function.
#[derive(Clone, Default)]
pub struct VNode {
    pub tag: Option<String>,
    pub text: Option<String>,
    pub children: Vec<VNode>,
    /// Present on placeholder nodes for child components.
    pub component_options: Option<VNodeComponentOptions>,
}

/// What a parent passes to a child component through its placeholder node.
#[derive(Clone, Default)]
pub struct VNodeComponentOptions {
    pub definition: Option<Definition>,
    pub props_data: Option<Record>,
    pub listeners: Listeners,
    pub children: Vec<VNode>,
    pub tag: Option<String>,
}

impl VNode {
    pub fn element(tag: &str, children: Vec<VNode>) -> Self {
        Self {
            tag: Some(tag.to_owned()),
            children,
            ..Self::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_owned()),
            ..Self::default()
        }
    }

    /// A placeholder node for a child component.
    pub fn component(tag: &str, options: VNodeComponentOptions) -> Self {
        Self {
            tag: Some(tag.to_owned()),
            component_options: Some(VNodeComponentOptions {
                tag: options.tag.or_else(|| Some(tag.to_owned())),
                ..options
            }),
            ..Self::default()
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("tag", &self.tag)
            .field("text", &self.text)
            .field("children", &self.children)
            .field("component_options", &self.component_options)
            .finish()
    }
}

impl fmt::Debug for VNodeComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNodeComponentOptions")
            .field("definition", &self.definition)
            .field("props_data", &self.props_data)
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .field("children", &self.children.len())
            .field("tag", &self.tag)
            .finish()
    }
}
