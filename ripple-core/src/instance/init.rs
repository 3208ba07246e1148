//! Instance Initialization
//!
//! Creation takes one of two paths:
//!
//! - A root instance resolves its definition's options and merges the
//!   caller's options over them.
//! - A child created from a vnode takes the fast path: the resolved options
//!   are taken as-is and the per-instance fields are copied off the vnode,
//!   with no merge and no resolution.
//!
//! Both paths then run the same fixed initialization sequence.

use std::sync::Arc;

use super::{inject, lifecycle, state, Instance, InstanceOptions, VNode};
use crate::config::config;
use crate::debug;
use crate::options::{merge_options, Definition, OptionValue, Options, RenderFn};

/// How an instance is being created.
pub enum CreateOptions {
    /// A root or standalone instance with caller-supplied options.
    Root(Options),
    /// A child instance created by the renderer for a placeholder vnode.
    Component(InternalComponentOptions),
}

impl From<Options> for CreateOptions {
    fn from(options: Options) -> Self {
        CreateOptions::Root(options)
    }
}

/// Options the renderer passes when instantiating a child component.
pub struct InternalComponentOptions {
    pub parent: Option<Instance>,
    pub parent_vnode: VNode,
    pub render: Option<RenderFn>,
    pub static_render_fns: Option<Arc<[RenderFn]>>,
}

impl InternalComponentOptions {
    pub fn new(parent: &Instance, parent_vnode: VNode) -> Self {
        Self {
            parent: Some(parent.clone()),
            parent_vnode,
            render: None,
            static_render_fns: None,
        }
    }
}

impl Instance {
    /// Create and initialize an instance of `definition`.
    pub fn new(definition: &Definition, create: impl Into<CreateOptions>) -> Instance {
        let vm = Instance::alloc(definition);

        let options = match create.into() {
            CreateOptions::Component(internal) => init_internal_component(definition, internal),
            CreateOptions::Root(options) => {
                let resolved = definition.resolve_options();
                InstanceOptions::merged(merge_options(&resolved, &options, Some(&vm)))
            }
        };
        // The slot is empty until here; nothing else writes it.
        let _ = vm.0.options.set(options);

        let _span = config().performance.then(|| {
            tracing::info_span!(
                "init",
                uid = vm.uid(),
                component = %debug::format_component_name(Some(&vm))
            )
            .entered()
        });

        lifecycle::init_lifecycle(&vm);
        lifecycle::init_events(&vm);
        lifecycle::call_hook(&vm, "beforeCreate");
        inject::init_injections(&vm);
        state::init_state(&vm);
        inject::init_provide(&vm);
        lifecycle::call_hook(&vm, "created");

        tracing::debug!(uid = vm.uid(), cid = definition.cid(), "instance created");
        vm
    }
}

/// Build child instance options without resolution or merging.
///
/// The options read through to the definition's current options; the
/// fields below are copied from the placeholder vnode.
pub fn init_internal_component(definition: &Definition, internal: InternalComponentOptions) -> InstanceOptions {
    let mut opts = InstanceOptions::derived(definition.options());
    opts.parent = internal.parent.as_ref().map(Instance::downgrade);

    match &internal.parent_vnode.component_options {
        Some(component) => {
            opts.props_data = component.props_data.clone();
            opts.parent_listeners = Some(component.listeners.clone());
            opts.render_children = component.children.clone();
            opts.component_tag = component.tag.clone();
        }
        None => debug::warn(
            "Child instance created from a vnode without component options.",
            internal.parent.as_ref(),
        ),
    }
    opts.parent_vnode = Some(internal.parent_vnode);

    if let Some(render) = internal.render {
        opts.own.insert("render", OptionValue::Render(render));
        if let Some(static_fns) = internal.static_render_fns {
            opts.own
                .insert("staticRenderFns", OptionValue::StaticRenderFns(static_fns));
        }
    }
    opts
}
