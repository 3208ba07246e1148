//! Integration Tests for Option Resolution and Instance Creation

use std::sync::Arc;

use parking_lot::Mutex;
use ripple_core::instance::{CreateOptions, InternalComponentOptions};
use ripple_core::options::{resolve_constructor_options, PropOptions};
use ripple_core::reactive::Watcher;
use ripple_core::{Definition, Instance, Options, Record, VNode, VNodeComponentOptions, Value};
use serde_json::json;

fn record(doc: serde_json::Value) -> Record {
    Value::from(doc).as_record().cloned().unwrap()
}

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Test that resolution is cached until the super options are replaced.
#[test]
fn resolution_is_cached_per_super_identity() {
    let root = Definition::root();
    let sub = root.extend(Options::new().name_as("sub").method("own", |_, _| Value::Null));

    let first = resolve_constructor_options(&sub);
    let second = resolve_constructor_options(&sub);
    assert!(Arc::ptr_eq(&first, &second));

    root.mixin(Options::new().hook("created", |_| {}));
    let third = resolve_constructor_options(&sub);
    assert!(!Arc::ptr_eq(&second, &third));
    assert_eq!(third.hooks("created").len(), 1);
    assert!(third.map("methods").unwrap().contains_key("own"));

    let fourth = resolve_constructor_options(&sub);
    assert!(Arc::ptr_eq(&third, &fourth));
}

/// Test that a component registered on a subclass after creation survives
/// re-resolution triggered by a change further up the chain.
#[test]
fn late_registration_survives_super_change() {
    let root = Definition::root();
    let sub = root.extend(Options::new().name_as("panel"));
    let late = root.extend(Options::new().name_as("late-widget"));
    sub.component("late-widget", &late);

    root.mixin(Options::new());
    let vm = Instance::new(&sub, Options::new());

    assert!(vm.resolve_component("late-widget").unwrap().ptr_eq(&late));
    assert!(vm.resolve_component("panel").unwrap().ptr_eq(&sub));
}

/// Test that the child's methods win over the base's, and base-only
/// methods survive.
#[test]
fn child_methods_take_precedence() {
    let root = Definition::root();
    let base = root.extend(
        Options::new()
            .method("greet", |_, _| Value::from("base"))
            .method("farewell", |_, _| Value::from("bye")),
    );
    let sub = base.extend(Options::new().method("greet", |_, _| Value::from("sub")));

    let vm = Instance::new(&sub, Options::new());
    assert_eq!(vm.call("greet", &[]), Some(Value::from("sub")));
    assert_eq!(vm.call("farewell", &[]), Some(Value::from("bye")));
    assert_eq!(vm.call("missing", &[]), None);
}

/// Test that instance options override the resolved definition options.
#[test]
fn root_instance_merges_caller_options() {
    let root = Definition::root();
    let app = root.extend(
        Options::new()
            .data(|_| record(json!({ "a": 1, "shared": "definition" })))
            .method("m", |_, _| Value::from("definition")),
    );

    let vm = Instance::new(
        &app,
        Options::new()
            .data_object(record(json!({ "b": 2, "shared": "instance" })))
            .method("m", |_, _| Value::from("instance")),
    );

    assert_eq!(vm.get("a"), Some(Value::from(1)));
    assert_eq!(vm.get("b"), Some(Value::from(2)));
    assert_eq!(vm.get("shared"), Some(Value::from("instance")));
    assert_eq!(vm.call("m", &[]), Some(Value::from("instance")));
    assert!(vm.is_root());
}

/// Test that child creation from a vnode copies the vnode's fields and does
/// not resolve or merge.
#[test]
fn child_fast_path_copies_vnode_fields() {
    let root = Definition::root();
    let parent = Instance::new(&root, Options::new());
    let child_def = root.extend(
        Options::new()
            .name_as("todo-item")
            .prop("title", PropOptions::default()),
    );

    // Replacing the root options would force a re-merge if the child path
    // resolved its definition.
    root.mixin(Options::new().hook("created", |_| {}));
    let before = child_def.options();

    let pings = log();
    let p = pings.clone();
    let mut listeners = ripple_core::options::Listeners::new();
    listeners.insert(
        "ping".to_owned(),
        Arc::new(move |_: &[Value]| p.lock().push("ping".to_owned())),
    );
    let vnode = VNode::component(
        "todo-item",
        VNodeComponentOptions {
            definition: Some(child_def.clone()),
            props_data: Some(record(json!({ "title": "write tests" }))),
            listeners,
            children: vec![VNode::text("slot content")],
            tag: None,
        },
    );

    let child = Instance::new(
        &child_def,
        CreateOptions::Component(InternalComponentOptions::new(&parent, vnode)),
    );

    assert_eq!(child.get("title"), Some(Value::from("write tests")));
    assert!(Arc::ptr_eq(&child_def.options(), &before));
    assert!(Arc::ptr_eq(child.options().base().unwrap(), &before));
    assert!(child.options().own().is_empty());
    assert_eq!(child.options().component_tag().as_deref(), Some("todo-item"));
    assert_eq!(child.options().render_children().len(), 1);

    assert!(child.parent().unwrap().ptr_eq(&parent));
    assert!(child.root().ptr_eq(&parent));
    assert_eq!(parent.children().len(), 1);

    assert_eq!(child.emit("ping", &[]), 1);
    assert_eq!(*pings.lock(), vec!["ping"]);
}

/// Test the fixed initialization order: hooks, injections, state, provide.
#[test]
fn initialization_order_is_fixed() {
    let events = log();
    let root = Definition::root();

    let e = events.clone();
    let provider = Instance::new(
        &root,
        Options::new()
            .data(|_| record(json!({ "theme": "dark" })))
            .provide(move |vm| {
                e.lock().push("provide".to_owned());
                [("theme", vm.get("theme").unwrap_or_default())]
                    .into_iter()
                    .collect()
            }),
    );
    assert_eq!(*events.lock(), vec!["provide"]);
    events.lock().clear();

    let (e1, e2, e3) = (events.clone(), events.clone(), events.clone());
    let consumer_def = root.extend(
        Options::new()
            .name_as("consumer")
            .inject("theme", None, None)
            .inject("size", None, Some(Value::from("medium")))
            .hook("beforeCreate", move |vm| {
                let theme = vm.get("theme");
                e1.lock().push(format!("beforeCreate:{}", theme.is_some()));
            })
            .data(move |vm| {
                let theme = vm.get("theme").unwrap_or_default();
                e2.lock().push(format!("data:{theme}"));
                record(json!({ "label": theme.to_string() }))
            })
            .hook("created", move |vm| {
                let label = vm.get("label").unwrap_or_default();
                e3.lock().push(format!("created:{label}"));
            }),
    );

    let vnode = VNode::component("consumer", VNodeComponentOptions::default());
    let consumer = Instance::new(
        &consumer_def,
        CreateOptions::Component(InternalComponentOptions::new(&provider, vnode)),
    );

    assert_eq!(
        *events.lock(),
        vec!["beforeCreate:false", "data:dark", "created:dark"]
    );
    assert_eq!(consumer.get("size"), Some(Value::from("medium")));
}

/// Test that computed properties and watchers react to instance state.
#[test]
fn computed_and_watch_follow_state() {
    let changes = log();
    let c = changes.clone();
    let root = Definition::root();
    let counter = root.extend(
        Options::new()
            .data(|_| record(json!({ "count": 1 })))
            .computed("double", |vm| {
                let n = vm.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
                Value::Number(n * 2.0)
            })
            .watch("count", move |_, new, old| c.lock().push(format!("{old}->{new}"))),
    );

    let vm = Instance::new(&counter, Options::new());
    assert_eq!(vm.get("double"), Some(Value::from(2)));

    vm.set("count", Value::from(5));
    assert_eq!(vm.get("double"), Some(Value::from(10)));
    assert_eq!(*changes.lock(), vec!["1->5"]);

    vm.set("double", Value::from(0));
    assert_eq!(vm.get("double"), Some(Value::from(10)));
}

/// Test that watching a nested path tracks the nested field.
#[test]
fn watch_nested_path() {
    let root = Definition::root();
    let vm = Instance::new(
        &root,
        Options::new().data(|_| record(json!({ "user": { "name": "ada" } }))),
    );
    let seen = log();
    let s = seen.clone();
    let watcher = vm.watch("user.name", move |_, new, _| s.lock().push(new.to_string()));
    assert_eq!(watcher.value(), Value::from("ada"));

    let user = vm.get("user").unwrap();
    user.as_record().unwrap().set("name", Value::from("grace"));
    assert_eq!(*seen.lock(), vec!["grace"]);
}

/// Test that hooks and data factories never subscribe an enclosing
/// computation.
#[test]
fn creation_inside_a_computation_is_untracked() {
    let shared = Value::from(json!({ "x": 1 }));
    let shared = ripple_core::observe(&shared).as_record().cloned().unwrap();
    let root = Definition::root();

    let s = shared.clone();
    let def = root.extend(Options::new().hook("created", move |_| {
        s.get("x");
    }));

    let outer = Watcher::new(move || {
        Instance::new(&def, Options::new());
        Value::Null
    });
    assert_eq!(outer.dependency_count(), 0);
    shared.set("x", Value::from(2));
    assert_eq!(outer.run_count(), 1);
}

/// Test that destroying an instance runs its hooks, detaches it and stops
/// its watchers.
#[test]
fn destroy_tears_down() {
    let events = log();
    let (e1, e2, e3) = (events.clone(), events.clone(), events.clone());
    let root = Definition::root();
    let parent = Instance::new(&root, Options::new());

    let def = root.extend(
        Options::new()
            .data(|_| record(json!({ "n": 0 })))
            .watch("n", move |_, _, _| e1.lock().push("watch".to_owned()))
            .hook("beforeDestroy", move |_| e2.lock().push("beforeDestroy".to_owned()))
            .hook("destroyed", move |_| e3.lock().push("destroyed".to_owned())),
    );
    let vnode = VNode::component("child", VNodeComponentOptions::default());
    let child = Instance::new(
        &def,
        CreateOptions::Component(InternalComponentOptions::new(&parent, vnode)),
    );

    child.set("n", Value::from(1));
    child.destroy();
    child.set("n", Value::from(2));
    child.destroy();

    assert!(child.is_destroyed());
    assert!(parent.children().is_empty());
    assert_eq!(*events.lock(), vec!["watch", "beforeDestroy", "destroyed"]);
    assert_eq!(child.data().observer().unwrap().root_count(), 0);
}

/// Test that an abstract parent is skipped when registering children.
#[test]
fn abstract_parents_are_skipped() {
    let root = Definition::root();
    let app = Instance::new(&root, Options::new());
    let keep_alive = root.extend(
        Options::new()
            .name_as("keep-alive")
            .with("abstract", ripple_core::OptionValue::Value(Value::from(true))),
    );
    let wrapper = Instance::new(
        &keep_alive,
        CreateOptions::Component(InternalComponentOptions::new(
            &app,
            VNode::component("keep-alive", VNodeComponentOptions::default()),
        )),
    );
    let leaf = Instance::new(
        &root.extend(Options::new()),
        CreateOptions::Component(InternalComponentOptions::new(
            &wrapper,
            VNode::component("leaf", VNodeComponentOptions::default()),
        )),
    );

    assert!(app.children().iter().any(|c| c.ptr_eq(&leaf)));
    assert!(!app.children().iter().any(|c| c.ptr_eq(&wrapper)));
    assert!(leaf.parent().unwrap().ptr_eq(&wrapper));
    assert!(leaf.root().ptr_eq(&app));
}
