//! Ripple Core
//!
//! This crate provides the reactive data engine for the Ripple component
//! runtime. It implements:
//!
//! - Dependency tracking (dependencies, the active computation stack,
//!   watchers)
//! - Observable records and lists, with intercepted list mutation
//! - Component option merging and cached resolution along the definition
//!   chain
//! - Instance initialization, including the fast path for child components
//!
//! # Architecture
//!
//! - `reactive`: dependencies, the reactive context and watchers
//! - `value`: the dynamic value model (records, lists, scalars)
//! - `observer`: makes values reactive; the list interceptor lives in
//!   `observer::array`
//! - `options`: option maps, merge strategies, definitions and the resolver
//! - `instance`: component instances and their initialization order
//! - `config`, `debug`, `error`: runtime configuration and diagnostics
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{observe, Value, Watcher};
//! use serde_json::json;
//!
//! let state = observe(&Value::from(json!({ "count": 1 })));
//! let record = state.as_record().unwrap().clone();
//!
//! let r = record.clone();
//! let watcher = Watcher::new(move || r.get("count").unwrap_or_default());
//!
//! record.set("count", Value::from(2));
//! assert_eq!(watcher.run_count(), 2);
//! ```

pub mod config;
pub mod debug;
pub mod error;
pub mod instance;
pub mod observer;
pub mod options;
pub mod reactive;
pub mod value;

pub use config::{config, set_config, Config};
pub use error::{Error, Result};
pub use instance::{CreateOptions, Instance, InternalComponentOptions, VNode, VNodeComponentOptions};
pub use observer::{observe, ArrayMethods};
pub use options::{Definition, OptionValue, Options};
pub use reactive::{Dep, ReactiveContext, Watcher};
pub use value::{List, Record, Value};
