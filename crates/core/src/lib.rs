//! metaplug Core - Meta-Object Runtime and Plugin Factories
//!
//! This crate contains the runtime reflection layer and the plugin loader:
//! - [`variant`] / [`metatype`] - dynamically typed values and type ids
//! - [`meta`] - class descriptors (properties, methods, enums, class-info)
//! - [`object`] - the object model every reflected class implements
//! - [`connections`] - signal/slot connections and dispatch
//! - [`events`] - per-thread queues for queued calls
//! - [`plugins`] - library handles, factory loaders and search paths
//! - [`runtime`] - process-wide state shared with loaded plugins
//!
//! # Re-exports
//!
//! The SDK and engine crates are re-exported for plugin authors:
//! - [`sdk`] - ABI constants and class-info key names
//! - [`engine`] - shared library loading and process globals

// Allow the crate to refer to itself as `metaplug_core` for proc macro compatibility
extern crate self as metaplug_core;

pub use metaplug_engine as engine;
pub use metaplug_sdk as sdk;

pub mod config;
pub mod connections;
pub mod events;
pub mod logging;
pub mod meta;
pub mod metatype;
pub mod object;
pub mod plugins;
pub mod registry;
pub mod runtime;
pub mod serialization;
pub mod variant;

// Re-export commonly used items
pub use connections::{
    connect, connect_by_name, connect_fn, disconnect, disconnect_all, emit, invoke_method,
    sender, ConnectError, ConnectionKey, ConnectionType,
};
pub use events::{post_event, process_posted_events};
pub use meta::{
    InvokeError, MetaEnum, MetaMethod, MetaObject, MetaObjectBuilder, MetaProperty,
    MethodBuilder, PropertyBuilder,
};
pub use object::{new_object, set_parent, Object, ObjectBase, ObjectExt, ObjectHandle};
pub use plugins::{
    register_static_plugin, CaseSensitivity, FactoryLoader, LibraryHandle, LoadState,
};
pub use registry::{find_meta_object, register_meta_object};
pub use serialization::{restore_properties, store_properties};
pub use variant::{Variant, VariantValue};

// Re-export config types
pub use config::{ConfigError, ConfigResult, CoreConfig, PluginConfig};

// Re-export macros
pub use metaplug_macros::MetaClass;

/// Start the runtime on the calling thread
///
/// Records the main thread, installs logging and applies the plugin
/// settings from `config`.
pub fn init(config: &CoreConfig) {
    if engine::init_main_thread().is_err() {
        tracing::debug!("Main thread already recorded");
    }
    logging::init(config);
    plugins::configure(config);
    tracing::info!("metaplug {} initialized", sdk::abi_tag_str());
}
