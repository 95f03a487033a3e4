//! Statically linked plugins
//!
//! Plugins compiled into the executable register their meta object here.
//! Loaders consult them before any library on disk.

use std::sync::LazyLock;

use parking_lot::{Mutex, RwLock};

use crate::meta::MetaObject;
use crate::object::ObjectHandle;

static STATIC_PLUGINS: LazyLock<RwLock<Vec<&'static MetaObject>>> =
    LazyLock::new(|| RwLock::new(Vec::new()));

/// One instance per static plugin class
static STATIC_INSTANCES: LazyLock<Mutex<Vec<(&'static MetaObject, ObjectHandle)>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

/// Register a statically linked plugin; registering twice is a no-op
pub fn register_static_plugin(meta: &'static MetaObject) {
    let mut plugins = STATIC_PLUGINS.write();
    if !plugins.iter().any(|m| std::ptr::eq(*m, meta)) {
        tracing::debug!("Registered static plugin {}", meta.class_name());
        plugins.push(meta);
    }
}

/// All registered static plugins, in registration order
pub fn static_plugins() -> Vec<&'static MetaObject> {
    STATIC_PLUGINS.read().clone()
}

/// The shared instance of a static plugin, created on first use
pub fn static_instance(meta: &'static MetaObject) -> Option<ObjectHandle> {
    let mut instances = STATIC_INSTANCES.lock();
    if let Some((_, obj)) = instances.iter().find(|(m, _)| std::ptr::eq(*m, meta)) {
        return Some(obj.clone());
    }

    let obj = meta.new_instance()?;
    if !obj.base().has_parent() {
        obj.base().move_to_thread(metaplug_engine::main_thread_id());
    }
    instances.push((meta, obj.clone()));
    Some(obj)
}
