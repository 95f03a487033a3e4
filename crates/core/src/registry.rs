//! Process-wide class registry
//!
//! Every built [`MetaObject`] is entered here by class name, and by Rust
//! type when it was built with [`MetaObjectBuilder::for_type`]. Entries are
//! never removed. Classes of attached plugins land in the host's registry.
//!
//! [`MetaObjectBuilder::for_type`]: crate::meta::MetaObjectBuilder::for_type

use std::any::TypeId;

use crate::meta::MetaObject;
use crate::object::Object;
use crate::runtime::runtime;

/// Enter a descriptor into the registry
///
/// A later registration under the same class name replaces the earlier one.
pub fn register_meta_object(meta: &'static MetaObject) {
    runtime().register_meta_object(meta);
}

/// Descriptor registered for the Rust type `T`
pub fn meta_object_of<T: Object>() -> Option<&'static MetaObject> {
    runtime().meta_object_of(TypeId::of::<T>())
}

/// Descriptor registered under `class_name`
pub fn find_meta_object(class_name: &str) -> Option<&'static MetaObject> {
    runtime().find_meta_object(class_name)
}

/// Names of all registered classes, sorted
pub fn registered_classes() -> Vec<String> {
    runtime().registered_classes()
}

pub(crate) mod local {
    use std::any::TypeId;
    use std::sync::LazyLock;

    use dashmap::DashMap;

    use crate::meta::MetaObject;

    /// Class name -> descriptor
    static BY_NAME: LazyLock<DashMap<String, &'static MetaObject>> =
        LazyLock::new(DashMap::new);

    /// Rust type -> descriptor
    static BY_TYPE: LazyLock<DashMap<TypeId, &'static MetaObject>> =
        LazyLock::new(DashMap::new);

    pub fn register(meta: &'static MetaObject) {
        if let Some(previous) = BY_NAME.insert(meta.class_name().to_string(), meta) {
            if !std::ptr::eq(previous, meta) {
                tracing::debug!("Meta object {} re-registered", meta.class_name());
            }
        }

        if let Some(type_id) = meta.type_id() {
            BY_TYPE.insert(type_id, meta);
        }
    }

    pub fn of_type(type_id: TypeId) -> Option<&'static MetaObject> {
        BY_TYPE.get(&type_id).map(|entry| *entry.value())
    }

    pub fn find(class_name: &str) -> Option<&'static MetaObject> {
        BY_NAME.get(class_name).map(|entry| *entry.value())
    }

    pub fn classes() -> Vec<String> {
        let mut names: Vec<String> = BY_NAME.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}
