//! Registration-time builders
//!
//! # Example
//!
//! ```ignore
//! fn static_meta_object() -> &'static MetaObject {
//!     static META: OnceLock<&'static MetaObject> = OnceLock::new();
//!     META.get_or_init(|| {
//!         MetaObjectBuilder::for_type::<Sample>("Sample")
//!             .property(
//!                 PropertyBuilder::new::<f32>("volume")
//!                     .read(read_jar(|s: &Sample| s.volume()))
//!                     .write(write_jar(|s: &Sample, v: f32| s.set_volume(v))),
//!             )
//!             .method(MethodBuilder::signal("volumeChanged(f32)"))
//!             .factory(|| new_object(Sample::default()))
//!             .build()
//!     })
//! }
//! ```

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use crate::meta::class_info::MetaClassInfo;
use crate::meta::enums::{register_enum, EnumValue, MetaEnum};
use crate::meta::jar::{JarInvoke, JarRead, JarReset, JarWrite};
use crate::meta::method::{Access, MetaMethod, MethodAttributes, MethodSignature, MethodType};
use crate::meta::object::MetaObject;
use crate::meta::property::MetaProperty;
use crate::metatype::normalized_type;
use crate::object::{Object, ObjectHandle};
use crate::registry;
use crate::variant::VariantValue;

/// Builder for one [`MetaProperty`]
pub struct PropertyBuilder {
    property: MetaProperty,
}

impl PropertyBuilder {
    /// Start a property whose value type is `V`
    pub fn new<V: VariantValue>(name: &str) -> Self {
        Self {
            property: MetaProperty {
                name: name.to_string(),
                type_resolver: V::type_name,
                type_name: OnceLock::new(),
                value_type: Some(TypeId::of::<V>()),
                enum_accessor: None,
                read: None,
                write: None,
                reset: None,
                designable: None,
                scriptable: None,
                stored: None,
                user: None,
                notify: None,
                revision: 0,
                constant: false,
                is_final: false,
                setter_name: None,
                meta_object: OnceLock::new(),
            },
        }
    }

    /// Start a property whose value type is the enum or flag type `E`
    ///
    /// `E` is registered in the enum registry.
    pub fn new_enum<E: EnumValue + VariantValue>(name: &str) -> Self {
        register_enum::<E>();
        let mut builder = Self::new::<E>(name);
        builder.property.enum_accessor = Some(E::meta_enum);
        builder
    }

    pub fn read(mut self, jar: Arc<dyn JarRead>) -> Self {
        self.property.read = Some(jar);
        self
    }

    pub fn write(mut self, jar: Arc<dyn JarWrite>) -> Self {
        self.property.write = Some(jar);
        self
    }

    pub fn reset(mut self, jar: Arc<dyn JarReset>) -> Self {
        self.property.reset = Some(jar);
        self
    }

    pub fn designable(mut self, jar: Arc<dyn JarRead>) -> Self {
        self.property.designable = Some(jar);
        self
    }

    pub fn scriptable(mut self, jar: Arc<dyn JarRead>) -> Self {
        self.property.scriptable = Some(jar);
        self
    }

    pub fn stored(mut self, jar: Arc<dyn JarRead>) -> Self {
        self.property.stored = Some(jar);
        self
    }

    pub fn user(mut self, jar: Arc<dyn JarRead>) -> Self {
        self.property.user = Some(jar);
        self
    }

    /// Notify signal signature, e.g. `volumeChanged(f32)`
    pub fn notify(mut self, signature: &str) -> Self {
        match MethodSignature::parse(signature) {
            Some(parsed) => self.property.notify = Some(parsed),
            None => tracing::warn!(
                "Property {}: invalid notify signature {:?}",
                self.property.name,
                signature
            ),
        }
        self
    }

    pub fn revision(mut self, revision: u32) -> Self {
        self.property.revision = revision;
        self
    }

    pub fn constant(mut self) -> Self {
        self.property.constant = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.property.is_final = true;
        self
    }

    /// Name of the setter method, used by `has_std_cpp_set`
    pub fn setter_name(mut self, setter: &str) -> Self {
        self.property.setter_name = Some(setter.to_string());
        self
    }
}

/// Builder for one [`MetaMethod`]
pub struct MethodBuilder {
    method: MetaMethod,
}

impl MethodBuilder {
    fn with_type(signature: &str, method_type: MethodType) -> Self {
        let parsed = MethodSignature::parse(signature).unwrap_or_else(|| {
            tracing::warn!("Invalid method signature {:?}", signature);
            MethodSignature {
                name: signature.trim().to_string(),
                parameter_types: Vec::new(),
            }
        });

        Self {
            method: MetaMethod {
                name: parsed.name,
                return_type: "void".to_string(),
                parameter_types: parsed.parameter_types,
                parameter_names: Vec::new(),
                access: Access::Public,
                method_type,
                attributes: MethodAttributes::empty(),
                revision: 0,
                tag: String::new(),
                class_name: String::new(),
                jar: None,
            },
        }
    }

    pub fn signal(signature: &str) -> Self {
        Self::with_type(signature, MethodType::Signal)
    }

    pub fn slot(signature: &str) -> Self {
        Self::with_type(signature, MethodType::Slot)
    }

    pub fn method(signature: &str) -> Self {
        Self::with_type(signature, MethodType::Method)
    }

    pub fn constructor(signature: &str) -> Self {
        Self::with_type(signature, MethodType::Constructor)
    }

    pub fn invoke(mut self, jar: Arc<dyn JarInvoke>) -> Self {
        if jar.arity() != self.method.parameter_types.len() {
            tracing::warn!(
                "Method {}: invoker takes {} arguments, signature declares {}",
                self.method.name,
                jar.arity(),
                self.method.parameter_types.len()
            );
        }
        self.method.jar = Some(jar);
        self
    }

    pub fn return_type(mut self, type_name: &str) -> Self {
        self.method.return_type = normalized_type(type_name);
        self
    }

    pub fn parameter_names(mut self, names: &[&str]) -> Self {
        self.method.parameter_names = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.method.access = access;
        self
    }

    pub fn attributes(mut self, attributes: MethodAttributes) -> Self {
        self.method.attributes = attributes;
        self
    }

    pub fn revision(mut self, revision: u32) -> Self {
        self.method.revision = revision;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.method.tag = tag.to_string();
        self
    }
}

/// Builder for a [`MetaObject`]
pub struct MetaObjectBuilder {
    meta: MetaObject,
}

impl MetaObjectBuilder {
    pub fn new(class_name: &str) -> Self {
        Self {
            meta: MetaObject {
                class_name: class_name.to_string(),
                super_class: None,
                properties: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
                class_info: Vec::new(),
                enumerators: Vec::new(),
                factory: None,
                type_id: None,
            },
        }
    }

    /// Start a descriptor bound to the Rust type `T`
    ///
    /// The built descriptor is then also found by [`registry::meta_object_of`].
    pub fn for_type<T: Object>(class_name: &str) -> Self {
        let mut builder = Self::new(class_name);
        builder.meta.type_id = Some(TypeId::of::<T>());
        builder
    }

    /// Parent class, given as its static accessor
    pub fn super_class(mut self, accessor: fn() -> &'static MetaObject) -> Self {
        self.meta.super_class = Some(accessor);
        self
    }

    pub fn class_info(mut self, name: &str, value: &str) -> Self {
        self.meta.class_info.push(MetaClassInfo::new(name, value));
        self
    }

    pub fn property(mut self, builder: PropertyBuilder) -> Self {
        self.meta.properties.push(builder.property);
        self
    }

    pub fn method(mut self, builder: MethodBuilder) -> Self {
        self.meta.methods.push(builder.method);
        self
    }

    pub fn constructor(mut self, builder: MethodBuilder) -> Self {
        let mut method = builder.method;
        method.method_type = MethodType::Constructor;
        self.meta.constructors.push(method);
        self
    }

    /// Register the enum or flag type `E` in this class
    pub fn enumerator<E: EnumValue>(mut self) -> Self {
        register_enum::<E>();
        self.meta.enumerators.push(E::meta_enum());
        self
    }

    /// Register a descriptor that has no Rust type behind it
    pub fn enumerator_descriptor(mut self, meta_enum: &'static MetaEnum) -> Self {
        self.meta.enumerators.push(meta_enum);
        self
    }

    /// Default constructor used by [`MetaObject::new_instance`]
    pub fn factory(mut self, factory: fn() -> ObjectHandle) -> Self {
        self.meta.factory = Some(factory);
        self
    }

    /// Finish the descriptor
    ///
    /// The descriptor is leaked into `'static` storage, linked to its
    /// members and entered into the class registry.
    pub fn build(self) -> &'static MetaObject {
        let mut meta = self.meta;
        for method in meta.methods.iter_mut().chain(meta.constructors.iter_mut()) {
            method.class_name.clone_from(&meta.class_name);
        }

        let meta: &'static MetaObject = Box::leak(Box::new(meta));
        for property in &meta.properties {
            // a fresh descriptor, so the cell is always empty here
            let _ = property.meta_object.set(meta);
        }

        registry::register_meta_object(meta);
        tracing::debug!(
            "Built meta object {} ({} properties, {} methods)",
            meta.class_name,
            meta.properties.len(),
            meta.methods.len()
        );
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::static_method_jar;

    crate::meta_enum! {
        enum Mode in "BuilderTest" {
            Fast = 0,
            Safe = 1,
        }
    }

    #[test]
    fn test_build_links_members() {
        let meta = MetaObjectBuilder::new("BuilderTestClass")
            .property(PropertyBuilder::new::<i32>("count").notify("countChanged(int)"))
            .method(
                MethodBuilder::method("sum(int,int)")
                    .return_type("int")
                    .parameter_names(&["a", "b"])
                    .tag("math")
                    .revision(2)
                    .invoke(static_method_jar(|a: i32, b: i32| a + b)),
            )
            .method(MethodBuilder::signal("countChanged(int)"))
            .build();

        let property = meta.property(0).unwrap();
        assert_eq!(property.enclosing_meta_object(), Some(meta));
        assert_eq!(property.notify_signal_index(), Some(1));

        let sum = meta.method(0).unwrap();
        assert_eq!(sum.class_name(), "BuilderTestClass");
        assert_eq!(sum.return_type(), "i32");
        assert_eq!(sum.parameter_names(), ["a", "b"]);
        assert_eq!(sum.tag(), "math");
        assert_eq!(sum.revision(), 2);
        assert!(sum.is_invokable());

        assert_eq!(
            registry::find_meta_object("BuilderTestClass").map(MetaObject::class_name),
            Some("BuilderTestClass")
        );
    }

    #[test]
    fn test_enum_property_and_enumerator() {
        let meta = MetaObjectBuilder::new("BuilderTestEnum")
            .enumerator::<Mode>()
            .property(PropertyBuilder::new_enum::<Mode>("mode"))
            .property(PropertyBuilder::new::<i32>("plain"))
            .build();

        assert_eq!(meta.enumerator_count(), 1);
        assert_eq!(meta.index_of_enumerator("Mode"), Some(0));

        let mode = meta.property(0).unwrap();
        assert!(mode.is_enum_type());
        assert!(!mode.is_flag_type());
        assert_eq!(mode.type_name(), "BuilderTest::Mode");
        assert_eq!(mode.type_id(), crate::metatype::types::INT);
        assert!(mode.user_type() >= crate::metatype::types::USER_TYPE);

        let plain = meta.property(1).unwrap();
        assert!(!plain.is_enum_type());
        assert_eq!(plain.user_type(), crate::metatype::types::INT);
    }

    #[test]
    fn test_unregistered_enum_falls_back_to_int() {
        let meta_enum: &'static MetaEnum =
            Box::leak(Box::new(MetaEnum::new("BuilderTest", "Loose", false, &[("A", 0)])));

        fn loose() -> &'static MetaEnum {
            static LOOSE: OnceLock<MetaEnum> = OnceLock::new();
            LOOSE.get_or_init(|| MetaEnum::new("BuilderTestLoose", "Unregistered", false, &[]))
        }

        let mut builder = PropertyBuilder::new::<i32>("loose");
        builder.property.enum_accessor = Some(loose);
        let meta = MetaObjectBuilder::new("BuilderTestLoose")
            .enumerator_descriptor(meta_enum)
            .property(builder)
            .build();

        let property = meta.property(0).unwrap();
        assert!(property.is_enum_type());
        assert_eq!(property.user_type(), crate::metatype::types::INT);
    }
}
