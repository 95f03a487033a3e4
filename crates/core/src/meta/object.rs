//! Per-class descriptor
//!
//! Indexing is absolute across the inheritance chain: inherited members come
//! first, and a class's own members start at its `*_offset()`. Name lookups
//! search the most-derived class first, so a redeclared member shadows the
//! inherited one.

use std::any::TypeId;
use std::fmt;

use crate::meta::class_info::MetaClassInfo;
use crate::meta::enums::MetaEnum;
use crate::meta::method::{self, MetaMethod, MethodSignature, MethodType};
use crate::meta::property::MetaProperty;
use crate::metatype;
use crate::object::ObjectHandle;

/// Runtime descriptor of one class
pub struct MetaObject {
    pub(crate) class_name: String,
    pub(crate) super_class: Option<fn() -> &'static MetaObject>,
    pub(crate) properties: Vec<MetaProperty>,
    pub(crate) methods: Vec<MetaMethod>,
    pub(crate) constructors: Vec<MetaMethod>,
    pub(crate) class_info: Vec<MetaClassInfo>,
    pub(crate) enumerators: Vec<&'static MetaEnum>,
    pub(crate) factory: Option<fn() -> ObjectHandle>,
    pub(crate) type_id: Option<TypeId>,
}

impl MetaObject {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Parent class descriptor
    pub fn super_class(&self) -> Option<&'static MetaObject> {
        self.super_class.map(|accessor| accessor())
    }

    /// Rust type the descriptor was registered for
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Whether this class is `class_name` or derives from it
    pub fn inherits(&self, class_name: &str) -> bool {
        if self.class_name == class_name {
            return true;
        }
        self.super_class()
            .is_some_and(|parent| parent.inherits(class_name))
    }

    /// Construct a default instance
    ///
    /// Returns `None` when the class registered no default constructor.
    pub fn new_instance(&self) -> Option<ObjectHandle> {
        let factory = self.factory?;
        let object = factory();
        tracing::trace!("Constructed instance of {}", self.class_name);
        Some(object)
    }

    pub fn is_constructible(&self) -> bool {
        self.factory.is_some()
    }

    // ---------------------------------------------------------------------
    // Properties

    pub fn property_offset(&self) -> usize {
        self.super_class().map_or(0, MetaObject::property_count)
    }

    pub fn property_count(&self) -> usize {
        self.property_offset() + self.properties.len()
    }

    pub fn property(&self, index: usize) -> Option<&MetaProperty> {
        let offset = self.property_offset();
        if index < offset {
            return self.super_class()?.property(index);
        }
        self.properties.get(index - offset)
    }

    pub fn index_of_property(&self, name: &str) -> Option<usize> {
        let offset = self.property_offset();
        if let Some(pos) = self.properties.iter().position(|p| p.name() == name) {
            return Some(offset + pos);
        }
        self.super_class()?.index_of_property(name)
    }

    /// Last property flagged as the user property
    pub fn user_property(&self) -> Option<&MetaProperty> {
        (0..self.property_count())
            .rev()
            .filter_map(|index| self.property(index))
            .find(|p| p.is_user(None))
    }

    // ---------------------------------------------------------------------
    // Methods

    pub fn method_offset(&self) -> usize {
        self.super_class().map_or(0, MetaObject::method_count)
    }

    pub fn method_count(&self) -> usize {
        self.method_offset() + self.methods.len()
    }

    pub fn method(&self, index: usize) -> Option<&MetaMethod> {
        let offset = self.method_offset();
        if index < offset {
            return self.super_class()?.method(index);
        }
        self.methods.get(index - offset)
    }

    /// Index of a method by signature, e.g. `setValue(int)`
    pub fn index_of_method(&self, signature: &str) -> Option<usize> {
        let signature = MethodSignature::parse(signature)?;
        self.find_method(&|m: &MetaMethod| {
            m.name == signature.name && m.parameter_types == signature.parameter_types
        })
    }

    /// Index of a signal by signature
    ///
    /// A bare name (no parameter list) matches the first signal with that name.
    pub fn index_of_signal(&self, signature: &str) -> Option<usize> {
        self.index_of_kind(signature, MethodType::Signal)
    }

    /// Index of a slot by signature or bare name
    pub fn index_of_slot(&self, signature: &str) -> Option<usize> {
        self.index_of_kind(signature, MethodType::Slot)
    }

    fn index_of_kind(&self, signature: &str, kind: MethodType) -> Option<usize> {
        let signature = signature.trim();
        if !signature.contains('(') {
            return self
                .find_method(&|m: &MetaMethod| m.method_type == kind && m.name == signature);
        }

        let parsed = MethodSignature::parse(signature)?;
        self.find_method(&|m: &MetaMethod| {
            m.method_type == kind
                && m.name == parsed.name
                && m.parameter_types == parsed.parameter_types
        })
    }

    fn find_method(&self, predicate: &dyn Fn(&MetaMethod) -> bool) -> Option<usize> {
        let offset = self.method_offset();
        if let Some(pos) = self.methods.iter().position(predicate) {
            return Some(offset + pos);
        }
        self.super_class()?.find_method(predicate)
    }

    // ---------------------------------------------------------------------
    // Constructors (not inherited)

    pub fn constructor_count(&self) -> usize {
        self.constructors.len()
    }

    pub fn constructor(&self, index: usize) -> Option<&MetaMethod> {
        self.constructors.get(index)
    }

    pub fn index_of_constructor(&self, signature: &str) -> Option<usize> {
        let signature = MethodSignature::parse(signature)?;
        self.constructors.iter().position(|c| {
            c.name == signature.name && c.parameter_types == signature.parameter_types
        })
    }

    // ---------------------------------------------------------------------
    // Enumerators

    pub fn enumerator_offset(&self) -> usize {
        self.super_class().map_or(0, MetaObject::enumerator_count)
    }

    pub fn enumerator_count(&self) -> usize {
        self.enumerator_offset() + self.enumerators.len()
    }

    pub fn enumerator(&self, index: usize) -> Option<&'static MetaEnum> {
        let offset = self.enumerator_offset();
        if index < offset {
            return self.super_class()?.enumerator(index);
        }
        self.enumerators.get(index - offset).copied()
    }

    pub fn index_of_enumerator(&self, name: &str) -> Option<usize> {
        let offset = self.enumerator_offset();
        if let Some(pos) = self.enumerators.iter().position(|e| e.name() == name) {
            return Some(offset + pos);
        }
        self.super_class()?.index_of_enumerator(name)
    }

    // ---------------------------------------------------------------------
    // Class info

    pub fn class_info_offset(&self) -> usize {
        self.super_class().map_or(0, MetaObject::class_info_count)
    }

    pub fn class_info_count(&self) -> usize {
        self.class_info_offset() + self.class_info.len()
    }

    pub fn class_info(&self, index: usize) -> Option<&MetaClassInfo> {
        let offset = self.class_info_offset();
        if index < offset {
            return self.super_class()?.class_info(index);
        }
        self.class_info.get(index - offset)
    }

    pub fn index_of_class_info(&self, name: &str) -> Option<usize> {
        let offset = self.class_info_offset();
        if let Some(pos) = self.class_info.iter().position(|c| c.name() == name) {
            return Some(offset + pos);
        }
        self.super_class()?.index_of_class_info(name)
    }

    /// Value of a class-info entry
    pub fn class_info_value(&self, name: &str) -> Option<&str> {
        let index = self.index_of_class_info(name)?;
        self.class_info(index).map(MetaClassInfo::value)
    }

    // ---------------------------------------------------------------------
    // Signature helpers

    /// Whether a slot signature can receive a signal signature's arguments
    pub fn check_connect_args(signal: &str, slot: &str) -> bool {
        match (MethodSignature::parse(signal), MethodSignature::parse(slot)) {
            (Some(signal), Some(slot)) => {
                method::check_connect_args(&signal.parameter_types, &slot.parameter_types)
            }
            _ => false,
        }
    }

    pub fn normalized_signature(signature: &str) -> String {
        method::normalized_signature(signature)
    }

    pub fn normalized_type(type_name: &str) -> String {
        metatype::normalized_type(type_name)
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("class_name", &self.class_name)
            .field("super_class", &self.super_class().map(MetaObject::class_name))
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .field("class_info", &self.class_info)
            .finish()
    }
}

impl PartialEq for MetaObject {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
