//! Meta-object descriptors
//!
//! A [`MetaObject`] describes one class: its properties, methods (signals,
//! slots, plain invokables and constructors), enumerators and class-info
//! pairs. Descriptors are built once with [`MetaObjectBuilder`], leaked into
//! `'static` storage and never mutated afterwards except for memoized fields.
//!
//! Calls go through type-erased invokers ([`jar`]) so callers never need the
//! concrete class type.

pub mod builder;
pub mod cell;
pub mod class_info;
pub mod enums;
pub mod jar;
pub mod method;
pub mod object;
pub mod property;

pub use builder::{MetaObjectBuilder, MethodBuilder, PropertyBuilder};
pub use cell::PropertyCell;
pub use class_info::MetaClassInfo;
pub use enums::{enum_for_type, find_enum, register_enum, EnumValue, MetaEnum};
pub use jar::{
    constant_jar, method_jar, read_jar, reset_jar, static_method_jar, static_read_jar, write_jar,
    JarInvoke, JarRead, JarReset, JarWrite, MethodFn, StaticMethodFn,
};
pub use method::{
    check_connect_args, normalized_signature, Access, MetaMethod, MethodAttributes,
    MethodSignature, MethodType,
};
pub use object::MetaObject;
pub use property::MetaProperty;

/// Error returned when a method cannot be invoked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// Fewer arguments than the method declares
    #[error("Expected {expected} arguments, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    /// An argument could not be converted to the declared parameter type
    #[error("Argument {index} cannot be converted to {expected}")]
    ArgumentType { index: usize, expected: &'static str },

    /// The object is not an instance of the method's class
    #[error("Object is not an instance of {0}")]
    WrongObjectType(&'static str),

    /// No invoker is bound (e.g. a signal without an emitter)
    #[error("Method {0} is not invokable")]
    NotInvokable(String),
}
