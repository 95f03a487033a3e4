//! Enumerator descriptors and the enum registry
//!
//! The registry maps a Rust `TypeId` to the descriptor of the enum or flag
//! type, so a property can discover that its value type is an enumeration.
//! Registering an enum also registers `Scope::Name` as a user type.

use std::any::TypeId;

use crate::metatype;
use crate::runtime::runtime;

/// Descriptor of an enum or flag type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEnum {
    name: String,
    scope: String,
    is_flag: bool,
    keys: Vec<(String, i32)>,
}

impl MetaEnum {
    /// Create a descriptor
    ///
    /// # Arguments
    /// * `scope` - Name of the enclosing class
    /// * `name` - Enum type name
    /// * `is_flag` - Values combine with `|`
    /// * `keys` - Ordered key/value pairs
    pub fn new(scope: &str, name: &str, is_flag: bool, keys: &[(&str, i32)]) -> Self {
        Self {
            name: name.to_string(),
            scope: scope.to_string(),
            is_flag,
            keys: keys.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// `Scope::Name`
    pub fn qualified_name(&self) -> String {
        if self.scope.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.scope, self.name)
        }
    }

    pub fn is_flag(&self) -> bool {
        self.is_flag
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(|(k, _)| k.as_str())
    }

    pub fn value(&self, index: usize) -> Option<i32> {
        self.keys.get(index).map(|(_, v)| *v)
    }

    /// Value of `key`; accepts `Key`, `Name::Key` and `Scope::Key` spellings
    pub fn key_to_value(&self, key: &str) -> Option<i32> {
        let key = self.strip_scope(key.trim());
        self.keys.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// First key with the given value
    pub fn value_to_key(&self, value: i32) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(k, _)| k.as_str())
    }

    /// Evaluate an expression such as `Left|Right`, `~Left` or `0x4|Mono`
    ///
    /// Returns `None` if any term is neither a key nor an integer literal.
    pub fn keys_to_value(&self, keys: &str) -> Option<i32> {
        let mut result = 0i32;
        for term in keys.split('|') {
            let term = term.trim();
            let (negate, term) = match term.strip_prefix('~') {
                Some(rest) => (true, rest.trim()),
                None => (false, term),
            };

            let value = match self.key_to_value(term) {
                Some(v) => v,
                None => parse_int(term)?,
            };
            result |= if negate { !value } else { value };
        }
        Some(result)
    }

    /// Keys whose bits are all set in `value`, joined with `|`
    ///
    /// A zero-valued key is only reported when `value` is zero.
    pub fn value_to_keys(&self, value: i32) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let mut remaining = value;

        for (k, v) in &self.keys {
            let matched = if *v == 0 {
                value == 0
            } else {
                (v & value) == *v && (v & remaining) != 0
            };
            if matched && !parts.contains(&k.as_str()) {
                parts.push(k);
                remaining &= !v;
            }
        }

        parts.join("|")
    }

    fn strip_scope<'a>(&self, key: &'a str) -> &'a str {
        match key.rsplit_once("::") {
            Some((prefix, rest)) if prefix == self.scope || prefix == self.name => rest,
            Some((prefix, rest)) if prefix == self.qualified_name() => rest,
            _ => key,
        }
    }
}

fn parse_int(term: &str) -> Option<i32> {
    if let Some(hex) = term
        .strip_prefix("0x")
        .or_else(|| term.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16).ok().map(|v| v as i32);
    }
    term.parse().ok()
}

/// A Rust type that is described by a [`MetaEnum`]
///
/// Implemented by [`meta_enum!`](crate::meta_enum) and
/// [`meta_flags!`](crate::meta_flags).
pub trait EnumValue: Copy + Send + Sync + 'static {
    fn to_raw(self) -> i32;

    fn from_raw(raw: i32) -> Option<Self>;

    fn meta_enum() -> &'static MetaEnum;
}

/// Register `E` so properties of type `E` are recognised as enums
///
/// Returns the user type id of `Scope::Name`.
pub fn register_enum<E: EnumValue>() -> u32 {
    let meta = E::meta_enum();
    runtime().register_enum(TypeId::of::<E>(), meta);
    let id = metatype::register_type(&meta.qualified_name());
    tracing::trace!("Registered enum {} as {}", meta.qualified_name(), id);
    id
}

/// Descriptor for a registered enum type
pub fn enum_for_type(type_id: TypeId) -> Option<&'static MetaEnum> {
    runtime().enum_for_type(type_id)
}

/// Find a registered enum by scope and name
pub fn find_enum(scope: &str, name: &str) -> Option<&'static MetaEnum> {
    runtime().find_enum(scope, name)
}

pub(crate) mod local {
    use std::any::TypeId;
    use std::sync::LazyLock;

    use dashmap::DashMap;

    use super::MetaEnum;

    static ENUM_REGISTRY: LazyLock<DashMap<TypeId, &'static MetaEnum>> =
        LazyLock::new(DashMap::new);

    pub fn register(type_id: TypeId, meta: &'static MetaEnum) {
        ENUM_REGISTRY.insert(type_id, meta);
    }

    pub fn of_type(type_id: TypeId) -> Option<&'static MetaEnum> {
        ENUM_REGISTRY.get(&type_id).map(|entry| *entry.value())
    }

    pub fn find(scope: &str, name: &str) -> Option<&'static MetaEnum> {
        ENUM_REGISTRY
            .iter()
            .find(|entry| entry.value().scope == scope && entry.value().name == name)
            .map(|entry| *entry.value())
    }
}

/// Declare an enum usable as a property type
///
/// ```ignore
/// meta_enum! {
///     pub enum Channel in "Sample" {
///         Mono = 1,
///         Stereo = 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! meta_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident in $scope:literal {
            $($variant:ident = $value:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        $vis enum $name {
            $($variant = $value),*
        }

        impl $crate::meta::EnumValue for $name {
            fn to_raw(self) -> i32 {
                self as i32
            }

            fn from_raw(raw: i32) -> Option<Self> {
                $(if raw == $name::$variant as i32 {
                    return Some($name::$variant);
                })*
                None
            }

            fn meta_enum() -> &'static $crate::meta::MetaEnum {
                static META: std::sync::OnceLock<$crate::meta::MetaEnum> =
                    std::sync::OnceLock::new();
                META.get_or_init(|| {
                    $crate::meta::MetaEnum::new(
                        $scope,
                        stringify!($name),
                        false,
                        &[$((stringify!($variant), $name::$variant as i32)),*],
                    )
                })
            }
        }

        impl $crate::variant::VariantValue for $name {
            fn type_name() -> &'static str {
                concat!($scope, "::", stringify!($name))
            }

            fn to_variant(self) -> $crate::variant::Variant {
                $crate::variant::Variant::Int(self as i32)
            }

            fn from_variant(value: &$crate::variant::Variant) -> Option<Self> {
                use $crate::meta::EnumValue;
                let raw = match value {
                    $crate::variant::Variant::String(key) => Self::meta_enum().key_to_value(key)?,
                    other => other.value::<i32>()?,
                };
                Self::from_raw(raw)
            }
        }
    };
}

/// Describe a `bitflags` type with `u32` bits as a flag property type
///
/// ```ignore
/// bitflags::bitflags! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub struct Channels: u32 { const LEFT = 1; const RIGHT = 2; }
/// }
/// meta_flags!(Channels in "Sample");
/// ```
#[macro_export]
macro_rules! meta_flags {
    ($name:ident in $scope:literal) => {
        impl $crate::meta::EnumValue for $name {
            fn to_raw(self) -> i32 {
                self.bits() as i32
            }

            fn from_raw(raw: i32) -> Option<Self> {
                Self::from_bits(raw as u32)
            }

            fn meta_enum() -> &'static $crate::meta::MetaEnum {
                static META: std::sync::OnceLock<$crate::meta::MetaEnum> =
                    std::sync::OnceLock::new();
                META.get_or_init(|| {
                    let keys: Vec<(&str, i32)> = Self::all()
                        .iter_names()
                        .map(|(key, flag)| (key, flag.bits() as i32))
                        .collect();
                    $crate::meta::MetaEnum::new($scope, stringify!($name), true, &keys)
                })
            }
        }

        impl $crate::variant::VariantValue for $name {
            fn type_name() -> &'static str {
                concat!($scope, "::", stringify!($name))
            }

            fn to_variant(self) -> $crate::variant::Variant {
                $crate::variant::Variant::Int(self.bits() as i32)
            }

            fn from_variant(value: &$crate::variant::Variant) -> Option<Self> {
                use $crate::meta::EnumValue;
                let raw = match value {
                    $crate::variant::Variant::String(keys) => {
                        Self::meta_enum().keys_to_value(keys)?
                    }
                    other => other.value::<i32>()?,
                };
                Self::from_raw(raw)
            }
        }
    };
}
