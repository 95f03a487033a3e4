//! Property descriptors

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::meta::enums::{enum_for_type, MetaEnum};
use crate::meta::jar::{JarRead, JarReset, JarWrite};
use crate::meta::method::{MetaMethod, MethodSignature, MethodType};
use crate::meta::object::MetaObject;
use crate::metatype::{self, normalized_type, types};
use crate::object::Object;
use crate::variant::Variant;

/// Descriptor of one property
///
/// Built through [`PropertyBuilder`](crate::meta::PropertyBuilder) and owned
/// by the declaring [`MetaObject`].
pub struct MetaProperty {
    pub(crate) name: String,
    pub(crate) type_resolver: fn() -> &'static str,
    pub(crate) type_name: OnceLock<String>,
    pub(crate) value_type: Option<TypeId>,
    pub(crate) enum_accessor: Option<fn() -> &'static MetaEnum>,
    pub(crate) read: Option<Arc<dyn JarRead>>,
    pub(crate) write: Option<Arc<dyn JarWrite>>,
    pub(crate) reset: Option<Arc<dyn JarReset>>,
    pub(crate) designable: Option<Arc<dyn JarRead>>,
    pub(crate) scriptable: Option<Arc<dyn JarRead>>,
    pub(crate) stored: Option<Arc<dyn JarRead>>,
    pub(crate) user: Option<Arc<dyn JarRead>>,
    pub(crate) notify: Option<MethodSignature>,
    pub(crate) revision: u32,
    pub(crate) constant: bool,
    pub(crate) is_final: bool,
    pub(crate) setter_name: Option<String>,
    pub(crate) meta_object: OnceLock<&'static MetaObject>,
}

/// Evaluate an optional predicate Jar
///
/// No Jar yields `default`. A static Jar runs without an object. A
/// non-static Jar without an object also yields `default`.
fn predicate(jar: Option<&Arc<dyn JarRead>>, obj: Option<&dyn Object>, default: bool) -> bool {
    let Some(jar) = jar else {
        return default;
    };

    match obj {
        Some(obj) => jar.run::<bool>(Some(obj)).unwrap_or(default),
        None if jar.is_static() => jar.run::<bool>(None).unwrap_or(default),
        None => default,
    }
}

impl MetaProperty {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type name, resolved on first use
    pub fn type_name(&self) -> &str {
        self.type_name
            .get_or_init(|| normalized_type((self.type_resolver)()))
    }

    /// Built-in type id, `INT` for enums, or `USER_TYPE` for anything else
    pub fn type_id(&self) -> u32 {
        if self.is_enum_type() {
            return types::INT;
        }
        match metatype::type_id_from_name(self.type_name()) {
            Some(id) if id < types::USER_TYPE => id,
            _ => types::USER_TYPE,
        }
    }

    /// Registered type id
    ///
    /// Enums resolve through `Scope::Name` and fall back to `INT` when the
    /// enum was never registered as a type.
    pub fn user_type(&self) -> u32 {
        if let Some(meta_enum) = self.enumerator() {
            return metatype::type_id_from_name(&meta_enum.qualified_name())
                .unwrap_or(types::INT);
        }
        metatype::register_type(self.type_name())
    }

    /// Descriptor of the property's enum type, if it is one
    pub fn enumerator(&self) -> Option<&'static MetaEnum> {
        if let Some(accessor) = self.enum_accessor {
            return Some(accessor());
        }
        self.value_type.and_then(enum_for_type)
    }

    pub fn is_enum_type(&self) -> bool {
        self.enumerator().is_some()
    }

    pub fn is_flag_type(&self) -> bool {
        self.enumerator().is_some_and(MetaEnum::is_flag)
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn is_readable(&self) -> bool {
        self.read.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some() && !self.constant
    }

    pub fn is_resettable(&self) -> bool {
        self.reset.is_some()
    }

    pub fn has_notify_signal(&self) -> bool {
        self.notify.is_some()
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Class that declares this property
    pub fn enclosing_meta_object(&self) -> Option<&'static MetaObject> {
        self.meta_object.get().copied()
    }

    /// Read the value from `obj`
    ///
    /// Returns [`Variant::Invalid`] if there is no read accessor or `obj`
    /// is not an instance of the declaring class.
    pub fn read(&self, obj: &dyn Object) -> Variant {
        match &self.read {
            Some(jar) => jar.run_v(Some(obj)),
            None => Variant::Invalid,
        }
    }

    /// Write `value` to `obj`
    ///
    /// Enum properties accept key names (`"Stereo"`, `"Left|Right"`).
    /// Returns false if the property is not writable or the value does not
    /// convert to the property type.
    pub fn write(&self, obj: &dyn Object, value: impl Into<Variant>) -> bool {
        if !self.is_writable() {
            return false;
        }
        let Some(jar) = &self.write else {
            return false;
        };

        let mut value = value.into();
        if let (Some(meta_enum), Variant::String(keys)) = (self.enumerator(), &value) {
            let raw = if meta_enum.is_flag() {
                meta_enum.keys_to_value(keys)
            } else {
                meta_enum.key_to_value(keys)
            };
            match raw {
                Some(raw) => value = Variant::Int(raw),
                None => return false,
            }
        }

        jar.run_v(obj, &value)
    }

    /// Reset `obj`'s value; false without a reset accessor
    pub fn reset(&self, obj: &dyn Object) -> bool {
        match &self.reset {
            Some(jar) => jar.run_v(obj),
            None => false,
        }
    }

    pub fn is_designable(&self, obj: Option<&dyn Object>) -> bool {
        predicate(self.designable.as_ref(), obj, true)
    }

    pub fn is_scriptable(&self, obj: Option<&dyn Object>) -> bool {
        predicate(self.scriptable.as_ref(), obj, true)
    }

    pub fn is_stored(&self, obj: Option<&dyn Object>) -> bool {
        predicate(self.stored.as_ref(), obj, true)
    }

    pub fn is_user(&self, obj: Option<&dyn Object>) -> bool {
        predicate(self.user.as_ref(), obj, false)
    }

    /// Index of the notify signal in the declaring class's method table
    ///
    /// Matched structurally, not by a stored index, so it is a linear scan.
    pub fn notify_signal_index(&self) -> Option<usize> {
        let signature = self.notify.as_ref()?;
        let meta = self.enclosing_meta_object()?;
        let class_name = meta.class_name();

        (0..meta.method_count()).find(|&index| {
            meta.method(index).is_some_and(|m| {
                m.method_type() == MethodType::Signal && m.matches(signature, class_name)
            })
        })
    }

    pub fn notify_signal(&self) -> Option<&'static MetaMethod> {
        let index = self.notify_signal_index()?;
        self.enclosing_meta_object()?.method(index)
    }

    /// Whether the setter follows the `setName` / `set_name` convention
    ///
    /// A naming check only.
    pub fn has_std_cpp_set(&self) -> bool {
        let Some(setter) = &self.setter_name else {
            return false;
        };

        let mut chars = self.name.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => return false,
        };

        *setter == format!("set{}", capitalized) || *setter == format!("set_{}", self.name)
    }
}

impl fmt::Debug for MetaProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaProperty")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .field("notify", &self.notify)
            .finish()
    }
}
