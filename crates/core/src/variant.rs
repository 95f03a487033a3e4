//! Dynamically typed values
//!
//! [`Variant`] is the value container every Jar speaks. Rust types move in
//! and out of it through [`VariantValue`], which performs the same lenient
//! conversions a property system needs (numbers from strings, bools from
//! numbers, and so on).

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::metatype::{self, types};

/// List of variants
pub type VariantList = Vec<Variant>;

/// String-keyed map of variants
pub type VariantMap = BTreeMap<String, Variant>;

/// A value of a registered custom type
#[derive(Clone)]
pub struct CustomValue {
    type_id: u32,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
    eq: fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> bool,
}

impl CustomValue {
    /// Registered type id
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Registered type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the value as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && (self.eq)(&*self.value, &*other.value)
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(..)", self.type_name)
    }
}

fn custom_eq<T: PartialEq + 'static>(
    a: &(dyn Any + Send + Sync),
    b: &(dyn Any + Send + Sync),
) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Dynamically typed value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    /// No value (also the result of calling a `void` accessor)
    #[default]
    Invalid,
    Bool(bool),
    Int(i32),
    UInt(u32),
    LongLong(i64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    List(VariantList),
    Map(VariantMap),
    Custom(CustomValue),
}

impl Variant {
    /// Wrap a custom value, registering its type name on first use
    pub fn from_custom<T>(value: T) -> Self
    where
        T: Any + Clone + PartialEq + Send + Sync,
    {
        let type_name = std::any::type_name::<T>();
        Variant::Custom(CustomValue {
            type_id: metatype::register_type(type_name),
            type_name,
            value: Arc::new(value),
            eq: custom_eq::<T>,
        })
    }

    /// Whether the variant holds a value
    pub fn is_valid(&self) -> bool {
        !matches!(self, Variant::Invalid)
    }

    /// Type id of the held value
    pub fn type_id(&self) -> u32 {
        match self {
            Variant::Invalid => types::INVALID,
            Variant::Bool(_) => types::BOOL,
            Variant::Int(_) => types::INT,
            Variant::UInt(_) => types::UINT,
            Variant::LongLong(_) => types::LONG_LONG,
            Variant::ULongLong(_) => types::ULONG_LONG,
            Variant::Float(_) => types::FLOAT,
            Variant::Double(_) => types::DOUBLE,
            Variant::String(_) => types::STRING,
            Variant::StringList(_) => types::STRING_LIST,
            Variant::List(_) => types::LIST,
            Variant::Map(_) => types::MAP,
            Variant::Custom(c) => c.type_id,
        }
    }

    /// Type name of the held value
    pub fn type_name(&self) -> String {
        match self {
            Variant::Invalid => "Invalid".to_string(),
            Variant::Custom(c) => c.type_name.to_string(),
            other => metatype::type_name(other.type_id()).unwrap_or_default(),
        }
    }

    /// Convert to `T`, if the held value can be converted
    pub fn value<T: VariantValue>(&self) -> Option<T> {
        T::from_variant(self)
    }

    /// Whether [`Variant::value`] would succeed for `T`
    pub fn can_convert<T: VariantValue>(&self) -> bool {
        T::from_variant(self).is_some()
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::String(s) => {
                let s = s.trim();
                Some(!(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")))
            }
            Variant::Float(_) | Variant::Double(_) => self.to_f64().map(|v| v != 0.0),
            _ => self.to_i128().map(|v| v != 0),
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.to_i128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Variant::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Variant::Int(v) => Some(f64::from(*v)),
            Variant::UInt(v) => Some(f64::from(*v)),
            Variant::LongLong(v) => Some(*v as f64),
            Variant::ULongLong(v) => Some(*v as f64),
            Variant::Float(v) => Some(f64::from(*v)),
            Variant::Double(v) => Some(*v),
            Variant::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text form of scalar values and string lists
    pub fn to_text(&self) -> Option<String> {
        match self {
            Variant::Bool(b) => Some(b.to_string()),
            Variant::Int(v) => Some(v.to_string()),
            Variant::UInt(v) => Some(v.to_string()),
            Variant::LongLong(v) => Some(v.to_string()),
            Variant::ULongLong(v) => Some(v.to_string()),
            Variant::Float(v) => Some(v.to_string()),
            Variant::Double(v) => Some(v.to_string()),
            Variant::String(s) => Some(s.clone()),
            Variant::StringList(list) if list.len() == 1 => Some(list[0].clone()),
            _ => None,
        }
    }

    pub fn to_string_list(&self) -> Option<Vec<String>> {
        match self {
            Variant::StringList(list) => Some(list.clone()),
            Variant::String(s) => Some(vec![s.clone()]),
            Variant::List(list) => list.iter().map(Variant::to_text).collect(),
            _ => None,
        }
    }

    pub fn to_list(&self) -> Option<VariantList> {
        match self {
            Variant::List(list) => Some(list.clone()),
            Variant::StringList(list) => Some(list.iter().cloned().map(Variant::String).collect()),
            _ => None,
        }
    }

    pub fn to_map(&self) -> Option<VariantMap> {
        match self {
            Variant::Map(map) => Some(map.clone()),
            _ => None,
        }
    }

    fn to_i128(&self) -> Option<i128> {
        match self {
            Variant::Bool(b) => Some(i128::from(*b)),
            Variant::Int(v) => Some(i128::from(*v)),
            Variant::UInt(v) => Some(i128::from(*v)),
            Variant::LongLong(v) => Some(i128::from(*v)),
            Variant::ULongLong(v) => Some(i128::from(*v)),
            Variant::Float(_) | Variant::Double(_) => {
                let v = self.to_f64()?.round();
                v.is_finite().then_some(v as i128)
            }
            Variant::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert a JSON value into the closest variant
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Variant::Invalid,
            Value::Bool(b) => Variant::Bool(*b),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    i32::try_from(v).map_or(Variant::LongLong(v), Variant::Int)
                } else if let Some(v) = n.as_u64() {
                    Variant::ULongLong(v)
                } else {
                    Variant::Double(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => Variant::String(s.clone()),
            Value::Array(items) => Variant::List(items.iter().map(Variant::from_json).collect()),
            Value::Object(map) => Variant::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Variant::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Invalid => f.write_str("<invalid>"),
            Variant::Custom(c) => write!(f, "{:?}", c),
            Variant::List(list) => {
                let items: Vec<String> = list.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Variant::Map(map) => {
                let items: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Variant::StringList(list) => write!(f, "[{}]", list.join(", ")),
            other => f.write_str(&other.to_text().unwrap_or_default()),
        }
    }
}

/// Custom values serialize as `null`; they have no portable representation
impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Variant::Invalid | Variant::Custom(_) => serializer.serialize_unit(),
            Variant::Bool(v) => serializer.serialize_bool(*v),
            Variant::Int(v) => serializer.serialize_i32(*v),
            Variant::UInt(v) => serializer.serialize_u32(*v),
            Variant::LongLong(v) => serializer.serialize_i64(*v),
            Variant::ULongLong(v) => serializer.serialize_u64(*v),
            Variant::Float(v) => serializer.serialize_f32(*v),
            Variant::Double(v) => serializer.serialize_f64(*v),
            Variant::String(v) => serializer.serialize_str(v),
            Variant::StringList(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Variant::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Variant::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Conversion between a Rust type and [`Variant`]
pub trait VariantValue: Sized + Send + Sync + 'static {
    /// Canonical type name (see [`metatype::normalized_type`])
    fn type_name() -> &'static str;

    fn to_variant(self) -> Variant;

    fn from_variant(value: &Variant) -> Option<Self>;

    /// Type id, registering the name if it is not built in
    fn meta_type() -> u32 {
        metatype::register_type(Self::type_name())
    }
}

impl VariantValue for () {
    fn type_name() -> &'static str {
        "void"
    }

    fn to_variant(self) -> Variant {
        Variant::Invalid
    }

    fn from_variant(_: &Variant) -> Option<Self> {
        Some(())
    }
}

impl VariantValue for Variant {
    fn type_name() -> &'static str {
        "Variant"
    }

    fn to_variant(self) -> Variant {
        self
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        Some(value.clone())
    }
}

impl VariantValue for bool {
    fn type_name() -> &'static str {
        "bool"
    }

    fn to_variant(self) -> Variant {
        Variant::Bool(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_bool()
    }
}

macro_rules! impl_integer_value {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl VariantValue for $ty {
                fn type_name() -> &'static str {
                    $name
                }

                fn to_variant(self) -> Variant {
                    Variant::$variant(self)
                }

                fn from_variant(value: &Variant) -> Option<Self> {
                    value.to_i128().and_then(|v| <$ty>::try_from(v).ok())
                }
            }

            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$variant(value)
                }
            }
        )*
    };
}

impl_integer_value! {
    i32 => Int, "i32";
    u32 => UInt, "u32";
    i64 => LongLong, "i64";
    u64 => ULongLong, "u64";
}

impl VariantValue for f32 {
    fn type_name() -> &'static str {
        "f32"
    }

    fn to_variant(self) -> Variant {
        Variant::Float(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_f64().map(|v| v as f32)
    }
}

impl VariantValue for f64 {
    fn type_name() -> &'static str {
        "f64"
    }

    fn to_variant(self) -> Variant {
        Variant::Double(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_f64()
    }
}

impl VariantValue for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn to_variant(self) -> Variant {
        Variant::String(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_text()
    }
}

impl VariantValue for Vec<String> {
    fn type_name() -> &'static str {
        "Vec<String>"
    }

    fn to_variant(self) -> Variant {
        Variant::StringList(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_string_list()
    }
}

impl VariantValue for VariantList {
    fn type_name() -> &'static str {
        "VariantList"
    }

    fn to_variant(self) -> Variant {
        Variant::List(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_list()
    }
}

impl VariantValue for VariantMap {
    fn type_name() -> &'static str {
        "VariantMap"
    }

    fn to_variant(self) -> Variant {
        Variant::Map(self)
    }

    fn from_variant(value: &Variant) -> Option<Self> {
        value.to_map()
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Float(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<Vec<String>> for Variant {
    fn from(value: Vec<String>) -> Self {
        Variant::StringList(value)
    }
}

impl From<VariantList> for Variant {
    fn from(value: VariantList) -> Self {
        Variant::List(value)
    }
}

impl From<VariantMap> for Variant {
    fn from(value: VariantMap) -> Self {
        Variant::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions() {
        let v = Variant::from(0.5f32);
        assert_eq!(v.value::<f32>(), Some(0.5));
        assert_eq!(v.value::<f64>(), Some(0.5));
        assert_eq!(Variant::Double(2.6).value::<i32>(), Some(3));
        assert_eq!(Variant::Int(-1).value::<u32>(), None);
        assert_eq!(Variant::LongLong(i64::MAX).value::<i32>(), None);
        assert_eq!(Variant::from("42").value::<i32>(), Some(42));
    }

    #[test]
    fn test_bool_conversions() {
        assert_eq!(Variant::Int(2).to_bool(), Some(true));
        assert_eq!(Variant::from("false").to_bool(), Some(false));
        assert_eq!(Variant::from("0").to_bool(), Some(false));
        assert_eq!(Variant::from("yes").to_bool(), Some(true));
        assert_eq!(Variant::Invalid.to_bool(), None);
    }

    #[test]
    fn test_invalid_and_void() {
        assert!(!Variant::Invalid.is_valid());
        assert!(!().to_variant().is_valid());
        assert_eq!(Variant::default().type_id(), types::INVALID);
    }

    #[test]
    fn test_custom_value_equality() {
        #[derive(Clone, PartialEq)]
        struct Point(i32, i32);

        let a = Variant::from_custom(Point(1, 2));
        let b = Variant::from_custom(Point(1, 2));
        let c = Variant::from_custom(Point(2, 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.type_id() >= types::USER_TYPE);

        match &a {
            Variant::Custom(custom) => assert!(custom.downcast_ref::<Point>().is_some()),
            other => panic!("expected custom value, got {:?}", other),
        }
    }

    #[test]
    fn test_json_serialization() {
        let mut map = VariantMap::new();
        map.insert("name".to_string(), Variant::from("codec"));
        map.insert("rate".to_string(), Variant::Int(44100));
        map.insert("tags".to_string(), Variant::from(vec!["a".to_string()]));

        let json = serde_json::to_value(Variant::Map(map.clone())).unwrap();
        assert_eq!(json["rate"], 44100);
        assert_eq!(json["tags"][0], "a");

        let back = Variant::from_json(&json);
        assert_eq!(back.value::<VariantMap>().unwrap()["name"], Variant::from("codec"));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Variant::from(1.0f32).type_name(), "f32");
        assert_eq!(Variant::from("x").type_name(), "String");
        assert_eq!(<Vec<String>>::meta_type(), types::STRING_LIST);
    }
}
