//! Process-wide type id registry
//!
//! Built-in value types have fixed ids. Every other type name (custom value
//! types, registered enums) is assigned an id at or above [`types::USER_TYPE`]
//! the first time it is registered. Ids are never reused.

use crate::runtime::runtime;

/// Fixed type ids
pub mod types {
    pub const INVALID: u32 = 0;
    pub const BOOL: u32 = 1;
    pub const INT: u32 = 2;
    pub const UINT: u32 = 3;
    pub const LONG_LONG: u32 = 4;
    pub const ULONG_LONG: u32 = 5;
    pub const DOUBLE: u32 = 6;
    pub const MAP: u32 = 8;
    pub const LIST: u32 = 9;
    pub const STRING: u32 = 10;
    pub const STRING_LIST: u32 = 11;
    pub const FLOAT: u32 = 38;
    pub const VARIANT: u32 = 41;
    pub const VOID: u32 = 43;

    /// First id handed out to registered types
    pub const USER_TYPE: u32 = 1024;
}

const BUILTIN_TYPES: &[(&str, u32)] = &[
    ("void", types::VOID),
    ("bool", types::BOOL),
    ("i32", types::INT),
    ("u32", types::UINT),
    ("i64", types::LONG_LONG),
    ("u64", types::ULONG_LONG),
    ("f64", types::DOUBLE),
    ("f32", types::FLOAT),
    ("String", types::STRING),
    ("Vec<String>", types::STRING_LIST),
    ("VariantList", types::LIST),
    ("VariantMap", types::MAP),
    ("Variant", types::VARIANT),
];

/// Spellings accepted for built-in types
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("int", "i32"),
    ("unsigned int", "u32"),
    ("uint", "u32"),
    ("long long", "i64"),
    ("qint64", "i64"),
    ("unsigned long long", "u64"),
    ("quint64", "u64"),
    ("double", "f64"),
    ("float", "f32"),
    ("str", "String"),
    ("&str", "String"),
    ("QString", "String"),
    ("QStringList", "Vec<String>"),
    ("()", "void"),
];

/// Normalize a type spelling
///
/// Strips `const`, reference markers and redundant whitespace, then maps
/// common aliases (`int`, `double`, `QString`, ...) to their canonical name.
pub fn normalized_type(name: &str) -> String {
    let mut words: Vec<&str> = name.split_whitespace().collect();
    if words.first() == Some(&"const") {
        words.remove(0);
    }
    let mut joined = words.join(" ");
    while joined.len() > 1 && joined.ends_with('&') {
        joined.pop();
        joined.truncate(joined.trim_end().len());
    }
    // leading & is kept only for "&str"
    if joined.starts_with('&') && joined != "&str" {
        joined.remove(0);
    }

    for (alias, canonical) in TYPE_ALIASES {
        if joined == *alias {
            return (*canonical).to_string();
        }
    }

    joined.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Look up the id of a type name without registering it
pub fn type_id_from_name(name: &str) -> Option<u32> {
    let name = normalized_type(name);
    if let Some((_, id)) = BUILTIN_TYPES.iter().find(|(n, _)| *n == name) {
        return Some(*id);
    }
    runtime().user_type_id(&name)
}

/// Register a type name, returning its id
///
/// Built-in names return their fixed id. Registering the same name twice
/// returns the same id.
pub fn register_type(name: &str) -> u32 {
    if let Some(id) = type_id_from_name(name) {
        return id;
    }

    runtime().register_type(&normalized_type(name))
}

/// Name for a type id
pub fn type_name(id: u32) -> Option<String> {
    if id >= types::USER_TYPE {
        return runtime().user_type_name(id);
    }
    BUILTIN_TYPES
        .iter()
        .find(|(_, builtin)| *builtin == id)
        .map(|(name, _)| (*name).to_string())
}

/// Check whether an id is built in or was registered
pub fn is_registered(id: u32) -> bool {
    type_name(id).is_some()
}

pub(crate) mod local {
    use std::collections::HashMap;
    use std::sync::LazyLock;

    use parking_lot::RwLock;

    use super::types;

    #[derive(Default)]
    struct TypeRegistry {
        names: Vec<String>,
        by_name: HashMap<String, u32>,
    }

    static USER_TYPES: LazyLock<RwLock<TypeRegistry>> =
        LazyLock::new(|| RwLock::new(TypeRegistry::default()));

    pub fn id(normalized: &str) -> Option<u32> {
        USER_TYPES.read().by_name.get(normalized).copied()
    }

    pub fn register(normalized: &str) -> u32 {
        let mut registry = USER_TYPES.write();
        if let Some(id) = registry.by_name.get(normalized) {
            return *id;
        }

        let id = types::USER_TYPE + registry.names.len() as u32;
        registry.names.push(normalized.to_string());
        registry.by_name.insert(normalized.to_string(), id);
        tracing::trace!("Registered type {} as {}", normalized, id);
        id
    }

    pub fn name(id: u32) -> Option<String> {
        let index = id.checked_sub(types::USER_TYPE)? as usize;
        USER_TYPES.read().names.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_fixed() {
        assert_eq!(type_id_from_name("bool"), Some(types::BOOL));
        assert_eq!(type_id_from_name("f32"), Some(types::FLOAT));
        assert_eq!(type_id_from_name("double"), Some(types::DOUBLE));
        assert_eq!(type_id_from_name("const QString &"), Some(types::STRING));
        assert_eq!(type_name(types::INT).as_deref(), Some("i32"));
    }

    #[test]
    fn test_register_user_type() {
        let name = "test_metatype::Gadget";
        assert_eq!(type_id_from_name(name), None);

        let id = register_type(name);
        assert!(id >= types::USER_TYPE);
        assert_eq!(register_type(name), id);
        assert_eq!(type_id_from_name(name), Some(id));
        assert_eq!(type_name(id).as_deref(), Some(name));
        assert!(is_registered(id));
    }

    #[test]
    fn test_register_builtin_returns_fixed_id() {
        assert_eq!(register_type("int"), types::INT);
    }

    #[test]
    fn test_normalized_type() {
        assert_eq!(normalized_type("  unsigned   int "), "u32");
        assert_eq!(normalized_type("const Vec<String>&"), "Vec<String>");
        assert_eq!(normalized_type("Vec< String >"), "Vec<String>");
        assert_eq!(normalized_type("&str"), "String");
        assert_eq!(normalized_type("Gadget"), "Gadget");
    }
}
