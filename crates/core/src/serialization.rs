//! Property snapshots as JSON
//!
//! [`store_properties`] captures every stored property of an object,
//! [`restore_properties`] writes such a snapshot back. Inherited properties
//! are included. Dynamic properties are not.

use serde_json::{Map, Value};

use crate::object::Object;
use crate::variant::Variant;

/// Readable, stored properties of `obj` keyed by name
///
/// Properties that read as [`Variant::Invalid`] or hold custom values are
/// left out.
pub fn store_properties(obj: &dyn Object) -> Map<String, Value> {
    let meta = obj.meta_object();
    let mut out = Map::new();

    for index in 0..meta.property_count() {
        let Some(property) = meta.property(index) else {
            continue;
        };
        if !property.is_readable() || !property.is_stored(Some(obj)) {
            continue;
        }

        let value = property.read(obj);
        if matches!(value, Variant::Invalid | Variant::Custom(_)) {
            continue;
        }
        match serde_json::to_value(&value) {
            Ok(json) => {
                out.insert(property.name().to_string(), json);
            }
            Err(e) => tracing::warn!("Cannot store property {}: {}", property.name(), e),
        }
    }

    out
}

/// Write the entries of `values` back into `obj`
///
/// Only writable, stored properties are touched. Returns the number of
/// properties written; unknown names and rejected values are skipped.
pub fn restore_properties(obj: &dyn Object, values: &Map<String, Value>) -> usize {
    let meta = obj.meta_object();
    let mut written = 0;

    for (name, json) in values {
        let Some(property) = meta.index_of_property(name).and_then(|i| meta.property(i)) else {
            tracing::debug!("{} has no property {}", meta.class_name(), name);
            continue;
        };
        if !property.is_writable() || !property.is_stored(Some(obj)) {
            continue;
        }

        if property.write(obj, Variant::from_json(json)) {
            written += 1;
        } else {
            tracing::warn!(
                "Cannot restore {}.{} from {}",
                meta.class_name(),
                name,
                json
            );
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::OnceLock;

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::meta::{constant_jar, read_jar, write_jar, MetaObject, MetaObjectBuilder, PropertyBuilder};
    use crate::object::testing::{BoundedCounter, Counter};
    use crate::object::{new_object, ObjectBase, ObjectExt};

    struct Session {
        base: ObjectBase,
        user: Mutex<String>,
        token: Mutex<String>,
    }

    impl Object for Session {
        fn meta_object(&self) -> &'static MetaObject {
            static META: OnceLock<&'static MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObjectBuilder::for_type::<Session>("Session")
                    .property(
                        PropertyBuilder::new::<String>("user")
                            .read(read_jar(|s: &Session| s.user.lock().clone()))
                            .write(write_jar(|s: &Session, v: String| *s.user.lock() = v)),
                    )
                    .property(
                        PropertyBuilder::new::<String>("token")
                            .read(read_jar(|s: &Session| s.token.lock().clone()))
                            .write(write_jar(|s: &Session, v: String| *s.token.lock() = v))
                            .stored(constant_jar(false)),
                    )
                    .build()
            })
        }

        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn session(user: &str, token: &str) -> Session {
        Session {
            base: ObjectBase::new(),
            user: Mutex::new(user.to_string()),
            token: Mutex::new(token.to_string()),
        }
    }

    #[test]
    fn test_store_includes_inherited_properties() {
        let bounded = BoundedCounter::new(3);
        let stored = store_properties(&bounded);
        assert_eq!(stored.get("value"), Some(&json!(0)));
        assert_eq!(stored.get("limit"), Some(&json!(3)));
    }

    #[test]
    fn test_unstored_properties_are_skipped() {
        let stored = store_properties(&session("ada", "secret"));
        assert_eq!(stored.get("user"), Some(&json!("ada")));
        assert!(!stored.contains_key("token"));
    }

    #[test]
    fn test_restore_writes_back() {
        let source = new_object(Counter::new(42));
        let target = new_object(Counter::new(0));

        assert_eq!(restore_properties(&*target, &store_properties(&*source)), 1);
        assert_eq!(target.value(), 42);
    }

    #[test]
    fn test_restore_skips_unknown_and_read_only() {
        let bounded = BoundedCounter::new(3);
        let mut values = Map::new();
        values.insert("limit".to_string(), json!(10));
        values.insert("missing".to_string(), json!(true));
        values.insert("value".to_string(), json!(5));

        assert_eq!(restore_properties(&bounded, &values), 1);
        assert_eq!(bounded.limit, 3);
        assert_eq!(bounded.property("value"), Variant::Int(5));
    }

    #[test]
    fn test_restore_ignores_unstored() {
        let target = session("", "keep");
        let values = json!({ "user": "grace", "token": "leak" });
        let Value::Object(values) = values else {
            unreachable!()
        };

        assert_eq!(restore_properties(&target, &values), 1);
        assert_eq!(*target.user.lock(), "grace");
        assert_eq!(*target.token.lock(), "keep");
    }
}
