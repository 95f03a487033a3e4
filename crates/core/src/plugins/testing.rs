//! Helpers for plugin tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Fresh empty directory under the system temp dir
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "metaplug-{}-{}-{}",
        label,
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Create an empty file in `dir`
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

/// Declare a plugin class with the given class-info and a counting factory
macro_rules! test_plugin {
    ($name:ident, iid = $iid:expr, keys = $keys:expr, version = $version:expr) => {
        pub struct $name {
            base: $crate::object::ObjectBase,
        }

        impl $name {
            fn counter() -> &'static ::std::sync::atomic::AtomicUsize {
                static COUNT: ::std::sync::atomic::AtomicUsize =
                    ::std::sync::atomic::AtomicUsize::new(0);
                &COUNT
            }

            /// Number of instances the factory created
            #[allow(dead_code)]
            pub fn constructed() -> usize {
                Self::counter().load(::std::sync::atomic::Ordering::SeqCst)
            }

            pub fn static_meta_object() -> &'static $crate::meta::MetaObject {
                static META: ::std::sync::OnceLock<&'static $crate::meta::MetaObject> =
                    ::std::sync::OnceLock::new();
                META.get_or_init(|| {
                    $crate::meta::MetaObjectBuilder::for_type::<$name>(stringify!($name))
                        .class_info(::metaplug_sdk::class_info::PLUGIN_IID, $iid)
                        .class_info(::metaplug_sdk::class_info::PLUGIN_KEY, $keys)
                        .class_info(::metaplug_sdk::class_info::PLUGIN_VERSION, $version)
                        .factory(|| {
                            $name::counter().fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                            $crate::object::new_object($name {
                                base: $crate::object::ObjectBase::new(),
                            })
                        })
                        .build()
                })
            }
        }

        impl $crate::object::Object for $name {
            fn meta_object(&self) -> &'static $crate::meta::MetaObject {
                Self::static_meta_object()
            }

            fn base(&self) -> &$crate::object::ObjectBase {
                &self.base
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}

pub(crate) use test_plugin;
