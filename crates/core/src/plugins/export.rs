//! Plugin entry points
//!
//! A plugin `cdylib` invokes [`export_plugin!`](crate::export_plugin) once
//! with an expression yielding its `&'static MetaObject`. The macro emits
//! the three `extern "C"` entry points named in `metaplug_sdk::symbols`.

/// Export a plugin's meta object from a `cdylib`
///
/// ```ignore
/// metaplug_core::export_plugin!(Codec::static_meta_object());
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($meta:expr) => {
        #[no_mangle]
        pub extern "C" fn metaplug_plugin_abi() -> *const ::std::ffi::c_char {
            $crate::runtime::abi_tag().as_ptr()
        }

        /// # Safety
        /// `runtime` must come from the host's `raw_runtime()` and the ABI
        /// tags must match.
        #[no_mangle]
        pub unsafe extern "C" fn metaplug_plugin_attach(
            runtime: *const $crate::sdk::RawRuntime,
        ) -> bool {
            $crate::runtime::attach(runtime)
        }

        #[no_mangle]
        pub extern "C" fn metaplug_plugin_meta_object() -> *const $crate::sdk::RawMetaObject {
            let meta: &'static $crate::meta::MetaObject = $meta;
            ::std::ptr::from_ref(meta).cast()
        }
    };
}
