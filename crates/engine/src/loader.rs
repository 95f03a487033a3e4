//! Plugin entry point resolution
//!
//! A plugin library exports three `extern "C"` functions: an ABI tag
//! accessor, a runtime attach entry point and a meta object accessor. The
//! tag is compared before anything else is touched, since the runtime and
//! the meta object are Rust types whose layout depends on the exact
//! framework build.

use std::ffi::{c_char, CStr};
use std::ptr::NonNull;

use metaplug_sdk::{
    symbols, PluginAbiFn, PluginAttachFn, PluginMetaObjectFn, RawMetaObject, RawRuntime,
};

use crate::error::LibraryError;
use crate::library::SharedLibrary;

/// Verify the library was built against the same framework build as the host
///
/// `expected` is the host's full ABI tag.
///
/// # Safety
/// The library must export `metaplug_plugin_abi` with the [`PluginAbiFn`]
/// signature if it exports it at all.
pub unsafe fn verify_abi(library: &SharedLibrary, expected: &CStr) -> Result<(), LibraryError> {
    let abi_fn = library.get::<PluginAbiFn>(symbols::PLUGIN_ABI)?;
    let tag_ptr: *const c_char = abi_fn();

    if tag_ptr.is_null() {
        return Err(LibraryError::NullSymbol(format!(
            "metaplug_plugin_abi in {}",
            library.path().display()
        )));
    }

    let found = CStr::from_ptr(tag_ptr);
    if found != expected {
        return Err(LibraryError::AbiMismatch {
            path: library.path().display().to_string(),
            expected: expected.to_string_lossy().into_owned(),
            found: found.to_string_lossy().into_owned(),
        });
    }

    tracing::trace!("ABI tag verified for {}", library.path().display());
    Ok(())
}

/// Hand the host runtime to a plugin library
///
/// # Returns
/// * `Err(SymbolNotFound)` - the library has no attach entry point
/// * `Err(AttachRefused)` - the plugin is bound to another runtime
///
/// # Safety
/// [`verify_abi`] must have succeeded for this library, and `runtime` must
/// stay valid for the rest of the process.
pub unsafe fn attach_runtime(
    library: &SharedLibrary,
    runtime: *const RawRuntime,
) -> Result<(), LibraryError> {
    let attach_fn = library.get::<PluginAttachFn>(symbols::PLUGIN_ATTACH)?;

    if !attach_fn(runtime) {
        return Err(LibraryError::AttachRefused(
            library.path().display().to_string(),
        ));
    }

    tracing::trace!("Runtime attached to {}", library.path().display());
    Ok(())
}

/// Resolve the meta object a plugin library exports
///
/// # Returns
/// * `Err(SymbolNotFound)` - the library is not a metaplug plugin
/// * `Err(NullSymbol)` - the accessor exists but returned null
///
/// # Safety
/// [`verify_abi`] and [`attach_runtime`] must have succeeded for this library.
pub unsafe fn load_meta_object(
    library: &SharedLibrary,
) -> Result<NonNull<RawMetaObject>, LibraryError> {
    let meta_fn = library.get::<PluginMetaObjectFn>(symbols::PLUGIN_META_OBJECT)?;

    NonNull::new(meta_fn() as *mut RawMetaObject).ok_or_else(|| {
        LibraryError::NullSymbol(format!(
            "metaplug_plugin_meta_object in {}",
            library.path().display()
        ))
    })
}
