//! Plugin entry point type definitions
//!
//! The meta object and the host runtime cross the library boundary as
//! opaque pointers. Each side casts them back to its own types after the
//! ABI tag has been verified.

use std::ffi::c_char;

/// Opaque type for an exported meta object
#[repr(C)]
pub struct RawMetaObject {
    _opaque: [u8; 0],
}

/// Opaque type for the host runtime handed to a plugin
#[repr(C)]
pub struct RawRuntime {
    _opaque: [u8; 0],
}

/// ABI tag accessor signature
///
/// # Returns
/// Pointer to a null-terminated tag string with static lifetime
pub type PluginAbiFn = unsafe extern "C" fn() -> *const c_char;

/// Meta object accessor signature
///
/// Every plugin library exports one of these. The returned pointer refers to
/// a meta object with static storage inside the plugin and stays valid for as
/// long as the library is loaded.
///
/// # Returns
/// Pointer to the plugin's meta object, or null if the plugin failed to
/// register it
pub type PluginMetaObjectFn = unsafe extern "C" fn() -> *const RawMetaObject;

/// Runtime attach signature
///
/// Called once by the host after the ABI tag matched and before the meta
/// object is resolved. From then on the plugin's copy of the runtime
/// forwards to the host's.
///
/// # Returns
/// false if the plugin is already attached to a different runtime
pub type PluginAttachFn = unsafe extern "C" fn(runtime: *const RawRuntime) -> bool;
