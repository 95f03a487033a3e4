//! Exported symbol names for plugin libraries
//!
//! These strings must match exactly what the plugin exports.
//! See `export_plugin!` in metaplug-core for the generating side.

/// ABI tag accessor (`PluginAbiFn`)
pub const PLUGIN_ABI: &[u8] = b"metaplug_plugin_abi\0";

/// Runtime attach entry point (`PluginAttachFn`)
pub const PLUGIN_ATTACH: &[u8] = b"metaplug_plugin_attach\0";

/// Meta object accessor (`PluginMetaObjectFn`)
pub const PLUGIN_META_OBJECT: &[u8] = b"metaplug_plugin_meta_object\0";

/// Collected symbol names for iteration
pub const EXPORTED_SYMBOLS: &[(&str, &[u8])] = &[
    ("PluginAbi", PLUGIN_ABI),
    ("PluginAttach", PLUGIN_ATTACH),
    ("PluginMetaObject", PLUGIN_META_OBJECT),
];
