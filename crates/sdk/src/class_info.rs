//! Class-info key names
//!
//! These strings must match exactly on both sides of the plugin boundary.

/// Interface identifier the plugin implements (compared case-sensitively)
pub const PLUGIN_IID: &str = "plugin_iid";

/// Comma-separated list of keys the plugin answers to
pub const PLUGIN_KEY: &str = "plugin_key";

/// Framework version the plugin was built against (non-negative integer)
pub const PLUGIN_VERSION: &str = "plugin_version";

/// Separator between entries of [`PLUGIN_KEY`]
pub const KEY_SEPARATOR: char = ',';
