//! Plugin discovery and loading
//!
//! - [`LibraryHandle`] - one shared handle per library file, loads it and
//!   constructs its plugin object at most once
//! - [`FactoryLoader`] - scans the search directories for libraries that
//!   implement an interface id and maps their keys to them
//! - [`paths`] - the process-wide search directories
//! - [`statics`] - plugins linked into the executable
//!
//! A plugin library exports its meta object through [`export_plugin!`].
//! The meta object must carry `plugin_iid` and `plugin_version` class-info,
//! usually with a comma separated `plugin_key` list.
//!
//! [`export_plugin!`]: crate::export_plugin

pub mod backend;
mod export;
pub mod factory;
pub mod library;
pub mod paths;
pub mod statics;

#[cfg(test)]
pub(crate) mod testing;

use metaplug_engine::LoadHints;

use crate::config::CoreConfig;

pub use backend::{LibraryBackend, MemoryBackend, NativeBackend, OpenedLibrary, Resolution};
pub use factory::{
    default_load_hints, set_default_load_hints, CaseSensitivity, FactoryLoader, PathSource,
};
pub use library::{LibraryHandle, LoadState};
pub use paths::{
    add_library_path, init_library_paths, library_paths, remove_library_path, set_library_paths,
    LibraryPaths, PLUGIN_PATH_ENV,
};
pub use statics::{register_static_plugin, static_instance, static_plugins};

/// Apply the plugin settings of `config`
///
/// Sets the default load hints and reseeds the search directories, which
/// rescans every live loader.
pub fn configure(config: &CoreConfig) {
    let hints = if config.prevent_unload {
        LoadHints::PREVENT_UNLOAD
    } else {
        LoadHints::empty()
    };
    set_default_load_hints(hints);
    init_library_paths(config);
}
