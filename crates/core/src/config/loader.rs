//! Config path resolution
//!
//! Everything lives below one base directory: `METAPLUG_HOME` when set,
//! otherwise the directory of the running executable.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "METAPLUG_HOME";

/// Returns the metaplug base directory.
pub fn metaplug_base_dir() -> ConfigResult<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    exe.parent()
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the base configs directory: `<base>/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(metaplug_base_dir()?.join("configs"))
}

/// Returns the path for a plugin's config file.
///
/// Path: `<base>/configs/plugins/{plugin_name}/{plugin_name}.toml`
pub fn plugin_config_path(plugin_name: &str) -> ConfigResult<PathBuf> {
    Ok(configs_dir()?
        .join("plugins")
        .join(plugin_name)
        .join(format!("{}.toml", plugin_name)))
}

/// Returns the core config path: `<base>/configs/core.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join("core.toml"))
}
