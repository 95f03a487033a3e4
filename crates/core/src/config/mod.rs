//! Configuration
//!
//! TOML files below the base directory (see [`metaplug_base_dir`]):
//! - `configs/core.toml` holds [`CoreConfig`]
//! - `configs/plugins/{name}/{name}.toml` holds each plugin's [`PluginConfig`]
//!
//! A missing file is created with default values on first load.
//!
//! # Example
//!
//! ```ignore
//! use serde::{Deserialize, Serialize};
//! use metaplug_core::PluginConfig;
//!
//! #[derive(Default, Serialize, Deserialize)]
//! pub struct CodecConfig {
//!     pub bitrate: u32,
//! }
//!
//! impl PluginConfig for CodecConfig {
//!     const PLUGIN_NAME: &'static str = "codec";
//! }
//!
//! let config = CodecConfig::load().unwrap_or_default();
//! ```

mod loader;

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use loader::{configs_dir, core_config_path, metaplug_base_dir, plugin_config_path, HOME_ENV};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Neither `METAPLUG_HOME` nor the executable location gave a base path
    #[error("Config directory not available - could not resolve base path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read `path`, or write `T::default()` there if it does not exist
fn load_or_create<T>(path: &Path, what: &str) -> ConfigResult<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: T = toml::from_str(&content)?;
        tracing::debug!("Loaded {} config from {:?}", what, path);
        Ok(config)
    } else {
        let default = T::default();
        write_toml(path, &default)?;
        tracing::info!("Created default {} config at {:?}", what, path);
        Ok(default)
    }
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(value)?)?;
    Ok(())
}

/// Per-plugin configuration.
///
/// The file lives at `configs/plugins/{PLUGIN_NAME}/{PLUGIN_NAME}.toml`.
pub trait PluginConfig: Default + Serialize + DeserializeOwned + Send + Sync {
    const PLUGIN_NAME: &'static str;

    /// Load config from file, creating default if missing.
    fn load() -> ConfigResult<Self> {
        load_or_create(&plugin_config_path(Self::PLUGIN_NAME)?, Self::PLUGIN_NAME)
    }

    /// Save config to file, creating parent directories.
    fn save(&self) -> ConfigResult<()> {
        let path = plugin_config_path(Self::PLUGIN_NAME)?;
        write_toml(&path, self)?;
        tracing::debug!("Saved config for {} to {:?}", Self::PLUGIN_NAME, path);
        Ok(())
    }

    /// Replace self with the current file contents.
    fn reload(&mut self) -> ConfigResult<()> {
        let path = plugin_config_path(Self::PLUGIN_NAME)?;
        *self = toml::from_str(&std::fs::read_to_string(&path)?)?;
        tracing::debug!("Reloaded config for {} from {:?}", Self::PLUGIN_NAME, path);
        Ok(())
    }
}

/// Core framework configuration, `configs/core.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Extra plugin search directories, searched before `METAPLUG_PLUGIN_PATH`
    pub plugin_paths: Vec<PathBuf>,

    /// Never unload plugin libraries, even ones that were rejected
    pub prevent_unload: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            plugin_paths: Vec::new(),
            prevent_unload: false,
        }
    }
}

impl CoreConfig {
    /// Load core config from file, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&core_config_path()?)
    }

    /// Load from an explicit path, creating default if missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        load_or_create(path, "core")
    }

    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&core_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        write_toml(path, self)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload core config from file.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let path = core_config_path()?;
        *self = toml::from_str(&std::fs::read_to_string(&path)?)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }
}
