//! Library search paths
//!
//! Loaders created with [`PathSource::Global`] scan the process-wide list
//! kept here. Changing the list rescans every loader.
//!
//! [`PathSource::Global`]: super::factory::PathSource::Global

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use parking_lot::RwLock;

use super::factory::FactoryLoader;
use crate::config::CoreConfig;

/// Environment variable with extra plugin directories, in `PATH` syntax
pub const PLUGIN_PATH_ENV: &str = "METAPLUG_PLUGIN_PATH";

/// Ordered list of distinct, canonical directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryPaths {
    paths: Vec<PathBuf>,
}

fn canonical_dir(dir: &Path) -> Option<PathBuf> {
    match dir.canonicalize() {
        Ok(path) if path.is_dir() => Some(path),
        _ => {
            tracing::debug!("Ignoring library path {:?} (not a directory)", dir);
            None
        }
    }
}

impl LibraryPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config directories first, then those from `METAPLUG_PLUGIN_PATH`
    pub fn from_config(config: &CoreConfig) -> Self {
        let mut paths = Self::new();
        for dir in config.plugin_paths.iter().cloned().chain(Self::env_paths()) {
            paths.append_path(&dir);
        }
        paths
    }

    /// Directories listed in `METAPLUG_PLUGIN_PATH`
    pub fn env_paths() -> Vec<PathBuf> {
        std::env::var_os(PLUGIN_PATH_ENV)
            .map(|value| {
                std::env::split_paths(&value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Put `dir` first; an existing entry moves to the front
    ///
    /// Returns false if `dir` is not an existing directory.
    pub fn add_path(&mut self, dir: &Path) -> bool {
        let Some(dir) = canonical_dir(dir) else {
            return false;
        };
        self.paths.retain(|p| *p != dir);
        self.paths.insert(0, dir);
        true
    }

    /// Put `dir` last unless already present
    pub fn append_path(&mut self, dir: &Path) -> bool {
        let Some(dir) = canonical_dir(dir) else {
            return false;
        };
        if !self.paths.contains(&dir) {
            self.paths.push(dir);
        }
        true
    }

    pub fn remove_path(&mut self, dir: &Path) -> bool {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let before = self.paths.len();
        self.paths.retain(|p| *p != dir);
        self.paths.len() != before
    }

    /// Replace the list, keeping order and dropping duplicates
    pub fn set_paths<I, P>(&mut self, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.paths.clear();
        for dir in dirs {
            self.append_path(dir.as_ref());
        }
    }
}

static GLOBAL_PATHS: LazyLock<RwLock<LibraryPaths>> = LazyLock::new(|| {
    let mut paths = LibraryPaths::new();
    for dir in LibraryPaths::env_paths() {
        paths.append_path(&dir);
    }
    RwLock::new(paths)
});

/// Current process-wide search directories
pub fn library_paths() -> Vec<PathBuf> {
    GLOBAL_PATHS.read().paths().to_vec()
}

/// Reseed the process-wide list from config and environment
pub fn init_library_paths(config: &CoreConfig) {
    *GLOBAL_PATHS.write() = LibraryPaths::from_config(config);
    FactoryLoader::refresh_all();
}

/// Prepend a search directory and rescan
pub fn add_library_path(dir: &Path) -> bool {
    let added = GLOBAL_PATHS.write().add_path(dir);
    if added {
        FactoryLoader::refresh_all();
    }
    added
}

/// Remove a search directory and rescan
pub fn remove_library_path(dir: &Path) -> bool {
    let removed = GLOBAL_PATHS.write().remove_path(dir);
    if removed {
        FactoryLoader::refresh_all();
    }
    removed
}

/// Replace the search directories and rescan
pub fn set_library_paths<I, P>(dirs: I)
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    GLOBAL_PATHS.write().set_paths(dirs);
    FactoryLoader::refresh_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::temp_dir;

    #[test]
    fn test_add_path_prepends_and_dedups() {
        let a = temp_dir("paths-a");
        let b = temp_dir("paths-b");
        let mut paths = LibraryPaths::new();

        assert!(paths.append_path(&a));
        assert!(paths.add_path(&b));
        assert!(paths.add_path(&a.join(".")));

        let canonical_a = a.canonicalize().unwrap();
        let canonical_b = b.canonicalize().unwrap();
        assert_eq!(paths.paths(), [canonical_a, canonical_b]);
    }

    #[test]
    fn test_missing_directory_is_ignored() {
        let dir = temp_dir("paths-missing");
        let mut paths = LibraryPaths::new();
        assert!(!paths.add_path(&dir.join("nope")));
        assert!(paths.is_empty());
    }

    #[test]
    fn test_remove_and_set() {
        let a = temp_dir("paths-remove-a");
        let b = temp_dir("paths-remove-b");
        let mut paths = LibraryPaths::new();

        paths.set_paths([&a, &b, &a]);
        assert_eq!(paths.paths().len(), 2);
        assert!(paths.remove_path(&a));
        assert!(!paths.remove_path(&a));
        assert_eq!(paths.paths(), [b.canonicalize().unwrap()]);
    }

    #[test]
    fn test_from_config_keeps_config_order() {
        let a = temp_dir("paths-config-a");
        let b = temp_dir("paths-config-b");
        let config = CoreConfig {
            plugin_paths: vec![b.clone(), a.clone()],
            ..CoreConfig::default()
        };

        let paths = LibraryPaths::from_config(&config);
        assert_eq!(paths.paths()[0], b.canonicalize().unwrap());
        assert_eq!(paths.paths()[1], a.canonicalize().unwrap());
    }
}
