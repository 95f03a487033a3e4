//! Library backends
//!
//! A backend opens one library file and resolves the meta object it
//! exports. [`NativeBackend`] uses the OS loader; [`MemoryBackend`] serves
//! descriptors registered in-process, for tests and statically linked
//! builds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use metaplug_engine::{
    attach_runtime, load_meta_object, verify_abi, LibraryError, LoadHints, SharedLibrary,
};

use crate::meta::MetaObject;
use crate::runtime;

/// What an opened library turned out to be
pub enum Resolution {
    /// The library exports a meta object
    Plugin(&'static MetaObject),
    /// The library loaded but is not a plugin; the reason is logged
    NotPlugin(String),
}

/// An opened library
pub struct OpenedLibrary {
    /// OS handle, absent for in-memory libraries. A plugin attached to the
    /// runtime comes back with [`LoadHints::PREVENT_UNLOAD`] set.
    pub library: Option<SharedLibrary>,
    pub resolution: Resolution,
}

/// Opens library files
pub trait LibraryBackend: Send + Sync {
    /// Open `path` and resolve its exported meta object
    ///
    /// `Err` means the library could not be loaded at all.
    fn open(&self, path: &Path, hints: LoadHints) -> Result<OpenedLibrary, LibraryError>;
}

/// Backend over the OS dynamic loader
///
/// A plugin is attached to this process's runtime before its meta object is
/// resolved, and is then kept resident: its meta objects, closures and
/// queued tasks live on in the shared tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl LibraryBackend for NativeBackend {
    #[tracing::instrument(skip(self))]
    fn open(&self, path: &Path, hints: LoadHints) -> Result<OpenedLibrary, LibraryError> {
        // SAFETY: running library initializers is inherent to plugin loading
        let mut library = unsafe { SharedLibrary::open(path, hints)? };

        // SAFETY: the symbol, when present, has the PluginAbiFn signature
        match unsafe { verify_abi(&library, runtime::abi_tag()) } {
            Ok(()) => {}
            Err(LibraryError::SymbolNotFound { .. }) => {
                return Ok(OpenedLibrary {
                    library: Some(library),
                    resolution: Resolution::NotPlugin("no plugin ABI tag".to_string()),
                });
            }
            Err(e) => return Err(e),
        }

        // SAFETY: the ABI tag matched, so the plugin's runtime types have the
        // host's layout; the host runtime is a static
        match unsafe { attach_runtime(&library, runtime::raw_runtime()) } {
            Ok(()) => {}
            Err(LibraryError::SymbolNotFound { .. }) => {
                return Ok(OpenedLibrary {
                    library: Some(library),
                    resolution: Resolution::NotPlugin("no runtime attach entry point".to_string()),
                });
            }
            Err(e) => return Err(e),
        }
        library.prevent_unload();
        tracing::debug!("{} attached to the runtime, kept resident", path.display());

        // SAFETY: the ABI tag matched, so the exported pointer is a MetaObject
        // of this exact framework build
        let resolution = match unsafe { load_meta_object(&library) } {
            Ok(raw) => {
                let meta = unsafe { &*raw.as_ptr().cast::<MetaObject>() };
                Resolution::Plugin(meta)
            }
            Err(LibraryError::NullSymbol(_)) => {
                tracing::warn!(
                    "Plugin {} returned a null meta object (build mismatch?)",
                    path.display()
                );
                Resolution::NotPlugin("meta object is null".to_string())
            }
            Err(LibraryError::SymbolNotFound { .. }) => {
                Resolution::NotPlugin("no exported meta object".to_string())
            }
            Err(e) => return Err(e),
        };

        Ok(OpenedLibrary {
            library: Some(library),
            resolution,
        })
    }
}

enum MemoryEntry {
    Plugin(&'static MetaObject),
    NotPlugin,
    Broken(String),
}

/// Backend serving meta objects registered by path
///
/// Paths are canonicalized on registration, so the files must exist.
/// Unregistered files load as "not a plugin".
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<PathBuf, MemoryEntry>>,
    opens: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }

    /// Serve `meta` for the library at `path`
    pub fn insert(&self, path: &Path, meta: &'static MetaObject) {
        self.entries
            .write()
            .insert(Self::key(path), MemoryEntry::Plugin(meta));
    }

    /// Make `path` load without exporting a meta object
    pub fn insert_not_plugin(&self, path: &Path) {
        self.entries
            .write()
            .insert(Self::key(path), MemoryEntry::NotPlugin);
    }

    /// Make loading `path` fail with `reason`
    pub fn insert_broken(&self, path: &Path, reason: &str) {
        self.entries
            .write()
            .insert(Self::key(path), MemoryEntry::Broken(reason.to_string()));
    }

    /// Number of `open` calls so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl LibraryBackend for MemoryBackend {
    fn open(&self, path: &Path, _hints: LoadHints) -> Result<OpenedLibrary, LibraryError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let resolution = match self.entries.read().get(&Self::key(path)) {
            Some(MemoryEntry::Plugin(meta)) => Resolution::Plugin(*meta),
            Some(MemoryEntry::NotPlugin) | None => {
                Resolution::NotPlugin("no exported meta object".to_string())
            }
            Some(MemoryEntry::Broken(reason)) => {
                return Err(LibraryError::Open {
                    path: path.display().to_string(),
                    reason: reason.clone(),
                })
            }
        };

        Ok(OpenedLibrary {
            library: None,
            resolution,
        })
    }
}
