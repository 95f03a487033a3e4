//! OS shared library primitive

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::error::LibraryError;

bitflags! {
    /// Hints that control how a library is opened and released
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LoadHints: u32 {
        /// Resolve every undefined symbol at open time (`RTLD_NOW`)
        const RESOLVE_ALL_SYMBOLS = 1 << 0;
        /// Make the library's symbols available to later loads (`RTLD_GLOBAL`)
        const EXPORT_EXTERNAL_SYMBOLS = 1 << 1;
        /// Never unload the library once opened
        const PREVENT_UNLOAD = 1 << 2;
    }
}

/// An opened shared library
///
/// Dropping the value closes the library unless [`LoadHints::PREVENT_UNLOAD`]
/// was set, in which case the OS handle is leaked for the rest of the process.
pub struct SharedLibrary {
    library: Option<libloading::Library>,
    path: PathBuf,
    hints: LoadHints,
}

impl SharedLibrary {
    /// Open the library at `path`
    ///
    /// # Safety
    /// Opening a library runs its initialisers. The caller must trust the file.
    pub unsafe fn open(path: &Path, hints: LoadHints) -> Result<Self, LibraryError> {
        let library = open_with_hints(path, hints).map_err(|e| LibraryError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Opened library {} ({:?})", path.display(), hints);

        Ok(Self {
            library: Some(library),
            path: path.to_path_buf(),
            hints,
        })
    }

    /// Path the library was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hints the library was opened with
    pub fn hints(&self) -> LoadHints {
        self.hints
    }

    /// Mark the library as never-unload
    pub fn prevent_unload(&mut self) {
        self.hints |= LoadHints::PREVENT_UNLOAD;
    }

    /// Resolve a symbol by null-terminated name
    ///
    /// # Arguments
    /// * `symbol` - Null-terminated symbol name (e.g., b"metaplug_plugin_abi\0")
    ///
    /// # Safety
    /// `T` must match the actual type of the exported symbol
    pub unsafe fn get<T: Copy>(&self, symbol: &[u8]) -> Result<T, LibraryError> {
        let name = CStr::from_bytes_with_nul(symbol).map_err(|_| {
            LibraryError::InvalidSymbolName(String::from_utf8_lossy(symbol).into_owned())
        })?;

        let not_found = || LibraryError::SymbolNotFound {
            symbol: name.to_string_lossy().into_owned(),
            path: self.path.display().to_string(),
        };

        let library = self.library.as_ref().ok_or_else(not_found)?;
        let sym: libloading::Symbol<'_, T> = library.get(symbol).map_err(|_| not_found())?;
        Ok(*sym)
    }

    /// Try to resolve a symbol, returning None on failure instead of error
    ///
    /// # Safety
    /// Same as `get`
    pub unsafe fn try_get<T: Copy>(&self, symbol: &[u8]) -> Option<T> {
        self.get(symbol).ok()
    }

    /// Close the library now and report any OS error
    ///
    /// A library opened with [`LoadHints::PREVENT_UNLOAD`] is leaked instead.
    pub fn close(mut self) -> Result<(), LibraryError> {
        let Some(library) = self.library.take() else {
            return Ok(());
        };

        if self.hints.contains(LoadHints::PREVENT_UNLOAD) {
            std::mem::forget(library);
            tracing::debug!("Library {} kept resident", self.path.display());
            return Ok(());
        }

        library.close().map_err(|e| LibraryError::Unload {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!("Closed library {}", self.path.display());
        Ok(())
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        let Some(library) = self.library.take() else {
            return;
        };

        if self.hints.contains(LoadHints::PREVENT_UNLOAD) {
            std::mem::forget(library);
        } else if let Err(e) = library.close() {
            tracing::warn!("Failed to unload {}: {}", self.path.display(), e);
        }
    }
}

impl std::fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLibrary")
            .field("path", &self.path)
            .field("hints", &self.hints)
            .field("open", &self.library.is_some())
            .finish()
    }
}

#[cfg(unix)]
unsafe fn open_with_hints(
    path: &Path,
    hints: LoadHints,
) -> Result<libloading::Library, libloading::Error> {
    use libloading::os::unix;

    let mut flags = if hints.contains(LoadHints::RESOLVE_ALL_SYMBOLS) {
        unix::RTLD_NOW
    } else {
        unix::RTLD_LAZY
    };
    flags |= if hints.contains(LoadHints::EXPORT_EXTERNAL_SYMBOLS) {
        unix::RTLD_GLOBAL
    } else {
        unix::RTLD_LOCAL
    };

    unix::Library::open(Some(path), flags).map(Into::into)
}

#[cfg(not(unix))]
unsafe fn open_with_hints(
    path: &Path,
    _hints: LoadHints,
) -> Result<libloading::Library, libloading::Error> {
    libloading::Library::new(path)
}

/// Check whether a file name looks like a loadable shared library
///
/// Accepts `.so`, versioned `.so.N[.N...]`, `.dylib`, `.bundle` and `.dll`.
pub fn is_library(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();

    if [".so", ".dylib", ".bundle", ".dll"]
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
    {
        return true;
    }

    // libfoo.so.1.2
    match name.find(".so.") {
        Some(pos) if pos > 0 => name[pos + 4..]
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())),
        _ => false,
    }
}

/// Platform file name for a library stem (e.g., `codec` -> `libcodec.so`)
pub fn library_file_name(stem: &str) -> String {
    format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        stem,
        std::env::consts::DLL_SUFFIX
    )
}
