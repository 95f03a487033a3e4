//! Library handles
//!
//! A [`LibraryHandle`] owns one opened library and the meta object and
//! plugin instance resolved from it. Handles are shared: opening the same
//! canonical path twice yields the same `Arc`. The registry only keeps weak
//! references, so dropping the last handle releases the library.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::{Mutex, RwLock};

use metaplug_engine::{LoadHints, SharedLibrary};
use metaplug_sdk::class_info;

use super::backend::{LibraryBackend, Resolution};
use crate::meta::MetaObject;
use crate::object::ObjectHandle;

/// Load state of a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    /// Loaded, but exports no usable plugin meta object
    LoadedNotPlugin,
    /// Loaded with a meta object carrying `plugin_iid` and `plugin_version`
    LoadedValidPlugin,
    LoadFailed,
}

/// Canonical path -> live handle
static LIBRARIES: LazyLock<Mutex<HashMap<PathBuf, Weak<LibraryHandle>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// One shared library and what was resolved from it
pub struct LibraryHandle {
    // the instance must drop before the library that holds its code
    plugin_obj: Mutex<Option<ObjectHandle>>,
    meta_object: RwLock<Option<&'static MetaObject>>,
    library: Mutex<Option<SharedLibrary>>,
    path: PathBuf,
    hints: RwLock<LoadHints>,
    state: RwLock<LoadState>,
    error: RwLock<Option<String>>,
    backend: Arc<dyn LibraryBackend>,
}

impl LibraryHandle {
    /// Handle for `path`, shared with every other user of the same file
    ///
    /// `path` is canonicalized; a path that cannot be canonicalized is used
    /// as given. The handle starts [`LoadState::Unloaded`] unless it was
    /// already loaded by another user.
    pub fn find_or_create(
        path: &Path,
        hints: LoadHints,
        backend: Arc<dyn LibraryBackend>,
    ) -> Arc<LibraryHandle> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let mut libraries = LIBRARIES.lock();
        if let Some(existing) = libraries.get(&canonical).and_then(Weak::upgrade) {
            existing.add_hints(hints);
            return existing;
        }

        // dead entries are pruned on insertion
        libraries.retain(|_, weak| weak.strong_count() > 0);

        let handle = Arc::new(LibraryHandle {
            plugin_obj: Mutex::new(None),
            meta_object: RwLock::new(None),
            library: Mutex::new(None),
            path: canonical.clone(),
            hints: RwLock::new(hints),
            state: RwLock::new(LoadState::Unloaded),
            error: RwLock::new(None),
            backend,
        });
        libraries.insert(canonical, Arc::downgrade(&handle));
        handle
    }

    /// Canonical path of the library
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn hints(&self) -> LoadHints {
        *self.hints.read()
    }

    fn add_hints(&self, hints: LoadHints) {
        *self.hints.write() |= hints;
        if hints.contains(LoadHints::PREVENT_UNLOAD) {
            if let Some(library) = self.library.lock().as_mut() {
                library.prevent_unload();
            }
        }
    }

    /// Keep the library loaded for the rest of the process
    pub fn prevent_unload(&self) {
        self.add_hints(LoadHints::PREVENT_UNLOAD);
    }

    pub fn state(&self) -> LoadState {
        *self.state.read()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(
            self.state(),
            LoadState::LoadedNotPlugin | LoadState::LoadedValidPlugin
        )
    }

    pub fn is_valid_plugin(&self) -> bool {
        self.state() == LoadState::LoadedValidPlugin
    }

    /// Description of the last load failure
    pub fn error_string(&self) -> Option<String> {
        self.error.read().clone()
    }

    /// Load the library and resolve its meta object
    ///
    /// Loading happens once; later calls return the settled state.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> LoadState {
        let mut state = self.state.write();
        if *state != LoadState::Unloaded {
            return *state;
        }
        *state = LoadState::Loading;

        let opened = match self.backend.open(&self.path, self.hints()) {
            Ok(opened) => opened,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", self.path.display(), e);
                *self.error.write() = Some(e.to_string());
                *state = LoadState::LoadFailed;
                return *state;
            }
        };

        let mut library = opened.library;
        if let Some(library) = library.as_mut() {
            if self.hints().contains(LoadHints::PREVENT_UNLOAD) {
                library.prevent_unload();
            } else if library.hints().contains(LoadHints::PREVENT_UNLOAD) {
                // the backend pinned it (an attached plugin)
                *self.hints.write() |= LoadHints::PREVENT_UNLOAD;
            }
        }
        *self.library.lock() = library;

        *state = match opened.resolution {
            Resolution::Plugin(meta) => {
                if meta.class_info_value(class_info::PLUGIN_IID).is_none()
                    || meta.class_info_value(class_info::PLUGIN_VERSION).is_none()
                {
                    tracing::warn!(
                        "{} exports {} without plugin_iid or plugin_version",
                        self.path.display(),
                        meta.class_name()
                    );
                    LoadState::LoadedNotPlugin
                } else {
                    *self.meta_object.write() = Some(meta);
                    LoadState::LoadedValidPlugin
                }
            }
            Resolution::NotPlugin(reason) => {
                tracing::debug!("{} is not a plugin: {}", self.path.display(), reason);
                LoadState::LoadedNotPlugin
            }
        };

        tracing::debug!("Loaded {} ({:?})", self.path.display(), *state);
        *state
    }

    /// Meta object of a valid plugin
    ///
    /// A native plugin library stays resident once loaded, so the reference
    /// never outlives the code it describes.
    pub fn meta_object(&self) -> Option<&'static MetaObject> {
        *self.meta_object.read()
    }

    /// The plugin object, constructed at most once per library
    ///
    /// An object created without a parent is moved to the main thread.
    pub fn instance(&self) -> Option<ObjectHandle> {
        let meta = self.meta_object()?;

        let mut plugin_obj = self.plugin_obj.lock();
        if let Some(obj) = plugin_obj.as_ref() {
            return Some(Arc::clone(obj));
        }

        let Some(obj) = meta.new_instance() else {
            tracing::warn!(
                "Plugin class {} in {} is not constructible",
                meta.class_name(),
                self.path.display()
            );
            return None;
        };

        if !obj.base().has_parent() {
            obj.base().move_to_thread(metaplug_engine::main_thread_id());
        }

        tracing::debug!(
            "Created plugin instance {} from {}",
            meta.class_name(),
            self.path.display()
        );
        *plugin_obj = Some(Arc::clone(&obj));
        Some(obj)
    }

    /// Release the library unless it must stay loaded
    ///
    /// Returns false when the unload was skipped: the handle carries
    /// [`LoadHints::PREVENT_UNLOAD`], which includes every native plugin
    /// attached to the runtime.
    pub fn unload(&self) -> bool {
        if self.hints().contains(LoadHints::PREVENT_UNLOAD) {
            tracing::trace!("Not unloading {} (prevent unload)", self.path.display());
            return false;
        }

        let mut state = self.state.write();
        self.plugin_obj.lock().take();
        self.meta_object.write().take();
        if let Some(library) = self.library.lock().take() {
            if let Err(e) = library.close() {
                tracing::warn!("{}", e);
            }
        }
        *state = LoadState::Unloaded;
        true
    }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        let mut libraries = LIBRARIES.lock();
        if libraries
            .get(&self.path)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            libraries.remove(&self.path);
        }
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("hints", &self.hints())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaObjectBuilder;
    use crate::plugins::backend::MemoryBackend;
    use crate::plugins::testing::{temp_dir, test_plugin, touch};

    test_plugin!(LibraryTestValid, iid = "com.test.States", keys = "a", version = "1");
    test_plugin!(LibraryTestOnce, iid = "com.test.Once", keys = "k", version = "1");
    test_plugin!(LibraryTestUnload, iid = "com.test.Unload", keys = "k", version = "1");

    #[test]
    fn test_same_path_shares_handle() {
        let dir = temp_dir("library-share");
        let file = touch(&dir, "libshared.so");
        let backend = Arc::new(MemoryBackend::new());

        let a = LibraryHandle::find_or_create(&file, LoadHints::empty(), backend.clone());
        let b = LibraryHandle::find_or_create(
            &dir.join(".").join("libshared.so"),
            LoadHints::PREVENT_UNLOAD,
            backend.clone(),
        );
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.hints().contains(LoadHints::PREVENT_UNLOAD));

        a.load();
        b.load();
        assert_eq!(backend.open_count(), 1);
    }

    #[test]
    fn test_dropping_last_handle_releases_entry() {
        let dir = temp_dir("library-release");
        let file = touch(&dir, "librelease.so");
        let backend = Arc::new(MemoryBackend::new());

        let first = LibraryHandle::find_or_create(&file, LoadHints::empty(), backend.clone());
        first.load();
        drop(first);

        let second = LibraryHandle::find_or_create(&file, LoadHints::empty(), backend.clone());
        assert_eq!(second.state(), LoadState::Unloaded);
    }

    #[test]
    fn test_load_states() {
        let dir = temp_dir("library-states");
        let valid = touch(&dir, "libvalid.so");
        let plain = touch(&dir, "libplain.so");
        let broken = touch(&dir, "libbroken.so");
        let no_version = touch(&dir, "libnoversion.so");

        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&valid, LibraryTestValid::static_meta_object());
        backend.insert_broken(&broken, "undefined symbol: foo");
        backend.insert(
            &no_version,
            MetaObjectBuilder::new("LibraryTestNoVersion")
                .class_info(class_info::PLUGIN_IID, "com.test.States")
                .build(),
        );

        let open = |path: &Path| {
            let handle = LibraryHandle::find_or_create(path, LoadHints::empty(), backend.clone());
            handle.load();
            handle
        };

        let valid = open(&valid);
        assert_eq!(valid.state(), LoadState::LoadedValidPlugin);
        assert_eq!(valid.meta_object(), Some(LibraryTestValid::static_meta_object()));

        assert_eq!(open(&plain).state(), LoadState::LoadedNotPlugin);
        assert_eq!(open(&no_version).state(), LoadState::LoadedNotPlugin);

        let broken = open(&broken);
        assert_eq!(broken.state(), LoadState::LoadFailed);
        assert!(broken.error_string().unwrap().contains("undefined symbol"));
        assert!(broken.meta_object().is_none());
        assert!(broken.instance().is_none());
    }

    #[test]
    fn test_instance_created_once() {
        let dir = temp_dir("library-instance");
        let file = touch(&dir, "libonce.so");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&file, LibraryTestOnce::static_meta_object());

        let handle = LibraryHandle::find_or_create(&file, LoadHints::empty(), backend);
        assert!(handle.instance().is_none());
        handle.load();

        let a = handle.instance().unwrap();
        let b = handle.instance().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(LibraryTestOnce::constructed(), 1);
        assert_eq!(a.base().thread(), metaplug_engine::main_thread_id());
    }

    #[test]
    fn test_unload_respects_prevent_unload() {
        let dir = temp_dir("library-unload");
        let file = touch(&dir, "libunload.so");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&file, LibraryTestUnload::static_meta_object());

        let handle = LibraryHandle::find_or_create(&file, LoadHints::empty(), backend);
        handle.load();
        assert!(handle.unload());
        assert_eq!(handle.state(), LoadState::Unloaded);
        assert!(handle.meta_object().is_none());

        handle.load();
        handle.prevent_unload();
        assert!(!handle.unload());
        assert!(handle.is_valid_plugin());
    }
}
