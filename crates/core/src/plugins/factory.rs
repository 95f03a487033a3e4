//! Factory loader
//!
//! A [`FactoryLoader`] finds the plugins implementing one interface id.
//! It scans `<dir>/<suffix>` for every search directory, keeps the
//! libraries whose meta object carries a matching `plugin_iid` and maps
//! each of their `plugin_key` entries to the library.
//!
//! # Example
//!
//! ```ignore
//! let loader = FactoryLoader::new("com.metaplug.Codec", "codecs", CaseSensitivity::Insensitive);
//! if let Some(codec) = loader.instance("MP3") {
//!     codec.set_property("bitrate", 320);
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use metaplug_engine::{is_library, LoadHints};
use metaplug_sdk::{class_info, FRAMEWORK_VERSION};

use super::backend::{LibraryBackend, NativeBackend};
use super::library::{LibraryHandle, LoadState};
use super::paths::library_paths;
use super::statics::{static_instance, static_plugins};
use crate::meta::MetaObject;
use crate::object::ObjectHandle;

/// Held for the whole of a scan; reentrant because `refresh_all` runs
/// every loader's `update` under it
static LOADER_LOCK: LazyLock<ReentrantMutex<()>> = LazyLock::new(|| ReentrantMutex::new(()));

/// Every live loader
static LOADERS: LazyLock<Mutex<Vec<Weak<LoaderShared>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Hints applied to every library a loader opens
static DEFAULT_HINTS: AtomicU32 = AtomicU32::new(0);

/// Set the hints used for libraries opened from now on
pub fn set_default_load_hints(hints: LoadHints) {
    DEFAULT_HINTS.store(hints.bits(), Ordering::Relaxed);
}

pub fn default_load_hints() -> LoadHints {
    LoadHints::from_bits_truncate(DEFAULT_HINTS.load(Ordering::Relaxed))
}

/// How plugin keys are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    /// Keys are folded to lower case when stored and when looked up
    Insensitive,
}

/// Where a loader gets its search directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSource {
    /// The process-wide list in [`super::paths`]
    Global,
    Fixed(Vec<PathBuf>),
}

impl PathSource {
    fn resolve(&self) -> Vec<PathBuf> {
        match self {
            PathSource::Global => library_paths(),
            PathSource::Fixed(paths) => paths.clone(),
        }
    }
}

#[derive(Default)]
struct LoaderState {
    /// Directories already scanned, append-only
    loaded_paths: Vec<PathBuf>,
    library_list: Vec<Arc<LibraryHandle>>,
    library_map: BTreeMap<String, Arc<LibraryHandle>>,
}

struct LoaderShared {
    id: u64,
    iid: String,
    suffix: String,
    case_sensitivity: CaseSensitivity,
    source: PathSource,
    backend: Arc<dyn LibraryBackend>,
    state: RwLock<LoaderState>,
}

/// Parsed `plugin_version`, `None` if absent or not a non-negative integer
fn plugin_version(meta: &MetaObject) -> Option<u32> {
    meta.class_info_value(class_info::PLUGIN_VERSION)?
        .trim()
        .parse()
        .ok()
}

/// Directory entries that look like libraries, sorted by file name
fn library_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read plugin directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_library(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

impl LoaderShared {
    fn fold(&self, key: &str) -> String {
        match self.case_sensitivity {
            CaseSensitivity::Sensitive => key.to_string(),
            CaseSensitivity::Insensitive => key.to_lowercase(),
        }
    }

    /// Folded, trimmed, non-empty entries of `plugin_key`
    fn keys_of(&self, meta: &MetaObject) -> Vec<String> {
        meta.class_info_value(class_info::PLUGIN_KEY)
            .unwrap_or_default()
            .split(class_info::KEY_SEPARATOR)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| self.fold(key))
            .collect()
    }

    fn matches_iid(&self, meta: &MetaObject) -> bool {
        meta.class_info_value(class_info::PLUGIN_IID) == Some(self.iid.as_str())
    }

    fn scan_dir(&self, state: &mut LoaderState, dir: &Path) {
        let hints = default_load_hints();
        for file in library_files(dir) {
            let handle = LibraryHandle::find_or_create(&file, hints, self.backend.clone());
            match handle.load() {
                LoadState::LoadedValidPlugin => {}
                LoadState::LoadFailed => {
                    tracing::warn!(
                        "Skipping {}: {}",
                        file.display(),
                        handle.error_string().unwrap_or_default()
                    );
                    continue;
                }
                _ => continue,
            }

            let Some(meta) = handle.meta_object() else {
                continue;
            };
            if !self.matches_iid(meta) {
                tracing::trace!("{} implements another interface", file.display());
                continue;
            }
            let Some(version) = plugin_version(meta) else {
                tracing::warn!(
                    "Skipping {}: malformed plugin_version {:?}",
                    file.display(),
                    meta.class_info_value(class_info::PLUGIN_VERSION)
                );
                continue;
            };

            let keys = self.keys_of(meta);
            let mut claimed = keys.is_empty();
            for key in keys {
                let replace = match state.library_map.get(&key) {
                    None => true,
                    Some(existing) => {
                        let existing_version = existing
                            .meta_object()
                            .and_then(plugin_version)
                            .unwrap_or(u32::MAX);
                        existing_version > FRAMEWORK_VERSION && version <= FRAMEWORK_VERSION
                    }
                };

                if replace {
                    tracing::debug!("Key {:?} -> {} (version {})", key, file.display(), version);
                    state.library_map.insert(key, handle.clone());
                    claimed = true;
                }
            }

            if claimed {
                handle.prevent_unload();
                if !state.library_list.iter().any(|h| Arc::ptr_eq(h, &handle)) {
                    state.library_list.push(handle);
                }
            }
        }
    }

    #[tracing::instrument(skip(self), fields(iid = %self.iid))]
    fn update(&self) {
        let _lock = LOADER_LOCK.lock();
        let mut state = self.state.write();

        for base in self.source.resolve() {
            let dir = if self.suffix.is_empty() {
                base
            } else {
                base.join(self.suffix.trim_start_matches('/'))
            };
            let Ok(dir) = dir.canonicalize() else {
                continue;
            };
            if !dir.is_dir() || state.loaded_paths.contains(&dir) {
                continue;
            }

            state.loaded_paths.push(dir.clone());
            self.scan_dir(&mut state, &dir);
        }

        tracing::debug!(
            "Loader {} has {} libraries, {} keys",
            self.iid,
            state.library_list.len(),
            state.library_map.len()
        );
    }
}

/// Resolves plugin keys to plugin instances for one interface id
pub struct FactoryLoader {
    shared: Arc<LoaderShared>,
}

impl FactoryLoader {
    /// Loader over the global search paths and the OS loader
    pub fn new(iid: &str, suffix: &str, case_sensitivity: CaseSensitivity) -> Self {
        Self::with_source(
            iid,
            suffix,
            case_sensitivity,
            PathSource::Global,
            Arc::new(NativeBackend),
        )
    }

    /// Loader with explicit directories and backend
    pub fn with_source(
        iid: &str,
        suffix: &str,
        case_sensitivity: CaseSensitivity,
        source: PathSource,
        backend: Arc<dyn LibraryBackend>,
    ) -> Self {
        let shared = Arc::new(LoaderShared {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            iid: iid.to_string(),
            suffix: suffix.to_string(),
            case_sensitivity,
            source,
            backend,
            state: RwLock::new(LoaderState::default()),
        });

        {
            let mut loaders = LOADERS.lock();
            loaders.retain(|weak| weak.strong_count() > 0);
            loaders.push(Arc::downgrade(&shared));
        }

        let loader = Self { shared };
        loader.update();
        loader
    }

    pub fn iid(&self) -> &str {
        &self.shared.iid
    }

    pub fn suffix(&self) -> &str {
        &self.shared.suffix
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.shared.case_sensitivity
    }

    /// Scan search directories not scanned before
    pub fn update(&self) {
        self.shared.update();
    }

    /// Run [`update`](Self::update) on every live loader
    pub fn refresh_all() {
        let _lock = LOADER_LOCK.lock();
        let loaders: Vec<Arc<LoaderShared>> =
            LOADERS.lock().iter().filter_map(Weak::upgrade).collect();
        for loader in loaders {
            loader.update();
        }
    }

    /// Directories scanned so far
    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.shared.state.read().loaded_paths.clone()
    }

    /// Libraries kept by this loader, in scan order
    pub fn library_list(&self) -> Vec<Arc<LibraryHandle>> {
        self.shared.state.read().library_list.clone()
    }

    /// Library selected for `key`
    pub fn library(&self, key: &str) -> Option<Arc<LibraryHandle>> {
        let key = self.shared.fold(key);
        self.shared.state.read().library_map.get(&key).cloned()
    }

    fn static_plugins(&self) -> impl Iterator<Item = &'static MetaObject> + '_ {
        static_plugins()
            .into_iter()
            .filter(|meta| self.shared.matches_iid(meta))
    }

    /// Every available key, sorted; static plugins included
    pub fn keys(&self) -> Vec<String> {
        self.key_set().into_iter().collect()
    }

    pub fn key_set(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> =
            self.shared.state.read().library_map.keys().cloned().collect();
        for meta in self.static_plugins() {
            keys.extend(self.shared.keys_of(meta));
        }
        keys
    }

    /// The plugin object for `key`
    ///
    /// Static plugins are checked first. Every key of one library yields the
    /// same object. `None` means the plugin is absent or failed to construct.
    pub fn instance(&self, key: &str) -> Option<ObjectHandle> {
        let key = self.shared.fold(key);

        if let Some(meta) = self
            .static_plugins()
            .find(|meta| self.shared.keys_of(meta).contains(&key))
        {
            return static_instance(meta);
        }

        let handle = self.shared.state.read().library_map.get(&key).cloned()?;
        handle.instance()
    }
}

impl Drop for FactoryLoader {
    fn drop(&mut self) {
        let id = self.shared.id;
        LOADERS
            .lock()
            .retain(|weak| weak.upgrade().is_some_and(|loader| loader.id != id));
    }
}

impl std::fmt::Debug for FactoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryLoader")
            .field("iid", &self.shared.iid)
            .field("suffix", &self.shared.suffix)
            .field("case_sensitivity", &self.shared.case_sensitivity)
            .field("source", &self.shared.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaObjectBuilder;
    use crate::object::ObjectExt;
    use crate::plugins::backend::MemoryBackend;
    use crate::plugins::statics::register_static_plugin;
    use crate::plugins::testing::{temp_dir, test_plugin, touch};

    test_plugin!(Mp3Codec, iid = "com.example.Codec", keys = "mp3, MP3", version = "2");
    test_plugin!(FutureMp3Codec, iid = "com.example.Codec", keys = "mp3", version = "5");
    test_plugin!(OggCodec, iid = "com.example.Codec", keys = "ogg", version = "3");
    test_plugin!(AnyCodec, iid = "com.example.Codec", keys = "", version = "1");
    test_plugin!(ImageFormat, iid = "com.example.Image", keys = "png", version = "1");
    test_plugin!(SharedCodec, iid = "com.test.Shared", keys = "k1, k2", version = "1");
    test_plugin!(FoldCodec, iid = "com.test.Fold", keys = "foo", version = "1");
    test_plugin!(StaticCodec, iid = "com.test.Static", keys = "flac", version = "1");
    test_plugin!(OldBadge, iid = "com.test.Both", keys = "badge", version = "1");
    test_plugin!(NewBadge, iid = "com.test.Both", keys = "badge", version = "2");

    fn loader(iid: &str, dir: &Path, cs: CaseSensitivity, backend: &Arc<MemoryBackend>) -> FactoryLoader {
        FactoryLoader::with_source(
            iid,
            "",
            cs,
            PathSource::Fixed(vec![dir.to_path_buf()]),
            backend.clone(),
        )
    }

    #[test]
    fn test_mp3_scenario_case_insensitive() {
        let dir = temp_dir("factory-mp3");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libmp3.so"), Mp3Codec::static_meta_object());

        let loader = loader("com.example.Codec", &dir, CaseSensitivity::Insensitive, &backend);
        assert_eq!(loader.keys(), ["mp3"]);

        let obj = loader.instance("mp3").unwrap();
        assert!(std::ptr::eq(obj.meta_object(), Mp3Codec::static_meta_object()));
        assert!(obj.downcast_ref::<Mp3Codec>().is_some());
    }

    #[test]
    fn test_mp3_scenario_case_sensitive() {
        let dir = temp_dir("factory-mp3-cs");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libmp3.so"), Mp3Codec::static_meta_object());

        let loader = loader("com.example.Codec", &dir, CaseSensitivity::Sensitive, &backend);
        assert_eq!(loader.keys(), ["MP3", "mp3"]);
        assert!(loader.instance("Mp3").is_none());
        assert!(Arc::ptr_eq(
            &loader.instance("MP3").unwrap(),
            &loader.instance("mp3").unwrap()
        ));
    }

    #[test]
    fn test_newer_framework_version_loses() {
        // both scan orders: the future plugin sorts first in one directory
        // and last in the other
        for (future_name, current_name) in [("liba.so", "libz.so"), ("libz.so", "liba.so")] {
            let dir = temp_dir("factory-version");
            let backend = Arc::new(MemoryBackend::new());
            let current = touch(&dir, current_name);
            backend.insert(&touch(&dir, future_name), FutureMp3Codec::static_meta_object());
            backend.insert(&current, Mp3Codec::static_meta_object());

            let loader = loader("com.example.Codec", &dir, CaseSensitivity::Insensitive, &backend);
            let selected = loader.library("mp3").unwrap();
            assert_eq!(selected.path(), current.canonicalize().unwrap());
            assert_eq!(selected.meta_object(), Some(Mp3Codec::static_meta_object()));
        }
    }

    #[test]
    fn test_same_compatible_version_first_scanned_wins() {
        let dir = temp_dir("factory-tie");
        let backend = Arc::new(MemoryBackend::new());
        let first = touch(&dir, "liba.so");
        backend.insert(&first, NewBadge::static_meta_object());
        backend.insert(&touch(&dir, "libb.so"), OldBadge::static_meta_object());

        let loader = loader("com.test.Both", &dir, CaseSensitivity::Sensitive, &backend);
        assert_eq!(loader.library("badge").unwrap().path(), first.canonicalize().unwrap());
        // the loser claimed no key and is not kept
        assert_eq!(loader.library_list().len(), 1);
    }

    #[test]
    fn test_update_is_idempotent() {
        let dir = temp_dir("factory-idempotent");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libmp3.so"), Mp3Codec::static_meta_object());
        backend.insert(&touch(&dir, "libogg.so"), OggCodec::static_meta_object());

        let loader = loader("com.example.Codec", &dir, CaseSensitivity::Insensitive, &backend);
        let keys = loader.keys();
        let libraries: Vec<PathBuf> = loader.library_list().iter().map(|h| h.path().to_path_buf()).collect();
        let opens = backend.open_count();

        loader.update();
        FactoryLoader::refresh_all();

        assert_eq!(loader.keys(), keys);
        assert_eq!(
            loader.library_list().iter().map(|h| h.path().to_path_buf()).collect::<Vec<_>>(),
            libraries
        );
        assert_eq!(loader.loaded_paths().len(), 1);
        assert_eq!(backend.open_count(), opens);
    }

    #[test]
    fn test_case_folding_returns_same_object() {
        let dir = temp_dir("factory-fold");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libfoo.so"), FoldCodec::static_meta_object());

        let loader = loader("com.test.Fold", &dir, CaseSensitivity::Insensitive, &backend);
        let upper = loader.instance("Foo").unwrap();
        let lower = loader.instance("foo").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
        assert_eq!(FoldCodec::constructed(), 1);
    }

    #[test]
    fn test_concurrent_instances_construct_once() {
        let dir = temp_dir("factory-concurrent");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libshared.so"), SharedCodec::static_meta_object());
        let loader = loader("com.test.Shared", &dir, CaseSensitivity::Sensitive, &backend);

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| loader.instance("k1"));
            let b = scope.spawn(|| loader.instance("k2"));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(SharedCodec::constructed(), 1);
    }

    #[test]
    fn test_rejected_candidates_are_skipped() {
        let dir = temp_dir("factory-reject");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libimage.so"), ImageFormat::static_meta_object());
        backend.insert_broken(&touch(&dir, "libbroken.so"), "bad ELF header");
        touch(&dir, "libplain.so");
        touch(&dir, "readme.txt");
        backend.insert(
            &touch(&dir, "libnoversion.so"),
            MetaObjectBuilder::new("FactoryTestBadVersion")
                .class_info(class_info::PLUGIN_IID, "com.example.Codec")
                .class_info(class_info::PLUGIN_KEY, "bad")
                .class_info(class_info::PLUGIN_VERSION, "two")
                .build(),
        );
        backend.insert(&touch(&dir, "libogg.so"), OggCodec::static_meta_object());

        let loader = loader("com.example.Codec", &dir, CaseSensitivity::Sensitive, &backend);
        assert_eq!(loader.keys(), ["ogg"]);
        assert_eq!(loader.library_list().len(), 1);
        assert!(loader.instance("png").is_none());
        assert!(loader.instance("bad").is_none());
        // not a library name, never opened
        assert_eq!(backend.open_count(), 5);
    }

    #[test]
    fn test_empty_key_list_is_kept() {
        let dir = temp_dir("factory-nokeys");
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&dir, "libany.so"), AnyCodec::static_meta_object());

        let loader = loader("com.example.Codec", &dir, CaseSensitivity::Sensitive, &backend);
        assert!(loader.keys().is_empty());
        assert_eq!(loader.library_list().len(), 1);
        assert!(loader.library_list()[0].hints().contains(LoadHints::PREVENT_UNLOAD));
    }

    #[test]
    fn test_suffix_and_new_directories() {
        let first = temp_dir("factory-suffix-a");
        let second = temp_dir("factory-suffix-b");
        std::fs::create_dir_all(first.join("codecs")).unwrap();
        std::fs::create_dir_all(second.join("codecs")).unwrap();

        let backend = Arc::new(MemoryBackend::new());
        backend.insert(&touch(&first.join("codecs"), "libmp3.so"), Mp3Codec::static_meta_object());
        backend.insert(&touch(&second.join("codecs"), "libogg.so"), OggCodec::static_meta_object());
        // outside the suffix directory, never scanned
        backend.insert(&touch(&first, "libogg.so"), OggCodec::static_meta_object());

        let loader = FactoryLoader::with_source(
            "com.example.Codec",
            "/codecs",
            CaseSensitivity::Insensitive,
            PathSource::Fixed(vec![first.clone(), second.clone(), first.clone()]),
            backend.clone(),
        );

        assert_eq!(loader.suffix(), "/codecs");
        assert_eq!(loader.keys(), ["mp3", "ogg"]);
        assert_eq!(loader.loaded_paths().len(), 2);
        assert_eq!(
            loader.library("ogg").unwrap().path(),
            second.join("codecs").join("libogg.so").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_static_plugins_come_first() {
        register_static_plugin(StaticCodec::static_meta_object());
        register_static_plugin(StaticCodec::static_meta_object());

        let dir = temp_dir("factory-static");
        let backend = Arc::new(MemoryBackend::new());
        let loader = loader("com.test.Static", &dir, CaseSensitivity::Sensitive, &backend);

        assert_eq!(loader.keys(), ["flac"]);
        let a = loader.instance("flac").unwrap();
        let b = loader.instance("flac").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(StaticCodec::constructed(), 1);
        assert!(loader.library("flac").is_none());
    }
}
