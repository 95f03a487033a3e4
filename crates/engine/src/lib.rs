//! metaplug Engine - Shared Library Loading and Process Globals
//!
//! This crate handles:
//! - Opening shared libraries with platform load hints
//! - Resolving the plugin entry points exported by metaplug plugins
//! - Storing the main thread identity for thread affinity checks
//!
//! # Architecture
//!
//! [`SharedLibrary`] is a thin owner of one OS library handle. The plugin
//! entry points are resolved through [`loader::verify_abi`],
//! [`loader::attach_runtime`] and [`loader::load_meta_object`], which check
//! the ABI tag before any framework type crosses the boundary.
//!
//! # Thread Safety
//!
//! The main thread is recorded once via [`init_main_thread`]. Objects created
//! without an owner are moved to that thread by the plugin layer.

pub mod error;
pub mod globals;
pub mod library;
pub mod loader;

pub use error::LibraryError;
pub use globals::{init_main_thread, is_main_thread, main_thread_id};
pub use library::{is_library, library_file_name, LoadHints, SharedLibrary};
pub use loader::{attach_runtime, load_meta_object, verify_abi};
