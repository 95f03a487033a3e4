//! metaplug SDK - Plugin ABI Definitions
//!
//! This crate contains the constants shared by a plugin host and the plugins
//! it loads. It has no dependencies so that both sides agree on the exact
//! same bytes without linking the runtime twice.
//!
//! # Modules
//!
//! - [`abi`] - Opaque exported types and entry point signatures
//! - [`class_info`] - Class-info key names used for plugin identification
//! - [`symbols`] - Exported symbol names resolved by the loader

pub mod abi;
pub mod class_info;
pub mod symbols;

pub use abi::*;
pub use symbols::EXPORTED_SYMBOLS;

/// Version of the running framework.
///
/// A plugin whose `plugin_version` class-info exceeds this value was built
/// against a newer framework and is only selected when nothing older
/// provides the same key.
pub const FRAMEWORK_VERSION: u32 = 3;

/// Compiler that built this crate, as reported by `rustc --version`
pub const RUSTC_VERSION: &str = env!("METAPLUG_RUSTC_VERSION");

/// SDK part of the ABI tag, null-terminated.
///
/// Encodes the SDK version and the compiler. The runtime appends its own
/// version and a layout fingerprint; host and plugin must agree on the full
/// tag byte-for-byte before any Rust type crosses the library boundary.
pub const ABI_TAG: &[u8] = concat!(
    "metaplug-abi-",
    env!("CARGO_PKG_VERSION"),
    "/",
    env!("METAPLUG_RUSTC_VERSION"),
    "\0"
)
.as_bytes();

/// ABI tag without the trailing null
pub fn abi_tag_str() -> &'static str {
    let bytes = &ABI_TAG[..ABI_TAG.len() - 1];
    match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_tag_is_null_terminated() {
        assert_eq!(ABI_TAG.last(), Some(&0));
        assert!(abi_tag_str().starts_with("metaplug-abi-"));
        assert!(!abi_tag_str().contains('\0'));
        assert!(abi_tag_str().ends_with(RUSTC_VERSION));
    }
}
