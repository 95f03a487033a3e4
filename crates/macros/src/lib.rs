//! metaplug Proc Macros
//!
//! This crate provides `#[derive(MetaClass)]`, which declares a class's
//! meta object from attributes on its struct.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::atomic::AtomicU32;
//! use parking_lot::RwLock;
//! use metaplug_core::{MetaClass, ObjectBase};
//!
//! #[derive(Default, MetaClass)]
//! #[meta(
//!     class = "Mp3Codec",
//!     class_info(plugin_iid = "com.metaplug.Codec", plugin_key = "mp3, MP3", plugin_version = "2"),
//!     constructible
//! )]
//! pub struct Mp3Codec {
//!     #[meta(base)]
//!     base: ObjectBase,
//!
//!     #[meta(property, notify = "bitrateChanged(u32)")]
//!     bitrate: AtomicU32,
//!
//!     #[meta(property, readonly)]
//!     name: RwLock<String>,
//! }
//!
//! // Generated:
//! // - Mp3Codec::static_meta_object()
//! // - codec.bitrate() / codec.set_bitrate(320), which emits bitrateChanged(u32)
//! // - codec.name()
//! // - impl Object for Mp3Codec
//! ```
//!
//! # Attributes
//!
//! ## Struct Attributes
//!
//! - `#[meta(class = "Name")]` - Optional. Class name (default: the struct name).
//! - `#[meta(class_info(key = "value", ...))]` - Class-info pairs, in order.
//! - `#[meta(constructible)]` - Register a factory that uses `Default`.
//! - `#[meta(methods = path)]` - A `fn(MetaObjectBuilder) -> MetaObjectBuilder`
//!   that adds hand-written signals, slots and methods.
//!
//! ## Field Attributes
//!
//! - `#[meta(base)]` - The class's `ObjectBase`.
//! - `#[meta(extends)]` - An embedded object whose class becomes the super
//!   class. Exactly one of `base` / `extends` is required.
//! - `#[meta(property)]` - A property stored in a `PropertyCell` field
//!   (`parking_lot::RwLock<T>`, `parking_lot::Mutex<T>` or an atomic).
//! - `#[meta(name = "...")]` - Property name (default: the field name).
//! - `#[meta(notify = "signal(T)")]` - Notify signal, declared automatically
//!   and emitted by the setter when the value changes.
//! - `#[meta(readonly)]` - No setter.
//! - `#[meta(transient)]` - Not stored.
//! - `#[meta(user)]` - The class's user property.

mod meta_class;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for reflected classes
///
/// # Generated Code
///
/// - `CLASS_NAME` and `static_meta_object()` on the struct
/// - A getter per property, and a `set_` setter unless `readonly`
/// - An `Object` trait implementation
#[proc_macro_derive(MetaClass, attributes(meta))]
pub fn derive_meta_class(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    meta_class::derive_meta_class(input).into()
}
