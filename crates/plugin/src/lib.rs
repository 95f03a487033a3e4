//! metaplug Sample Plugin - MP3 Codec
//!
//! This crate compiles to a cdylib (.so/.dll/.dylib) that a host finds with
//!
//! ```ignore
//! let loader = FactoryLoader::new("com.metaplug.Codec", "codecs", CaseSensitivity::Insensitive);
//! let codec = loader.instance("mp3");
//! ```
//!
//! The library exports the `Mp3Codec` meta object. The host constructs the
//! codec through the meta object's factory, once per loaded library.

pub mod codec;

pub use codec::{CodecConfig, Mp3Codec, CODEC_IID};

metaplug_core::export_plugin!(Mp3Codec::static_meta_object());
