//! MP3 codec plugin object

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use metaplug_core::meta::method_jar;
use metaplug_core::{
    connections, MetaClass, MetaObjectBuilder, MethodBuilder, ObjectBase, PluginConfig, Variant,
};

/// Interface id shared by every codec plugin
pub const CODEC_IID: &str = "com.metaplug.Codec";

/// `configs/plugins/codec/codec.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Bitrate in kbit/s
    pub bitrate: u32,
    pub channels: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            bitrate: 192,
            channels: 2,
        }
    }
}

impl PluginConfig for CodecConfig {
    const PLUGIN_NAME: &'static str = "codec";
}

#[derive(MetaClass)]
#[meta(
    class = "Mp3Codec",
    class_info(plugin_iid = "com.metaplug.Codec", plugin_key = "mp3, MP3", plugin_version = "2"),
    constructible,
    methods = codec_methods
)]
pub struct Mp3Codec {
    #[meta(base)]
    base: ObjectBase,

    #[meta(property, notify = "bitrateChanged(u32)", user)]
    bitrate: AtomicU32,

    #[meta(property, notify = "channelsChanged(u32)")]
    channels: AtomicU32,

    #[meta(property, readonly, transient)]
    frames: AtomicU64,
}

impl Default for Mp3Codec {
    fn default() -> Self {
        Self::with_config(&CodecConfig::default())
    }
}

const SAMPLE_RATE: u32 = 44_100;

impl Mp3Codec {
    pub fn with_config(config: &CodecConfig) -> Self {
        Self {
            base: ObjectBase::new(),
            bitrate: AtomicU32::new(config.bitrate),
            channels: AtomicU32::new(config.channels),
            frames: AtomicU64::new(0),
        }
    }

    /// Bytes in one MPEG-1 Layer III frame at the current bitrate
    ///
    /// Saturates at `u32::MAX` for bitrates no real stream uses.
    pub fn frame_size(&self) -> u32 {
        let bytes = 144 * u64::from(self.bitrate()) * 1000 / u64::from(SAMPLE_RATE);
        u32::try_from(bytes).unwrap_or(u32::MAX)
    }

    /// Count `count` encoded frames; emits `framesEncoded(u64)` with the total
    pub fn encode_frames(&self, count: u64) {
        let total = self.frames.fetch_add(count, Ordering::SeqCst) + count;
        tracing::trace!("Encoded {} frames ({} total)", count, total);
        connections::emit(self, "framesEncoded(u64)", &[Variant::ULongLong(total)]);
    }

    /// Apply `codec.toml`; false if it could not be read
    pub fn reload_config(&self) -> bool {
        match CodecConfig::load() {
            Ok(config) => {
                self.set_bitrate(config.bitrate);
                self.set_channels(config.channels);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to load codec config: {}", e);
                false
            }
        }
    }
}

fn codec_methods(builder: MetaObjectBuilder) -> MetaObjectBuilder {
    builder
        .method(MethodBuilder::signal("framesEncoded(u64)").parameter_names(&["total"]))
        .method(
            MethodBuilder::slot("encodeFrames(u64)")
                .parameter_names(&["count"])
                .invoke(method_jar(|codec: &Mp3Codec, count: u64| codec.encode_frames(count))),
        )
        .method(
            MethodBuilder::slot("reloadConfig()")
                .return_type("bool")
                .invoke(method_jar(|codec: &Mp3Codec| codec.reload_config())),
        )
        .method(
            MethodBuilder::method("frameSize()")
                .return_type("u32")
                .invoke(method_jar(|codec: &Mp3Codec| codec.frame_size())),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use metaplug_core::{connect_fn, invoke_method, new_object, ConnectionType, ObjectExt};

    use super::*;

    #[test]
    fn test_plugin_class_info() {
        let meta = Mp3Codec::static_meta_object();
        assert_eq!(meta.class_info_value("plugin_iid"), Some(CODEC_IID));
        assert_eq!(meta.class_info_value("plugin_version"), Some("2"));
        assert!(meta.is_constructible());
        assert_eq!(meta.user_property().map(|p| p.name()), Some("bitrate"));
    }

    #[test]
    fn test_frame_size_follows_bitrate() {
        let codec = new_object(Mp3Codec::default());
        assert_eq!(
            invoke_method(&*codec, "frameSize()", ConnectionType::Direct, &[]).unwrap(),
            Variant::UInt(626)
        );

        assert!(codec.set_property("bitrate", 320));
        assert_eq!(codec.frame_size(), 1044);
    }

    #[test]
    fn test_frame_size_large_bitrate() {
        let codec = new_object(Mp3Codec::default());

        codec.set_bitrate(320_000);
        assert_eq!(codec.frame_size(), 1_044_897);

        codec.set_bitrate(u32::MAX);
        assert_eq!(codec.frame_size(), u32::MAX);
    }

    #[test]
    fn test_encode_frames_emits_total() {
        let codec = new_object(Mp3Codec::default());
        let totals = Arc::new(Mutex::new(Vec::new()));
        let sink = totals.clone();
        connect_fn(
            &*codec,
            "framesEncoded(u64)",
            &*codec,
            move |args| sink.lock().push(args[0].to_u64().unwrap_or_default()),
            ConnectionType::Direct,
        )
        .unwrap();

        invoke_method(&*codec, "encodeFrames(u64)", ConnectionType::Direct, &[Variant::Int(3)])
            .unwrap();
        codec.encode_frames(2);

        assert_eq!(*totals.lock(), [3, 5]);
        assert_eq!(codec.frames(), 5);
    }
}
