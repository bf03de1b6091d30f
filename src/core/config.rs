//! Codec configuration records built once from demux output.
//!
//! Decoder wrappers compare configs by a process-unique version stamped at
//! construction instead of by object identity. Cloning preserves the version
//! (a clone is the same configuration), so a decoder already configured with
//! a config is never reconfigured by one of its clones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Version counter value identifying one built configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigVersion(u64);

static NEXT_CONFIG_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> ConfigVersion {
    ConfigVersion(NEXT_CONFIG_VERSION.fetch_add(1, Ordering::Relaxed))
}

/// Video decoder configuration: codec id string (e.g. `avc1.64001f`), coded
/// dimensions, and the out-of-band description bytes the container carried.
#[derive(Debug, Clone)]
pub struct VideoCodecConfig {
    pub codec: String,
    pub coded_width: u32,
    pub coded_height: u32,
    pub description: Option<Arc<[u8]>>,
    version: ConfigVersion,
}

impl VideoCodecConfig {
    pub fn new(
        codec: String,
        coded_width: u32,
        coded_height: u32,
        description: Option<Arc<[u8]>>,
    ) -> Self {
        Self {
            codec,
            coded_width,
            coded_height,
            description,
            version: next_version(),
        }
    }

    pub fn version(&self) -> ConfigVersion {
        self.version
    }
}

/// Audio decoder configuration.
#[derive(Debug, Clone)]
pub struct AudioCodecConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub channel_count: u32,
    pub description: Option<Arc<[u8]>>,
    version: ConfigVersion,
}

impl AudioCodecConfig {
    pub fn new(
        codec: String,
        sample_rate: u32,
        channel_count: u32,
        description: Option<Arc<[u8]>>,
    ) -> Self {
        Self {
            codec,
            sample_rate,
            channel_count,
            description,
            version: next_version(),
        }
    }

    pub fn version(&self) -> ConfigVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_configs_get_distinct_versions() {
        let a = VideoCodecConfig::new("avc1.42001f".into(), 1280, 720, None);
        let b = VideoCodecConfig::new("avc1.42001f".into(), 1280, 720, None);
        assert_ne!(a.version(), b.version());
    }

    #[test]
    fn test_clone_keeps_version() {
        let a = AudioCodecConfig::new("mp4a.40.2".into(), 48_000, 2, None);
        let b = a.clone();
        assert_eq!(a.version(), b.version());
    }
}
