//! Codec backend traits.
//!
//! Backends accept encoded chunks in decode order and surface output through
//! `poll`. The contract every backend upholds: each accepted chunk produces
//! exactly one output carrying the chunk's timestamp, outputs arrive in
//! submission order, and `reset` discards in-flight work without emitting it.

use crate::core::chunk::EncodedChunk;
use crate::core::config::{AudioCodecConfig, VideoCodecConfig};
use crate::core::time::TimeUs;
use crate::decode::frame::{AudioBuffer, VideoFrame};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("codec {0:?} is not supported")]
    UnsupportedCodec(String),
    #[error("decoder used before configure")]
    NotConfigured,
    #[error("configure failed: {0}")]
    Configure(String),
    #[error("decode failed: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("codec {0:?} is not supported")]
    UnsupportedCodec(String),
    #[error("encoder used before configure")]
    NotConfigured,
    #[error("configure failed: {0}")]
    Configure(String),
    #[error("encode failed: {0}")]
    Backend(String),
}

/// Encoder output: one compressed frame plus its placement.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    pub timestamp: TimeUs,
    pub duration: TimeUs,
    pub is_key: bool,
}

/// Target parameters for video encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_bps: u32,
    pub framerate: f64,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: "avc1.42001F".into(),
            width: 1280,
            height: 720,
            bitrate_bps: 6_000_000,
            framerate: 30.0,
        }
    }
}

pub trait VideoDecodeBackend: Send {
    fn configure(&mut self, config: &VideoCodecConfig) -> Result<(), DecodeError>;
    /// Accept one chunk in decode order.
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<(), DecodeError>;
    /// Drain whatever output is ready, oldest first.
    fn poll(&mut self) -> Vec<VideoFrame>;
    /// Force out everything still in flight.
    fn flush(&mut self) -> Result<Vec<VideoFrame>, DecodeError>;
    /// Discard in-flight work. The backend must be reconfigured afterwards.
    fn reset(&mut self);
}

pub trait AudioDecodeBackend: Send {
    fn configure(&mut self, config: &AudioCodecConfig) -> Result<(), DecodeError>;
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<(), DecodeError>;
    fn poll(&mut self) -> Vec<AudioBuffer>;
    fn flush(&mut self) -> Result<Vec<AudioBuffer>, DecodeError>;
    fn reset(&mut self);
}

pub trait VideoEncodeBackend: Send {
    fn configure(&mut self, settings: &EncodeSettings) -> Result<(), EncodeError>;
    /// Accept one frame; `keyframe` forces a sync point.
    fn encode(&mut self, frame: &VideoFrame, keyframe: bool) -> Result<(), EncodeError>;
    fn poll(&mut self) -> Vec<EncodedPacket>;
    fn flush(&mut self) -> Result<Vec<EncodedPacket>, EncodeError>;
    fn reset(&mut self);
    /// Codec configuration record (e.g. avcC) once the first output exists.
    fn description(&self) -> Option<&[u8]>;
}
