//! Decoding layer: codec backend traits, config-gated chunk decoders, and
//! the FFmpeg-backed implementations.

pub mod audio;
pub mod backend;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod video;

pub use audio::AudioChunkDecoder;
pub use backend::{
    AudioDecodeBackend, DecodeError, EncodeError, EncodeSettings, EncodedPacket,
    VideoDecodeBackend, VideoEncodeBackend,
};
pub use frame::{AudioBuffer, VideoFrame};
pub use video::VideoChunkDecoder;
