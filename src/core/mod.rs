//! Core types for the editing pipeline.
//!
//! Fundamental data structures shared across demux, playback and export:
//! encoded chunks and their shared lists, codec configurations, trim ranges,
//! effect parameters, and the microsecond time representation.

pub mod chunk;
pub mod config;
pub mod effects;
pub mod events;
pub mod range;
pub mod time;

// Re-export core data structures for easier access.
pub use chunk::{ChunkKind, ChunkList, ChunkListId, ChunkPos, EncodedChunk};
pub use config::{AudioCodecConfig, ConfigVersion, VideoCodecConfig};
pub use effects::EffectSettings;
pub use range::TrimRange;
pub use time::{TimeUs, ZERO};
