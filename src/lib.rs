//! Chunk-oriented video editing pipeline.
//!
//! Uploaded container bytes are demuxed into immutable chunk lists
//! ([`demux`]), wrapped in track buffers ([`track`]) and arranged as boxes on
//! a timeline ([`timeline`]). From there the same chunks feed two pipelines:
//! interactive playback ([`playback`] driving [`decode`], [`effects`] and
//! [`render`]) and batch export ([`export`] driving [`decode`], [`effects`]
//! and [`mux`]). Project state survives sessions through [`project`].
//!
//! Codec work happens behind the backend traits in [`decode`]; the crate
//! ships FFmpeg-backed implementations behind the `ffmpeg` feature and fake
//! backends for its own tests. Nothing here spawns threads: callers drive the
//! pipelines with ticks and polls.

pub mod core;
pub mod decode;
pub mod demux;
pub mod effects;
pub mod export;
pub mod mux;
pub mod playback;
pub mod project;
pub mod render;
pub mod timeline;
pub mod track;

pub use crate::core::{EncodedChunk, TimeUs};
pub use crate::demux::{demux, DemuxError, DemuxOutput};
pub use crate::export::{ExportError, ExportEvent, Exporter};
pub use crate::playback::{PlaybackController, PlaybackState, PlayerEvent};
pub use crate::timeline::{BoxId, Timeline, TimelineBox};
