//! Export pipeline: timeline in, downloadable MP4 out.
//!
//! The write-side counterpart of playback. Video is decoded, filtered and
//! re-encoded; audio is copied as-is. See [`Exporter`] for the run loop.

pub mod encode;
pub mod events;
pub mod exporter;

use crate::decode::backend::{DecodeError, EncodeError};
use crate::effects::EffectsError;
use crate::mux::MuxError;

pub use encode::{VideoFrameEncoder, KEYFRAME_INTERVAL_US};
pub use events::ExportEvent;
pub use exporter::{Exporter, QUEUE_WINDOW};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: the timeline is empty")]
    EmptyTimeline,
    #[error("decode failed during export: {0}")]
    Decode(#[from] DecodeError),
    #[error("encode failed during export: {0}")]
    Encode(#[from] EncodeError),
    #[error("effects failed during export: {0}")]
    Effects(#[from] EffectsError),
    #[error("mux failed during export: {0}")]
    Mux(#[from] MuxError),
}
