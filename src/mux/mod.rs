//! Container multiplexing.
//!
//! The writing side of [`crate::demux`]: encoded samples accumulate into
//! per-track tables and a shared payload region, and `finalize` serializes
//! a complete container in one pass. Exports produced here demux back into
//! the same chunk lists they were built from.

mod mp4;
pub(crate) mod writer;

pub use mp4::{Mp4Muxer, AUDIO_TIMESCALE, VIDEO_TIMESCALE};

use crate::core::time::TimeUs;
use thiserror::Error;

/// Multiplexing failure. Fatal for the export writing the sample.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error(
        "first video sample holds {len} bytes, short of its parameter prefix ending at byte {prefix_end}"
    )]
    PrefixOutOfBounds { prefix_end: usize, len: usize },

    #[error("{track} sample at {timestamp} µs steps backwards")]
    NonMonotonic {
        track: &'static str,
        timestamp: TimeUs,
    },

    #[error("{0} sample pushed before the track was added")]
    MissingTrack(&'static str),

    #[error("finalized with no tracks")]
    NoTracks,
}
