//! Container demultiplexing.
//!
//! Takes uploaded container bytes, surfaces per-track metadata, then
//! exhaustively extracts every sample into immutable chunk lists. A malformed
//! container fails with [`DemuxError`] and returns no partial track.

pub mod mp4;

pub use mp4::{
    demux, probe, AudioStreamInfo, AudioTrackSource, ContainerInfo, DemuxOutput, Mp4Demuxer,
    VideoStreamInfo, VideoTrackSource,
};

use thiserror::Error;

/// Demultiplexing failure. Fatal: the upload is rejected before any track
/// buffer is created.
#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("container truncated at byte {0}")]
    Truncated(usize),

    #[error("missing moov box")]
    MissingMoov,

    #[error("malformed `{0}` box: {1}")]
    Malformed(&'static str, &'static str),

    #[error("unsupported sample entry {0:08x}")]
    UnsupportedCodec(u32),

    #[error("unsupported layout: {0}")]
    UnsupportedLayout(&'static str),

    #[error("sample {index}: bytes {offset}..{offset_end} outside container of {len} bytes")]
    SampleOutOfBounds {
        index: usize,
        offset: u64,
        offset_end: u64,
        len: usize,
    },

    #[error("no decodable tracks")]
    NoTracks,
}
