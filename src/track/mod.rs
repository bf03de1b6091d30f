//! Track buffers: immutable decode-ordered chunk sequences with a trim range.
//!
//! A buffer is created once from demux output. Copies share the underlying
//! chunk list and differ only in their range, so splitting a clip never
//! duplicates sample payloads.

pub mod audio;
pub mod video;

pub use audio::AudioTrackBuffer;
pub use video::VideoTrackBuffer;
