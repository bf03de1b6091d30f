//! Video track buffer with key-chunk group queries.

use std::sync::Arc;

use crate::core::chunk::{ChunkList, ChunkListId, EncodedChunk};
use crate::core::config::VideoCodecConfig;
use crate::core::range::TrimRange;
use crate::core::time;
use crate::demux::VideoTrackSource;

/// One video track: decode-ordered chunks, fixed codec configuration, and a
/// mutable trim range in seconds.
#[derive(Debug, Clone)]
pub struct VideoTrackBuffer {
    chunks: ChunkList,
    config: Arc<VideoCodecConfig>,
    pub range: TrimRange,
}

impl VideoTrackBuffer {
    pub fn new(chunks: ChunkList, config: VideoCodecConfig) -> Self {
        let extent = chunks.duration_us();
        Self {
            chunks,
            config: Arc::new(config),
            range: TrimRange::full(time::to_seconds(extent)),
        }
    }

    pub fn from_source(source: VideoTrackSource) -> Self {
        let extent = source.chunks.duration_us().max(source.duration_us);
        let mut track = Self::new(source.chunks, source.config);
        track.range = TrimRange::full(time::to_seconds(extent));
        track
    }

    pub fn config(&self) -> &Arc<VideoCodecConfig> {
        &self.config
    }

    pub fn chunk_list(&self) -> &ChunkList {
        &self.chunks
    }

    pub fn list_id(&self) -> ChunkListId {
        self.chunks.id()
    }

    /// Trimmed duration in seconds.
    pub fn duration(&self) -> f64 {
        self.range.duration()
    }

    /// Independent logical reference: shares the chunk storage, owns its
    /// range.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Whether `chunk` came from this buffer's chunk list.
    pub fn owns_chunk(&self, chunk: &EncodedChunk) -> bool {
        self.chunks.owns(chunk)
    }

    /// Chunks needed to decode and present source time `t` (seconds): the
    /// containing group's key chunk through the chunk covering `t`. `None`
    /// when `t` lies outside the track's samples. Seeds a decode after a
    /// seek.
    pub fn chunks_for_time(&self, t: f64) -> Option<&[EncodedChunk]> {
        let index = self.chunks.index_at_time(time::from_seconds(t))?;
        let start = self.chunks.group_start(index);
        Some(&self.chunks.as_slice()[start..=index])
    }

    /// Up to `max_count` chunks strictly after `after` in decode order,
    /// crossing group boundaries. `None` at end of track. `after` must come
    /// from this buffer.
    pub fn next_chunks(&self, after: &EncodedChunk, max_count: usize) -> Option<&[EncodedChunk]> {
        assert!(
            self.owns_chunk(after),
            "next_chunks called with a chunk from another track"
        );
        let next = after.position().index + 1;
        if next >= self.chunks.len() {
            return None;
        }
        let end = (next + max_count).min(self.chunks.len());
        Some(&self.chunks.as_slice()[next..end])
    }
}
