//! Audio track buffer. Every audio chunk is independently decodable, so the
//! dependency queries collapse to single-chunk seeds.

use std::sync::Arc;

use crate::core::chunk::{ChunkList, ChunkListId, EncodedChunk};
use crate::core::config::AudioCodecConfig;
use crate::core::range::TrimRange;
use crate::core::time;
use crate::demux::AudioTrackSource;

#[derive(Debug, Clone)]
pub struct AudioTrackBuffer {
    chunks: ChunkList,
    config: Arc<AudioCodecConfig>,
    pub range: TrimRange,
}

impl AudioTrackBuffer {
    pub fn new(chunks: ChunkList, config: AudioCodecConfig) -> Self {
        let extent = chunks.duration_us();
        Self {
            chunks,
            config: Arc::new(config),
            range: TrimRange::full(time::to_seconds(extent)),
        }
    }

    pub fn from_source(source: AudioTrackSource) -> Self {
        let extent = source.chunks.duration_us().max(source.duration_us);
        let mut track = Self::new(source.chunks, source.config);
        track.range = TrimRange::full(time::to_seconds(extent));
        track
    }

    pub fn config(&self) -> &Arc<AudioCodecConfig> {
        &self.config
    }

    pub fn chunk_list(&self) -> &ChunkList {
        &self.chunks
    }

    pub fn list_id(&self) -> ChunkListId {
        self.chunks.id()
    }

    pub fn duration(&self) -> f64 {
        self.range.duration()
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn owns_chunk(&self, chunk: &EncodedChunk) -> bool {
        self.chunks.owns(chunk)
    }

    /// The chunk presenting source time `t` (seconds), as a one-element seed
    /// run. `None` outside the track's samples.
    pub fn chunks_for_time(&self, t: f64) -> Option<&[EncodedChunk]> {
        let index = self.chunks.index_at_time(time::from_seconds(t))?;
        Some(&self.chunks.as_slice()[index..=index])
    }

    /// Up to `max_count` chunks strictly after `after`. `None` at end of
    /// track.
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

    /// Chunks whose timestamps fall inside `[start, end)` seconds of source
    /// time. Export filters a box's audio to its trim range with this.
    pub fn chunks_in_range(&self, start: f64, end: f64) -> &[EncodedChunk] {
        let start_us = time::from_seconds(start);
        let end_us = time::from_seconds(end);
        let slice = self.chunks.as_slice();
        let lo = slice.partition_point(|c| c.timestamp < start_us);
        let hi = slice.partition_point(|c| c.timestamp < end_us);
        &slice[lo..hi]
    }
}
