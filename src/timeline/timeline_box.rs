//! Timeline box: one clip instance on the timeline.
//!
//! A box aggregates the track buffers demuxed from one upload, a trim range,
//! and its own effect parameters. Copying or splitting a box copies the track
//! buffers (which share chunk storage) so no two boxes share mutable state.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::chunk::EncodedChunk;
use crate::core::effects::EffectSettings;
use crate::core::range::TrimRange;
use crate::demux::DemuxOutput;
use crate::track::{AudioTrackBuffer, VideoTrackBuffer};

pub type BoxId = u64;

static NEXT_BOX_ID: AtomicU64 = AtomicU64::new(1);

fn next_box_id() -> BoxId {
    NEXT_BOX_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub struct TimelineBox {
    id: BoxId,
    /// Owned video tracks in concatenation order. The first is the primary
    /// track; additional tracks extend the box's source extent.
    video: Vec<VideoTrackBuffer>,
    audio: Vec<AudioTrackBuffer>,
    pub range: TrimRange,
    pub effects: EffectSettings,
    /// Identifier of the uploaded asset backing this box, carried through
    /// persistence.
    pub resource_id: Option<String>,
}

impl TimelineBox {
    /// Build a box from demux output. `None` when the container held no
    /// video track.
    pub fn from_demux(output: DemuxOutput, resource_id: Option<String>) -> Option<Self> {
        let video: Vec<_> = output
            .video
            .into_iter()
            .map(VideoTrackBuffer::from_source)
            .collect();
        let audio: Vec<_> = output
            .audio
            .into_iter()
            .map(AudioTrackBuffer::from_source)
            .collect();
        let mut tbox = Self::from_tracks(video, audio)?;
        tbox.resource_id = resource_id;
        Some(tbox)
    }

    /// Assemble a box directly from track buffers. `None` without video.
    pub fn from_tracks(video: Vec<VideoTrackBuffer>, audio: Vec<AudioTrackBuffer>) -> Option<Self> {
        if video.is_empty() {
            return None;
        }
        let extent: f64 = video.iter().map(|t| t.range.max_end).sum();
        let mut tbox = Self {
            id: next_box_id(),
            video,
            audio,
            range: TrimRange::full(extent),
            effects: EffectSettings::default(),
            resource_id: None,
        };
        tbox.sync_track_ranges();
        Some(tbox)
    }

    pub fn id(&self) -> BoxId {
        self.id
    }

    pub fn video_tracks(&self) -> &[VideoTrackBuffer] {
        &self.video
    }

    pub fn audio_tracks(&self) -> &[AudioTrackBuffer] {
        &self.audio
    }

    pub fn first_audio(&self) -> Option<&AudioTrackBuffer> {
        self.audio.first()
    }

    /// Trimmed duration in seconds.
    pub fn duration(&self) -> f64 {
        self.range.duration()
    }

    /// Move the start edge (absolute source seconds).
    pub fn trim_start(&mut self, start: f64) {
        self.range.trim_start(start);
        self.sync_track_ranges();
    }

    /// Move the end edge (absolute source seconds).
    pub fn trim_end(&mut self, end: f64) {
        self.range.trim_end(end);
        self.sync_track_ranges();
    }

    /// Independent copy with a fresh id. Chunk storage is shared, range and
    /// effects are cloned.
    pub fn copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = next_box_id();
        copy
    }

    /// Split into two independent boxes at `local_time` seconds past the
    /// box's start. Left keeps `[start, split]`, right keeps `[split, end]`.
    /// The caller replaces this box with the pair.
    pub fn split_at(&self, local_time: f64) -> (Self, Self) {
        let split = self.range.to_absolute(local_time.clamp(0.0, self.duration()));
        let mut left = self.copy();
        left.trim_end(split);
        let mut right = self.copy();
        right.trim_start(split);
        (left, right)
    }

    /// Chunks required to render `local_time` seconds past the box's start.
    /// `None` at or past the trim end (exclusive upper bound, so a boundary
    /// frame is never produced by two adjacent boxes).
    pub fn video_chunks_needed(&self, local_time: f64) -> Option<&[EncodedChunk]> {
        if !self.range.contains_local(local_time) {
            return None;
        }
        let absolute = self.range.to_absolute(local_time);
        let (track, track_time) = self.owning_video_track(absolute)?;
        track.chunks_for_time(track_time)
    }

    /// Decode-order continuation after `after`. When `after`'s track is
    /// exhausted, advances to the next owned track and reseeds with its
    /// dependency chunks. `None` once every track is exhausted.
    pub fn next_video_chunks(&self, after: &EncodedChunk, max_count: usize) -> Option<&[EncodedChunk]> {
        let owner = self.video.iter().position(|t| t.owns_chunk(after))?;
        if let Some(chunks) = self.video[owner].next_chunks(after, max_count) {
            return Some(chunks);
        }
        let next_track = self.video.get(owner + 1)?;
        next_track.chunks_for_time(0.0)
    }

    /// Audio counterpart of [`Self::video_chunks_needed`], over the first
    /// audio track only.
    pub fn audio_chunks_needed(&self, local_time: f64) -> Option<&[EncodedChunk]> {
        if !self.range.contains_local(local_time) {
            return None;
        }
        let absolute = self.range.to_absolute(local_time);
        self.first_audio()?.chunks_for_time(absolute)
    }

    /// Audio counterpart of [`Self::next_video_chunks`].
    pub fn next_audio_chunks(&self, after: &EncodedChunk, max_count: usize) -> Option<&[EncodedChunk]> {
        let track = self.audio.iter().find(|t| t.owns_chunk(after))?;
        track.next_chunks(after, max_count)
    }

    /// Track covering `absolute` seconds, with the time rebased into that
    /// track's own source axis. Tracks concatenate in order.
    fn owning_video_track(&self, absolute: f64) -> Option<(&VideoTrackBuffer, f64)> {
        let mut prefix = 0.0;
        for track in &self.video {
            let extent = track.range.max_end;
            if absolute < prefix + extent {
                return Some((track, absolute - prefix));
            }
            prefix += extent;
        }
        None
    }

    /// Seconds of earlier tracks preceding `chunk`'s owner, i.e. what to add
    /// to the chunk's own timestamp to place it on the box's source axis.
    /// `None` for a chunk from no track of this box.
    pub fn video_track_prefix(&self, chunk: &EncodedChunk) -> Option<f64> {
        let mut prefix = 0.0;
        for track in &self.video {
            if track.owns_chunk(chunk) {
                return Some(prefix);
            }
            prefix += track.range.max_end;
        }
        None
    }

    fn sync_track_ranges(&mut self) {
        for track in &mut self.video {
            let max = track.range.max_end;
            track.range.start = self.range.start.clamp(0.0, max);
            track.range.end = self.range.end.clamp(track.range.start, max);
        }
        for track in &mut self.audio {
            let max = track.range.max_end;
            track.range.start = self.range.start.clamp(0.0, max);
            track.range.end = self.range.end.clamp(track.range.start, max);
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::core::chunk::testutil::chunk_list;
    use crate::core::config::{AudioCodecConfig, VideoCodecConfig};

    /// A box over one synthetic video track: `n` chunks of `dur_us`, key
    /// chunk every `group`.
    pub fn video_box(n: usize, dur_us: i64, group: usize) -> TimelineBox {
        let config = VideoCodecConfig::new("avc1.42001F".into(), 640, 360, None);
        let track = VideoTrackBuffer::new(chunk_list(n, dur_us, group), config);
        TimelineBox::from_tracks(vec![track], Vec::new()).unwrap()
    }

    /// Like [`video_box`] with an audio track of matching extent.
    pub fn av_box(n: usize, dur_us: i64, group: usize) -> TimelineBox {
        let vconfig = VideoCodecConfig::new("avc1.42001F".into(), 640, 360, None);
        let aconfig = AudioCodecConfig::new("mp4a.40.2".into(), 48_000, 2, None);
        let video = VideoTrackBuffer::new(chunk_list(n, dur_us, group), vconfig);
        let audio = AudioTrackBuffer::new(chunk_list(n, dur_us, 1), aconfig);
        TimelineBox::from_tracks(vec![video], vec![audio]).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{av_box, video_box};
    use super::*;

    #[test]
    fn test_from_tracks_requires_video() {
        assert!(TimelineBox::from_tracks(Vec::new(), Vec::new()).is_none());
    }

    #[test]
    fn test_duration_follows_range() {
        let mut tbox = video_box(300, 33_333, 30); // ~10 s
        assert!((tbox.duration() - 9.9999).abs() < 0.001);
        tbox.trim_start(2.0);
        tbox.trim_end(6.0);
        assert!((tbox.duration() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_chunks_needed_projects_range() {
        let mut tbox = video_box(300, 33_333, 30);
        tbox.trim_start(2.0);
        // local 0 maps to absolute 2.0
        let run = tbox.video_chunks_needed(0.0).unwrap();
        let last = run.last().unwrap();
        assert!(last.timestamp <= 2_000_000 && 2_000_000 < last.end());
        assert!(run[0].is_key());
    }

    #[test]
    fn test_chunks_needed_upper_bound_exclusive() {
        let mut tbox = video_box(300, 33_333, 30);
        tbox.trim_end(4.0);
        assert!(tbox.video_chunks_needed(3.999).is_some());
        assert!(tbox.video_chunks_needed(4.0).is_none());
        assert!(tbox.video_chunks_needed(-0.5).is_none());
    }

    #[test]
    fn test_split_preserves_ranges() {
        let tbox = video_box(300, 33_333, 30);
        let original = tbox.duration();
        let (left, right) = tbox.split_at(3.0);

        assert_eq!(left.range.start, tbox.range.start);
        assert_eq!(left.range.end, tbox.range.start + 3.0);
        assert_eq!(right.range.start, tbox.range.start + 3.0);
        assert_eq!(right.range.end, tbox.range.end);
        assert!((left.duration() + right.duration() - original).abs() < 1e-9);
        assert_ne!(left.id(), right.id());
        assert_ne!(left.id(), tbox.id());
    }

    #[test]
    fn test_split_of_trimmed_box() {
        let mut tbox = video_box(300, 33_333, 30);
        tbox.trim_start(2.0);
        tbox.trim_end(8.0);
        let (left, right) = tbox.split_at(1.5);
        assert_eq!(left.range.start, 2.0);
        assert_eq!(left.range.end, 3.5);
        assert_eq!(right.range.start, 3.5);
        assert_eq!(right.range.end, 8.0);
    }

    #[test]
    fn test_copies_do_not_share_state() {
        let tbox = av_box(60, 33_333, 30);
        let mut copy = tbox.copy();
        copy.effects.opacity = 25.0;
        copy.trim_end(1.0);
        assert_eq!(tbox.effects.opacity, 100.0);
        assert!(tbox.duration() > 1.5);
        // chunk storage is still shared
        assert_eq!(
            copy.video_tracks()[0].list_id(),
            tbox.video_tracks()[0].list_id()
        );
    }

    #[test]
    fn test_next_chunks_forwards_to_owner() {
        let tbox = video_box(10, 1_000, 4);
        let seed = tbox.video_chunks_needed(0.0).unwrap();
        let after = seed.last().unwrap().clone();
        let next = tbox.next_video_chunks(&after, 3).unwrap();
        assert_eq!(next[0].position().index, 1);

        let foreign_box = video_box(10, 1_000, 4);
        let foreign = foreign_box.video_chunks_needed(0.0).unwrap()[0].clone();
        assert!(tbox.next_video_chunks(&foreign, 3).is_none());
    }

    #[test]
    fn test_audio_queries() {
        let tbox = av_box(60, 33_333, 30);
        let seed = tbox.audio_chunks_needed(0.5).unwrap();
        assert_eq!(seed.len(), 1);
        let next = tbox.next_audio_chunks(&seed[0], 4).unwrap();
        assert_eq!(next.len(), 4);
        assert!(tbox.audio_chunks_needed(tbox.duration()).is_none());
    }

    #[test]
    fn test_track_ranges_mirror_box_range() {
        let mut tbox = av_box(300, 33_333, 30);
        tbox.trim_start(1.0);
        tbox.trim_end(5.0);
        assert_eq!(tbox.video_tracks()[0].range.start, 1.0);
        assert_eq!(tbox.video_tracks()[0].range.end, 5.0);
        assert_eq!(tbox.audio_tracks()[0].range.start, 1.0);
        assert_eq!(tbox.audio_tracks()[0].range.end, 5.0);
    }
}
