//! Batch export: decode every box's video, run it through effects, re-encode
//! it onto one continuous output axis and mux the result, then pass the audio
//! through untouched. The run is synchronous but windowed: submission pauses
//! whenever too much work is in flight, so memory stays bounded regardless of
//! timeline length.

use tracing::{debug, info};

use crate::core::chunk::EncodedChunk;
use crate::core::events::{EventHub, Subscription};
use crate::core::time::{self, TimeUs};
use crate::decode::backend::{DecodeError, EncodeSettings, EncodedPacket};
use crate::decode::frame::VideoFrame;
use crate::decode::VideoChunkDecoder;
use crate::effects::EffectsStage;
use crate::export::encode::VideoFrameEncoder;
use crate::export::events::ExportEvent;
use crate::export::ExportError;
use crate::mux::Mp4Muxer;
use crate::timeline::{Timeline, TimelineBox};

/// Ceiling on chunks submitted but not yet muxed. Submission stops here and
/// results are drained before more work goes in.
pub const QUEUE_WINDOW: usize = 20;

/// Draining continues until in-flight work falls back to this level.
const DRAIN_TARGET: usize = 5;

/// Chunks pulled per continuation step once the seed run is in.
const PULL_BATCH: usize = 10;

/// Timestamp stamped onto chunks decoded only as dependencies of kept ones.
/// Their frames are dropped at the decoder output instead of encoded.
const DISCARD_US: TimeUs = -1;

/// One-shot pipeline turning a timeline into a finished MP4.
///
/// The exporter owns its own decoder and encoder so a run never disturbs
/// playback state, and both are torn down when a run fails partway. Output
/// timestamps restart at zero: each box contributes its trimmed span shifted
/// by the total duration of the boxes before it.
pub struct Exporter {
    decoder: VideoChunkDecoder,
    encoder: VideoFrameEncoder,
    effects: Box<dyn EffectsStage>,
    events: EventHub<ExportEvent>,
    output: Option<Vec<u8>>,
    encoded: usize,
    total: usize,
}

impl Exporter {
    pub fn new(
        decoder: VideoChunkDecoder,
        encoder: VideoFrameEncoder,
        effects: Box<dyn EffectsStage>,
    ) -> Self {
        Self {
            decoder,
            encoder,
            effects,
            events: EventHub::default(),
            output: None,
            encoded: 0,
            total: 0,
        }
    }

    pub fn subscribe(&mut self) -> Subscription<ExportEvent> {
        self.events.subscribe()
    }

    /// Samples written so far and the total planned for the current run.
    pub fn progress(&self) -> (usize, usize) {
        (self.encoded, self.total)
    }

    /// Run the whole timeline through the pipeline. On success the finished
    /// container is held for [`Self::download`]; on failure both codecs are
    /// torn down and nothing is kept.
    pub fn export(
        &mut self,
        timeline: &Timeline,
        settings: &EncodeSettings,
    ) -> Result<(), ExportError> {
        if timeline.is_empty() {
            return Err(ExportError::EmptyTimeline);
        }
        self.decoder.reset();
        self.encoder.reset();
        self.output = None;
        self.encoded = 0;
        self.total = planned_video_samples(timeline);
        info!(boxes = timeline.len(), planned = self.total, "export started");

        let mut muxer = Mp4Muxer::new();
        let result = self
            .run(timeline, settings, &mut muxer)
            .and_then(|()| muxer.finalize().map_err(ExportError::from));
        match result {
            Ok(bytes) => {
                info!(encoded = self.encoded, bytes = bytes.len(), "export finished");
                self.output = Some(bytes);
                self.events.emit(ExportEvent::Completed);
                Ok(())
            }
            Err(err) => {
                self.decoder.reset();
                self.encoder.reset();
                self.events.emit(ExportEvent::Cancelled);
                Err(err)
            }
        }
    }

    /// The finished container bytes. Taking them leaves the exporter empty.
    pub fn download(&mut self) -> Option<Vec<u8>> {
        self.output.take()
    }

    /// Abort whatever state is held: in-flight codec work, counters and any
    /// finished output.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.encoder.reset();
        self.output = None;
        self.encoded = 0;
        self.total = 0;
        self.events.emit(ExportEvent::Cancelled);
    }

    fn run(
        &mut self,
        timeline: &Timeline,
        settings: &EncodeSettings,
        muxer: &mut Mp4Muxer,
    ) -> Result<(), ExportError> {
        let mut prefix = 0.0;
        for (index, tbox) in timeline.boxes().iter().enumerate() {
            self.export_box_video(timeline, tbox, prefix, settings, muxer)?;
            debug!(index, encoded = self.encoded, "box video drained");
            prefix += tbox.duration();
        }
        // the decoder is empty after the per-box flushes; force the
        // encoder's tail out before the audio is appended
        let packets = self.encoder.flush()?;
        self.mux_packets(muxer, settings, packets)?;
        self.mux_audio(timeline, muxer)
    }

    /// Feed one box's video through the decoder in decode order. Chunks
    /// inside the trim range are remapped onto the output axis; chunks the
    /// range depends on but does not keep are stamped for discard. Ends with
    /// a decoder flush because the next box may switch configuration.
    fn export_box_video(
        &mut self,
        timeline: &Timeline,
        tbox: &TimelineBox,
        prefix: f64,
        settings: &EncodeSettings,
        muxer: &mut Mp4Muxer,
    ) -> Result<(), ExportError> {
        let start_us = time::from_seconds(tbox.range.start);
        let end_us = time::from_seconds(tbox.range.end);
        let shift_us = time::from_seconds(prefix - tbox.range.start);

        let mut batch: Vec<EncodedChunk> = match tbox.video_chunks_needed(0.0) {
            Some(seed) => seed.to_vec(),
            None => return Ok(()),
        };
        let mut active_track: Option<usize> = None;
        loop {
            self.throttle(timeline, settings, muxer)?;
            let owner = tbox
                .video_tracks()
                .iter()
                .position(|track| track.owns_chunk(&batch[0]))
                .expect("batch comes from one of the box's tracks");
            // a track switch is a config switch, so the decoder must drain
            if active_track.is_some_and(|index| index != owner) {
                let frames = self.decoder.flush()?;
                self.encode_frames(timeline, settings, frames)?;
            }
            active_track = Some(owner);
            self.submit_batch(tbox, owner, &batch, start_us, end_us, shift_us)?;

            let last = batch.last().expect("batches are never empty");
            if source_time(tbox, last) >= end_us {
                break;
            }
            match tbox.next_video_chunks(last, PULL_BATCH) {
                Some(next) => batch = next.to_vec(),
                None => break,
            }
        }
        let frames = self.decoder.flush()?;
        self.encode_frames(timeline, settings, frames)
    }

    /// Remap and submit one batch, all owned by the box's `owner` track.
    fn submit_batch(
        &mut self,
        tbox: &TimelineBox,
        owner: usize,
        batch: &[EncodedChunk],
        start_us: TimeUs,
        end_us: TimeUs,
        shift_us: TimeUs,
    ) -> Result<(), DecodeError> {
        let track = &tbox.video_tracks()[owner];
        let track_prefix: f64 = tbox.video_tracks()[..owner]
            .iter()
            .map(|earlier| earlier.range.max_end)
            .sum();
        let prefix_us = time::from_seconds(track_prefix);

        let remapped: Vec<EncodedChunk> = batch
            .iter()
            .map(|chunk| {
                let source = prefix_us + chunk.timestamp;
                let target = if (start_us..end_us).contains(&source) {
                    source + shift_us
                } else {
                    DISCARD_US
                };
                chunk.with_timestamp(target)
            })
            .collect();
        self.decoder.submit(&remapped, track.config())
    }

    /// Pause-and-drain backpressure. Returns as soon as in-flight work is
    /// back under the drain target, or earlier if a round moves nothing
    /// (a latency backend may hold frames until the next flush).
    fn throttle(
        &mut self,
        timeline: &Timeline,
        settings: &EncodeSettings,
        muxer: &mut Mp4Muxer,
    ) -> Result<(), ExportError> {
        if self.outstanding() < QUEUE_WINDOW {
            return Ok(());
        }
        loop {
            let progressed = self.drain(timeline, settings, muxer)?;
            if self.outstanding() <= DRAIN_TARGET || !progressed {
                return Ok(());
            }
        }
    }

    fn outstanding(&self) -> usize {
        self.decoder.in_flight() + self.encoder.in_flight()
    }

    /// One poll round across both codecs. `false` when nothing moved.
    fn drain(
        &mut self,
        timeline: &Timeline,
        settings: &EncodeSettings,
        muxer: &mut Mp4Muxer,
    ) -> Result<bool, ExportError> {
        let frames = self.decoder.poll();
        let decoded = !frames.is_empty();
        self.encode_frames(timeline, settings, frames)?;
        let packets = self.encoder.poll();
        let progressed = decoded || !packets.is_empty();
        self.mux_packets(muxer, settings, packets)?;
        Ok(progressed)
    }

    /// Effects, then encode, in presentation order. Discard-stamped frames
    /// are dropped here; every kept frame carries the effect settings of the
    /// box its output timestamp lands in.
    fn encode_frames(
        &mut self,
        timeline: &Timeline,
        settings: &EncodeSettings,
        frames: Vec<VideoFrame>,
    ) -> Result<(), ExportError> {
        for frame in frames {
            if frame.timestamp < 0 {
                continue;
            }
            let effects = timeline
                .box_at(frame.timestamp_seconds())
                .map(|(index, _)| timeline.boxes()[index].effects)
                .unwrap_or_default();
            let frame = self.effects.process(&frame, &effects)?;
            self.encoder.submit(&frame, settings)?;
        }
        Ok(())
    }

    /// Hand encoder output to the muxer, creating the video track on first
    /// contact (the codec description only exists once the encoder has run).
    fn mux_packets(
        &mut self,
        muxer: &mut Mp4Muxer,
        settings: &EncodeSettings,
        packets: Vec<EncodedPacket>,
    ) -> Result<(), ExportError> {
        if packets.is_empty() {
            return Ok(());
        }
        if !muxer.has_video_track() {
            let description = self
                .encoder
                .description()
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            muxer.add_video_track(settings.width, settings.height, description);
        }
        for packet in &packets {
            muxer.push_video(packet)?;
            self.encoded += 1;
            self.events.emit(ExportEvent::Progress {
                encoded: self.encoded,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Append each box's first audio track, filtered to the trim range and
    /// shifted onto the output axis. No re-encode and no resampling: the
    /// output track keeps the first box's sample rate, and later boxes with
    /// a different rate will drift.
    fn mux_audio(&mut self, timeline: &Timeline, muxer: &mut Mp4Muxer) -> Result<(), ExportError> {
        let mut prefix = 0.0;
        for tbox in timeline.boxes() {
            if let Some(track) = tbox.first_audio() {
                if !muxer.has_audio_track() {
                    let config = track.config();
                    muxer.add_audio_track(
                        config.sample_rate,
                        config.channel_count,
                        config.description.as_deref().map(<[u8]>::to_vec),
                    );
                }
                let shift_us = time::from_seconds(prefix - tbox.range.start);
                for chunk in track.chunks_in_range(tbox.range.start, tbox.range.end) {
                    muxer.push_audio(&chunk.with_timestamp(chunk.timestamp + shift_us))?;
                }
            }
            prefix += tbox.duration();
        }
        Ok(())
    }
}

/// A chunk's position on its box's source axis, in microseconds.
fn source_time(tbox: &TimelineBox, chunk: &EncodedChunk) -> TimeUs {
    let prefix = tbox
        .video_track_prefix(chunk)
        .expect("chunk comes from one of the box's tracks");
    time::from_seconds(prefix) + chunk.timestamp
}

/// Number of video samples the run will write: every chunk whose source
/// position falls inside its box's trim range. Computed up front so progress
/// events carry a stable denominator.
fn planned_video_samples(timeline: &Timeline) -> usize {
    let mut total = 0;
    for tbox in timeline.boxes() {
        let start_us = time::from_seconds(tbox.range.start);
        let end_us = time::from_seconds(tbox.range.end);
        let mut track_prefix = 0.0;
        for track in tbox.video_tracks() {
            let prefix_us = time::from_seconds(track_prefix);
            total += track
                .chunk_list()
                .as_slice()
                .iter()
                .filter(|chunk| (start_us..end_us).contains(&(prefix_us + chunk.timestamp)))
                .count();
            track_prefix += track.range.max_end;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::core::effects::EffectSettings;
    use crate::decode::backend::testing::{FakeVideoDecoder, FakeVideoEncoder};
    use crate::demux::demux;
    use crate::effects::{CpuEffects, EffectsError};
    use crate::timeline::timeline_box::testutil::{av_box, video_box};

    /// Effects stage that records every settings value it is handed before
    /// delegating to the CPU path.
    struct RecordingEffects {
        inner: CpuEffects,
        seen: Arc<Mutex<Vec<EffectSettings>>>,
    }

    impl RecordingEffects {
        fn new() -> (Self, Arc<Mutex<Vec<EffectSettings>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let stage = Self {
                inner: CpuEffects::new(),
                seen: Arc::clone(&seen),
            };
            (stage, seen)
        }
    }

    impl EffectsStage for RecordingEffects {
        fn process(
            &mut self,
            frame: &VideoFrame,
            settings: &EffectSettings,
        ) -> Result<VideoFrame, EffectsError> {
            self.seen.lock().unwrap().push(*settings);
            self.inner.process(frame, settings)
        }
    }

    fn exporter() -> Exporter {
        Exporter::new(
            VideoChunkDecoder::new(Box::new(FakeVideoDecoder::new())),
            VideoFrameEncoder::new(Box::new(FakeVideoEncoder::new())),
            Box::new(CpuEffects::new()),
        )
    }

    fn recording_exporter() -> (Exporter, Arc<Mutex<Vec<EffectSettings>>>) {
        let (stage, seen) = RecordingEffects::new();
        let exporter = Exporter::new(
            VideoChunkDecoder::new(Box::new(FakeVideoDecoder::new())),
            VideoFrameEncoder::new(Box::new(FakeVideoEncoder::new())),
            Box::new(stage),
        );
        (exporter, seen)
    }

    #[test]
    fn test_export_single_box_with_effects() {
        let (mut exporter, seen) = recording_exporter();
        let events = exporter.subscribe();

        let mut timeline = Timeline::new();
        let mut tbox = video_box(150, 33_333, 30); // ~5 s
        tbox.effects.opacity = 50.0;
        timeline.push(tbox);

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        assert_eq!(exporter.progress(), (150, 150));

        let bytes = exporter.download().unwrap();
        assert!(exporter.download().is_none());

        let out = demux(&bytes).unwrap();
        assert_eq!(out.video.len(), 1);
        let track = &out.video[0];
        assert_eq!(track.chunks.len(), 150);
        // full box: within one frame of the source's five seconds
        assert!((track.duration_us - 5_000_000).abs() <= 33_333);

        // sync points forced at the start and every four seconds
        let keys: Vec<usize> = track
            .chunks
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, chunk)| chunk.is_key())
            .map(|(index, _)| index)
            .collect();
        assert_eq!(keys, vec![0, 121]);

        // every frame went through effects with the box's settings
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 150);
        assert!(seen.iter().all(|settings| settings.opacity == 50.0));

        let events = events.drain();
        assert_eq!(events.last(), Some(&ExportEvent::Completed));
        let progress: Vec<&ExportEvent> = events
            .iter()
            .filter(|event| matches!(event, ExportEvent::Progress { .. }))
            .collect();
        assert_eq!(progress.len(), 150);
        assert_eq!(
            progress.last(),
            Some(&&ExportEvent::Progress {
                encoded: 150,
                total: 150
            })
        );
    }

    #[test]
    fn test_trimmed_box_skips_leading_content() {
        let fake = FakeVideoDecoder::new();
        let stats = fake.stats();
        let mut exporter = Exporter::new(
            VideoChunkDecoder::new(Box::new(fake)),
            VideoFrameEncoder::new(Box::new(FakeVideoEncoder::new())),
            Box::new(CpuEffects::new()),
        );

        let mut timeline = Timeline::new();
        let mut tbox = video_box(300, 33_333, 30); // ~10 s
        tbox.trim_start(2.05); // mid-group, so the cut depends on earlier chunks
        timeline.push(tbox);

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();

        // chunks 62..=299 are inside the range; 60 and 61 were decoded only
        // to reach them and never encoded
        assert_eq!(exporter.progress(), (238, 238));
        assert_eq!(stats.decoded(), 240);

        let bytes = exporter.download().unwrap();
        let out = demux(&bytes).unwrap();
        let track = &out.video[0];
        assert_eq!(track.chunks.len(), 238);
        // output restarts at zero and spans the trimmed length
        assert_eq!(track.chunks.as_slice()[0].timestamp, 0);
        assert!((track.duration_us - 7_949_900).abs() <= 33_333);
    }

    #[test]
    fn test_two_boxes_concatenate_on_the_output_axis() {
        let (mut exporter, seen) = recording_exporter();

        let mut timeline = Timeline::new();
        let mut first = video_box(120, 33_333, 30); // ~4 s
        first.effects.opacity = 30.0;
        let mut second = video_box(180, 33_333, 30); // ~6 s
        second.effects.blur = 4.0;
        timeline.push(first);
        timeline.push(second);

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        assert_eq!(exporter.progress(), (300, 300));

        let bytes = exporter.download().unwrap();
        let out = demux(&bytes).unwrap();
        let track = &out.video[0];
        assert_eq!(track.chunks.len(), 300);
        assert!((track.duration_us - 10_000_000).abs() <= 33_333);

        // seamless at the box boundary: one ordinary frame step
        let ts: Vec<TimeUs> = track
            .chunks
            .as_slice()
            .iter()
            .map(|chunk| chunk.timestamp)
            .collect();
        assert_eq!(ts[120] - ts[119], 33_333);

        // frames switched to the second box's settings exactly at the seam
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 300);
        assert!(seen[..120]
            .iter()
            .all(|s| s.opacity == 30.0 && s.blur == 0.0));
        assert!(seen[120..]
            .iter()
            .all(|s| s.opacity == 100.0 && s.blur == 4.0));
    }

    #[test]
    fn test_audio_passes_through_remapped() {
        let mut timeline = Timeline::new();
        let mut tbox = av_box(100, 20_000, 10); // 2 s
        tbox.trim_start(0.5);
        timeline.push(tbox);

        let mut exporter = exporter();
        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        let bytes = exporter.download().unwrap();
        let out = demux(&bytes).unwrap();

        assert_eq!(out.video[0].chunks.len(), 75);

        assert_eq!(out.audio.len(), 1);
        let audio = &out.audio[0];
        assert_eq!(audio.config.codec, "mp4a.40.2");
        assert_eq!(audio.config.sample_rate, 48_000);
        assert_eq!(audio.config.channel_count, 2);
        // chunks from 0.5 s on survive, shifted back to zero
        assert_eq!(audio.chunks.len(), 75);
        assert_eq!(audio.chunks.as_slice()[0].timestamp, 0);
        assert_eq!(audio.chunks.as_slice()[1].timestamp, 20_000);
        assert_eq!(audio.duration_us, 1_500_000);
    }

    #[test]
    fn test_decode_failure_rolls_back() {
        let mut fake = FakeVideoDecoder::new();
        fake.fail_on_call = Some(10);
        let stats = fake.stats();
        let mut exporter = Exporter::new(
            VideoChunkDecoder::new(Box::new(fake)),
            VideoFrameEncoder::new(Box::new(FakeVideoEncoder::new())),
            Box::new(CpuEffects::new()),
        );
        let events = exporter.subscribe();

        let mut timeline = Timeline::new();
        timeline.push(video_box(60, 33_333, 30));

        let err = exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Decode(_)));
        assert!(exporter.download().is_none());
        // nothing was muxed before the failure, so the only event is the abort
        assert_eq!(events.drain(), vec![ExportEvent::Cancelled]);
        // one reset going in, one tearing down
        assert_eq!(stats.resets(), 2);
    }

    #[test]
    fn test_encode_failure_rolls_back() {
        let mut fake = FakeVideoEncoder::new();
        fake.fail_on_call = Some(5);
        let mut exporter = Exporter::new(
            VideoChunkDecoder::new(Box::new(FakeVideoDecoder::new())),
            VideoFrameEncoder::new(Box::new(fake)),
            Box::new(CpuEffects::new()),
        );
        let events = exporter.subscribe();

        let mut timeline = Timeline::new();
        timeline.push(video_box(60, 33_333, 30));

        let err = exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Encode(_)));
        assert!(exporter.download().is_none());
        assert_eq!(events.drain().last(), Some(&ExportEvent::Cancelled));
    }

    #[test]
    fn test_empty_timeline_is_rejected() {
        let mut exporter = exporter();
        let events = exporter.subscribe();
        let err = exporter
            .export(&Timeline::new(), &EncodeSettings::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::EmptyTimeline));
        assert!(events.drain().is_empty());
    }

    #[test]
    fn test_reorder_latency_is_flushed_at_box_boundaries() {
        let mut exporter = Exporter::new(
            VideoChunkDecoder::new(Box::new(FakeVideoDecoder::with_latency(3))),
            VideoFrameEncoder::new(Box::new(FakeVideoEncoder::new())),
            Box::new(CpuEffects::new()),
        );
        let mut timeline = Timeline::new();
        timeline.push(video_box(40, 33_333, 20));
        timeline.push(video_box(40, 33_333, 20));

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        // the frames the backend held back were recovered by the flushes
        assert_eq!(exporter.progress(), (80, 80));
        let bytes = exporter.download().unwrap();
        assert_eq!(demux(&bytes).unwrap().video[0].chunks.len(), 80);
    }

    #[test]
    fn test_exporter_is_reusable() {
        let mut exporter = exporter();
        let mut timeline = Timeline::new();
        timeline.push(video_box(30, 33_333, 30));

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        let first = exporter.download().unwrap();
        assert!(!first.is_empty());

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        assert_eq!(exporter.progress(), (30, 30));
        let second = exporter.download().unwrap();
        assert_eq!(demux(&second).unwrap().video[0].chunks.len(), 30);
    }

    #[test]
    fn test_reset_discards_finished_output() {
        let mut exporter = exporter();
        let events = exporter.subscribe();
        let mut timeline = Timeline::new();
        timeline.push(video_box(30, 33_333, 30));

        exporter
            .export(&timeline, &EncodeSettings::default())
            .unwrap();
        exporter.reset();

        assert!(exporter.download().is_none());
        assert_eq!(exporter.progress(), (0, 0));
        assert_eq!(events.drain().last(), Some(&ExportEvent::Cancelled));
    }
}
