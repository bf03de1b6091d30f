//! cpal-backed audio sink.
//!
//! The output stream callback owns the sink clock: it mixes scheduled
//! segments into the device buffer and advances elapsed time by exactly the
//! frames it consumed, so `elapsed()` tracks real output progress rather
//! than wall time. Sample rates are passed through untouched; a buffer at
//! the wrong rate plays at the wrong speed instead of being resampled.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::warn;

use crate::decode::frame::AudioBuffer;
use crate::render::audio::{AudioError, AudioSink};

/// One scheduled stretch of interleaved samples at the sink's layout.
struct Segment {
    start_frame: u64,
    data: Vec<f32>,
}

#[derive(Default)]
struct Shared {
    elapsed_frames: u64,
    segments: Vec<Segment>,
}

/// Default-output-device sink.
pub struct CpalSink {
    shared: Arc<Mutex<Shared>>,
    sample_rate: u32,
    channels: u32,
    stream: Stream,
}

impl CpalSink {
    /// Open the default output device and start its stream. The stream
    /// emits silence until something is scheduled.
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let default_config = device.default_output_config()?;
        let sample_rate = default_config.sample_rate().0;
        let channels = default_config.channels() as u32;
        let config: StreamConfig = default_config.config();

        let shared = Arc::new(Mutex::new(Shared::default()));
        let callback_shared = Arc::clone(&shared);
        let stream = device.build_output_stream(
            &config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mix_into(&callback_shared, out, channels);
            },
            |err| warn!(error = %err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            shared,
            sample_rate,
            channels,
            stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream.pause()?;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), AudioError> {
        self.stream.play()?;
        Ok(())
    }
}

impl AudioSink for CpalSink {
    fn elapsed(&self) -> f64 {
        let shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.elapsed_frames as f64 / self.sample_rate as f64
    }

    fn schedule(&mut self, buffer: &AudioBuffer, at: f64) -> Result<(), AudioError> {
        let start_frame = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        let data = adapt_channels(buffer, self.channels);
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.segments.push(Segment { start_frame, data });
        Ok(())
    }

    fn clear(&mut self) {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.segments.clear();
    }
}

/// Sum every scheduled segment overlapping this device buffer into `out`
/// and advance the sink clock past it.
fn mix_into(shared: &Mutex<Shared>, out: &mut [f32], channels: u32) {
    out.fill(0.0);
    let channels = channels.max(1) as u64;
    let Ok(mut shared) = shared.lock() else {
        return;
    };
    let frames = out.len() as u64 / channels;
    let begin = shared.elapsed_frames;

    for segment in &shared.segments {
        let seg_frames = segment.data.len() as u64 / channels;
        let from = begin.max(segment.start_frame);
        let to = (begin + frames).min(segment.start_frame + seg_frames);
        for frame in from..to {
            let src = ((frame - segment.start_frame) * channels) as usize;
            let dst = ((frame - begin) * channels) as usize;
            for c in 0..channels as usize {
                out[dst + c] += segment.data[src + c];
            }
        }
    }

    shared.elapsed_frames += frames;
    let played_to = shared.elapsed_frames;
    shared
        .segments
        .retain(|s| s.start_frame + s.data.len() as u64 / channels > played_to);
}

/// Re-interleave `buffer` for a sink with `channels` outputs: extra outputs
/// repeat the last source channel, extra sources are dropped.
fn adapt_channels(buffer: &AudioBuffer, channels: u32) -> Vec<f32> {
    let src_ch = buffer.channels.max(1) as usize;
    let dst_ch = channels.max(1) as usize;
    if src_ch == dst_ch {
        return buffer.data.clone();
    }
    let frames = buffer.frame_count();
    let mut out = vec![0.0; frames * dst_ch];
    for frame in 0..frames {
        let src = frame * src_ch;
        let dst = frame * dst_ch;
        for c in 0..dst_ch {
            out[dst + c] = buffer.data[src + c.min(src_ch - 1)];
        }
    }
    out
}
