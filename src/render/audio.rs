//! Audio presentation scheduling.
//!
//! Decoded buffers arrive at irregular times and carry global timeline
//! timestamps. The renderer translates each one into a start time on the
//! sink's own clock: the elapsed-time accumulator is re-anchored at the
//! sink clock on every call, so the math holds across seeks and arrival
//! gaps without the sink ever knowing about the play head.

use crate::decode::frame::AudioBuffer;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device")]
    NoDevice,
    #[error("audio stream error: {0}")]
    Stream(String),
    #[cfg(feature = "cpal")]
    #[error("default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[cfg(feature = "cpal")]
    #[error("build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[cfg(feature = "cpal")]
    #[error("play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[cfg(feature = "cpal")]
    #[error("pause stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),
}

/// Where scheduled PCM goes. The sink runs its own monotonic clock; the
/// renderer only ever talks in that clock's seconds.
pub trait AudioSink {
    /// Sink time elapsed since the sink opened, in seconds.
    fn elapsed(&self) -> f64;
    /// Queue `buffer` to begin at `at` seconds of sink time.
    fn schedule(&mut self, buffer: &AudioBuffer, at: f64) -> Result<(), AudioError>;
    /// Drop everything queued but not yet played.
    fn clear(&mut self);
}

/// Schedules decoded buffers against the play head.
pub struct AudioRenderer {
    sink: Box<dyn AudioSink>,
    anchor: f64,
}

impl AudioRenderer {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self { sink, anchor: 0.0 }
    }

    /// Queue `buffer` so it starts `timestamp - current_time` seconds from
    /// now. Buffers already due (or overdue) start immediately.
    pub fn schedule(&mut self, buffer: &AudioBuffer, current_time: f64) -> Result<(), AudioError> {
        self.anchor = self.sink.elapsed();
        let offset = (buffer.timestamp_seconds() - current_time).max(0.0);
        self.sink.schedule(buffer, self.anchor + offset)
    }

    /// Forget queued audio, e.g. after a seek.
    pub fn reset(&mut self) {
        self.sink.clear();
        self.anchor = self.sink.elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct SinkLog {
        elapsed: Mutex<f64>,
        scheduled: Mutex<Vec<f64>>,
        clears: AtomicUsize,
    }

    struct RecordingSink {
        log: Arc<SinkLog>,
    }

    impl AudioSink for RecordingSink {
        fn elapsed(&self) -> f64 {
            *self.log.elapsed.lock().unwrap()
        }

        fn schedule(&mut self, _buffer: &AudioBuffer, at: f64) -> Result<(), AudioError> {
            self.log.scheduled.lock().unwrap().push(at);
            Ok(())
        }

        fn clear(&mut self) {
            self.log.clears.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn buffer_at(timestamp: i64) -> AudioBuffer {
        AudioBuffer {
            data: vec![0.0; 960],
            sample_rate: 48_000,
            channels: 2,
            timestamp,
        }
    }

    fn renderer() -> (AudioRenderer, Arc<SinkLog>) {
        let log = Arc::new(SinkLog::default());
        let sink = RecordingSink {
            log: Arc::clone(&log),
        };
        (AudioRenderer::new(Box::new(sink)), log)
    }

    #[test]
    fn test_schedule_offsets_from_sink_clock() {
        let (mut renderer, log) = renderer();
        *log.elapsed.lock().unwrap() = 10.0;

        // buffer half a second ahead of the play head
        renderer.schedule(&buffer_at(2_000_000), 1.5).unwrap();
        assert_eq!(log.scheduled.lock().unwrap().as_slice(), &[10.5]);
    }

    #[test]
    fn test_anchor_follows_sink_clock_between_calls() {
        let (mut renderer, log) = renderer();

        *log.elapsed.lock().unwrap() = 10.0;
        renderer.schedule(&buffer_at(2_000_000), 2.0).unwrap();
        // sink time moved on; the next call anchors at the new value
        *log.elapsed.lock().unwrap() = 11.25;
        renderer.schedule(&buffer_at(3_000_000), 2.8).unwrap();

        let scheduled = log.scheduled.lock().unwrap();
        assert_eq!(scheduled.len(), 2);
        assert!((scheduled[0] - 10.0).abs() < 1e-9);
        assert!((scheduled[1] - 11.45).abs() < 1e-9);
    }

    #[test]
    fn test_overdue_buffer_starts_immediately() {
        let (mut renderer, log) = renderer();
        *log.elapsed.lock().unwrap() = 4.0;

        renderer.schedule(&buffer_at(1_000_000), 3.0).unwrap();
        assert_eq!(log.scheduled.lock().unwrap().as_slice(), &[4.0]);
    }

    #[test]
    fn test_reset_clears_sink() {
        let (mut renderer, log) = renderer();
        renderer.reset();
        assert_eq!(log.clears.load(Ordering::Relaxed), 1);
    }
}
