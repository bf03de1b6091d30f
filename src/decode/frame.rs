//! Decoded media payloads exchanged between decoders, effects and renderers.

use crate::core::time::{self, TimeUs};

/// Decoded video frame, RGBA8 rows without padding.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: TimeUs,
    pub duration: TimeUs,
}

impl VideoFrame {
    /// Solid-color frame, used as decoder filler and in tests.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], timestamp: TimeUs, duration: TimeUs) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self {
            data,
            width,
            height,
            timestamp,
            duration,
        }
    }

    pub fn timestamp_seconds(&self) -> f64 {
        time::to_seconds(self.timestamp)
    }

    pub fn end(&self) -> TimeUs {
        self.timestamp + self.duration
    }
}

/// Decoded audio, interleaved PCM f32 (L, R, L, R, ...).
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub data: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u32,
    pub timestamp: TimeUs,
}

impl AudioBuffer {
    /// Frames per channel.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels as usize
        }
    }

    pub fn duration(&self) -> TimeUs {
        if self.sample_rate == 0 {
            return 0;
        }
        time::from_timescale(self.frame_count() as i64, self.sample_rate)
    }

    pub fn timestamp_seconds(&self) -> f64 {
        time::to_seconds(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_frame_dimensions() {
        let frame = VideoFrame::filled(4, 2, [255, 0, 0, 255], 0, 33_333);
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(frame.end(), 33_333);
    }

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer {
            data: vec![0.0; 48_000 * 2],
            sample_rate: 48_000,
            channels: 2,
            timestamp: 0,
        };
        assert_eq!(buffer.frame_count(), 48_000);
        assert_eq!(buffer.duration(), 1_000_000);
    }
}
