//! Video chunk decoder: config gating and in-flight accounting on top of a
//! codec backend.

use crate::core::chunk::EncodedChunk;
use crate::core::config::{ConfigVersion, VideoCodecConfig};
use crate::decode::backend::{DecodeError, VideoDecodeBackend};
use crate::decode::frame::VideoFrame;

pub struct VideoChunkDecoder {
    backend: Box<dyn VideoDecodeBackend>,
    configured: Option<ConfigVersion>,
    submitted: u64,
    delivered: u64,
}

impl VideoChunkDecoder {
    pub fn new(backend: Box<dyn VideoDecodeBackend>) -> Self {
        Self {
            backend,
            configured: None,
            submitted: 0,
            delivered: 0,
        }
    }

    /// Feed `chunks` in decode order. Reconfigures the backend only when
    /// `config` carries a version the backend has not seen, so repeated
    /// submits from the same track are cheap.
    pub fn submit(&mut self, chunks: &[EncodedChunk], config: &VideoCodecConfig) -> Result<(), DecodeError> {
        if self.configured != Some(config.version()) {
            self.backend.configure(config)?;
            self.configured = Some(config.version());
        }
        for chunk in chunks {
            self.backend.decode(chunk)?;
            self.submitted += 1;
        }
        Ok(())
    }

    /// Frames ready so far, oldest first, stamped with their chunk
    /// timestamps.
    pub fn poll(&mut self) -> Vec<VideoFrame> {
        let frames = self.backend.poll();
        self.delivered += frames.len() as u64;
        frames
    }

    /// Drain everything still in flight.
    pub fn flush(&mut self) -> Result<Vec<VideoFrame>, DecodeError> {
        let frames = self.backend.flush()?;
        self.delivered += frames.len() as u64;
        Ok(frames)
    }

    /// Chunks submitted whose frames have not come back yet.
    pub fn in_flight(&self) -> usize {
        (self.submitted - self.delivered) as usize
    }

    /// Drop in-flight work without emitting it. The next submit
    /// reconfigures from scratch.
    pub fn reset(&mut self) {
        self.backend.reset();
        self.configured = None;
        self.submitted = 0;
        self.delivered = 0;
    }
}
