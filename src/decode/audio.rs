//! Audio chunk decoder, the PCM-producing twin of the video wrapper.

use crate::core::chunk::EncodedChunk;
use crate::core::config::{AudioCodecConfig, ConfigVersion};
use crate::decode::backend::{AudioDecodeBackend, DecodeError};
use crate::decode::frame::AudioBuffer;

pub struct AudioChunkDecoder {
    backend: Box<dyn AudioDecodeBackend>,
    configured: Option<ConfigVersion>,
    submitted: u64,
    delivered: u64,
}

impl AudioChunkDecoder {
    pub fn new(backend: Box<dyn AudioDecodeBackend>) -> Self {
        Self {
            backend,
            configured: None,
            submitted: 0,
            delivered: 0,
        }
    }

    /// Feed `chunks` in decode order, reconfiguring only on a new config
    /// version.
    pub fn submit(&mut self, chunks: &[EncodedChunk], config: &AudioCodecConfig) -> Result<(), DecodeError> {
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

    pub fn poll(&mut self) -> Vec<AudioBuffer> {
        let buffers = self.backend.poll();
        self.delivered += buffers.len() as u64;
        buffers
    }

    pub fn flush(&mut self) -> Result<Vec<AudioBuffer>, DecodeError> {
        let buffers = self.backend.flush()?;
        self.delivered += buffers.len() as u64;
        Ok(buffers)
    }

    pub fn in_flight(&self) -> usize {
        (self.submitted - self.delivered) as usize
    }

    pub fn reset(&mut self) {
        self.backend.reset();
        self.configured = None;
        self.submitted = 0;
        self.delivered = 0;
    }
}
