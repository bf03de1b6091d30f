//! Video frame encoder: settings gating, forced keyframes and in-flight
//! accounting on top of an encode backend.

use crate::core::time::TimeUs;
use crate::decode::backend::{EncodeError, EncodeSettings, EncodedPacket, VideoEncodeBackend};
use crate::decode::frame::VideoFrame;

/// Forced sync-point spacing in the output stream, so seeking the exported
/// file never scans more than this far back.
pub const KEYFRAME_INTERVAL_US: TimeUs = 4_000_000;

pub struct VideoFrameEncoder {
    backend: Box<dyn VideoEncodeBackend>,
    configured: Option<EncodeSettings>,
    next_keyframe_at: TimeUs,
    submitted: u64,
    delivered: u64,
}

impl VideoFrameEncoder {
    pub fn new(backend: Box<dyn VideoEncodeBackend>) -> Self {
        Self {
            backend,
            configured: None,
            next_keyframe_at: 0,
            submitted: 0,
            delivered: 0,
        }
    }

    /// Feed one frame in presentation order. Reconfigures only when
    /// `settings` differ from the active configuration. A keyframe is
    /// forced whenever the frame reaches the next scheduled boundary,
    /// which then moves one interval past that frame.
    pub fn submit(
        &mut self,
        frame: &VideoFrame,
        settings: &EncodeSettings,
    ) -> Result<(), EncodeError> {
        if self.configured.as_ref() != Some(settings) {
            self.backend.configure(settings)?;
            self.configured = Some(settings.clone());
        }
        let keyframe = frame.timestamp >= self.next_keyframe_at;
        if keyframe {
            self.next_keyframe_at = frame.timestamp + KEYFRAME_INTERVAL_US;
        }
        self.backend.encode(frame, keyframe)?;
        self.submitted += 1;
        Ok(())
    }

    /// Packets ready so far, oldest first.
    pub fn poll(&mut self) -> Vec<EncodedPacket> {
        let packets = self.backend.poll();
        self.delivered += packets.len() as u64;
        packets
    }

    /// Drain everything still in flight.
    pub fn flush(&mut self) -> Result<Vec<EncodedPacket>, EncodeError> {
        let packets = self.backend.flush()?;
        self.delivered += packets.len() as u64;
        Ok(packets)
    }

    /// Frames submitted whose packets have not come back yet.
    pub fn in_flight(&self) -> usize {
        (self.submitted - self.delivered) as usize
    }

    /// Codec configuration record once the backend has one.
    pub fn description(&self) -> Option<&[u8]> {
        self.backend.description()
    }

    /// Drop in-flight work and the keyframe schedule. The next submit
    /// reconfigures from scratch.
    pub fn reset(&mut self) {
        self.backend.reset();
        self.configured = None;
        self.next_keyframe_at = 0;
        self.submitted = 0;
        self.delivered = 0;
    }
}
