//! Render queue holding decoded frames on the global timeline axis.
//!
//! A frame is owned by exactly one place: pushed frames belong to the queue,
//! `take_renderable` transfers one out, everything else is released by drop.
//! Draws are de-duplicated by timestamp so repeated ticks inside one frame
//! interval never draw it twice.

use std::collections::VecDeque;

use crate::core::time::TimeUs;
use crate::decode::frame::VideoFrame;

#[derive(Default)]
pub struct FrameQueue {
    frames: VecDeque<VideoFrame>,
    last_rendered: Option<TimeUs>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Insert keeping ascending timestamp order. Decoder outputs usually
    /// arrive in order, so the scan from the back is cheap.
    pub fn push(&mut self, frame: VideoFrame) {
        let at = self
            .frames
            .iter()
            .rposition(|f| f.timestamp <= frame.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.frames.insert(at, frame);
    }

    /// Release every frame whose interval has fully passed `current`.
    /// Returns how many were dropped.
    pub fn drop_stale(&mut self, current: TimeUs) -> usize {
        let before = self.frames.len();
        while let Some(front) = self.frames.front() {
            if front.end() <= current {
                self.frames.pop_front();
            } else {
                break;
            }
        }
        before - self.frames.len()
    }

    /// Transfer out the frame covering `current`, unless that timestamp was
    /// already rendered.
    pub fn take_renderable(&mut self, current: TimeUs) -> Option<VideoFrame> {
        let index = self
            .frames
            .iter()
            .position(|f| f.timestamp <= current && current < f.end())?;
        if self.last_rendered == Some(self.frames[index].timestamp) {
            return None;
        }
        let frame = self.frames.remove(index)?;
        self.last_rendered = Some(frame.timestamp);
        Some(frame)
    }

    /// Drop everything, including the de-dup marker. Used on seek.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.last_rendered = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: TimeUs) -> VideoFrame {
        VideoFrame::filled(2, 2, [0, 0, 0, 255], ts, 33_333)
    }

    #[test]
    fn test_push_keeps_timestamp_order() {
        let mut queue = FrameQueue::new();
        queue.push(frame(66_666));
        queue.push(frame(0));
        queue.push(frame(33_333));
        let order: Vec<TimeUs> = queue.frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(order, vec![0, 33_333, 66_666]);
    }

    #[test]
    fn test_drop_stale_releases_passed_frames() {
        let mut queue = FrameQueue::new();
        for i in 0..5 {
            queue.push(frame(i * 33_333));
        }
        // current inside frame 2's interval: frames 0 and 1 have passed
        let dropped = queue.drop_stale(2 * 33_333 + 10);
        assert_eq!(dropped, 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_take_renderable_dedups_by_timestamp() {
        let mut queue = FrameQueue::new();
        queue.push(frame(0));
        queue.push(frame(33_333));

        let first = queue.take_renderable(10_000).unwrap();
        assert_eq!(first.timestamp, 0);
        // same interval again: nothing new to draw
        queue.push(first);
        assert!(queue.take_renderable(20_000).is_none());
        // a later interval renders the next frame
        assert!(queue.take_renderable(40_000).is_some());
    }

    #[test]
    fn test_take_renderable_outside_intervals() {
        let mut queue = FrameQueue::new();
        queue.push(frame(100_000));
        assert!(queue.take_renderable(50_000).is_none());
        assert!(queue.take_renderable(200_000).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_resets_dedup() {
        let mut queue = FrameQueue::new();
        queue.push(frame(0));
        assert!(queue.take_renderable(0).is_some());
        queue.clear();
        queue.push(frame(0));
        assert!(queue.take_renderable(0).is_some());
    }
}
