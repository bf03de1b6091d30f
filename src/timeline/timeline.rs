//! Sequential timeline: an ordered list of boxes with no gaps.
//!
//! Global time is the concatenation of box durations. Every mapping between
//! global and box-local time goes through [`Timeline::box_at`] so the
//! exclusive-end convention lives in one place.

use crate::core::effects::EffectSettings;
use crate::timeline::timeline_box::{BoxId, TimelineBox};

#[derive(Debug, Default, Clone)]
pub struct Timeline {
    boxes: Vec<TimelineBox>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total duration in seconds, the sum of trimmed box durations.
    pub fn duration(&self) -> f64 {
        self.boxes.iter().map(|b| b.duration()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn boxes(&self) -> &[TimelineBox] {
        &self.boxes
    }

    pub fn get(&self, index: usize) -> Option<&TimelineBox> {
        self.boxes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TimelineBox> {
        self.boxes.get_mut(index)
    }

    /// Append a box at the end of the timeline.
    pub fn push(&mut self, tbox: TimelineBox) {
        self.boxes.push(tbox);
    }

    /// Remove and return the box at `index`; later boxes shift earlier.
    pub fn remove(&mut self, index: usize) -> Option<TimelineBox> {
        if index < self.boxes.len() {
            Some(self.boxes.remove(index))
        } else {
            None
        }
    }

    pub fn index_of(&self, id: BoxId) -> Option<usize> {
        self.boxes.iter().position(|b| b.id() == id)
    }

    /// Box covering `global_time`, with the time rebased into the box's
    /// local axis. Each box covers `[prefix, prefix + duration)`; `None`
    /// before zero, at or past the total duration, or on an empty timeline.
    pub fn box_at(&self, global_time: f64) -> Option<(usize, f64)> {
        if global_time < 0.0 {
            return None;
        }
        let mut prefix = 0.0;
        for (index, tbox) in self.boxes.iter().enumerate() {
            let end = prefix + tbox.duration();
            if global_time < end {
                return Some((index, global_time - prefix));
            }
            prefix = end;
        }
        None
    }

    /// Sum of durations of boxes before `index`, i.e. the global time at
    /// which that box starts.
    pub fn prefix_duration(&self, index: usize) -> f64 {
        self.boxes.iter().take(index).map(|b| b.duration()).sum()
    }

    /// Split the box at `index` at `local_time` seconds past its start,
    /// replacing it in place with the two halves. Returns the ids of the
    /// halves. `None` when the index is out of range or the cut would
    /// produce an empty half.
    pub fn split_box_at(&mut self, index: usize, local_time: f64) -> Option<(BoxId, BoxId)> {
        let tbox = self.boxes.get(index)?;
        if local_time <= 0.0 || local_time >= tbox.duration() {
            return None;
        }
        let (left, right) = tbox.split_at(local_time);
        let ids = (left.id(), right.id());
        self.boxes[index] = left;
        self.boxes.insert(index + 1, right);
        Some(ids)
    }

    /// Replace the effect parameters of the box at `index`.
    pub fn set_effects(&mut self, index: usize, effects: EffectSettings) -> bool {
        match self.boxes.get_mut(index) {
            Some(tbox) => {
                tbox.effects = effects;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::timeline_box::testutil::video_box;

    /// Box with duration `seconds` built from 10 ms chunks.
    fn box_of(seconds: f64) -> TimelineBox {
        let n = (seconds * 100.0).round() as usize;
        video_box(n, 10_000, 10)
    }

    #[test]
    fn test_duration_sums_boxes() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.duration(), 0.0);
        timeline.push(box_of(4.0));
        timeline.push(box_of(6.0));
        assert!((timeline.duration() - 10.0).abs() < 1e-9);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_box_at_maps_global_to_local() {
        let mut timeline = Timeline::new();
        timeline.push(box_of(4.0));
        timeline.push(box_of(6.0));

        let (index, local) = timeline.box_at(1.0).unwrap();
        assert_eq!(index, 0);
        assert!((local - 1.0).abs() < 1e-9);

        // boundary belongs to the later box
        let (index, local) = timeline.box_at(4.0).unwrap();
        assert_eq!(index, 1);
        assert!(local.abs() < 1e-9);

        let (index, local) = timeline.box_at(9.999).unwrap();
        assert_eq!(index, 1);
        assert!((local - 5.999).abs() < 1e-9);

        assert!(timeline.box_at(10.0).is_none());
        assert!(timeline.box_at(-0.1).is_none());
        assert!(Timeline::new().box_at(0.0).is_none());
    }

    #[test]
    fn test_prefix_duration() {
        let mut timeline = Timeline::new();
        timeline.push(box_of(4.0));
        timeline.push(box_of(6.0));
        assert_eq!(timeline.prefix_duration(0), 0.0);
        assert!((timeline.prefix_duration(1) - 4.0).abs() < 1e-9);
        assert!((timeline.prefix_duration(2) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_box_in_place() {
        let mut timeline = Timeline::new();
        timeline.push(box_of(4.0));
        timeline.push(box_of(6.0));
        let before = timeline.duration();

        let (left_id, right_id) = timeline.split_box_at(0, 2.0).unwrap();

        assert_eq!(timeline.len(), 3);
        let durations: Vec<f64> = timeline.boxes().iter().map(|b| b.duration()).collect();
        assert!((durations[0] - 2.0).abs() < 1e-9);
        assert!((durations[1] - 2.0).abs() < 1e-9);
        assert!((durations[2] - 6.0).abs() < 1e-9);
        assert!((timeline.duration() - before).abs() < 1e-9);
        assert_eq!(timeline.get(0).unwrap().id(), left_id);
        assert_eq!(timeline.get(1).unwrap().id(), right_id);
    }

    #[test]
    fn test_split_rejects_degenerate_cuts() {
        let mut timeline = Timeline::new();
        timeline.push(box_of(4.0));
        assert!(timeline.split_box_at(0, 0.0).is_none());
        assert!(timeline.split_box_at(0, 4.0).is_none());
        assert!(timeline.split_box_at(1, 1.0).is_none());
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_remove_shifts_later_boxes() {
        let mut timeline = Timeline::new();
        timeline.push(box_of(4.0));
        timeline.push(box_of(6.0));
        let second = timeline.get(1).unwrap().id();

        let removed = timeline.remove(0).unwrap();
        assert!((removed.duration() - 4.0).abs() < 1e-9);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.get(0).unwrap().id(), second);
        assert!((timeline.duration() - 6.0).abs() < 1e-9);
        assert!(timeline.remove(5).is_none());
    }

    #[test]
    fn test_set_effects() {
        let mut timeline = Timeline::new();
        timeline.push(box_of(4.0));
        let effects = EffectSettings {
            blur: 8.0,
            ..Default::default()
        };
        assert!(timeline.set_effects(0, effects));
        assert_eq!(timeline.get(0).unwrap().effects.blur, 8.0);
        assert!(!timeline.set_effects(3, effects));
    }
}
