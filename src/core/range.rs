//! Trim range over a source track, expressed in seconds.

use serde::{Deserialize, Serialize};

/// A half-open window `[start, end)` into a source whose full extent is
/// `[0, max_end]`. Invariant: `0 <= start <= end <= max_end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
    pub max_end: f64,
}

impl TrimRange {
    /// Full, untrimmed range over a source of the given duration.
    pub fn full(max_end: f64) -> Self {
        Self {
            start: 0.0,
            end: max_end,
            max_end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Move the start edge, clamped to `[0, end]`.
    pub fn trim_start(&mut self, start: f64) {
        self.start = start.clamp(0.0, self.end);
    }

    /// Move the end edge, clamped to `[start, max_end]`.
    pub fn trim_end(&mut self, end: f64) {
        self.end = end.clamp(self.start, self.max_end);
    }

    /// Map a time local to this range onto the source's absolute time axis.
    pub fn to_absolute(&self, local: f64) -> f64 {
        self.start + local
    }

    /// Map an absolute source time into this range's local axis.
    pub fn to_local(&self, absolute: f64) -> f64 {
        absolute - self.start
    }

    /// Whether a local time falls inside the range. The upper bound is
    /// exclusive so a boundary instant belongs to at most one range.
    pub fn contains_local(&self, local: f64) -> bool {
        local >= 0.0 && local < self.duration()
    }

    pub fn is_valid(&self) -> bool {
        0.0 <= self.start && self.start <= self.end && self.end <= self.max_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_range() {
        let r = TrimRange::full(10.0);
        assert_eq!(r.start, 0.0);
        assert_eq!(r.end, 10.0);
        assert_eq!(r.max_end, 10.0);
        assert_eq!(r.duration(), 10.0);
        assert!(r.is_valid());
    }

    #[test]
    fn test_trim_edges() {
        let mut r = TrimRange::full(10.0);
        r.trim_start(2.0);
        r.trim_end(7.5);
        assert_eq!(r.duration(), 5.5);
        assert!(r.is_valid());
    }

    #[test]
    fn test_trim_clamps() {
        let mut r = TrimRange::full(10.0);
        r.trim_start(-3.0);
        assert_eq!(r.start, 0.0);

        r.trim_end(99.0);
        assert_eq!(r.end, 10.0);

        r.trim_start(4.0);
        r.trim_end(2.0); // cannot cross the start edge
        assert_eq!(r.end, 4.0);
        assert!(r.is_valid());
    }

    #[test]
    fn test_local_absolute_mapping() {
        let mut r = TrimRange::full(10.0);
        r.trim_start(3.0);
        assert_eq!(r.to_absolute(1.5), 4.5);
        assert_eq!(r.to_local(4.5), 1.5);
    }

    #[test]
    fn test_contains_upper_bound_exclusive() {
        let mut r = TrimRange::full(10.0);
        r.trim_start(2.0);
        r.trim_end(6.0);
        assert!(r.contains_local(0.0));
        assert!(r.contains_local(3.999));
        assert!(!r.contains_local(4.0));
        assert!(!r.contains_local(-0.001));
    }
}
