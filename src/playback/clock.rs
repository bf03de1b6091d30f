//! Play-head clock.
//!
//! Wall time enters through the `now` parameter instead of being read
//! internally, so ticks are reproducible in tests.

use std::time::Instant;

#[derive(Debug)]
pub struct PlaybackClock {
    current_time: f64,
    running: bool,
    last_advance: Option<Instant>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            current_time: 0.0,
            running: false,
            last_advance: None,
        }
    }

    /// Play-head position in seconds.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Snap to `t` without advancing. The next tick re-anchors, so elapsed
    /// time across a seek never leaks into the play head.
    pub fn set_time(&mut self, t: f64) {
        self.current_time = t;
        self.last_advance = None;
    }

    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.last_advance = Some(now);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.last_advance = None;
    }

    /// Add elapsed wall time since the previous tick. First tick after
    /// `start` or `set_time` anchors without moving.
    pub fn advance(&mut self, now: Instant) -> f64 {
        if self.running {
            if let Some(last) = self.last_advance {
                self.current_time += now.duration_since(last).as_secs_f64();
            }
            self.last_advance = Some(now);
        }
        self.current_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_advance_accumulates_elapsed_time() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.start(t0);
        clock.advance(t0 + Duration::from_millis(100));
        clock.advance(t0 + Duration::from_millis(250));
        assert!((clock.current_time() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_stopped_clock_does_not_move() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.set_time(3.0);
        clock.advance(t0 + Duration::from_secs(5));
        assert_eq!(clock.current_time(), 3.0);
    }

    #[test]
    fn test_set_time_reanchors() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.start(t0);
        clock.advance(t0 + Duration::from_millis(500));
        clock.set_time(10.0);
        // the gap between set_time and the next tick is not counted
        clock.advance(t0 + Duration::from_millis(900));
        assert_eq!(clock.current_time(), 10.0);
        clock.advance(t0 + Duration::from_millis(1000));
        assert!((clock.current_time() - 10.1).abs() < 1e-9);
    }
}
