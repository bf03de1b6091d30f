//! Time representation using microseconds for chunk-accurate editing.
//! Chunk timestamps and durations are i64 microseconds; user-facing times
//! (trim ranges, the play head) are f64 seconds and converted at the edges.

/// Time in microseconds since track or timeline start.
pub type TimeUs = i64;

/// Time constants for conversions
pub mod constants {
    use super::TimeUs;

    pub const MICROS_PER_SECOND: TimeUs = 1_000_000;
    pub const MICROS_PER_MILLI: TimeUs = 1_000;
}

/// Convert seconds (f64) to microseconds (i64)
#[inline]
pub fn from_seconds(seconds: f64) -> TimeUs {
    (seconds * constants::MICROS_PER_SECOND as f64).round() as TimeUs
}

/// Convert microseconds (i64) to seconds (f64)
#[inline]
pub fn to_seconds(micros: TimeUs) -> f64 {
    micros as f64 / constants::MICROS_PER_SECOND as f64
}

/// Convert milliseconds to microseconds
#[inline]
pub fn from_millis(millis: i64) -> TimeUs {
    millis * constants::MICROS_PER_MILLI
}

/// Convert microseconds to milliseconds
#[inline]
pub fn to_millis(micros: TimeUs) -> i64 {
    micros / constants::MICROS_PER_MILLI
}

/// Rescale a value from one timescale to another without overflow.
/// Sample tables count in track timescale units; chunks count in microseconds.
#[inline]
pub fn rescale(value: i64, from: u32, to: u32) -> i64 {
    debug_assert!(from > 0 && to > 0);
    (value as i128 * to as i128 / from as i128) as i64
}

/// Convert microseconds to units of the given timescale.
#[inline]
pub fn to_timescale(micros: TimeUs, timescale: u32) -> i64 {
    rescale(micros, constants::MICROS_PER_SECOND as u32, timescale)
}

/// Convert units of the given timescale to microseconds.
#[inline]
pub fn from_timescale(units: i64, timescale: u32) -> TimeUs {
    rescale(units, timescale, constants::MICROS_PER_SECOND as u32)
}

/// Time zero constant
pub const ZERO: TimeUs = 0;

/// Format time as HH:MM:SS.mmm
pub fn format_time(micros: TimeUs) -> String {
    let total_seconds = to_seconds(micros);
    let hours = (total_seconds / 3600.0).floor() as i64;
    let minutes = ((total_seconds % 3600.0) / 60.0).floor() as i64;
    let seconds = (total_seconds % 60.0).floor() as i64;
    let millis = to_millis(micros) % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_conversion() {
        let time = from_seconds(1.5);
        assert_eq!(time, 1_500_000);
        assert!((to_seconds(time) - 1.5).abs() < 0.000001);
    }

    #[test]
    fn test_millis_conversion() {
        let time = from_millis(1500);
        assert_eq!(time, 1_500_000);
        assert_eq!(to_millis(time), 1500);
    }

    #[test]
    fn test_format_time() {
        let time = from_seconds(3661.5); // 1 hour, 1 minute, 1.5 seconds
        let formatted = format_time(time);
        assert_eq!(formatted, "01:01:01.500");
    }

    #[test]
    fn test_zero() {
        assert_eq!(ZERO, 0);
        assert_eq!(to_seconds(ZERO), 0.0);
    }

    #[test]
    fn test_timescale_roundtrip() {
        // One second in a 90 kHz track timescale
        assert_eq!(to_timescale(1_000_000, 90_000), 90_000);
        assert_eq!(from_timescale(90_000, 90_000), 1_000_000);

        // Audio timescale
        assert_eq!(to_timescale(500_000, 48_000), 24_000);
        assert_eq!(from_timescale(24_000, 48_000), 500_000);
    }

    #[test]
    fn test_timescale_no_overflow() {
        // Hours of 90 kHz units would overflow i64 with naive * 1_000_000
        let ten_hours_us = from_seconds(36_000.0);
        let units = to_timescale(ten_hours_us, 90_000);
        assert_eq!(units, 36_000 * 90_000);
        assert_eq!(from_timescale(units, 90_000), ten_hours_us);
    }

    #[test]
    fn test_conversion_roundtrip() {
        let original_seconds = 123.456789;
        let time = from_seconds(original_seconds);
        let converted_back = to_seconds(time);
        assert!((original_seconds - converted_back).abs() < 0.000001);
    }

    #[test]
    fn test_negative_offsets() {
        // Negative values are legal; remap offsets can go below zero
        let neg = -from_seconds(1.0);
        assert_eq!(neg, -1_000_000);
        assert_eq!(to_seconds(neg), -1.0);
    }
}
