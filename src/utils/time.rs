//! Time parsing and formatting utilities

use chrono::{DateTime, Utc};

/// Seconds from 1904-01-01 (MP4 epoch) to 1970-01-01
const MP4_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Seconds from 1970-01-01 to 2001-01-01 (Matroska epoch)
const MATROSKA_EPOCH_OFFSET: i64 = 978_307_200;

/// Time parser for the clock formats found in container tags
pub struct TimeParser;

impl TimeParser {
    /// Create a new time parser
    pub fn new() -> Self {
        Self
    }
}

impl Default for TimeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeParser {
    /// Parse plain seconds, `MM:SS(.fff)` or `HH:MM:SS(.fffffffff)` into seconds
    pub fn parse_time(&self, time_str: &str) -> Option<f64> {
        let time_str = time_str.trim();

        if let Ok(seconds) = time_str.parse::<f64>() {
            return (seconds.is_finite() && seconds >= 0.0).then_some(seconds);
        }

        let parts: Vec<&str> = time_str.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [minutes, seconds] => ("0", *minutes, *seconds),
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            _ => return None,
        };
        let hours: u64 = hours.parse().ok()?;
        let minutes: u64 = minutes.parse().ok()?;
        let seconds: f64 = seconds.parse().ok()?;
        if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
            return None;
        }
        Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
    }

    /// Format seconds as `HH:MM:SS.mmm`
    pub fn format_time(&self, seconds: f64) -> String {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        let milliseconds = total_ms % 1000;
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, milliseconds)
    }
}

/// Render a UTC instant the way reports carry dates
pub fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Date for an MP4 timestamp (seconds since 1904); zero means unset
pub fn mp4_timestamp(seconds: u64) -> Option<String> {
    if seconds == 0 {
        return None;
    }
    let unix = i64::try_from(seconds).ok()?.checked_sub(MP4_EPOCH_OFFSET)?;
    DateTime::<Utc>::from_timestamp(unix, 0).map(format_utc)
}

/// Date for a Matroska `DateUTC` value (nanoseconds since 2001)
pub fn matroska_timestamp(nanoseconds: i64) -> Option<String> {
    let seconds = nanoseconds.div_euclid(1_000_000_000);
    let unix = seconds.checked_add(MATROSKA_EPOCH_OFFSET)?;
    DateTime::<Utc>::from_timestamp(unix, 0).map(format_utc)
}
