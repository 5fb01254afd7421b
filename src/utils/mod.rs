//! Common utilities and helpers

use std::time::Duration;

pub mod logging;
pub mod time;

/// Humanized value formatting for the text renderer
pub struct Utils;

impl Utils {
    /// Format a duration as `1 h 2 min`, `1 min 30 s`, `12 s 345 ms` or `345 ms`
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        let milliseconds = duration.subsec_millis();

        if hours > 0 {
            format!("{} h {} min", hours, minutes)
        } else if minutes > 0 {
            format!("{} min {} s", minutes, seconds)
        } else if seconds > 0 {
            format!("{} s {} ms", seconds, milliseconds)
        } else {
            format!("{} ms", milliseconds)
        }
    }

    /// Format a byte count with binary units and three significant digits
    pub fn format_file_size(size: u64) -> String {
        const UNITS: &[&str] = &["Bytes", "KiB", "MiB", "GiB", "TiB"];
        let mut value = size as f64;
        let mut unit_index = 0;

        while value >= 1024.0 && unit_index < UNITS.len() - 1 {
            value /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size, UNITS[0])
        } else {
            format!("{} {}", Self::three_digits(value), UNITS[unit_index])
        }
    }

    /// Format bits per second as `b/s`, `kb/s` or `Mb/s`
    pub fn format_bit_rate(bps: f64) -> String {
        if bps < 1_000.0 {
            format!("{:.0} b/s", bps)
        } else if bps < 10_000.0 {
            format!("{:.1} kb/s", bps / 1_000.0)
        } else if bps < 100_000_000.0 {
            format!("{} kb/s", Self::group_digits((bps / 1_000.0).round() as u64))
        } else {
            format!("{:.1} Mb/s", bps / 1_000_000.0)
        }
    }

    /// Group thousands with spaces: `1 920`
    pub fn group_digits(value: u64) -> String {
        let digits = value.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (index, digit) in digits.chars().enumerate() {
            if index > 0 && (digits.len() - index) % 3 == 0 {
                grouped.push(' ');
            }
            grouped.push(digit);
        }
        grouped
    }

    fn three_digits(value: f64) -> String {
        if value >= 100.0 {
            format!("{:.0}", value)
        } else if value >= 10.0 {
            format!("{:.1}", value)
        } else {
            format!("{:.2}", value)
        }
    }
}
