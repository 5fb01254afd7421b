// Domain rules - Field ordering and derived-value policies

use crate::domain::model::StreamKind;

const GENERAL_ORDER: &[&str] = &[
    "Complete name",
    "Format",
    "Format version",
    "Format profile",
    "Codec ID",
    "File size",
    "Duration",
    "Overall bit rate mode",
    "Overall bit rate",
    "Frame rate",
    "Title",
    "Recorded date",
    "Encoded date",
    "Tagged date",
    "Writing application",
    "Writing library",
    "Attachments",
    "File last modification date",
];

const VIDEO_ORDER: &[&str] = &[
    "ID",
    "Menu ID",
    "Format",
    "Format profile",
    "Codec ID",
    "Duration",
    "Bit rate",
    "Width",
    "Height",
    "Display aspect ratio",
    "Frame rate mode",
    "Frame rate",
    "Frame count",
    "Bit depth",
    "Scan type",
    "Stream size",
    "Title",
    "Language",
    "Default",
    "Forced",
];

const AUDIO_ORDER: &[&str] = &[
    "ID",
    "Menu ID",
    "Format",
    "Format profile",
    "Codec ID",
    "Duration",
    "Bit rate",
    "Channel(s)",
    "Channel layout",
    "Sampling rate",
    "Frame rate",
    "Bit depth",
    "Stream size",
    "Title",
    "Language",
    "Default",
    "Forced",
];

const TEXT_ORDER: &[&str] = &[
    "ID",
    "Menu ID",
    "Format",
    "Codec ID",
    "Duration",
    "Bit rate",
    "Stream size",
    "Title",
    "Language",
    "Default",
    "Forced",
];

const IMAGE_ORDER: &[&str] = &["ID", "Format", "Codec ID", "Width", "Height", "Stream size", "Title"];

const MENU_ORDER: &[&str] = &["ID", "Menu ID", "Format"];

/// Unknown fields sort after every known one, in insertion order
const UNKNOWN_RANK_BASE: usize = 1_000;

/// Canonical field ordering table
pub struct FieldOrder;

impl FieldOrder {
    /// Known field names of a kind, in display order
    pub fn table(kind: StreamKind) -> &'static [&'static str] {
        match kind {
            StreamKind::General => GENERAL_ORDER,
            StreamKind::Video => VIDEO_ORDER,
            StreamKind::Audio => AUDIO_ORDER,
            StreamKind::Text => TEXT_ORDER,
            StreamKind::Image => IMAGE_ORDER,
            StreamKind::Menu => MENU_ORDER,
        }
    }

    /// Rank of a field name; `insertion` breaks ties among unknown names
    pub fn rank(kind: StreamKind, name: &str, insertion: usize) -> usize {
        Self::table(kind)
            .iter()
            .position(|known| *known == name)
            .unwrap_or(UNKNOWN_RANK_BASE + insertion)
    }
}

/// Layout name for common channel counts
pub fn channel_layout(channels: u32) -> Option<&'static str> {
    match channels {
        1 => Some("Mono"),
        2 => Some("Stereo"),
        6 => Some("5.1"),
        8 => Some("7.1"),
        _ => None,
    }
}

/// Display aspect ratio as `16:9`, `4:3`, or a decimal ratio
pub fn display_aspect_ratio(width: f64, height: f64) -> Option<String> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let ratio = width / height;
    let named = [
        (4.0 / 3.0, "4:3"),
        (16.0 / 9.0, "16:9"),
        (5.0 / 4.0, "5:4"),
        (1.0, "1:1"),
        (3.0 / 2.0, "3:2"),
        (21.0 / 9.0, "21:9"),
    ];
    for (value, name) in named {
        if (ratio - value).abs() < 0.01 {
            return Some(name.to_string());
        }
    }
    Some(format!("{:.3}", ratio))
}

/// Overall bit rate from a byte count and a duration in seconds
pub fn bit_rate(bytes: u64, duration: f64) -> Option<f64> {
    if duration > 0.0 && bytes > 0 {
        Some(bytes as f64 * 8.0 / duration)
    } else {
        None
    }
}

/// Frame rate from a frame count and a duration in seconds
pub fn frame_rate(frames: u64, duration: f64) -> Option<f64> {
    if duration > 0.0 && frames > 0 {
        Some(frames as f64 / duration)
    } else {
        None
    }
}

/// Text encodings of field values
pub mod values {
    /// Seconds, exact
    ///
    /// Values that are whole milliseconds keep the `12.345` layout; anything
    /// finer is written in full so that it parses back to the same number.
    pub fn duration(seconds: f64) -> String {
        let millis = format!("{:.3}", seconds);
        if millis.parse::<f64>() == Ok(seconds) {
            millis
        } else {
            seconds.to_string()
        }
    }

    /// Bits per second, rounded
    pub fn bit_rate(bps: f64) -> String {
        format!("{:.0}", bps)
    }

    pub fn frame_rate(fps: f64) -> String {
        format!("{:.3}", fps)
    }

    /// Hertz, keeping a fractional part only when present
    pub fn sampling_rate(hz: f64) -> String {
        if hz.fract() == 0.0 {
            format!("{:.0}", hz)
        } else {
            format!("{}", hz)
        }
    }

    pub fn flag(value: bool) -> String {
        if value { "Yes" } else { "No" }.to_string()
    }
}

#[cfg(test)]
mod tests;
