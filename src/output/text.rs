//! Human-readable text renderer

use std::fmt::Write;
use std::time::Duration;

use crate::domain::model::{Report, Stream};
use crate::utils::Utils;

/// Column where values start
const NAME_WIDTH: usize = 41;

/// Render reports as blocks of `Name : value` lines
pub fn render(reports: &[Report]) -> String {
    let mut out = String::new();
    for report in reports {
        for stream in report.streams() {
            out.push_str(&report.heading(stream));
            out.push('\n');
            write_fields(&mut out, stream);
            out.push('\n');
        }
    }
    out
}

fn write_fields(out: &mut String, stream: &Stream) {
    for field in stream.fields() {
        let value = humanize(&field.name, &field.value);
        // Writing to a String cannot fail
        let _ = writeln!(out, "{:<width$}: {}", field.name, value, width = NAME_WIDTH);
    }
}

/// Display form of a stored value; unparsable numbers are shown as stored
fn humanize(name: &str, value: &str) -> String {
    let number = || value.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0);
    let shown = match name {
        "File size" | "Stream size" => number().map(|v| Utils::format_file_size(v as u64)),
        "Duration" => number().map(|v| Utils::format_duration(Duration::from_secs_f64(v))),
        "Bit rate" | "Overall bit rate" => number().map(Utils::format_bit_rate),
        "Width" | "Height" => number().map(|v| format!("{} pixels", Utils::group_digits(v as u64))),
        "Sampling rate" => number().map(|v| format!("{:.1} kHz", v / 1_000.0)),
        "Frame rate" => number().map(|v| format!("{:.3} FPS", v)),
        "Channel(s)" => match value {
            "1" => Some("1 channel".to_string()),
            _ => Some(format!("{} channels", value)),
        },
        "Bit depth" => Some(format!("{} bits", value)),
        _ => None,
    };
    shown.unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StreamKind;

    fn report() -> Report {
        let mut general = Stream::new(StreamKind::General);
        general.set("Complete name", "movie.mkv");
        general.set("File size", "1250000");
        general.set("Duration", "90.000");
        let mut video = Stream::new(StreamKind::Video);
        video.set("Width", "1920");
        video.set("Frame rate", "25.000");
        let mut audio = Stream::new(StreamKind::Audio);
        audio.set("Channel(s)", "2");
        audio.set("Sampling rate", "44100");
        Report::new("movie.mkv".to_string(), vec![general, video, audio])
    }

    fn line(name: &str, value: &str) -> String {
        format!("{:<41}: {}\n", name, value)
    }

    #[test]
    fn test_blocks_and_alignment() {
        let text = render(&[report()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "General");
        assert_eq!(format!("{}\n", lines[1]), line("Complete name", "movie.mkv"));
        assert!(text.contains(&line("File size", "1.19 MiB")));
        assert!(text.contains(&line("Duration", "1 min 30 s")));
        assert!(text.contains(&format!("\nVideo\n{}", line("Width", "1 920 pixels"))));
        assert!(text.contains(&line("Frame rate", "25.000 FPS")));
        assert!(text.contains(&line("Channel(s)", "2 channels")));
        assert!(text.contains(&line("Sampling rate", "44.1 kHz")));
    }

    #[test]
    fn test_unparsable_values_pass_through() {
        assert_eq!(humanize("Duration", "n/a"), "n/a");
        assert_eq!(humanize("Duration", "0.3333333333333333"), "333 ms");
        assert_eq!(humanize("Format", "AVC"), "AVC");
    }
}
