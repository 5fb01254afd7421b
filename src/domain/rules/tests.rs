// Unit tests for field ordering and derived values

use super::*;
use crate::domain::model::{Stream, StreamKind};

#[test]
fn test_known_fields_rank_before_unknown() {
    let format = FieldOrder::rank(StreamKind::General, "Format", 7);
    let custom = FieldOrder::rank(StreamKind::General, "Encoder settings", 0);
    assert!(format < custom);
}

#[test]
fn test_unknown_fields_keep_insertion_order() {
    let first = FieldOrder::rank(StreamKind::Menu, "00:00:00.000", 3);
    let second = FieldOrder::rank(StreamKind::Menu, "00:05:00.000", 4);
    assert!(first < second);
}

#[test]
fn test_stream_sorting_puts_identity_before_geometry() {
    let mut stream = Stream::new(StreamKind::Video);
    stream.set("Height", "1080");
    stream.set("Width", "1920");
    stream.set("Duration", "10.000");
    stream.set("Format", "AVC");
    stream.sort_fields();

    let names: Vec<&str> = stream.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Format", "Duration", "Width", "Height"]);
}

#[test]
fn test_channel_layout_names() {
    assert_eq!(channel_layout(1), Some("Mono"));
    assert_eq!(channel_layout(2), Some("Stereo"));
    assert_eq!(channel_layout(6), Some("5.1"));
    assert_eq!(channel_layout(8), Some("7.1"));
    assert_eq!(channel_layout(3), None);
}

#[test]
fn test_display_aspect_ratio() {
    assert_eq!(display_aspect_ratio(1920.0, 1080.0).as_deref(), Some("16:9"));
    assert_eq!(display_aspect_ratio(720.0, 540.0).as_deref(), Some("4:3"));
    assert_eq!(display_aspect_ratio(1998.0, 1080.0).as_deref(), Some("1.850"));
    assert_eq!(display_aspect_ratio(0.0, 1080.0), None);
}

#[test]
fn test_derived_rates() {
    assert_eq!(bit_rate(1_000, 8.0), Some(1_000.0));
    assert_eq!(bit_rate(1_000, 0.0), None);
    assert_eq!(frame_rate(250, 10.0), Some(25.0));
    assert_eq!(frame_rate(0, 10.0), None);
}

#[test]
fn test_value_encodings() {
    assert_eq!(values::duration(1.5), "1.500");
    assert_eq!(values::bit_rate(128_000.4), "128000");
    assert_eq!(values::frame_rate(29.97002997), "29.970");
    assert_eq!(values::sampling_rate(48_000.0), "48000");
    assert_eq!(values::sampling_rate(22_050.5), "22050.5");
    assert_eq!(values::flag(true), "Yes");
}

#[test]
fn test_duration_keeps_timescale_precision() {
    assert_eq!(values::duration(6006.0 / 600.0), "10.010");

    for seconds in [1.0 / 3.0, 5_000_000_000.0 / 90_000.0, 1001.0 / 24_000.0] {
        let text = values::duration(seconds);
        assert_eq!(text.parse::<f64>().unwrap(), seconds, "{}", text);
    }
}
