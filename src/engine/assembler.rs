//! Report assembly: container facts to the report model

use chrono::{DateTime, Utc};

use crate::domain::model::{Report, Stream, StreamKind};
use crate::domain::rules::{self, channel_layout, display_aspect_ratio, values};
use crate::probe::{ContainerFacts, MenuFacts, TrackFacts};
use crate::utils::time::{format_utc, TimeParser};

/// Filesystem-level facts about the unit
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub complete_name: String,
    /// Bytes; summed over every member of a group
    pub file_size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Builds one [`Report`] from parser output
pub struct ReportAssembler {
    source: SourceInfo,
    clock: TimeParser,
}

impl ReportAssembler {
    pub fn new(source: SourceInfo) -> Self {
        Self {
            source,
            clock: TimeParser::new(),
        }
    }

    /// Assemble the report: General first, then tracks grouped by kind in
    /// discovery order, then menus
    pub fn assemble(&self, facts: &ContainerFacts) -> Report {
        let mut streams = vec![self.general(facts)];

        let mut tracks: Vec<&TrackFacts> = facts
            .tracks
            .iter()
            .filter(|t| t.kind != StreamKind::General && t.kind != StreamKind::Menu)
            .collect();
        // Stable: discovery order is kept within a kind
        tracks.sort_by_key(|t| t.kind);
        streams.extend(tracks.into_iter().map(track_stream));
        streams.extend(facts.menus.iter().map(|m| self.menu_stream(m)));

        number_streams(&mut streams);
        for stream in &mut streams {
            stream.sort_fields();
        }
        Report::new(self.source.complete_name.clone(), streams)
    }

    fn general(&self, facts: &ContainerFacts) -> Stream {
        let mut general = Stream::new(StreamKind::General);
        general.set("Complete name", self.source.complete_name.as_str());
        general.set_opt("Format", facts.format.as_ref());
        general.set_opt("Format version", facts.format_version.as_ref());
        general.set_opt("Format profile", facts.format_profile.as_ref());
        general.set_opt("Codec ID", facts.codec_id.as_ref());
        general.set("File size", self.source.file_size.to_string());

        if let Some(duration) = facts.duration.filter(|d| *d > 0.0) {
            general.set("Duration", values::duration(duration));
            let overall = facts
                .overall_bit_rate
                .or_else(|| rules::bit_rate(self.source.file_size, duration));
            general.set_opt("Overall bit rate", overall.map(values::bit_rate));
        }
        let video_rate = facts
            .tracks
            .iter()
            .find(|t| t.kind == StreamKind::Video)
            .and_then(track_frame_rate);
        general.set_opt("Frame rate", video_rate.map(values::frame_rate));

        general.set_opt("Title", facts.title.as_ref());
        general.set_opt("Recorded date", facts.recorded_date.as_ref());
        general.set_opt("Encoded date", facts.encoded_date.as_ref());
        general.set_opt("Tagged date", facts.tagged_date.as_ref());
        general.set_opt("Writing application", facts.writing_application.as_ref());
        general.set_opt("Writing library", facts.writing_library.as_ref());
        if !facts.attachments.is_empty() {
            general.set("Attachments", facts.attachments.join(" / "));
        }
        general.set_opt(
            "File last modification date",
            self.source.modified.map(format_utc),
        );
        general
    }

    fn menu_stream(&self, menu: &MenuFacts) -> Stream {
        let mut stream = Stream::new(StreamKind::Menu);
        stream.set_opt("ID", menu.id.as_ref());
        stream.set_opt("Menu ID", menu.menu_id.as_ref());
        stream.set_opt("Format", menu.format.as_ref());

        let mut chapters: Vec<&(f64, String)> = menu.chapters.iter().collect();
        chapters.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (start, name) in chapters {
            let time = self.clock.format_time(*start);
            let mut key = time.clone();
            let mut copy = 1;
            while stream.contains(&key) {
                copy += 1;
                key = format!("{} ({})", time, copy);
            }
            stream.set(&key, name.as_str());
        }
        stream
    }
}

/// Frame rate as reported, or derived from the frame count
fn track_frame_rate(track: &TrackFacts) -> Option<f64> {
    track.frame_rate.or_else(|| {
        let duration = track.duration?;
        rules::frame_rate(track.frame_count?, duration)
    })
}

fn track_stream(track: &TrackFacts) -> Stream {
    let kind = track.kind;
    let mut stream = Stream::new(kind);
    stream.set_opt("ID", track.id.as_ref());
    stream.set_opt("Menu ID", track.menu_id.as_ref());
    stream.set_opt("Format", track.format.as_ref());
    if kind != StreamKind::Text && kind != StreamKind::Image {
        stream.set_opt("Format profile", track.format_profile.as_ref());
    }
    stream.set_opt("Codec ID", track.codec_id.as_ref());

    if kind != StreamKind::Image {
        let duration = track.duration.filter(|d| *d > 0.0);
        stream.set_opt("Duration", duration.map(values::duration));
        let bit_rate = track.bit_rate.or_else(|| {
            let duration = duration?;
            rules::bit_rate(track.stream_size?, duration)
        });
        stream.set_opt("Bit rate", bit_rate.map(values::bit_rate));
    }

    match kind {
        StreamKind::Video => {
            set_geometry(&mut stream, track);
            let aspect = match (track.display_aspect, track.width, track.height) {
                (Some(ratio), _, _) => display_aspect_ratio(ratio, 1.0),
                (None, Some(w), Some(h)) => display_aspect_ratio(w as f64, h as f64),
                _ => None,
            };
            stream.set_opt("Display aspect ratio", aspect);
            stream.set_opt("Frame rate mode", track.frame_rate_mode.map(|m| m.as_str()));
            stream.set_opt("Frame rate", track_frame_rate(track).map(values::frame_rate));
            stream.set_opt("Frame count", track.frame_count);
            stream.set_opt("Bit depth", track.bit_depth);
            stream.set_opt("Scan type", track.scan_type.as_ref());
        }
        StreamKind::Audio => {
            stream.set_opt("Channel(s)", track.channels);
            stream.set_opt("Channel layout", track.channels.and_then(channel_layout));
            stream.set_opt("Sampling rate", track.sample_rate.map(values::sampling_rate));
            stream.set_opt("Bit depth", track.bit_depth);
        }
        StreamKind::Image => set_geometry(&mut stream, track),
        _ => {}
    }

    stream.set_opt("Stream size", track.stream_size);
    stream.set_opt("Title", track.title.as_ref());
    if kind != StreamKind::Image {
        stream.set_opt("Language", track.language.as_ref());
        stream.set_opt("Default", track.default.map(values::flag));
        stream.set_opt("Forced", track.forced.map(values::flag));
    }
    stream
}

fn set_geometry(stream: &mut Stream, track: &TrackFacts) {
    stream.set_opt("Width", track.width);
    stream.set_opt("Height", track.height);
}

/// Number streams 1, 2, ... within each kind, in report order
fn number_streams(streams: &mut [Stream]) {
    for kind in StreamKind::ALL {
        for (index, stream) in streams
            .iter_mut()
            .filter(|s| s.kind() == kind)
            .enumerate()
        {
            stream.set_number(index + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FrameRateMode;

    fn source() -> SourceInfo {
        SourceInfo {
            complete_name: "clip.mkv".to_string(),
            file_size: 1_250_000,
            modified: DateTime::<Utc>::from_timestamp(1_700_000_000, 0),
        }
    }

    fn sample_facts() -> ContainerFacts {
        let mut facts = ContainerFacts::new("Matroska");
        facts.duration = Some(10.0);
        facts.attachments = vec!["notes.txt".to_string(), "font.ttf".to_string()];

        let mut video = TrackFacts::new(StreamKind::Video);
        video.id = Some("1".to_string());
        video.format = Some("AVC".to_string());
        video.width = Some(1920);
        video.height = Some(1080);
        video.frame_rate = Some(25.0);
        video.frame_rate_mode = Some(FrameRateMode::Constant);
        video.default = Some(true);

        let mut first_audio = TrackFacts::new(StreamKind::Audio);
        first_audio.format = Some("AAC".to_string());
        first_audio.channels = Some(6);
        first_audio.sample_rate = Some(48_000.0);
        first_audio.duration = Some(10.0);
        first_audio.stream_size = Some(160_000);
        let mut second_audio = TrackFacts::new(StreamKind::Audio);
        second_audio.format = Some("Opus".to_string());
        second_audio.channels = Some(3);
        second_audio.sample_rate = Some(44_100.5);

        // Audio discovered before video
        facts.tracks = vec![first_audio, video, second_audio];
        facts.menus.push(MenuFacts {
            chapters: vec![(65.5, "Second".to_string()), (0.0, "First".to_string())],
            ..MenuFacts::default()
        });
        facts
    }

    #[test]
    fn test_general_fields_in_canonical_order() {
        let report = ReportAssembler::new(source()).assemble(&sample_facts());
        let general = report.general().unwrap();
        let names: Vec<&str> = general.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Complete name",
                "Format",
                "File size",
                "Duration",
                "Overall bit rate",
                "Frame rate",
                "Attachments",
                "File last modification date",
            ]
        );
        assert_eq!(general.get("Duration"), Some("10.000"));
        assert_eq!(general.get("Overall bit rate"), Some("1000000"));
        assert_eq!(general.get("Frame rate"), Some("25.000"));
        assert_eq!(general.get("Attachments"), Some("notes.txt / font.ttf"));
        assert_eq!(
            general.get("File last modification date"),
            Some("2023-11-14 22:13:20 UTC")
        );
    }

    #[test]
    fn test_streams_grouped_and_numbered_by_kind() {
        let report = ReportAssembler::new(source()).assemble(&sample_facts());
        let headings: Vec<String> = report.streams().iter().map(|s| report.heading(s)).collect();
        assert_eq!(headings, vec!["General", "Video", "Audio #1", "Audio #2", "Menu"]);

        let audio: Vec<&Stream> = report.streams_of(StreamKind::Audio).collect();
        assert_eq!(audio[0].get("Channel layout"), Some("5.1"));
        assert_eq!(audio[0].get("Bit rate"), Some("128000"));
        assert_eq!(audio[1].get("Channel layout"), None);
        assert_eq!(audio[1].get("Sampling rate"), Some("44100.5"));
    }

    #[test]
    fn test_video_derived_fields() {
        let report = ReportAssembler::new(source()).assemble(&sample_facts());
        let video = report.streams_of(StreamKind::Video).next().unwrap();
        assert_eq!(video.get("Display aspect ratio"), Some("16:9"));
        assert_eq!(video.get("Frame rate mode"), Some("CFR"));
        assert_eq!(video.get("Default"), Some("Yes"));
        assert!(!video.contains("Channel(s)"));
        assert!(!video.contains("Duration"));
    }

    #[test]
    fn test_menu_chapters_in_time_order() {
        let report = ReportAssembler::new(source()).assemble(&sample_facts());
        let menu = report.streams_of(StreamKind::Menu).next().unwrap();
        let chapters: Vec<(&str, &str)> = menu
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            chapters,
            vec![("00:00:00.000", "First"), ("00:01:05.500", "Second")]
        );
    }

    #[test]
    fn test_chapters_sharing_a_start_time_are_all_listed() {
        let mut facts = ContainerFacts::default();
        facts.menus.push(MenuFacts {
            chapters: vec![
                (10.0, "Intro".to_string()),
                (10.0, "Intro (alt)".to_string()),
                (10.0, "Intro (dub)".to_string()),
                (20.0, "Main".to_string()),
            ],
            ..MenuFacts::default()
        });
        let report = ReportAssembler::new(source()).assemble(&facts);
        let menu = report.streams_of(StreamKind::Menu).next().unwrap();
        let chapters: Vec<(&str, &str)> = menu
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            chapters,
            vec![
                ("00:00:10.000", "Intro"),
                ("00:00:10.000 (2)", "Intro (alt)"),
                ("00:00:10.000 (3)", "Intro (dub)"),
                ("00:00:20.000", "Main"),
            ]
        );
    }

    #[test]
    fn test_unknown_format_keeps_filesystem_facts() {
        let report = ReportAssembler::new(source()).assemble(&ContainerFacts::default());
        assert_eq!(report.streams().len(), 1);
        let general = report.general().unwrap();
        assert_eq!(general.get("File size"), Some("1250000"));
        assert!(!general.contains("Format"));
        assert!(!general.contains("Duration"));
        assert!(!report.is_empty());
    }
}
