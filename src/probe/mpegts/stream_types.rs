//! PMT stream type classification

use crate::domain::model::StreamKind;
use crate::probe::elementary::HeaderKind;
use crate::probe::mpegts::psi::Descriptors;

/// How a PMT entry is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClass {
    pub kind: StreamKind,
    pub format: &'static str,
    pub profile: Option<&'static str>,
    pub header: HeaderKind,
}

const fn class(
    kind: StreamKind,
    format: &'static str,
    profile: Option<&'static str>,
    header: HeaderKind,
) -> StreamClass {
    StreamClass {
        kind,
        format,
        profile,
        header,
    }
}

/// Classify a stream type, refined by its descriptors
///
/// `hdmv` enables the Blu-ray assignments of the 0x80-0xA2 user-private range.
/// Stream types that carry no audio, video or subtitles yield `None`.
pub fn classify(stream_type: u8, descriptors: &Descriptors, hdmv: bool) -> Option<StreamClass> {
    use HeaderKind as H;
    use StreamKind::{Audio, Text, Video};

    let found = match stream_type {
        0x01 => class(Video, "MPEG Video", Some("Version 1"), H::MpegVideo),
        0x02 => class(Video, "MPEG Video", Some("Version 2"), H::MpegVideo),
        0x03 => class(Audio, "MPEG Audio", None, H::MpegAudio),
        0x04 => class(Audio, "MPEG Audio", None, H::MpegAudio),
        0x0F => class(Audio, "AAC", None, H::Adts),
        0x10 => class(Video, "MPEG-4 Visual", None, H::None),
        0x11 => class(Audio, "AAC", Some("LATM"), H::None),
        0x1B => class(Video, "AVC", None, H::None),
        0x24 => class(Video, "HEVC", None, H::None),
        0x33 => class(Video, "VVC", None, H::None),
        0x42 => class(Video, "AVS", None, H::None),
        0xEA => class(Video, "VC-1", None, H::None),
        0x06 => return classify_private(descriptors),
        0x80 if hdmv => class(Audio, "PCM", None, H::None),
        0x81 => class(Audio, "AC-3", None, H::Ac3),
        0x82 | 0x85 | 0x86 | 0xA2 if hdmv => class(Audio, "DTS", None, H::None),
        0x83 if hdmv => class(Audio, "MLP FBA", None, H::None),
        0x84 | 0xA1 if hdmv => class(Audio, "E-AC-3", None, H::Ac3),
        0x87 => class(Audio, "E-AC-3", None, H::Ac3),
        0x90 if hdmv => class(Text, "PGS", None, H::None),
        0x92 if hdmv => class(Text, "HDMV Text", None, H::None),
        _ => return None,
    };
    Some(found)
}

/// Private PES data is identified by descriptors alone
fn classify_private(descriptors: &Descriptors) -> Option<StreamClass> {
    use HeaderKind as H;
    use StreamKind::{Audio, Text, Video};

    if descriptors.eac3 {
        return Some(class(Audio, "E-AC-3", None, H::Ac3));
    }
    if descriptors.ac3 {
        return Some(class(Audio, "AC-3", None, H::Ac3));
    }
    if descriptors.dvb_subtitle {
        return Some(class(Text, "DVB Subtitle", None, H::None));
    }
    if descriptors.teletext {
        return Some(class(Text, "Teletext", None, H::None));
    }
    let found = match &descriptors.registration? {
        b"AC-3" => class(Audio, "AC-3", None, H::Ac3),
        b"EAC3" => class(Audio, "E-AC-3", None, H::Ac3),
        b"DTS1" | b"DTS2" | b"DTS3" => class(Audio, "DTS", None, H::None),
        b"Opus" => class(Audio, "Opus", None, H::None),
        b"HEVC" => class(Video, "HEVC", None, H::None),
        b"VC-1" => class(Video, "VC-1", None, H::None),
        _ => return None,
    };
    Some(found)
}
