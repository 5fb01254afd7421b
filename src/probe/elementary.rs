//! Elementary-stream header peeks
//!
//! These read the fixed headers found at the start of common elementary
//! streams (sequence headers, sync frames). Nothing here decodes samples.

use crate::probe::reader::BitReader;
use crate::probe::{FrameRateMode, TrackFacts};

/// Geometry and timing from an MPEG-1/2 video sequence header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSequence {
    pub width: u32,
    pub height: u32,
    pub display_aspect: Option<f64>,
    pub frame_rate: Option<f64>,
    pub bit_rate: Option<f64>,
    /// 2 when a sequence extension follows, otherwise 1
    pub mpeg_version: u8,
}

/// Audio parameters from a sync frame header
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub format: &'static str,
    pub profile: Option<String>,
    pub sample_rate: Option<f64>,
    pub bit_rate: Option<f64>,
    pub channels: Option<u32>,
    pub bit_depth: Option<u32>,
}

const MPEG_FRAME_RATES: [f64; 9] = [
    0.0,
    24000.0 / 1001.0,
    24.0,
    25.0,
    30000.0 / 1001.0,
    30.0,
    50.0,
    60000.0 / 1001.0,
    60.0,
];

fn find_start_code(data: &[u8], code: u8) -> Option<usize> {
    data.windows(4)
        .position(|w| w[0] == 0 && w[1] == 0 && w[2] == 1 && w[3] == code)
}

/// Locate and read an MPEG video sequence header (`00 00 01 B3`)
pub fn mpeg_video_sequence(data: &[u8]) -> Option<VideoSequence> {
    let start = find_start_code(data, 0xB3)?;
    let header = data.get(start + 4..start + 12)?;

    let width = ((header[0] as u32) << 4) | (header[1] as u32 >> 4);
    let height = (((header[1] & 0x0F) as u32) << 8) | header[2] as u32;
    if width == 0 || height == 0 {
        return None;
    }
    let aspect_code = header[3] >> 4;
    let rate_code = (header[3] & 0x0F) as usize;
    let rate_value =
        ((header[4] as u32) << 10) | ((header[5] as u32) << 2) | (header[6] as u32 >> 6);

    let mpeg_version = if find_start_code(&data[start..], 0xB5).is_some() {
        2
    } else {
        1
    };
    let display_aspect = match (mpeg_version, aspect_code) {
        (_, 1) => Some(width as f64 / height as f64),
        (2, 2) => Some(4.0 / 3.0),
        (2, 3) => Some(16.0 / 9.0),
        (2, 4) => Some(2.21),
        _ => None,
    };
    let frame_rate = MPEG_FRAME_RATES
        .get(rate_code)
        .copied()
        .filter(|r| *r > 0.0);
    // 0x3FFFF signals variable bit rate
    let bit_rate = if rate_value == 0 || rate_value == 0x3FFFF {
        None
    } else {
        Some(rate_value as f64 * 400.0)
    };

    Some(VideoSequence {
        width,
        height,
        display_aspect,
        frame_rate,
        bit_rate,
        mpeg_version,
    })
}

const AC3_SAMPLE_RATES: [f64; 3] = [48_000.0, 44_100.0, 32_000.0];
const AC3_BIT_RATES_KBPS: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];
const AC3_CHANNELS: [u32; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

/// Locate and read an AC-3 or E-AC-3 sync frame (`0B 77`)
pub fn ac3_frame(data: &[u8]) -> Option<AudioFrame> {
    let start = data.windows(2).position(|w| w == [0x0B, 0x77])?;
    let frame = data.get(start..start + 8)?;
    let bsid = frame[5] >> 3;

    if bsid > 10 {
        return eac3_frame(frame);
    }

    let fscod = (frame[4] >> 6) as usize;
    let frmsizecod = (frame[4] & 0x3F) as usize;
    let mut bits = BitReader::new(&frame[5..]);
    bits.skip_bits(5 + 3).ok()?; // bsid, bsmod
    let acmod = bits.read_bits(3).ok()? as usize;
    if acmod & 0x01 != 0 && acmod != 1 {
        bits.skip_bits(2).ok()?; // cmixlev
    }
    if acmod & 0x04 != 0 {
        bits.skip_bits(2).ok()?; // surmixlev
    }
    if acmod == 2 {
        bits.skip_bits(2).ok()?; // dsurmod
    }
    let lfe = bits.read_bits(1).ok()?;

    Some(AudioFrame {
        format: "AC-3",
        profile: None,
        sample_rate: AC3_SAMPLE_RATES.get(fscod).copied(),
        bit_rate: AC3_BIT_RATES_KBPS
            .get(frmsizecod / 2)
            .map(|kbps| *kbps as f64 * 1000.0),
        channels: Some(AC3_CHANNELS[acmod] + lfe),
        bit_depth: None,
    })
}

fn eac3_frame(frame: &[u8]) -> Option<AudioFrame> {
    let mut bits = BitReader::new(&frame[2..]);
    bits.skip_bits(2 + 3).ok()?; // strmtyp, substreamid
    let frmsiz = bits.read_bits(11).ok()?;
    let fscod = bits.read_bits(2).ok()? as usize;
    let (sample_rate, blocks) = if fscod == 3 {
        let fscod2 = bits.read_bits(2).ok()? as usize;
        (
            [24_000.0, 22_050.0, 16_000.0].get(fscod2).copied(),
            6.0,
        )
    } else {
        let numblkscod = bits.read_bits(2).ok()? as usize;
        (
            AC3_SAMPLE_RATES.get(fscod).copied(),
            [1.0, 2.0, 3.0, 6.0][numblkscod],
        )
    };
    let acmod = bits.read_bits(3).ok()? as usize;
    let lfe = bits.read_bits(1).ok()?;
    let frame_bytes = (frmsiz as f64 + 1.0) * 2.0;
    let bit_rate = sample_rate.map(|rate| frame_bytes * 8.0 * rate / (blocks * 256.0));

    Some(AudioFrame {
        format: "E-AC-3",
        profile: None,
        sample_rate,
        bit_rate,
        channels: Some(AC3_CHANNELS[acmod] + lfe),
        bit_depth: None,
    })
}

const MPEG1_BIT_RATES: [[u32; 16]; 3] = [
    // Layer 1
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
    // Layer 2
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
    // Layer 3
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
];

const MPEG2_BIT_RATES: [[u32; 16]; 2] = [
    // Layer 1
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
    // Layers 2 and 3
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
];

/// Locate and read an MPEG audio frame header
pub fn mpeg_audio_frame(data: &[u8]) -> Option<AudioFrame> {
    let start = data.windows(2).position(|w| {
        w[0] == 0xFF && w[1] & 0xE0 == 0xE0 && (w[1] >> 1) & 0x03 != 0 && (w[1] >> 3) & 0x03 != 1
    })?;
    let header = data.get(start..start + 4)?;

    let version = (header[1] >> 3) & 0x03; // 3 = MPEG-1, 2 = MPEG-2, 0 = MPEG-2.5
    let layer = 4 - ((header[1] >> 1) & 0x03) as usize; // 1..=3
    let bit_rate_index = (header[2] >> 4) as usize;
    let rate_index = ((header[2] >> 2) & 0x03) as usize;
    let channel_mode = header[3] >> 6;

    let base_rate = [44_100.0, 48_000.0, 32_000.0].get(rate_index).copied();
    let sample_rate = base_rate.map(|rate| match version {
        3 => rate,
        2 => rate / 2.0,
        _ => rate / 4.0,
    });
    let kbps = if version == 3 {
        MPEG1_BIT_RATES[layer - 1][bit_rate_index]
    } else {
        MPEG2_BIT_RATES[usize::from(layer > 1)][bit_rate_index]
    };
    let version_name = match version {
        3 => "Version 1",
        2 => "Version 2",
        _ => "Version 2.5",
    };

    Some(AudioFrame {
        format: "MPEG Audio",
        profile: Some(format!("{} / Layer {}", version_name, layer)),
        sample_rate,
        bit_rate: (kbps > 0).then(|| kbps as f64 * 1000.0),
        channels: Some(if channel_mode == 3 { 1 } else { 2 }),
        bit_depth: None,
    })
}

const AAC_SAMPLE_RATES: [f64; 13] = [
    96_000.0, 88_200.0, 64_000.0, 48_000.0, 44_100.0, 32_000.0, 24_000.0, 22_050.0, 16_000.0,
    12_000.0, 11_025.0, 8_000.0, 7_350.0,
];

/// Sampling rate for an MPEG-4 sampling frequency index
pub fn aac_sample_rate(index: usize) -> Option<f64> {
    AAC_SAMPLE_RATES.get(index).copied()
}

/// Profile name for an MPEG-4 audio object type
pub fn aac_profile(object_type: u32) -> Option<&'static str> {
    match object_type {
        1 => Some("Main"),
        2 => Some("LC"),
        3 => Some("SSR"),
        4 => Some("LTP"),
        5 => Some("HE-AAC"),
        29 => Some("HE-AACv2"),
        _ => None,
    }
}

/// AAC channel count for a channel configuration value
pub fn aac_channels(configuration: u32) -> Option<u32> {
    match configuration {
        1..=6 => Some(configuration),
        7 => Some(8),
        _ => None,
    }
}

/// Locate and read an ADTS header
pub fn adts_frame(data: &[u8]) -> Option<AudioFrame> {
    let start = data
        .windows(2)
        .position(|w| w[0] == 0xFF && w[1] & 0xF6 == 0xF0)?;
    let header = data.get(start..start + 7)?;

    let object_type = (header[2] >> 6) as u32 + 1;
    let rate_index = ((header[2] >> 2) & 0x0F) as usize;
    let configuration = (((header[2] & 0x01) as u32) << 2) | (header[3] >> 6) as u32;

    Some(AudioFrame {
        format: "AAC",
        profile: aac_profile(object_type).map(str::to_string),
        sample_rate: aac_sample_rate(rate_index),
        bit_rate: None,
        channels: aac_channels(configuration),
        bit_depth: None,
    })
}

/// Read the DVD LPCM private header that follows the substream id
pub fn dvd_lpcm_header(data: &[u8]) -> Option<AudioFrame> {
    // substream id, frame count, first access unit (2), emphasis/frame, format, range
    let format = *data.get(5)?;
    let bit_depth = [16, 20, 24].get((format >> 6) as usize).copied();
    let sample_rate = [48_000.0, 96_000.0]
        .get(((format >> 4) & 0x03) as usize)
        .copied();
    let channels = (format & 0x07) as u32 + 1;
    let bit_rate = match (sample_rate, bit_depth) {
        (Some(rate), Some(depth)) => Some(rate * depth as f64 * channels as f64),
        _ => None,
    };

    Some(AudioFrame {
        format: "PCM",
        profile: None,
        sample_rate,
        bit_rate,
        channels: Some(channels),
        bit_depth,
    })
}

/// Which elementary header to look for in a stream's first payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    MpegVideo,
    MpegAudio,
    Ac3,
    Adts,
    DvdLpcm,
    None,
}

/// Result of a successful header peek
#[derive(Debug, Clone, PartialEq)]
pub enum StreamHeader {
    Video(VideoSequence),
    Audio(AudioFrame),
}

/// Look for the header `kind` names in `data`
pub fn peek(kind: HeaderKind, data: &[u8]) -> Option<StreamHeader> {
    match kind {
        HeaderKind::MpegVideo => mpeg_video_sequence(data).map(StreamHeader::Video),
        HeaderKind::MpegAudio => mpeg_audio_frame(data).map(StreamHeader::Audio),
        HeaderKind::Ac3 => ac3_frame(data).map(StreamHeader::Audio),
        HeaderKind::Adts => adts_frame(data).map(StreamHeader::Audio),
        HeaderKind::DvdLpcm => dvd_lpcm_header(data).map(StreamHeader::Audio),
        HeaderKind::None => None,
    }
}

/// Fill track facts from a peeked header; values already set are kept
pub fn apply_header(facts: &mut TrackFacts, header: &StreamHeader) {
    match header {
        StreamHeader::Video(sequence) => {
            facts.width = facts.width.or(Some(sequence.width));
            facts.height = facts.height.or(Some(sequence.height));
            facts.display_aspect = facts.display_aspect.or(sequence.display_aspect);
            if let Some(rate) = sequence.frame_rate {
                facts.frame_rate = Some(rate);
                facts.frame_rate_mode = Some(FrameRateMode::Constant);
            }
            facts.bit_rate = facts.bit_rate.or(sequence.bit_rate);
            if facts.format.as_deref() == Some("MPEG Video") {
                facts.format_profile = Some(format!("Version {}", sequence.mpeg_version));
            }
        }
        StreamHeader::Audio(frame) => {
            // Sync word wins over the declared format
            facts.format = Some(frame.format.to_string());
            if frame.profile.is_some() {
                facts.format_profile = frame.profile.clone();
            }
            facts.sample_rate = facts.sample_rate.or(frame.sample_rate);
            facts.channels = facts.channels.or(frame.channels);
            facts.bit_depth = facts.bit_depth.or(frame.bit_depth);
            facts.bit_rate = frame.bit_rate.or(facts.bit_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mpeg2_sequence_header() {
        // 720x576, 16:9, 25 fps, 9.8 Mb/s, followed by a sequence extension
        let mut data = vec![0xAA, 0x00, 0x00, 0x01, 0xB3, 0x2D, 0x02, 0x40, 0x33];
        let rate_value: u32 = 24_500;
        data.push((rate_value >> 10) as u8);
        data.push((rate_value >> 2) as u8);
        data.push(((rate_value & 0x03) << 6) as u8 | 0x20);
        data.push(0x00);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB5, 0x14]);

        let sequence = mpeg_video_sequence(&data).unwrap();
        assert_eq!(sequence.width, 720);
        assert_eq!(sequence.height, 576);
        assert_eq!(sequence.display_aspect, Some(16.0 / 9.0));
        assert_eq!(sequence.frame_rate, Some(25.0));
        assert_eq!(sequence.bit_rate, Some(9_800_000.0));
        assert_eq!(sequence.mpeg_version, 2);
    }

    #[test]
    fn reads_ac3_sync_frame() {
        // 48 kHz, 448 kb/s, bsid 8, acmod 7 (3/2) with LFE
        let data = [0x0B, 0x77, 0x00, 0x00, 0x1E, 0x40, 0xE1, 0x40];
        let frame = ac3_frame(&data).unwrap();
        assert_eq!(frame.format, "AC-3");
        assert_eq!(frame.sample_rate, Some(48_000.0));
        assert_eq!(frame.bit_rate, Some(448_000.0));
        assert_eq!(frame.channels, Some(6));
    }

    #[test]
    fn reads_mpeg_audio_layer2() {
        // MPEG-1 Layer 2, 192 kb/s, 48 kHz, stereo
        let data = [0x00, 0xFF, 0xFD, 0xA4, 0x00];
        let frame = mpeg_audio_frame(&data).unwrap();
        assert_eq!(frame.profile.as_deref(), Some("Version 1 / Layer 2"));
        assert_eq!(frame.bit_rate, Some(192_000.0));
        assert_eq!(frame.sample_rate, Some(48_000.0));
        assert_eq!(frame.channels, Some(2));
    }

    #[test]
    fn reads_adts_header() {
        // LC, 48 kHz, 2 channels
        let data = [0xFF, 0xF1, 0x4C, 0x80, 0x00, 0x1F, 0xFC];
        let frame = adts_frame(&data).unwrap();
        assert_eq!(frame.format, "AAC");
        assert_eq!(frame.profile.as_deref(), Some("LC"));
        assert_eq!(frame.sample_rate, Some(48_000.0));
        assert_eq!(frame.channels, Some(2));
    }

    #[test]
    fn reads_dvd_lpcm_header() {
        // 16-bit, 48 kHz, stereo
        let data = [0xA0, 0x01, 0x00, 0x04, 0x00, 0x01, 0x80];
        let frame = dvd_lpcm_header(&data).unwrap();
        assert_eq!(frame.bit_depth, Some(16));
        assert_eq!(frame.channels, Some(2));
        assert_eq!(frame.bit_rate, Some(1_536_000.0));
    }

    #[test]
    fn missing_headers_yield_none() {
        assert!(mpeg_video_sequence(&[0u8; 32]).is_none());
        assert!(ac3_frame(&[0u8; 32]).is_none());
        assert!(adts_frame(&[0u8; 32]).is_none());
    }

    #[test]
    fn applied_audio_header_overrides_declared_format() {
        let mut facts = TrackFacts::new(crate::domain::model::StreamKind::Audio);
        facts.format = Some("MPEG Audio".to_string());
        let data = [0xFF, 0xF1, 0x4C, 0x80, 0x00, 0x1F, 0xFC];
        let header = peek(HeaderKind::Adts, &data).unwrap();
        apply_header(&mut facts, &header);
        assert_eq!(facts.format.as_deref(), Some("AAC"));
        assert_eq!(facts.channels, Some(2));
        assert_eq!(peek(HeaderKind::None, &data), None);
    }
}
