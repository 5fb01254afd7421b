use std::io::Cursor;

use super::*;
use crate::probe::pes::encode_timestamp;
use crate::probe::FrameRateMode;

const MPEG2_PACK: [u8; 14] = [
    0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8,
];
const MPEG1_PACK: [u8; 12] = [
    0x00, 0x00, 0x01, 0xBA, 0x21, 0x00, 0x01, 0x00, 0x01, 0x80, 0x00, 0x01,
];
const AC3_FRAME: [u8; 8] = [0x0B, 0x77, 0x00, 0x00, 0x1E, 0x40, 0xE1, 0x40];
const LPCM_HEADER: [u8; 7] = [0xA0, 0x01, 0x00, 0x04, 0x00, 0x01, 0x80];

fn pes(stream_id: u8, pts: u64, body: &[u8]) -> Vec<u8> {
    let length = 3 + 5 + body.len();
    let mut data = vec![0x00, 0x00, 0x01, stream_id];
    data.extend_from_slice(&(length as u16).to_be_bytes());
    data.extend_from_slice(&[0x80, 0x80, 0x05]);
    data.extend_from_slice(&encode_timestamp(0x2, pts));
    data.extend_from_slice(body);
    data
}

fn padding(len: usize) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x01, 0xBE];
    data.extend_from_slice(&(len as u16).to_be_bytes());
    data.extend(std::iter::repeat(0xFF).take(len));
    data
}

fn sequence_header() -> Vec<u8> {
    let rate_value: u32 = 24_500;
    let mut data = vec![0x00, 0x00, 0x01, 0xB3, 0x2D, 0x02, 0x40, 0x33];
    data.push((rate_value >> 10) as u8);
    data.push((rate_value >> 2) as u8);
    data.push(((rate_value & 0x03) << 6) as u8 | 0x20);
    data.push(0x00);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB5, 0x14]);
    data
}

/// One second of 25 fps video plus AC-3, LPCM and subpicture substreams
fn program_stream(with_sequence_header: bool) -> Vec<u8> {
    let mut data = Vec::new();
    for frame in 0..26u64 {
        let pts = 45_000 + frame * 3_600;
        data.extend_from_slice(&MPEG2_PACK);
        let body = if frame == 0 && with_sequence_header {
            sequence_header()
        } else {
            vec![0x00; 64]
        };
        data.extend(pes(0xE0, pts, &body));
        if frame % 5 == 0 {
            let mut ac3 = vec![0x80, 0x01, 0x00, 0x01];
            ac3.extend_from_slice(&AC3_FRAME);
            data.extend(pes(0xBD, pts, &ac3));
            let mut lpcm = LPCM_HEADER.to_vec();
            lpcm.extend_from_slice(&[0x00; 32]);
            data.extend(pes(0xBD, pts, &lpcm));
        }
        if frame == 10 {
            data.extend(pes(0xBD, pts, &[0x20, 0x00, 0x10]));
            data.extend(padding(40));
        }
    }
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB9]);
    data
}

fn run(data: &[u8], parse_speed: f64) -> ContainerFacts {
    let options = AnalyzeOptions::with_parse_speed(parse_speed).unwrap();
    parse(&mut Cursor::new(data), data.len() as u64, &options).unwrap()
}

#[test]
fn test_streams_and_substreams() {
    let facts = run(&program_stream(true), 0.5);

    assert_eq!(facts.format.as_deref(), Some("MPEG-PS"));
    assert_eq!(facts.format_version.as_deref(), Some("Version 2"));
    assert_eq!(facts.tracks.len(), 4);
    assert_eq!(facts.duration, Some(1.0));

    let video = &facts.tracks[0];
    assert_eq!(video.id.as_deref(), Some("224 (0xE0)"));
    assert_eq!(video.format_profile.as_deref(), Some("Version 2"));
    assert_eq!((video.width, video.height), (Some(720), Some(576)));
    assert_eq!(video.frame_rate, Some(25.0));
    assert_eq!(video.frame_rate_mode, Some(FrameRateMode::Constant));

    let ac3 = &facts.tracks[1];
    assert_eq!(ac3.id.as_deref(), Some("189 (0xBD)-128 (0x80)"));
    assert_eq!(ac3.format.as_deref(), Some("AC-3"));
    assert_eq!(ac3.channels, Some(6));

    let lpcm = &facts.tracks[2];
    assert_eq!(lpcm.format.as_deref(), Some("PCM"));
    assert_eq!(lpcm.bit_depth, Some(16));
    assert_eq!(lpcm.channels, Some(2));

    let subpicture = &facts.tracks[3];
    assert_eq!(subpicture.kind, StreamKind::Text);
    assert_eq!(subpicture.format.as_deref(), Some("RLE"));
}

#[test]
fn test_mpeg1_pack_version() {
    let mut data = MPEG1_PACK.to_vec();
    // MPEG-1 packet header: PTS-only marker
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xC0, 0x00, 0x07]);
    data.extend_from_slice(&encode_timestamp(0x2, 0));
    data.extend_from_slice(&[0xFF, 0xFB]);
    data.extend_from_slice(&MPEG1_PACK);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xC0, 0x00, 0x07]);
    data.extend_from_slice(&encode_timestamp(0x2, 90_000));
    data.extend_from_slice(&[0xFF, 0xFB]);

    let facts = run(&data, 0.5);
    assert_eq!(facts.format_version.as_deref(), Some("Version 1"));
    assert_eq!(facts.tracks.len(), 1);
    assert_eq!(facts.tracks[0].format.as_deref(), Some("MPEG Audio"));
    assert_eq!(facts.duration, Some(1.0));
}

#[test]
fn test_invalid_pes_header_is_not_a_stream() {
    let mut data = program_stream(true);
    let mut bogus = MPEG2_PACK.to_vec();
    bogus.extend_from_slice(&[0x00, 0x00, 0x01, 0xC0, 0x00, 0x02, 0x12, 0x34]);
    data.splice(0..0, bogus);
    let facts = run(&data, 0.5);
    assert_eq!(facts.tracks.len(), 4);
    assert!(facts.tracks.iter().all(|t| t.format.as_deref() != Some("MPEG Audio")));
}

#[test]
fn test_frame_rate_estimate_depends_on_speed() {
    let data = program_stream(false);
    assert_eq!(run(&data, 0.0).tracks[0].frame_rate, None);
    let fps = run(&data, 1.0).tracks[0].frame_rate.unwrap();
    assert!((fps - 25.0).abs() < 1e-9);
}

#[test]
fn test_leading_garbage_is_skipped() {
    let mut data = vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x13, 0x37];
    data.extend(program_stream(true));
    let facts = run(&data, 0.5);
    assert_eq!(facts.tracks.len(), 4);
    assert_eq!(facts.tracks[0].duration, Some(1.0));
}
