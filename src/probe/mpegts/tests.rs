use std::io::Cursor;

use super::psi::crc32_mpeg2;
use super::*;
use crate::probe::pes::encode_timestamp;
use crate::probe::FrameRateMode;

const VIDEO_PID: u16 = 0x100;
const AUDIO_PID: u16 = 0x101;
const SILENT_PID: u16 = 0x102;
const PMT_PID: u16 = 0x1000;

fn packet(pid: u16, unit_start: bool, counter: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 184);
    let mut data = vec![
        SYNC_BYTE,
        ((unit_start as u8) << 6) | (pid >> 8) as u8,
        pid as u8,
        0x10 | (counter & 0x0F),
    ];
    if payload.len() < 184 {
        data[3] |= 0x20;
        let stuffing = 183 - payload.len();
        data.push(stuffing as u8);
        if stuffing > 0 {
            data.push(0x00);
            data.extend(std::iter::repeat(0xFF).take(stuffing - 1));
        }
    }
    data.extend_from_slice(payload);
    assert_eq!(data.len(), TS_PACKET_SIZE);
    data
}

fn section(table_id: u8, extension: u16, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut data = vec![
        table_id,
        0xB0 | (section_length >> 8) as u8,
        section_length as u8,
        (extension >> 8) as u8,
        extension as u8,
        0xC1,
        0,
        0,
    ];
    data.extend_from_slice(body);
    let crc = crc32_mpeg2(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    data
}

fn psi_packet(pid: u16, section: &[u8]) -> Vec<u8> {
    let mut payload = vec![0u8];
    payload.extend_from_slice(section);
    payload.resize(184, 0xFF);
    packet(pid, true, 0, &payload)
}

fn pat() -> Vec<u8> {
    psi_packet(
        PAT_PID,
        &section(0x00, 1, &[0x00, 0x01, 0xE0 | (PMT_PID >> 8) as u8, PMT_PID as u8]),
    )
}

fn pmt(video_type: u8) -> Vec<u8> {
    let mut body = vec![0xE1, 0x00, 0xF0, 0x00];
    body.extend_from_slice(&[video_type, 0xE1, 0x00, 0xF0, 0x00]);
    body.extend_from_slice(&[0x81, 0xE1, 0x01, 0xF0, 0x06]);
    body.extend_from_slice(&[0x0A, 0x04, b'e', b'n', b'g', 0x00]);
    body.extend_from_slice(&[0x1B, 0xE1, 0x02, 0xF0, 0x00]);
    psi_packet(PMT_PID, &section(0x02, 1, &body))
}

fn pes(stream_id: u8, pts: u64, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
    data.extend_from_slice(&encode_timestamp(0x2, pts));
    data.extend_from_slice(body);
    data
}

fn mpeg2_sequence_header() -> Vec<u8> {
    // 720x576, 16:9, 25 fps, followed by a sequence extension
    let rate_value: u32 = 24_500;
    let mut data = vec![0x00, 0x00, 0x01, 0xB3, 0x2D, 0x02, 0x40, 0x33];
    data.push((rate_value >> 10) as u8);
    data.push((rate_value >> 2) as u8);
    data.push(((rate_value & 0x03) << 6) as u8 | 0x20);
    data.push(0x00);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB5, 0x14]);
    data
}

const AC3_FRAME: [u8; 8] = [0x0B, 0x77, 0x00, 0x00, 0x1E, 0x40, 0xE1, 0x40];

/// One second of 25 fps video and matching audio, PTS starting at one second
fn stream(video_type: u8) -> Vec<u8> {
    let mut data = pat();
    data.extend(pmt(video_type));
    for frame in 0..26u64 {
        let pts = 90_000 + frame * 3_600;
        let body = if frame == 0 && video_type == 0x02 {
            mpeg2_sequence_header()
        } else {
            vec![0x00; 100]
        };
        data.extend(packet(VIDEO_PID, true, frame as u8, &pes(0xE0, pts, &body)));
        data.extend(packet(VIDEO_PID, false, frame as u8, &[0x55; 184]));
        if frame % 5 == 0 {
            data.extend(packet(AUDIO_PID, true, frame as u8, &pes(0xBD, pts, &AC3_FRAME)));
        }
    }
    data
}

fn run(data: &[u8], packet_size: usize, offset: usize, parse_speed: f64) -> ContainerFacts {
    let options = AnalyzeOptions::with_parse_speed(parse_speed).unwrap();
    parse(
        &mut Cursor::new(data),
        data.len() as u64,
        packet_size,
        offset,
        &options,
    )
    .unwrap()
}

#[test]
fn test_programs_and_streams() {
    let facts = run(&stream(0x1B), 188, 0, 1.0);

    assert_eq!(facts.format.as_deref(), Some("MPEG-TS"));
    // The third PMT entry never carries a PES header
    assert_eq!(facts.tracks.len(), 2);
    assert!(facts.tracks.iter().all(|t| t.id.as_deref() != Some("258 (0x102)")));

    let video = &facts.tracks[0];
    assert_eq!(video.kind, StreamKind::Video);
    assert_eq!(video.id.as_deref(), Some("256 (0x100)"));
    assert_eq!(video.menu_id.as_deref(), Some("1 (0x1)"));
    assert_eq!(video.format.as_deref(), Some("AVC"));
    assert_eq!(video.duration, Some(1.0));
    let fps = video.frame_rate.unwrap();
    assert!((fps - 25.0).abs() < 1e-9);
    assert!(video.bit_rate.is_some());

    let audio = &facts.tracks[1];
    assert_eq!(audio.format.as_deref(), Some("AC-3"));
    assert_eq!(audio.language.as_deref(), Some("eng"));
    assert_eq!(audio.sample_rate, Some(48_000.0));
    assert_eq!(audio.channels, Some(6));
    assert_eq!(audio.bit_rate, Some(448_000.0));

    assert_eq!(facts.menus.len(), 1);
    assert_eq!(facts.menus[0].id.as_deref(), Some("4096 (0x1000)"));
    assert_eq!(facts.menus[0].format.as_deref(), Some("AVC / AC-3"));
    assert_eq!(facts.duration, Some(1.0));
}

#[test]
fn test_mpeg2_sequence_header_gives_exact_rate() {
    let facts = run(&stream(0x02), 188, 0, 0.5);
    let video = &facts.tracks[0];
    assert_eq!(video.format.as_deref(), Some("MPEG Video"));
    assert_eq!(video.format_profile.as_deref(), Some("Version 2"));
    assert_eq!((video.width, video.height), (Some(720), Some(576)));
    assert_eq!(video.frame_rate, Some(25.0));
    assert_eq!(video.frame_rate_mode, Some(FrameRateMode::Constant));
}

#[test]
fn test_zero_speed_skips_pes_counting() {
    let facts = run(&stream(0x1B), 188, 0, 0.0);
    let video = &facts.tracks[0];
    assert_eq!(video.duration, Some(1.0));
    assert_eq!(video.frame_rate, None);
}

#[test]
fn test_resync_after_garbage() {
    let mut data = stream(0x1B);
    let middle = 20 * TS_PACKET_SIZE;
    data.splice(middle..middle, [0x12, 0x47, 0x00, 0x47, 0x99]);
    let facts = run(&data, 188, 0, 1.0);
    assert_eq!(facts.tracks.len(), 2);
    assert_eq!(facts.tracks[0].duration, Some(1.0));
}

#[test]
fn test_bdav_packets() {
    let plain = stream(0x1B);
    let mut data = Vec::new();
    for chunk in plain.chunks(TS_PACKET_SIZE) {
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(chunk);
    }
    let facts = run(&data, 192, 4, 1.0);
    assert_eq!(facts.format.as_deref(), Some("BDAV"));
    assert_eq!(facts.tracks.len(), 2);
}

#[test]
fn test_missing_pat_gives_duration_only() {
    let data: Vec<u8> = stream(0x1B)
        .chunks(TS_PACKET_SIZE)
        .skip(2)
        .flatten()
        .copied()
        .collect();
    let facts = run(&data, 188, 0, 1.0);
    assert!(facts.tracks.is_empty());
    assert!(facts.menus.is_empty());
    assert_eq!(facts.duration, Some(1.0));
}

#[test]
fn test_scan_regions() {
    let full = AnalyzeOptions::with_parse_speed(1.0).unwrap();
    assert_eq!(
        scan_regions(0, 10_000_000, 188, &full),
        vec![Region {
            start: 0,
            end: 10_000_000,
            counting: true
        }]
    );

    let half = AnalyzeOptions::with_parse_speed(0.5).unwrap();
    let regions = scan_regions(0, 188_000_000, 188, &half);
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].start, 0);
    assert_eq!(regions[0].end % 188, 0);
    assert!(regions[0].counting);
    assert!(!regions[1].counting);
    assert_eq!((regions[1].start) % 188, 0);
    assert_eq!(regions[1].end, 188_000_000);

    let zero = AnalyzeOptions::with_parse_speed(0.0).unwrap();
    let regions = scan_regions(0, 188_000_000, 188, &zero);
    assert_eq!(regions[0].end, (1 << 20) / 188 * 188);
    assert!(!regions[0].counting);
}

#[test]
fn test_pmt_before_pat_is_not_a_stream() {
    let mut data = pmt(0x1B);
    data.extend(stream(0x1B));

    let mut demux = Demux::default();
    for packet in data.chunks(TS_PACKET_SIZE) {
        demux.packet(packet, true);
    }
    assert!(!demux.streams.contains_key(&PMT_PID));
    assert!(demux.streams.contains_key(&VIDEO_PID));

    let facts = run(&data, 188, 0, 1.0);
    assert_eq!(facts.tracks.len(), 2);
    assert_eq!(facts.menus.len(), 1);
}
