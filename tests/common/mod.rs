//! Byte-level fixtures for the integration tests
//!
//! Each builder writes a small but structurally valid container so that the
//! tests run without any external media tooling.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use probex_cli::probe::mpegts::psi::crc32_mpeg2;
use probex_cli::probe::pes::encode_timestamp;

/// Write `data` to `dir/name` and return the full path
pub fn write_fixture(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("failed to write fixture");
    path
}

// ---------------------------------------------------------------------------
// MP4

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    data.extend_from_slice(kind);
    data.extend_from_slice(payload);
    data
}

fn full_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend_from_slice(body);
    mp4_box(kind, &payload)
}

fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut body = vec![0; 8];
    body.extend_from_slice(&timescale.to_be_bytes());
    body.extend_from_slice(&duration.to_be_bytes());
    body.extend_from_slice(&[0; 80]);
    full_box(b"mvhd", &body)
}

/// 1280x720 AVC track in a 12800 Hz timescale with the given `stts` runs
fn video_trak(timing: &[(u32, u32)]) -> Vec<u8> {
    let frames: u32 = timing.iter().map(|(count, _)| count).sum();
    let ticks: u32 = timing.iter().map(|(count, delta)| count * delta).sum();
    let millis = (ticks as u64 * 1000 / 12_800) as u32;

    let mut tkhd = vec![0; 8];
    tkhd.extend_from_slice(&1u32.to_be_bytes());
    tkhd.extend_from_slice(&[0; 4]);
    tkhd.extend_from_slice(&millis.to_be_bytes());
    tkhd.extend_from_slice(&[0; 8 + 8 + 36]);
    tkhd.extend_from_slice(&(1280u32 << 16).to_be_bytes());
    tkhd.extend_from_slice(&(720u32 << 16).to_be_bytes());

    let mut mdhd = vec![0; 8];
    mdhd.extend_from_slice(&12_800u32.to_be_bytes());
    mdhd.extend_from_slice(&ticks.to_be_bytes());
    mdhd.extend_from_slice(&5575u16.to_be_bytes());
    mdhd.extend_from_slice(&[0; 2]);

    let mut hdlr = vec![0; 4];
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0; 13]);

    let mut entry = vec![0; 6];
    entry.extend_from_slice(&1u16.to_be_bytes());
    entry.extend_from_slice(&[0; 16]);
    entry.extend_from_slice(&1280u16.to_be_bytes());
    entry.extend_from_slice(&720u16.to_be_bytes());
    entry.extend_from_slice(&[0; 4 + 4 + 4 + 2 + 32 + 2 + 2]);
    entry.extend(mp4_box(b"avcC", &[1, 100, 0, 31, 0xFF]));
    let mut stsd = 1u32.to_be_bytes().to_vec();
    stsd.extend(mp4_box(b"avc1", &entry));

    let mut stts = (timing.len() as u32).to_be_bytes().to_vec();
    for (count, delta) in timing {
        stts.extend_from_slice(&count.to_be_bytes());
        stts.extend_from_slice(&delta.to_be_bytes());
    }

    let mut stsz = 2000u32.to_be_bytes().to_vec();
    stsz.extend_from_slice(&frames.to_be_bytes());

    let mut stbl = full_box(b"stsd", &stsd);
    stbl.extend(full_box(b"stts", &stts));
    stbl.extend(full_box(b"stsz", &stsz));

    let mut mdia = full_box(b"mdhd", &mdhd);
    mdia.extend(full_box(b"hdlr", &hdlr));
    mdia.extend(mp4_box(b"minf", &mp4_box(b"stbl", &stbl)));

    let mut trak = full_box(b"tkhd", &tkhd);
    trak.extend(mp4_box(b"mdia", &mdia));
    mp4_box(b"trak", &trak)
}

/// MP4 file with one 25 fps video track lasting `seconds`
pub fn mp4_movie(seconds: u32) -> Vec<u8> {
    mp4_movie_with_timing(&[(seconds * 25, 512)])
}

/// MP4 file with one video track whose `stts` holds `timing` as (count, delta)
pub fn mp4_movie_with_timing(timing: &[(u32, u32)]) -> Vec<u8> {
    let ticks: u32 = timing.iter().map(|(count, delta)| count * delta).sum();
    let mut file = mp4_box(b"ftyp", b"isom\0\0\x02\0isomavc1mp41");
    let mut moov = mvhd(1000, (ticks as u64 * 1000 / 12_800) as u32);
    moov.extend(video_trak(timing));
    file.extend(mp4_box(b"moov", &moov));
    file.extend(mp4_box(b"mdat", &[0; 256]));
    file
}

// ---------------------------------------------------------------------------
// Matroska

fn ebml_id(id: u32) -> Vec<u8> {
    id.to_be_bytes()
        .iter()
        .copied()
        .skip_while(|b| *b == 0)
        .collect()
}

fn element(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = ebml_id(id);
    data.push(0x01);
    data.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
    data.extend_from_slice(payload);
    data
}

fn uint_element(id: u32, value: u64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

fn text_element(id: u32, value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

/// Matroska file with a VP9 video track and an Opus audio track
pub fn matroska_movie(doc_type: &str, duration_ms: f64) -> Vec<u8> {
    matroska_movie_scaled(doc_type, 1_000_000, duration_ms)
}

/// Like [`matroska_movie`], with `duration` counted in `timestamp_scale` ns ticks
pub fn matroska_movie_scaled(doc_type: &str, timestamp_scale: u64, duration: f64) -> Vec<u8> {
    let header = element(
        0x1A45_DFA3,
        &[text_element(0x4282, doc_type), uint_element(0x4287, 4)].concat(),
    );
    let info = element(
        0x1549_A966,
        &[
            uint_element(0x2A_D7B1, timestamp_scale),
            element(0x4489, &duration.to_be_bytes()),
            text_element(0x4D80, "libebml v1.4.4 + libmatroska v1.7.1"),
            text_element(0x5741, "mkvmerge v80.0"),
        ]
        .concat(),
    );
    let video = element(
        0xAE,
        &[
            uint_element(0xD7, 1),
            uint_element(0x73C5, 11),
            uint_element(0x83, 1),
            text_element(0x86, "V_VP9"),
            element(0xE0, &[uint_element(0xB0, 640), uint_element(0xBA, 360)].concat()),
        ]
        .concat(),
    );
    let audio = element(
        0xAE,
        &[
            uint_element(0xD7, 2),
            uint_element(0x73C5, 22),
            uint_element(0x83, 2),
            text_element(0x86, "A_OPUS"),
            element(
                0xE1,
                &[element(0xB5, &48_000f64.to_be_bytes()), uint_element(0x9F, 2)].concat(),
            ),
        ]
        .concat(),
    );
    let tracks = element(0x1654_AE6B, &[video, audio].concat());
    [header, element(0x1853_8067, &[info, tracks].concat())].concat()
}

// ---------------------------------------------------------------------------
// MPEG transport stream

const TS_PACKET: usize = 188;
const PMT_PID: u16 = 0x1000;
const VIDEO_PID: u16 = 0x100;
const AUDIO_PID: u16 = 0x101;
const AC3_FRAME: [u8; 8] = [0x0B, 0x77, 0x00, 0x00, 0x1E, 0x40, 0xE1, 0x40];

fn ts_packet(pid: u16, unit_start: bool, counter: u8, payload: &[u8]) -> Vec<u8> {
    let mut data = vec![
        0x47,
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
    assert_eq!(data.len(), TS_PACKET);
    data
}

fn psi_section(table_id: u8, extension: u16, body: &[u8]) -> Vec<u8> {
    let length = 5 + body.len() + 4;
    let mut data = vec![
        table_id,
        0xB0 | (length >> 8) as u8,
        length as u8,
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
    ts_packet(pid, true, 0, &payload)
}

fn ts_pes(stream_id: u8, pts: u64, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
    data.extend_from_slice(&encode_timestamp(0x2, pts));
    data.extend_from_slice(body);
    data
}

/// One second of 25 fps AVC video plus AC-3 audio in one program
pub fn transport_stream() -> Vec<u8> {
    let mut data = psi_packet(
        0x0000,
        &psi_section(0x00, 1, &[0x00, 0x01, 0xE0 | (PMT_PID >> 8) as u8, PMT_PID as u8]),
    );
    let mut pmt = vec![0xE1, 0x00, 0xF0, 0x00];
    pmt.extend_from_slice(&[0x1B, 0xE1, 0x00, 0xF0, 0x00]);
    pmt.extend_from_slice(&[0x81, 0xE1, 0x01, 0xF0, 0x06]);
    pmt.extend_from_slice(&[0x0A, 0x04, b'e', b'n', b'g', 0x00]);
    data.extend(psi_packet(PMT_PID, &psi_section(0x02, 1, &pmt)));

    for frame in 0..26u64 {
        let pts = 90_000 + frame * 3_600;
        let counter = frame as u8;
        data.extend(ts_packet(VIDEO_PID, true, counter, &ts_pes(0xE0, pts, &[0; 100])));
        data.extend(ts_packet(VIDEO_PID, false, counter, &[0x55; 184]));
        if frame % 5 == 0 {
            data.extend(ts_packet(AUDIO_PID, true, counter, &ts_pes(0xBD, pts, &AC3_FRAME)));
        }
    }
    data
}

// ---------------------------------------------------------------------------
// MPEG program stream

const MPEG2_PACK: [u8; 14] = [
    0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8,
];

fn ps_pes(stream_id: u8, pts: u64, body: &[u8]) -> Vec<u8> {
    let length = 3 + 5 + body.len();
    let mut data = vec![0x00, 0x00, 0x01, stream_id];
    data.extend_from_slice(&(length as u16).to_be_bytes());
    data.extend_from_slice(&[0x80, 0x80, 0x05]);
    data.extend_from_slice(&encode_timestamp(0x2, pts));
    data.extend_from_slice(body);
    data
}

fn sequence_header() -> Vec<u8> {
    // 720x576, 16:9, 25 fps
    let rate_value: u32 = 24_500;
    let mut data = vec![0x00, 0x00, 0x01, 0xB3, 0x2D, 0x02, 0x40, 0x33];
    data.push((rate_value >> 10) as u8);
    data.push((rate_value >> 2) as u8);
    data.push(((rate_value & 0x03) << 6) as u8 | 0x20);
    data.push(0x00);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB5, 0x14]);
    data
}

/// One second of 25 fps MPEG-2 video with an AC-3 substream
pub fn program_stream() -> Vec<u8> {
    let mut data = Vec::new();
    for frame in 0..26u64 {
        let pts = 45_000 + frame * 3_600;
        data.extend_from_slice(&MPEG2_PACK);
        let body = if frame == 0 {
            sequence_header()
        } else {
            vec![0x00; 64]
        };
        data.extend(ps_pes(0xE0, pts, &body));
        if frame % 5 == 0 {
            let mut ac3 = vec![0x80, 0x01, 0x00, 0x01];
            ac3.extend_from_slice(&AC3_FRAME);
            data.extend(ps_pes(0xBD, pts, &ac3));
        }
    }
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB9]);
    data
}
