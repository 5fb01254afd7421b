//! Track (`trak`) extraction

use tracing::debug;

use crate::domain::model::{AnalyzeOptions, StreamKind};
use crate::probe::mp4::boxes::{children, full_box, read_versioned, visit_children};
use crate::probe::mp4::codec::{
    avc_profile, format_for_fourcc, hevc_profile, parse_btrt, parse_esds, parse_pasp, EsdsInfo,
};
use crate::probe::mp4::sample_table::{parse_stsz, parse_stts, SampleSizes, SampleTiming};
use crate::probe::reader::{fourcc_to_string, CheckedBuf, ParseError, ParseResult};
use crate::probe::{FrameRateMode, TrackFacts};

/// First sample description of a track
#[derive(Debug, Clone, Default)]
struct SampleEntry {
    code: [u8; 4],
    width: Option<u32>,
    height: Option<u32>,
    channels: Option<u32>,
    sample_rate: Option<f64>,
    sample_bits: Option<u32>,
    profile: Option<String>,
    esds: Option<EsdsInfo>,
    avg_bit_rate: Option<f64>,
    pixel_aspect: Option<f64>,
}

#[derive(Debug, Default)]
struct TrackBuilder {
    track_id: Option<u32>,
    tkhd_duration: Option<u64>,
    tkhd_width: Option<f64>,
    tkhd_height: Option<f64>,
    timescale: Option<u32>,
    media_duration: Option<u64>,
    language: Option<String>,
    handler: Option<[u8; 4]>,
    entry: Option<SampleEntry>,
    timing: Option<SampleTiming>,
    sizes: Option<SampleSizes>,
}

fn kind_for_handler(handler: &[u8; 4]) -> Option<StreamKind> {
    match handler {
        b"vide" => Some(StreamKind::Video),
        b"soun" => Some(StreamKind::Audio),
        b"text" | b"sbtl" | b"subt" | b"clcp" => Some(StreamKind::Text),
        _ => None,
    }
}

fn kind_for_format(format: Option<&str>) -> Option<StreamKind> {
    match format? {
        "AVC" | "HEVC" | "AV1" | "VP8" | "VP9" | "MPEG-4 Visual" | "H.263" | "JPEG" | "ProRes" => {
            Some(StreamKind::Video)
        }
        "AAC" | "MPEG Audio" | "AC-3" | "E-AC-3" | "Opus" | "FLAC" | "ALAC" | "AMR" | "PCM" => {
            Some(StreamKind::Audio)
        }
        _ => None,
    }
}

/// Extract one track; `None` when the handler is not a reported kind
pub fn parse_trak(
    payload: &[u8],
    depth: usize,
    movie_timescale: Option<u32>,
    options: &AnalyzeOptions,
) -> ParseResult<Option<TrackFacts>> {
    let mut builder = TrackBuilder::default();
    visit_children(payload, depth, |kind, body, depth| {
        builder.visit(kind, body, depth, options)
    })?;
    Ok(builder.finish(movie_timescale))
}

impl TrackBuilder {
    fn visit(
        &mut self,
        kind: [u8; 4],
        payload: &[u8],
        depth: usize,
        options: &AnalyzeOptions,
    ) -> ParseResult<()> {
        match &kind {
            b"mdia" | b"minf" | b"stbl" => visit_children(payload, depth, |kind, body, depth| {
                self.visit(kind, body, depth, options)
            }),
            b"tkhd" => self.read_tkhd(payload),
            b"mdhd" => self.read_mdhd(payload),
            b"hdlr" => self.read_hdlr(payload),
            b"stsd" => self.read_stsd(payload, depth),
            b"stts" => {
                let (_, _, body) = full_box(payload)?;
                self.timing = Some(parse_stts(body, options)?);
                Ok(())
            }
            b"stsz" => {
                let (_, _, body) = full_box(payload)?;
                self.sizes = Some(parse_stsz(body, options)?);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn read_tkhd(&mut self, payload: &[u8]) -> ParseResult<()> {
        let (version, _, mut body) = full_box(payload)?;
        read_versioned(&mut body, version, "tkhd creation time")?;
        read_versioned(&mut body, version, "tkhd modification time")?;
        self.track_id = Some(body.read_u32("tkhd track id")?);
        body.skip(4, "tkhd reserved")?;
        let duration = read_versioned(&mut body, version, "tkhd duration")?;
        self.tkhd_duration = (duration > 0 && duration != u32::MAX as u64).then_some(duration);
        body.skip(8 + 2 + 2 + 2 + 2 + 36, "tkhd layout")?;
        let width = body.read_u32("tkhd width")? as f64 / 65536.0;
        let height = body.read_u32("tkhd height")? as f64 / 65536.0;
        self.tkhd_width = (width > 0.0).then_some(width);
        self.tkhd_height = (height > 0.0).then_some(height);
        Ok(())
    }

    fn read_mdhd(&mut self, payload: &[u8]) -> ParseResult<()> {
        let (version, _, mut body) = full_box(payload)?;
        read_versioned(&mut body, version, "mdhd creation time")?;
        read_versioned(&mut body, version, "mdhd modification time")?;
        let timescale = body.read_u32("mdhd timescale")?;
        let duration = read_versioned(&mut body, version, "mdhd duration")?;
        self.timescale = (timescale > 0).then_some(timescale);
        self.media_duration = (duration > 0 && duration != u32::MAX as u64).then_some(duration);

        let packed = body.read_u16("mdhd language")?;
        let letters: String = [10u16, 5, 0]
            .iter()
            .map(|shift| (((packed >> shift) & 0x1F) as u8 + 0x60) as char)
            .collect();
        if letters.chars().all(|c| c.is_ascii_lowercase()) && letters != "und" {
            self.language = Some(letters);
        }
        Ok(())
    }

    fn read_hdlr(&mut self, payload: &[u8]) -> ParseResult<()> {
        let (_, _, mut body) = full_box(payload)?;
        body.skip(4, "hdlr pre-defined")?;
        let handler = body.read_fourcc("hdlr handler type")?;
        // Data handlers inside minf describe references, not the media
        if self.handler.is_none() || kind_for_handler(&handler).is_some() {
            self.handler = Some(handler);
        }
        Ok(())
    }

    fn read_stsd(&mut self, payload: &[u8], depth: usize) -> ParseResult<()> {
        let (_, _, mut body) = full_box(payload)?;
        let entry_count = body.read_u32("stsd entry count")?;
        if entry_count == 0 {
            return Ok(());
        }
        let (code, entry) = children(body)
            .next()
            .ok_or_else(|| ParseError::malformed("stsd", "missing sample entry"))??;

        let kind = self
            .handler
            .as_ref()
            .and_then(kind_for_handler)
            .or_else(|| kind_for_format(format_for_fourcc(&code)));

        let mut sample = SampleEntry {
            code,
            ..SampleEntry::default()
        };
        let mut cursor = entry;
        cursor.skip(6 + 2, "sample entry header")?;
        let extensions = match kind {
            Some(StreamKind::Video) => read_visual_entry(&mut sample, cursor)?,
            Some(StreamKind::Audio) => read_audio_entry(&mut sample, cursor)?,
            _ => &[][..],
        };
        read_entry_extensions(&mut sample, extensions, depth + 1);
        self.entry = Some(sample);
        Ok(())
    }

    fn finish(self, movie_timescale: Option<u32>) -> Option<TrackFacts> {
        let kind = self.handler.as_ref().and_then(kind_for_handler)?;
        let mut facts = TrackFacts::new(kind);
        facts.id = self.track_id.map(|id| id.to_string());
        facts.language = self.language.clone();

        facts.duration = match (self.media_duration, self.timescale) {
            (Some(duration), Some(timescale)) => Some(duration as f64 / timescale as f64),
            _ => match (self.tkhd_duration, movie_timescale) {
                (Some(duration), Some(timescale)) if timescale > 0 => {
                    Some(duration as f64 / timescale as f64)
                }
                _ => None,
            },
        };

        if let Some(sizes) = self.sizes {
            facts.stream_size = sizes.total_bytes;
        }

        let Some(entry) = self.entry.as_ref() else {
            return Some(facts);
        };
        let code = fourcc_to_string(&entry.code);
        facts.codec_id = Some(code.trim_end().to_string());
        let esds_format = entry.esds.as_ref().and_then(|e| e.format);
        facts.format = match (entry.code, esds_format) {
            (code, Some(format)) if &code == b"mp4a" || &code == b"mp4v" => Some(format.to_string()),
            _ => format_for_fourcc(&entry.code)
                .map(str::to_string)
                .or_else(|| facts.codec_id.clone()),
        };
        facts.format_profile = entry
            .profile
            .clone()
            .or_else(|| entry.esds.as_ref().and_then(|e| e.profile.clone()));

        match kind {
            StreamKind::Video => self.finish_video(&mut facts, entry),
            StreamKind::Audio => {
                facts.channels = entry
                    .channels
                    .or_else(|| entry.esds.as_ref().and_then(|e| e.channels));
                facts.sample_rate = entry
                    .sample_rate
                    .or_else(|| entry.esds.as_ref().and_then(|e| e.sample_rate));
                if matches!(facts.format.as_deref(), Some("PCM" | "ALAC" | "FLAC")) {
                    facts.bit_depth = entry.sample_bits;
                }
            }
            _ => {}
        }

        facts.bit_rate = entry
            .avg_bit_rate
            .or_else(|| entry.esds.as_ref().and_then(|e| e.avg_bit_rate))
            .or_else(|| match (facts.stream_size, facts.duration) {
                (Some(bytes), Some(seconds)) if seconds > 0.0 => Some(bytes as f64 * 8.0 / seconds),
                _ => None,
            });
        Some(facts)
    }

    fn finish_video(&self, facts: &mut TrackFacts, entry: &SampleEntry) {
        facts.width = entry.width.or(self.tkhd_width.map(|w| w.round() as u32));
        facts.height = entry.height.or(self.tkhd_height.map(|h| h.round() as u32));

        if let (Some(width), Some(height)) = (facts.width, facts.height) {
            if height > 0 {
                let coded = width as f64 / height as f64;
                facts.display_aspect = match (entry.pixel_aspect, self.tkhd_width, self.tkhd_height) {
                    (Some(par), _, _) if (par - 1.0).abs() > f64::EPSILON => Some(coded * par),
                    (_, Some(tw), Some(th)) if th > 0.0 && ((tw / th) - coded).abs() > 0.01 => {
                        Some(tw / th)
                    }
                    _ => None,
                };
            }
        }

        let Some(timescale) = self.timescale else {
            return;
        };
        let Some(timing) = self.timing else {
            return;
        };
        match timing.walked {
            Some(walked) if walked.sample_count > 0 => {
                let span = if walked.total_delta > 0 {
                    walked.total_delta
                } else {
                    self.media_duration.unwrap_or(0)
                };
                if span > 0 {
                    facts.frame_rate =
                        Some(walked.sample_count as f64 * timescale as f64 / span as f64);
                }
                facts.frame_count = Some(walked.sample_count);
                facts.frame_rate_mode = Some(if walked.constant {
                    FrameRateMode::Constant
                } else {
                    FrameRateMode::Variable
                });
            }
            _ => {
                if let Some(delta) = timing.first_delta.filter(|d| *d > 0) {
                    debug!(timescale, delta, "coarse frame rate from first stts run");
                    facts.frame_rate = Some(timescale as f64 / delta as f64);
                }
            }
        }
    }
}

fn read_visual_entry<'a>(sample: &mut SampleEntry, mut cursor: &'a [u8]) -> ParseResult<&'a [u8]> {
    cursor.skip(2 + 2 + 12, "visual entry pre-defined")?;
    let width = cursor.read_u16("visual entry width")?;
    let height = cursor.read_u16("visual entry height")?;
    cursor.skip(4 + 4 + 4 + 2 + 32 + 2 + 2, "visual entry layout")?;
    sample.width = (width > 0).then_some(width as u32);
    sample.height = (height > 0).then_some(height as u32);
    Ok(cursor)
}

fn read_audio_entry<'a>(sample: &mut SampleEntry, mut cursor: &'a [u8]) -> ParseResult<&'a [u8]> {
    let version = cursor.read_u16("audio entry version")?;
    cursor.skip(2 + 4, "audio entry revision and vendor")?;
    let channels = cursor.read_u16("audio entry channels")? as u32;
    let sample_bits = cursor.read_u16("audio entry sample size")? as u32;
    cursor.skip(2 + 2, "audio entry compression")?;
    let rate = cursor.read_u32("audio entry sample rate")? as f64 / 65536.0;

    sample.channels = (channels > 0).then_some(channels);
    sample.sample_bits = (sample_bits > 0).then_some(sample_bits);
    sample.sample_rate = (rate > 0.0).then_some(rate);

    match version {
        1 => cursor.skip(16, "audio entry v1 extension")?,
        2 => {
            cursor.skip(4, "audio entry v2 struct size")?;
            let raw = cursor.read_u64("audio entry v2 sample rate")?;
            let channels = cursor.read_u32("audio entry v2 channels")?;
            cursor.skip(4, "audio entry v2 marker")?;
            let bits = cursor.read_u32("audio entry v2 bits per channel")?;
            cursor.skip(4 + 4 + 4, "audio entry v2 packet layout")?;

            let as_double = f64::from_bits(raw);
            let rate = if as_double.is_finite() && (1.0..=1_000_000.0).contains(&as_double) {
                as_double
            } else {
                raw as f64 / 4_294_967_296.0
            };
            sample.sample_rate = (rate > 0.0).then_some(rate);
            sample.channels = (channels > 0).then_some(channels);
            sample.sample_bits = (bits > 0).then_some(bits);
        }
        _ => {}
    }
    Ok(cursor)
}

/// Configuration boxes after the fixed part of a sample entry
fn read_entry_extensions(sample: &mut SampleEntry, data: &[u8], depth: usize) {
    let result = visit_children(data, depth, |kind, payload, depth| {
        match &kind {
            b"avcC" => sample.profile = Some(avc_profile(payload)?),
            b"hvcC" => sample.profile = Some(hevc_profile(payload)?),
            b"esds" => {
                let (_, _, body) = full_box(payload)?;
                sample.esds = Some(parse_esds(body)?);
            }
            b"btrt" => sample.avg_bit_rate = parse_btrt(payload)?,
            b"pasp" => sample.pixel_aspect = parse_pasp(payload)?,
            b"wave" => read_entry_extensions(sample, payload, depth),
            _ => {}
        }
        Ok(())
    });
    if let Err(error) = result {
        debug!(%error, "sample entry extensions skipped");
    }
}
