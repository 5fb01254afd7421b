//! In-memory readers for the bounded level-1 elements of a Segment

use crate::domain::model::StreamKind;
use crate::probe::matroska::codecs;
use crate::probe::matroska::ebml::{
    elements, read_float, read_int, read_string, read_uint, read_vint, visit_elements,
};
use crate::probe::matroska::ids;
use crate::probe::mp4::codec::{avc_profile, hevc_profile};
use crate::probe::reader::{CheckedBuf, ParseResult};
use crate::probe::{FrameRateMode, MenuFacts, TrackFacts};
use crate::utils::time::matroska_timestamp;

/// Default nanoseconds per timestamp tick
pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

/// Level of the children of a level-1 element
const CHILD_DEPTH: usize = 2;

/// Segment `Info`
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub timestamp_scale: u64,
    /// In timestamp ticks
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
    pub date_utc: Option<String>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            duration: None,
            title: None,
            muxing_app: None,
            writing_app: None,
            date_utc: None,
        }
    }
}

impl SegmentInfo {
    /// `Duration * TimestampScale / 1e9`
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration
            .filter(|ticks| *ticks > 0.0)
            .map(|ticks| ticks * self.timestamp_scale as f64 / 1e9)
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn parse_info(payload: &[u8]) -> ParseResult<SegmentInfo> {
    let mut info = SegmentInfo::default();
    visit_elements(payload, CHILD_DEPTH, |id, data, _| {
        match id {
            ids::TIMESTAMP_SCALE => {
                let scale = read_uint(data)?;
                if scale > 0 {
                    info.timestamp_scale = scale;
                }
            }
            ids::DURATION => info.duration = Some(read_float(data)?),
            ids::DATE_UTC => info.date_utc = matroska_timestamp(read_int(data)?),
            ids::TITLE => info.title = non_empty(read_string(data)),
            ids::MUXING_APP => info.muxing_app = non_empty(read_string(data)),
            ids::WRITING_APP => info.writing_app = non_empty(read_string(data)),
            _ => {}
        }
        Ok(())
    })?;
    Ok(info)
}

/// A track together with the UID that tags refer to
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub uid: Option<u64>,
    pub facts: TrackFacts,
}

#[derive(Debug, Default)]
struct RawTrack {
    number: Option<u64>,
    uid: Option<u64>,
    track_type: Option<u64>,
    flag_default: Option<bool>,
    flag_forced: Option<bool>,
    default_duration: Option<u64>,
    name: Option<String>,
    language: Option<String>,
    language_bcp47: Option<String>,
    codec_id: Option<String>,
    codec_private: Option<Vec<u8>>,
    pixel_width: Option<u64>,
    pixel_height: Option<u64>,
    display_width: Option<u64>,
    display_height: Option<u64>,
    interlaced: Option<u64>,
    sampling: Option<f64>,
    output_sampling: Option<f64>,
    channels: Option<u64>,
    bit_depth: Option<u64>,
}

impl RawTrack {
    fn read(&mut self, id: u32, data: &[u8], depth: usize) -> ParseResult<()> {
        match id {
            ids::TRACK_NUMBER => self.number = Some(read_uint(data)?),
            ids::TRACK_UID => self.uid = Some(read_uint(data)?),
            ids::TRACK_TYPE => self.track_type = Some(read_uint(data)?),
            ids::FLAG_DEFAULT => self.flag_default = Some(read_uint(data)? != 0),
            ids::FLAG_FORCED => self.flag_forced = Some(read_uint(data)? != 0),
            ids::DEFAULT_DURATION => self.default_duration = Some(read_uint(data)?),
            ids::NAME => self.name = non_empty(read_string(data)),
            ids::LANGUAGE => self.language = non_empty(read_string(data)),
            ids::LANGUAGE_BCP47 => self.language_bcp47 = non_empty(read_string(data)),
            ids::CODEC_ID => self.codec_id = non_empty(read_string(data)),
            ids::CODEC_PRIVATE => self.codec_private = Some(data.to_vec()),
            ids::PIXEL_WIDTH => self.pixel_width = Some(read_uint(data)?),
            ids::PIXEL_HEIGHT => self.pixel_height = Some(read_uint(data)?),
            ids::DISPLAY_WIDTH => self.display_width = Some(read_uint(data)?),
            ids::DISPLAY_HEIGHT => self.display_height = Some(read_uint(data)?),
            ids::FLAG_INTERLACED => self.interlaced = Some(read_uint(data)?),
            ids::SAMPLING_FREQUENCY => self.sampling = Some(read_float(data)?),
            ids::OUTPUT_SAMPLING_FREQUENCY => self.output_sampling = Some(read_float(data)?),
            ids::CHANNELS => self.channels = Some(read_uint(data)?),
            ids::BIT_DEPTH => self.bit_depth = Some(read_uint(data)?),
            ids::VIDEO | ids::AUDIO => {
                visit_elements(data, depth, |id, data, depth| self.read(id, data, depth))?
            }
            _ => {}
        }
        Ok(())
    }

    fn into_entry(self) -> Option<TrackEntry> {
        let kind = match self.track_type? {
            1 => StreamKind::Video,
            2 => StreamKind::Audio,
            17 => StreamKind::Text,
            _ => return None,
        };
        let mut facts = TrackFacts::new(kind);
        facts.id = self.number.map(|n| n.to_string());
        facts.title = self.name;
        facts.language = self
            .language_bcp47
            .or(self.language)
            .filter(|lang| lang != "und");
        facts.default = Some(self.flag_default.unwrap_or(true));
        facts.forced = Some(self.flag_forced.unwrap_or(false));

        if let Some(codec_id) = &self.codec_id {
            let (format, profile) = codecs::lookup(codec_id);
            facts.format = Some(format.map_or_else(|| codec_id.clone(), str::to_string));
            facts.format_profile = profile.map(str::to_string);
            let private_profile = match (format, self.codec_private.as_deref()) {
                (Some("AVC"), Some(private)) => avc_profile(private).ok(),
                (Some("HEVC"), Some(private)) => hevc_profile(private).ok(),
                _ => None,
            };
            if private_profile.is_some() {
                facts.format_profile = private_profile;
            }
        }
        facts.codec_id = self.codec_id;

        match kind {
            StreamKind::Video => {
                facts.width = self.pixel_width.map(|w| w as u32);
                facts.height = self.pixel_height.map(|h| h as u32);
                if let (Some(dw), Some(dh)) = (self.display_width, self.display_height) {
                    if dh > 0 && (facts.width, facts.height) != (Some(dw as u32), Some(dh as u32)) {
                        facts.display_aspect = Some(dw as f64 / dh as f64);
                    }
                }
                facts.scan_type = match self.interlaced {
                    Some(1) => Some("Interlaced".to_string()),
                    Some(2) => Some("Progressive".to_string()),
                    _ => None,
                };
                if let Some(nanos) = self.default_duration.filter(|d| *d > 0) {
                    facts.frame_rate = Some(1e9 / nanos as f64);
                    facts.frame_rate_mode = Some(FrameRateMode::Constant);
                }
            }
            StreamKind::Audio => {
                facts.sample_rate = self.output_sampling.or(self.sampling).or(Some(8000.0));
                facts.channels = Some(self.channels.unwrap_or(1) as u32);
                facts.bit_depth = self.bit_depth.map(|b| b as u32);
            }
            _ => {}
        }

        Some(TrackEntry {
            uid: self.uid,
            facts,
        })
    }
}

pub fn parse_tracks(payload: &[u8]) -> ParseResult<Vec<TrackEntry>> {
    let mut tracks = Vec::new();
    visit_elements(payload, CHILD_DEPTH, |id, data, depth| {
        if id == ids::TRACK_ENTRY {
            let mut raw = RawTrack::default();
            visit_elements(data, depth, |id, data, depth| raw.read(id, data, depth))?;
            tracks.extend(raw.into_entry());
        }
        Ok(())
    })?;
    Ok(tracks)
}

/// One `SimpleTag`, bound to a track UID or to the whole segment
#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub track_uid: Option<u64>,
    pub name: String,
    pub value: String,
}

impl TagEntry {
    /// Tag name without a language suffix (`BPS-eng` becomes `BPS`)
    pub fn base_name(&self) -> &str {
        self.name.split('-').next().unwrap_or(&self.name)
    }
}

pub fn parse_tags(payload: &[u8]) -> ParseResult<Vec<TagEntry>> {
    let mut entries = Vec::new();
    visit_elements(payload, CHILD_DEPTH, |id, data, depth| {
        if id != ids::TAG {
            return Ok(());
        }
        let mut uids = Vec::new();
        let mut simple = Vec::new();
        visit_elements(data, depth, |id, data, depth| {
            match id {
                ids::TARGETS => visit_elements(data, depth, |id, data, _| {
                    if id == ids::TAG_TRACK_UID {
                        let uid = read_uint(data)?;
                        if uid != 0 {
                            uids.push(uid);
                        }
                    }
                    Ok(())
                })?,
                ids::SIMPLE_TAG => {
                    let mut name = None;
                    let mut value = None;
                    visit_elements(data, depth, |id, data, _| {
                        match id {
                            ids::TAG_NAME => name = Some(read_string(data)),
                            ids::TAG_STRING => value = Some(read_string(data)),
                            _ => {}
                        }
                        Ok(())
                    })?;
                    if let (Some(name), Some(value)) = (name, value) {
                        simple.push((name, value));
                    }
                }
                _ => {}
            }
            Ok(())
        })?;

        for (name, value) in simple {
            if uids.is_empty() {
                entries.push(TagEntry {
                    track_uid: None,
                    name,
                    value,
                });
            } else {
                for uid in &uids {
                    entries.push(TagEntry {
                        track_uid: Some(*uid),
                        name: name.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    })?;
    Ok(entries)
}

pub fn parse_chapters(payload: &[u8]) -> ParseResult<Vec<MenuFacts>> {
    let mut menus = Vec::new();
    visit_elements(payload, CHILD_DEPTH, |id, data, depth| {
        if id != ids::EDITION_ENTRY {
            return Ok(());
        }
        let mut menu = MenuFacts::default();
        visit_elements(data, depth, |id, data, depth| {
            if id != ids::CHAPTER_ATOM {
                return Ok(());
            }
            let mut start = None;
            let mut title = None;
            visit_elements(data, depth, |id, data, depth| {
                match id {
                    ids::CHAPTER_TIME_START => start = Some(read_uint(data)? as f64 / 1e9),
                    ids::CHAPTER_DISPLAY if title.is_none() => {
                        visit_elements(data, depth, |id, data, _| {
                            if id == ids::CHAP_STRING {
                                title = non_empty(read_string(data));
                            }
                            Ok(())
                        })?
                    }
                    _ => {}
                }
                Ok(())
            })?;
            if let Some(start) = start {
                menu.chapters.push((start, title.unwrap_or_default()));
            }
            Ok(())
        })?;
        if !menu.chapters.is_empty() {
            menu.chapters
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            menus.push(menu);
        }
        Ok(())
    })?;
    Ok(menus)
}

/// An attached file; only its size is kept, never its data
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: Option<String>,
    pub mime: Option<String>,
    pub size: u64,
}

pub fn parse_attachments(payload: &[u8]) -> ParseResult<Vec<Attachment>> {
    let mut attachments = Vec::new();
    visit_elements(payload, CHILD_DEPTH, |id, data, depth| {
        if id != ids::ATTACHED_FILE {
            return Ok(());
        }
        let mut attachment = Attachment {
            name: None,
            mime: None,
            size: 0,
        };
        visit_elements(data, depth, |id, data, _| {
            match id {
                ids::FILE_NAME => attachment.name = non_empty(read_string(data)),
                ids::FILE_MIME_TYPE => attachment.mime = non_empty(read_string(data)),
                ids::FILE_DATA => attachment.size = data.len() as u64,
                _ => {}
            }
            Ok(())
        })?;
        attachments.push(attachment);
        Ok(())
    })?;
    Ok(attachments)
}

/// Cluster timestamp and the latest block time inside it, in ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterTimes {
    pub timestamp: Option<u64>,
    pub max_block: Option<i64>,
}

/// Read cluster timing from a (possibly partial) cluster payload
pub fn cluster_times(payload: &[u8]) -> ClusterTimes {
    let mut times = ClusterTimes::default();
    let mut observe = |block: &[u8]| {
        if let Ok(relative) = block_timecode(block) {
            times.max_block = Some(times.max_block.map_or(relative, |m| m.max(relative)));
        }
    };
    let mut timestamp = None;
    for element in elements(payload) {
        let Ok((id, data)) = element else {
            break;
        };
        match id {
            ids::CLUSTER_TIMESTAMP => timestamp = read_uint(data).ok(),
            ids::SIMPLE_BLOCK => observe(data),
            ids::BLOCK_GROUP => {
                for child in elements(data).flatten() {
                    if child.0 == ids::BLOCK {
                        observe(child.1);
                    }
                }
            }
            _ => {}
        }
    }
    times.timestamp = timestamp;
    times
}

fn block_timecode(block: &[u8]) -> ParseResult<i64> {
    let mut cursor = block;
    read_vint(&mut cursor, 8, "block track number")?;
    Ok(cursor.read_u16("block timecode")? as i16 as i64)
}
