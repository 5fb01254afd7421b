//! Matroska-family (Matroska, WebM) parser
//!
//! The Segment's level-1 elements are visited by seeking from header to
//! header. Metadata elements (`Info`, `Tracks`, `Tags`, `Chapters`,
//! `Attachments`) are bounded and read into memory; clusters are skipped
//! unless the duration has to be estimated from block timestamps.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::domain::model::{AnalyzeOptions, StreamKind};
use crate::probe::reader::ParseResult;
use crate::probe::{ContainerFacts, MenuFacts, TrackFacts};
use crate::utils::time::TimeParser;

pub mod codecs;
pub mod ebml;
pub mod ids;
pub mod segment;

use ebml::{read_header, read_string, read_uint, visit_elements, ElementHeader};
use segment::{Attachment, SegmentInfo, TagEntry, TrackEntry};

/// Largest metadata element read into memory
const METADATA_LIMIT: u64 = 64 << 20;

/// Largest EBML header read
const EBML_HEADER_LIMIT: u64 = 4096;

/// Bytes read from the first cluster to find its timestamp
const CLUSTER_PEEK: u64 = 4096;

/// Widest element header: 4-byte ID and 8-byte size
const MAX_HEADER_LEN: u64 = 12;

/// Parse a Matroska-family file into container facts
pub fn parse<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
    options: &AnalyzeOptions,
) -> io::Result<ContainerFacts> {
    let mut walker = Walker { reader, file_size };
    let mut facts = ContainerFacts::new("Matroska");

    let header = match walker.header_at(0)? {
        Ok(header) if header.id == ids::EBML => header,
        Ok(header) => {
            debug!(id = header.id, "first element is not an EBML header");
            return Ok(facts);
        }
        Err(error) => {
            debug!(%error, "unreadable EBML header");
            return Ok(facts);
        }
    };
    let ebml_start = header.header_len as u64;
    let ebml_len = header.size.unwrap_or(0);
    let payload = walker.read_at(ebml_start, ebml_len.min(EBML_HEADER_LIMIT))?;
    if let Err(error) = read_ebml_header(&payload, &mut facts) {
        debug!(%error, "EBML header partially read");
    }

    let Some((segment_start, segment_end)) = walker.find_segment(ebml_start + ebml_len)? else {
        debug!("no Segment element found");
        return Ok(facts);
    };

    let mut scan = SegmentScan::default();
    scan.walk(&mut walker, segment_start, segment_end)?;

    let info = scan.info.take().unwrap_or_default();
    facts.duration = info.duration_seconds();
    if facts.duration.is_none() && options.walks_tables() {
        facts.duration = scan.estimate_duration(&mut walker, info.timestamp_scale)?;
    }
    facts.title = info.title.clone();
    facts.writing_library = info.muxing_app.clone();
    facts.writing_application = info.writing_app.clone();
    facts.encoded_date = info.date_utc.clone();

    scan.finish(&mut facts);
    Ok(facts)
}

fn read_ebml_header(payload: &[u8], facts: &mut ContainerFacts) -> ParseResult<()> {
    visit_elements(payload, 1, |id, data, _| {
        match id {
            ids::DOC_TYPE => {
                if read_string(data).eq_ignore_ascii_case("webm") {
                    facts.format = Some("WebM".to_string());
                }
            }
            ids::DOC_TYPE_VERSION => {
                facts.format_version = Some(format!("Version {}", read_uint(data)?));
            }
            _ => {}
        }
        Ok(())
    })
}

/// Seek-based access to element headers and payloads
struct Walker<'r, R> {
    reader: &'r mut R,
    file_size: u64,
}

impl<R: Read + Seek> Walker<'_, R> {
    /// Read up to `len` bytes at `position`, clamped to the end of the file
    fn read_at(&mut self, position: u64, len: u64) -> io::Result<Vec<u8>> {
        let len = len.min(self.file_size.saturating_sub(position));
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buf = Vec::with_capacity(len as usize);
        self.reader.by_ref().take(len).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn header_at(&mut self, position: u64) -> io::Result<ParseResult<ElementHeader>> {
        let bytes = self.read_at(position, MAX_HEADER_LEN)?;
        Ok(read_header(&mut &bytes[..]))
    }

    /// Locate the Segment's data range among the top-level elements
    fn find_segment(&mut self, mut position: u64) -> io::Result<Option<(u64, u64)>> {
        while position < self.file_size {
            let header = match self.header_at(position)? {
                Ok(header) => header,
                Err(error) => {
                    debug!(position, %error, "unreadable top-level element");
                    return Ok(None);
                }
            };
            let data_start = position + header.header_len as u64;
            match (header.id, header.size) {
                (ids::SEGMENT, Some(size)) => {
                    return Ok(Some((data_start, data_start.saturating_add(size))))
                }
                (ids::SEGMENT, None) => return Ok(Some((data_start, self.file_size))),
                (_, Some(size)) => position = data_start.saturating_add(size),
                (_, None) => return Ok(None),
            }
        }
        Ok(None)
    }

    /// End of an unknown-size element at `level` whose data starts at `start`
    ///
    /// Children are skipped until an ID of the same or a higher level shows up.
    fn unknown_end(&mut self, start: u64, limit: u64, level: usize) -> io::Result<u64> {
        let mut position = start;
        while position < limit {
            let header = match self.header_at(position)? {
                Ok(header) => header,
                Err(_) => return Ok(limit),
            };
            if ids::level(header.id).is_some_and(|l| l <= level) {
                return Ok(position);
            }
            let data_start = position + header.header_len as u64;
            position = match header.size {
                Some(size) => data_start.saturating_add(size),
                None if level + 1 < ebml::MAX_DEPTH => {
                    self.unknown_end(data_start, limit, level + 1)?
                }
                None => return Ok(limit),
            };
        }
        Ok(limit.min(position))
    }
}

/// State collected while walking a Segment
#[derive(Debug, Default)]
struct SegmentScan {
    info: Option<SegmentInfo>,
    tracks: Vec<TrackEntry>,
    tags: Vec<TagEntry>,
    menus: Vec<MenuFacts>,
    attachments: Vec<Attachment>,
    /// Data ranges of the first and last clusters
    first_cluster: Option<(u64, u64)>,
    last_cluster: Option<(u64, u64)>,
}

impl SegmentScan {
    fn walk<R: Read + Seek>(
        &mut self,
        walker: &mut Walker<'_, R>,
        segment_start: u64,
        segment_end: u64,
    ) -> io::Result<()> {
        let mut position = segment_start;
        while position < segment_end.min(walker.file_size) {
            let header = match walker.header_at(position)? {
                Ok(header) => header,
                Err(error) => {
                    debug!(position, %error, "segment walk stopped");
                    break;
                }
            };
            let data_start = position + header.header_len as u64;
            let data_end = match header.size {
                Some(size) => data_start.saturating_add(size),
                None => {
                    let level = ids::level(header.id).unwrap_or(1);
                    walker.unknown_end(data_start, segment_end.min(walker.file_size), level)?
                }
            }
            // An unknown-size scan may stop before the header it started from
            .max(data_start);
            let truncated = data_end > walker.file_size;

            match header.id {
                ids::CLUSTER => {
                    let range = (data_start, data_end.min(walker.file_size));
                    self.first_cluster.get_or_insert(range);
                    self.last_cluster = Some(range);
                }
                ids::INFO | ids::TRACKS | ids::TAGS | ids::CHAPTERS | ids::ATTACHMENTS => {
                    let len = data_end.min(walker.file_size).saturating_sub(data_start);
                    if truncated {
                        debug!(
                            id = header.id,
                            available = len,
                            "truncated element, reading its complete children"
                        );
                    }
                    if len > METADATA_LIMIT && !truncated {
                        warn!(id = header.id, size = len, "metadata element too large to load");
                    } else {
                        let payload = walker.read_at(data_start, len.min(METADATA_LIMIT))?;
                        if let Err(error) = self.apply(header.id, &payload) {
                            debug!(id = header.id, %error, "element skipped");
                        }
                    }
                }
                _ => {}
            }

            if truncated {
                break;
            }
            position = data_end;
        }
        Ok(())
    }

    fn apply(&mut self, id: u32, payload: &[u8]) -> ParseResult<()> {
        match id {
            ids::INFO => self.info = Some(segment::parse_info(payload)?),
            ids::TRACKS => self.tracks.extend(segment::parse_tracks(payload)?),
            ids::TAGS => self.tags.extend(segment::parse_tags(payload)?),
            ids::CHAPTERS => self.menus.extend(segment::parse_chapters(payload)?),
            ids::ATTACHMENTS => self.attachments.extend(segment::parse_attachments(payload)?),
            _ => {}
        }
        Ok(())
    }

    /// Duration from the first cluster timestamp to the last block timestamp
    fn estimate_duration<R: Read + Seek>(
        &self,
        walker: &mut Walker<'_, R>,
        timestamp_scale: u64,
    ) -> io::Result<Option<f64>> {
        let (Some(first), Some(last)) = (self.first_cluster, self.last_cluster) else {
            return Ok(None);
        };
        let head = walker.read_at(first.0, first.1.saturating_sub(first.0).min(CLUSTER_PEEK))?;
        let Some(start) = segment::cluster_times(&head).timestamp else {
            return Ok(None);
        };
        let tail = walker.read_at(last.0, last.1.saturating_sub(last.0).min(METADATA_LIMIT))?;
        let times = segment::cluster_times(&tail);
        let Some(last_timestamp) = times.timestamp else {
            return Ok(None);
        };
        let end = last_timestamp as i64 + times.max_block.unwrap_or(0);
        let ticks = end - start as i64;
        debug!(start, end, "duration estimated from cluster timestamps");
        Ok((ticks > 0).then(|| ticks as f64 * timestamp_scale as f64 / 1e9))
    }

    /// Bind tags to tracks and move everything into the facts
    fn finish(self, facts: &mut ContainerFacts) {
        let parser = TimeParser::new();
        let mut tracks = self.tracks;

        for tag in &self.tags {
            let Some(uid) = tag.track_uid else {
                if tag.base_name() == "TITLE" && facts.title.is_none() {
                    facts.title = Some(tag.value.clone());
                }
                continue;
            };
            let Some(entry) = tracks.iter_mut().find(|t| t.uid == Some(uid)) else {
                continue;
            };
            let track = &mut entry.facts;
            match tag.base_name() {
                "BPS" => track.bit_rate = tag.value.trim().parse().ok(),
                "DURATION" => track.duration = parser.parse_time(&tag.value),
                "NUMBER_OF_FRAMES" => track.frame_count = tag.value.trim().parse().ok(),
                "NUMBER_OF_BYTES" => track.stream_size = tag.value.trim().parse().ok(),
                _ => {}
            }
        }
        facts.tracks.extend(tracks.into_iter().map(|entry| entry.facts));

        for attachment in self.attachments {
            match attachment.mime.as_deref().and_then(codecs::image_format) {
                Some(format) => {
                    let mut image = TrackFacts::new(StreamKind::Image);
                    image.format = Some(format);
                    image.codec_id = attachment.mime.clone();
                    image.title = attachment.name.clone();
                    image.stream_size = Some(attachment.size);
                    facts.tracks.push(image);
                }
                None => facts.attachments.extend(attachment.name),
            }
        }
        facts.menus.extend(self.menus);
    }
}
