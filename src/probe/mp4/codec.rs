//! Sample entry codes and codec configuration records

use crate::probe::elementary::{aac_channels, aac_profile, aac_sample_rate};
use crate::probe::reader::{take_slice, BitReader, CheckedBuf, ParseError, ParseResult};

/// Human-readable format for a sample entry code
pub fn format_for_fourcc(code: &[u8; 4]) -> Option<&'static str> {
    let name = match code {
        b"avc1" | b"avc3" => "AVC",
        b"hvc1" | b"hev1" => "HEVC",
        b"av01" => "AV1",
        b"vp08" => "VP8",
        b"vp09" => "VP9",
        b"mp4v" => "MPEG-4 Visual",
        b"s263" | b"h263" => "H.263",
        b"jpeg" | b"mjpa" | b"mjpb" => "JPEG",
        b"apch" | b"apcn" | b"apcs" | b"apco" | b"ap4h" | b"ap4x" => "ProRes",
        b"mp4a" => "AAC",
        b".mp3" => "MPEG Audio",
        b"ac-3" => "AC-3",
        b"ec-3" => "E-AC-3",
        b"Opus" => "Opus",
        b"fLaC" => "FLAC",
        b"alac" => "ALAC",
        b"samr" => "AMR",
        b"sowt" | b"twos" | b"lpcm" | b"in24" | b"in32" | b"fl32" | b"fl64" | b"raw " => "PCM",
        b"tx3g" | b"text" => "Timed Text",
        b"wvtt" => "WebVTT",
        b"stpp" => "TTML",
        b"c608" => "EIA-608",
        b"c708" => "EIA-708",
        _ => return None,
    };
    Some(name)
}

fn decimal_level(value: u32, divisor: u32) -> String {
    let whole = value / divisor;
    let tenths = (value % divisor) * 10 / divisor;
    if tenths == 0 {
        whole.to_string()
    } else {
        format!("{}.{}", whole, tenths)
    }
}

/// Profile and level from an AVC decoder configuration record, e.g. `High@L4`
pub fn avc_profile(config: &[u8]) -> ParseResult<String> {
    let mut cursor = config;
    let version = cursor.read_u8("avcC version")?;
    if version != 1 {
        return Err(ParseError::malformed(
            "avcC",
            format!("configuration version {}", version),
        ));
    }
    let profile_idc = cursor.read_u8("avcC profile")?;
    cursor.skip(1, "avcC compatibility")?;
    let level_idc = cursor.read_u8("avcC level")?;

    let profile = match profile_idc {
        66 => "Baseline",
        77 => "Main",
        88 => "Extended",
        100 => "High",
        110 => "High 10",
        122 => "High 4:2:2",
        244 => "High 4:4:4 Predictive",
        44 => "CAVLC 4:4:4 Intra",
        other => return Ok(format!("{}@L{}", other, decimal_level(level_idc as u32, 10))),
    };
    Ok(format!("{}@L{}", profile, decimal_level(level_idc as u32, 10)))
}

/// Profile, level and tier from an HEVC decoder configuration record, e.g. `Main@L4@Main`
pub fn hevc_profile(config: &[u8]) -> ParseResult<String> {
    let mut cursor = config;
    cursor.skip(1, "hvcC version")?;
    let packed = cursor.read_u8("hvcC profile")?;
    cursor.skip(4 + 6, "hvcC flags")?;
    let level_idc = cursor.read_u8("hvcC level")?;

    let tier = if packed & 0x20 != 0 { "High" } else { "Main" };
    let profile = match packed & 0x1F {
        1 => "Main".to_string(),
        2 => "Main 10".to_string(),
        3 => "Main Still".to_string(),
        4 => "Format Range".to_string(),
        other => other.to_string(),
    };
    Ok(format!(
        "{}@L{}@{}",
        profile,
        decimal_level(level_idc as u32, 30),
        tier
    ))
}

/// Facts carried by an `esds` elementary stream descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EsdsInfo {
    pub format: Option<&'static str>,
    pub profile: Option<String>,
    pub avg_bit_rate: Option<f64>,
    pub channels: Option<u32>,
    pub sample_rate: Option<f64>,
}

fn read_descriptor<'a>(data: &mut &'a [u8]) -> ParseResult<(u8, &'a [u8])> {
    let tag = data.read_u8("descriptor tag")?;
    let mut len = 0usize;
    for _ in 0..4 {
        let byte = data.read_u8("descriptor length")?;
        len = (len << 7) | (byte & 0x7F) as usize;
        if byte & 0x80 == 0 {
            break;
        }
    }
    let body = take_slice(data, len, "descriptor")?;
    Ok((tag, body))
}

/// Parse an `esds` payload (after the full box header)
pub fn parse_esds(body: &[u8]) -> ParseResult<EsdsInfo> {
    let mut info = EsdsInfo::default();
    let mut cursor = body;
    let (tag, mut es) = read_descriptor(&mut cursor)?;
    if tag != 0x03 {
        return Err(ParseError::malformed(
            "esds",
            format!("expected ES descriptor, found tag {}", tag),
        ));
    }
    es.skip(2, "ES id")?;
    let flags = es.read_u8("ES flags")?;
    if flags & 0x80 != 0 {
        es.skip(2, "depends on ES id")?;
    }
    if flags & 0x40 != 0 {
        let url_len = es.read_u8("URL length")? as usize;
        es.skip(url_len, "URL")?;
    }
    if flags & 0x20 != 0 {
        es.skip(2, "OCR ES id")?;
    }

    while !es.is_empty() {
        let (tag, mut config) = read_descriptor(&mut es)?;
        if tag != 0x04 {
            continue;
        }
        let object_type = config.read_u8("object type")?;
        config.skip(1 + 3 + 4, "decoder config")?;
        let avg = config.read_u32("average bit rate")?;
        info.avg_bit_rate = (avg > 0).then_some(avg as f64);
        info.format = match object_type {
            0x40 | 0x66..=0x68 => Some("AAC"),
            0x69 | 0x6B => Some("MPEG Audio"),
            0x20 => Some("MPEG-4 Visual"),
            0x21 => Some("AVC"),
            0xA5 => Some("AC-3"),
            0xA6 => Some("E-AC-3"),
            _ => None,
        };
        if object_type == 0x40 {
            if let Ok((0x05, specific)) = read_descriptor(&mut config) {
                read_audio_specific_config(specific, &mut info);
            }
        }
        break;
    }
    Ok(info)
}

fn read_audio_specific_config(data: &[u8], info: &mut EsdsInfo) {
    let mut bits = BitReader::new(data);
    let Ok(mut object_type) = bits.read_bits(5) else {
        return;
    };
    if object_type == 31 {
        match bits.read_bits(6) {
            Ok(extended) => object_type = 32 + extended,
            Err(_) => return,
        }
    }
    let rate = match bits.read_bits(4) {
        Ok(0x0F) => bits.read_bits(24).ok().map(|hz| hz as f64),
        Ok(index) => aac_sample_rate(index as usize),
        Err(_) => None,
    };
    let channels = bits.read_bits(4).ok().and_then(aac_channels);
    info.profile = aac_profile(object_type).map(str::to_string);
    info.sample_rate = rate;
    info.channels = channels;
}

/// Average bit rate from a `btrt` payload
pub fn parse_btrt(data: &[u8]) -> ParseResult<Option<f64>> {
    let mut cursor = data;
    cursor.skip(4 + 4, "btrt buffer and max")?;
    let avg = cursor.read_u32("btrt average")?;
    Ok((avg > 0).then_some(avg as f64))
}

/// Pixel aspect ratio from a `pasp` payload
pub fn parse_pasp(data: &[u8]) -> ParseResult<Option<f64>> {
    let mut cursor = data;
    let h_spacing = cursor.read_u32("pasp h spacing")?;
    let v_spacing = cursor.read_u32("pasp v spacing")?;
    if h_spacing == 0 || v_spacing == 0 {
        return Ok(None);
    }
    Ok(Some(h_spacing as f64 / v_spacing as f64))
}
