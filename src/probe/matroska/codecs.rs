//! Matroska `CodecID` lookup

/// Format name and optional profile for a Matroska codec identifier
pub fn lookup(codec_id: &str) -> (Option<&'static str>, Option<&'static str>) {
    let format = match codec_id {
        "V_MPEG4/ISO/AVC" => "AVC",
        "V_MPEGH/ISO/HEVC" => "HEVC",
        "V_MPEGI/ISO/VVC" => "VVC",
        "V_AV1" => "AV1",
        "V_VP8" => "VP8",
        "V_VP9" => "VP9",
        "V_MPEG1" | "V_MPEG2" => "MPEG Video",
        "V_MPEG4/ISO/SP" | "V_MPEG4/ISO/ASP" | "V_MPEG4/ISO/AP" => "MPEG-4 Visual",
        "V_MS/VFW/FOURCC" => "VfW",
        "V_THEORA" => "Theora",
        "V_PRORES" => "ProRes",
        "V_MJPEG" => "JPEG",
        "V_FFV1" => "FFV1",
        "A_AC3" => "AC-3",
        "A_EAC3" => "E-AC-3",
        "A_DTS" => "DTS",
        "A_TRUEHD" => "MLP FBA",
        "A_OPUS" => "Opus",
        "A_VORBIS" => "Vorbis",
        "A_FLAC" => "FLAC",
        "A_ALAC" => "ALAC",
        "A_PCM/INT/LIT" | "A_PCM/INT/BIG" | "A_PCM/FLOAT/IEEE" => "PCM",
        "A_MPEG/L1" | "A_MPEG/L2" | "A_MPEG/L3" => "MPEG Audio",
        "S_TEXT/UTF8" => "UTF-8",
        "S_TEXT/SSA" | "S_SSA" => "SSA",
        "S_TEXT/ASS" | "S_ASS" => "ASS",
        "S_TEXT/WEBVTT" => "WebVTT",
        "S_VOBSUB" => "VobSub",
        "S_HDMV/PGS" => "PGS",
        "S_DVBSUB" => "DVB Subtitle",
        other if other.starts_with("A_AAC") => "AAC",
        _ => return (None, None),
    };

    let profile = match codec_id {
        "A_MPEG/L1" => Some("Layer 1"),
        "A_MPEG/L2" => Some("Layer 2"),
        "A_MPEG/L3" => Some("Layer 3"),
        "A_AAC/MPEG4/MAIN" | "A_AAC/MPEG2/MAIN" => Some("Main"),
        "A_AAC/MPEG4/LC" | "A_AAC/MPEG2/LC" => Some("LC"),
        "A_AAC/MPEG4/LC/SBR" | "A_AAC/MPEG2/LC/SBR" => Some("HE-AAC"),
        "A_AAC/MPEG4/SSR" | "A_AAC/MPEG2/SSR" => Some("SSR"),
        "A_AAC/MPEG4/LTP" => Some("LTP"),
        "V_MPEG1" => Some("Version 1"),
        "V_MPEG2" => Some("Version 2"),
        _ => None,
    };
    (Some(format), profile)
}

/// Image format for an attachment MIME type, if it is an image
pub fn image_format(mime: &str) -> Option<String> {
    let subtype = mime.strip_prefix("image/")?;
    let format = match subtype {
        "jpeg" | "jpg" => "JPEG".to_string(),
        "png" => "PNG".to_string(),
        "gif" => "GIF".to_string(),
        "webp" => "WebP".to_string(),
        "bmp" => "BMP".to_string(),
        other => other.to_ascii_uppercase(),
    };
    Some(format)
}
