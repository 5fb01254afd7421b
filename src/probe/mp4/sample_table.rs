//! Sample table summaries (`stts`, `stsz`)
//!
//! The tables are run-length or per-sample lists whose walk cost grows with
//! the media length, so both readers honour the parse-speed budget.

use crate::domain::model::AnalyzeOptions;
use crate::probe::reader::{CheckedBuf, ParseResult};

/// Result of walking every `stts` run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkedTiming {
    pub sample_count: u64,
    pub total_delta: u64,
    /// Every sample shares one delta
    pub constant: bool,
}

/// Timing facts from `stts`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTiming {
    pub entry_count: u32,
    /// Delta of the first run; read without walking the table
    pub first_delta: Option<u32>,
    /// Present only when the table was walked
    pub walked: Option<WalkedTiming>,
}

/// Parse an `stts` body (after the full box header)
pub fn parse_stts(body: &[u8], options: &AnalyzeOptions) -> ParseResult<SampleTiming> {
    let mut cursor = body;
    let entry_count = cursor.read_u32("stts entry count")?;
    let mut timing = SampleTiming {
        entry_count,
        first_delta: None,
        walked: None,
    };
    if entry_count == 0 {
        return Ok(timing);
    }

    let mut first = cursor;
    first.skip(4, "stts sample count")?;
    timing.first_delta = Some(first.read_u32("stts sample delta")?);

    if !options.walks_tables() || entry_count as usize > options.table_entry_budget() {
        return Ok(timing);
    }

    let mut sample_count = 0u64;
    let mut total_delta = 0u64;
    let mut deltas = Vec::with_capacity(2);
    for index in 0..entry_count {
        let count = cursor.read_u32("stts sample count")?;
        let delta = cursor.read_u32("stts sample delta")?;
        sample_count += count as u64;
        total_delta += count as u64 * delta as u64;
        // A closing single-sample run often carries a different delta
        let trailing_single = index + 1 == entry_count && count == 1 && entry_count > 1;
        if !trailing_single && !deltas.contains(&delta) {
            deltas.push(delta);
        }
    }
    timing.walked = Some(WalkedTiming {
        sample_count,
        total_delta,
        constant: deltas.len() <= 1,
    });
    Ok(timing)
}

/// Size facts from `stsz`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSizes {
    pub sample_count: u32,
    /// Sum of sample sizes when known
    pub total_bytes: Option<u64>,
}

/// Parse an `stsz` body (after the full box header)
pub fn parse_stsz(body: &[u8], options: &AnalyzeOptions) -> ParseResult<SampleSizes> {
    let mut cursor = body;
    let sample_size = cursor.read_u32("stsz sample size")?;
    let sample_count = cursor.read_u32("stsz sample count")?;

    let total_bytes = if sample_size != 0 {
        Some(sample_size as u64 * sample_count as u64)
    } else if options.walks_tables() && sample_count as usize <= options.table_entry_budget() {
        let mut total = 0u64;
        for _ in 0..sample_count {
            total += cursor.read_u32("stsz entry")? as u64;
        }
        Some(total)
    } else {
        None
    };

    Ok(SampleSizes {
        sample_count,
        total_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stts(entries: &[(u32, u32)]) -> Vec<u8> {
        let mut body = (entries.len() as u32).to_be_bytes().to_vec();
        for (count, delta) in entries {
            body.extend_from_slice(&count.to_be_bytes());
            body.extend_from_slice(&delta.to_be_bytes());
        }
        body
    }

    fn options(parse_speed: f64) -> AnalyzeOptions {
        AnalyzeOptions::with_parse_speed(parse_speed).unwrap()
    }

    #[test]
    fn constant_rate_table() {
        let timing = parse_stts(&stts(&[(250, 512), (1, 300)]), &options(1.0)).unwrap();
        let walked = timing.walked.unwrap();
        assert_eq!(walked.sample_count, 251);
        assert_eq!(walked.total_delta, 250 * 512 + 300);
        assert!(walked.constant);
        assert_eq!(timing.first_delta, Some(512));
    }

    #[test]
    fn variable_rate_table() {
        let timing = parse_stts(&stts(&[(10, 1000), (10, 1001), (10, 1000)]), &options(1.0)).unwrap();
        assert!(!timing.walked.unwrap().constant);
    }

    #[test]
    fn zero_speed_reads_only_the_first_run() {
        let timing = parse_stts(&stts(&[(25, 1000), (25, 2000)]), &options(0.0)).unwrap();
        assert_eq!(timing.first_delta, Some(1000));
        assert!(timing.walked.is_none());
    }

    #[test]
    fn truncated_table_is_an_error() {
        let mut body = stts(&[(25, 1000), (25, 2000)]);
        body.truncate(12);
        assert!(parse_stts(&body, &options(1.0)).is_err());
    }

    #[test]
    fn constant_sample_size_needs_no_walk() {
        let mut body = 100u32.to_be_bytes().to_vec();
        body.extend_from_slice(&50u32.to_be_bytes());
        let sizes = parse_stsz(&body, &options(0.0)).unwrap();
        assert_eq!(sizes.total_bytes, Some(5000));
    }

    #[test]
    fn per_sample_sizes_are_walked_when_allowed() {
        let mut body = 0u32.to_be_bytes().to_vec();
        body.extend_from_slice(&3u32.to_be_bytes());
        for size in [10u32, 20, 30] {
            body.extend_from_slice(&size.to_be_bytes());
        }
        assert_eq!(parse_stsz(&body, &options(0.5)).unwrap().total_bytes, Some(60));
        assert_eq!(parse_stsz(&body, &options(0.0)).unwrap().total_bytes, None);
    }
}
