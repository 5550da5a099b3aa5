//! Shard reader
//!
//! Splits the data file into contiguous line ranges, one per worker, and
//! aggregates a single range into an [`HourLightMatrix`].
//!
//! # Partitioning
//!
//! ```text
//! lines_per_shard = total / shard_count
//! start           = shard * lines_per_shard
//! end             = total                      (last shard)
//!                   start + lines_per_shard    (others)
//! ```
//!
//! The last shard absorbs the remainder, so the ranges cover `[0, total)`
//! exactly once.

use super::{HourLightMatrix, TrafficRecord};
use crate::config::TrafficConfig;
use crate::error::PipelineError;
use crate::Result;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Half-open line range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    pub start: usize,
    pub end: usize,
}

impl ShardRange {
    /// Range of shard `shard` out of `shard_count` over `total_lines` lines
    pub fn for_shard(shard: usize, shard_count: usize, total_lines: usize) -> Result<Self> {
        if shard_count == 0 {
            anyhow::bail!("shard_count must be at least 1");
        }
        if shard >= shard_count {
            anyhow::bail!("shard {} out of range for {} shards", shard, shard_count);
        }

        let lines_per_shard = total_lines / shard_count;
        let start = shard * lines_per_shard;
        let end = if shard == shard_count - 1 {
            total_lines
        } else {
            start + lines_per_shard
        };

        Ok(Self { start, end })
    }

    /// Every range for `shard_count` shards, in shard order
    pub fn partition(shard_count: usize, total_lines: usize) -> Result<Vec<Self>> {
        (0..shard_count)
            .map(|shard| Self::for_shard(shard, shard_count, total_lines))
            .collect()
    }
}

/// Outcome of reading one shard
#[derive(Debug)]
pub struct ShardRead {
    pub range: ShardRange,
    pub matrix: HourLightMatrix,
    /// Lines in range that parsed and were accumulated
    pub records: usize,
    /// Set when the source could not be read; `matrix` is then all zeros
    pub source_error: Option<PipelineError>,
}

impl ShardRead {
    pub fn is_degraded(&self) -> bool {
        self.source_error.is_some()
    }
}

/// Read shard `shard` of `shard_count` from the data file at `source`
///
/// An unreadable file does not fail the call: the result carries a zero
/// matrix and [`PipelineError::SourceUnavailable`] for the caller to report.
pub fn read_shard(
    shard: usize,
    shard_count: usize,
    source: &Path,
    traffic: &TrafficConfig,
) -> Result<ShardRead> {
    let range = ShardRange::for_shard(shard, shard_count, traffic.total_records())?;

    let opened = File::open(source).map(BufReader::new);
    let aggregated = opened.and_then(|reader| aggregate_range(reader, range, traffic));

    Ok(match aggregated {
        Ok((matrix, records)) => ShardRead {
            range,
            matrix,
            records,
            source_error: None,
        },
        Err(e) => ShardRead {
            range,
            matrix: HourLightMatrix::zeroed(traffic),
            records: 0,
            source_error: Some(PipelineError::SourceUnavailable {
                path: source.to_path_buf(),
                source: e,
            }),
        },
    })
}

/// Read shard `shard` of `shard_count` from an already-open record stream
pub fn read_shard_from<R: BufRead>(
    shard: usize,
    shard_count: usize,
    reader: R,
    traffic: &TrafficConfig,
) -> Result<ShardRead> {
    let range = ShardRange::for_shard(shard, shard_count, traffic.total_records())?;
    let (matrix, records) = aggregate_range(reader, range, traffic)?;

    Ok(ShardRead {
        range,
        matrix,
        records,
        source_error: None,
    })
}

/// Accumulate every well-formed line in `range`
///
/// Lines are split on raw bytes and only lines inside the range are decoded.
/// Malformed lines, including invalid UTF-8, are skipped without logging. Only
/// a read error discards everything accumulated so far.
fn aggregate_range<R: BufRead>(
    reader: R,
    range: ShardRange,
    traffic: &TrafficConfig,
) -> io::Result<(HourLightMatrix, usize)> {
    let mut matrix = HourLightMatrix::zeroed(traffic);
    let mut records = 0;

    for (line_num, line) in reader.split(b'\n').enumerate() {
        if line_num >= range.end {
            break;
        }
        let line = line?;
        if line_num < range.start {
            continue;
        }

        let record = std::str::from_utf8(&line)
            .ok()
            .and_then(|text| TrafficRecord::parse(text, traffic).ok());

        if let Some(record) = record {
            matrix.add(&record);
            records += 1;
        }
    }

    Ok((matrix, records))
}
