//! Per-block records, running totals and the post-pass summary.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::{Result, ScanError};
use crate::plan::Direction;

pub const MB: f64 = 1024.0 * 1024.0;
pub const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Fractions of the median rate below which blocks are reported as slow.
pub const SLOW_BLOCK_PERCENTILES: [f64; 4] = [50.0, 20.0, 10.0, 5.0];

/// Time, bytes and errors for one block during one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockRecord {
    /// Seconds spent in successful I/O.
    pub time: f64,
    pub bytes: u64,
    pub errors: u64,
}

impl BlockRecord {
    pub fn rate_mb(&self) -> f64 {
        if self.time > 0.0 {
            self.bytes as f64 / self.time / MB
        } else {
            0.0
        }
    }
}

/// Accumulated transfer in one direction over the lifetime of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub time: f64,
    pub bytes: u64,
    pub errors: u64,
}

impl Totals {
    /// Bytes per second, 0 until something has been transferred.
    pub fn bytes_per_second(&self) -> f64 {
        if self.time > 0.0 && self.bytes > 0 {
            self.bytes as f64 / self.time
        } else {
            0.0
        }
    }

    pub fn record(&mut self, time: f64, bytes: u64) {
        self.time += time;
        self.bytes += bytes;
    }
}

/// Read and write totals. These only grow.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTotals {
    pub read: Totals,
    pub write: Totals,
}

impl RunTotals {
    pub fn get(&self, direction: Direction) -> &Totals {
        match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut Totals {
        match direction {
            Direction::Read => &mut self.read,
            Direction::Write => &mut self.write,
        }
    }

    pub fn errors(&self) -> u64 {
        self.read.errors + self.write.errors
    }
}

/// Blocks slower than `percent` of the median rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowBlocks {
    pub percent: f64,
    pub count: usize,
}

impl fmt::Display for SlowBlocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number of blocks slower than {:.0}% of median: {}", self.percent, self.count)
    }
}

/// Rates are in MB/s.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    pub index: usize,
    pub direction: Direction,
    pub pattern: Option<u8>,
    pub errors: u64,
    pub min: f64,
    pub avg: f64,
    pub med: f64,
    pub max: f64,
    /// Only thresholds with at least one slow block.
    pub slow_blocks: Vec<SlowBlocks>,
}

impl PassSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "pass": self.index,
            "direction": self.direction.as_str(),
            "pattern": self.pattern,
            "errors": self.errors,
            "min_mb_s": self.min,
            "avg_mb_s": self.avg,
            "med_mb_s": self.med,
            "max_mb_s": self.max,
            "slow_blocks": self
                .slow_blocks
                .iter()
                .map(|s| json!({ "percent": s.percent, "count": s.count }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Figures for one completed pass. `records` keeps its index order; the
/// sort happens on a copy of the rates.
pub fn summarize(
    index: usize,
    direction: Direction,
    pattern: Option<u8>,
    records: &[BlockRecord],
    size_bytes: u64,
) -> PassSummary {
    let mut rates: Vec<f64> = records.iter().map(BlockRecord::rate_mb).collect();
    rates.sort_by(|a, b| a.total_cmp(b));

    let (min, med, max) = match rates.len() {
        0 => (0.0, 0.0, 0.0),
        n => (rates[0], rates[n / 2], rates[n - 1]),
    };
    let total_time: f64 = records.iter().map(|r| r.time).sum();
    let errors: u64 = records.iter().map(|r| r.errors).sum();
    let avg = if total_time > 0.0 {
        size_bytes as f64 / total_time / MB
    } else {
        0.0
    };

    let slow_blocks = SLOW_BLOCK_PERCENTILES
        .iter()
        .map(|&percent| {
            let threshold = med * percent / 100.0;
            let mut count = 0;
            while count < rates.len() && rates[count] < threshold {
                count += 1;
            }
            SlowBlocks { percent, count }
        })
        .filter(|s| s.count > 0)
        .collect();

    PassSummary { index, direction, pattern, errors, min, avg, med, max, slow_blocks }
}

/// `{prefix}_{read|write}{pass}_{size}.txt`
pub fn csv_file_name(prefix: &Path, direction: Direction, pass_index: usize, size_bytes: u64) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("_{}{}_{}.txt", direction, pass_index, size_bytes));
    PathBuf::from(name)
}

/// One `index,time,errors` line per block in index order.
pub fn write_block_csv(path: &Path, records: &[BlockRecord]) -> Result<()> {
    let output_error = |source: std::io::Error| ScanError::OutputFile { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(output_error)?;
    let mut out = BufWriter::new(file);
    for (i, r) in records.iter().enumerate() {
        writeln!(out, "{},{},{}", i, format_scientific(r.time), r.errors).map_err(output_error)?;
    }
    out.flush().map_err(output_error)
}

/// Six-digit mantissa and a signed two-digit exponent, e.g. `1.250000e-03`.
pub fn format_scientific(value: f64) -> String {
    let s = format!("{:.6e}", value);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(rate_mb: f64) -> BlockRecord {
        BlockRecord { time: 1.0, bytes: (rate_mb * MB) as u64, errors: 0 }
    }

    #[test]
    fn rate_is_zero_without_time() {
        let r = BlockRecord { time: 0.0, bytes: 4096, errors: 1 };
        assert_eq!(r.rate_mb(), 0.0);
        assert_eq!(Totals::default().bytes_per_second(), 0.0);
    }

    #[test]
    fn five_block_summary() {
        let records: Vec<BlockRecord> = [30.0, 10.0, 50.0, 20.0, 40.0].map(record_at).to_vec();
        let s = summarize(0, Direction::Read, None, &records, (150.0 * MB) as u64);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.med, 30.0);
        assert_eq!(s.max, 50.0);
        assert_eq!(s.avg, 30.0);
        assert_eq!(s.errors, 0);
        assert_eq!(s.slow_blocks, vec![SlowBlocks { percent: 50.0, count: 1 }]);
        // input order untouched
        assert_eq!(records[0].rate_mb(), 30.0);
    }

    #[test]
    fn median_takes_upper_middle_for_even_counts() {
        let records: Vec<BlockRecord> = [1.0, 2.0, 3.0, 4.0].map(record_at).to_vec();
        let s = summarize(0, Direction::Read, None, &records, (10.0 * MB) as u64);
        assert_eq!(s.med, 3.0);
    }

    #[test]
    fn thresholds_are_counted_independently() {
        let records: Vec<BlockRecord> = [100.0, 1.0, 8.0, 100.0, 15.0, 30.0, 100.0, 100.0, 100.0].map(record_at).to_vec();
        let s = summarize(2, Direction::Write, Some(0x55), &records, 1);
        let counts: Vec<(f64, usize)> = s.slow_blocks.iter().map(|b| (b.percent, b.count)).collect();
        assert_eq!(counts, vec![(50.0, 4), (20.0, 3), (10.0, 2), (5.0, 1)]);
        assert_eq!(s.slow_blocks[0].to_string(), "Number of blocks slower than 50% of median: 4");
    }

    #[test]
    fn zero_time_pass_has_zero_average_and_counts_errors() {
        let records = vec![BlockRecord { time: 0.0, bytes: 0, errors: 1 }; 3];
        let s = summarize(0, Direction::Read, None, &records, 3 * 4096);
        assert_eq!(s.avg, 0.0);
        assert_eq!(s.errors, 3);
        assert!(s.slow_blocks.is_empty());
    }

    #[test]
    fn csv_name_follows_prefix_direction_pass_and_size() {
        let name = csv_file_name(Path::new("out/scan"), Direction::Write, 2, 10485760);
        assert_eq!(name, PathBuf::from("out/scan_write2_10485760.txt"));
    }

    #[test]
    fn scientific_matches_c_style() {
        assert_eq!(format_scientific(0.00125), "1.250000e-03");
        assert_eq!(format_scientific(0.0), "0.000000e+00");
        assert_eq!(format_scientific(12.5), "1.250000e+01");
    }

    #[test]
    fn csv_lines_stay_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.txt");
        let records = vec![
            BlockRecord { time: 0.5, bytes: 10, errors: 0 },
            BlockRecord { time: 0.25, bytes: 10, errors: 2 },
        ];
        write_block_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0,5.000000e-01,0\n1,2.500000e-01,2\n");
    }

    #[test]
    fn unwritable_csv_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("blocks.txt");
        let err = write_block_csv(&path, &[BlockRecord::default()]).unwrap_err();
        assert!(matches!(err, ScanError::OutputFile { .. }));
    }
}
