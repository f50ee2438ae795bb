//! Rate-limited status line with run-wide completion and ETA.

use std::fmt;

use indicatif::{ProgressBar, ProgressStyle};

use crate::geometry::BlockGeometry;
use crate::plan::{Direction, PassSpec, RunPlan};
use crate::stats::{RunTotals, MB};

/// Minimum seconds between two status updates.
pub const PROGRESS_INTERVAL: f64 = 0.5;

/// Label shown when the run has more than one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassLabel {
    pub direction: Direction,
    /// 1-based.
    pub number: usize,
    pub of: usize,
    pub pattern: u8,
}

/// Snapshot of where the run stands. Byte figures are `f64` like the rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub pass: Option<PassLabel>,
    pub block_index: u64,
    pub num_blocks: u64,
    pub bytes_done: f64,
    pub bytes_per_pass: f64,
    /// Over the whole run, not just this pass.
    pub percent: f64,
    pub remaining_secs: f64,
    /// Bytes per second.
    pub read_rate: f64,
    pub write_rate: f64,
}

impl ProgressLine {
    pub fn estimate(
        geometry: &BlockGeometry,
        plan: &RunPlan,
        pass: &PassSpec,
        block_index: u64,
        totals: &RunTotals,
    ) -> Self {
        let bytes_per_pass = geometry.bytes_per_pass() as f64;
        let total_read_bytes = plan.count(Direction::Read) as f64 * bytes_per_pass;
        let total_write_bytes = plan.count(Direction::Write) as f64 * bytes_per_pass;
        let label = match (plan.len() > 1, pass.pattern) {
            (true, Some(pattern)) => Some(PassLabel {
                direction: pass.direction,
                number: pass.index + 1,
                of: plan.len(),
                pattern,
            }),
            _ => None,
        };

        let bytes_done = block_index as f64 * geometry.block_size() as f64;
        let percent = (pass.index as f64 * bytes_per_pass + bytes_done)
            / (total_read_bytes + total_write_bytes)
            * 100.0;

        let read_rate = totals.read.bytes_per_second();
        let write_rate = totals.write.bytes_per_second();
        let mut remaining_secs = 0.0;
        if read_rate > 0.0 {
            remaining_secs += (total_read_bytes - totals.read.bytes as f64) / read_rate;
        } else if write_rate > 0.0 {
            // Nothing read yet: assume reads run at write speed.
            remaining_secs += (total_read_bytes - totals.read.bytes as f64) / write_rate;
        }
        if write_rate > 0.0 {
            remaining_secs += (total_write_bytes - totals.write.bytes as f64) / write_rate;
        }

        Self {
            pass: label,
            block_index,
            num_blocks: geometry.num_blocks(),
            bytes_done,
            bytes_per_pass,
            percent,
            remaining_secs,
            read_rate,
            write_rate,
        }
    }
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.pass {
            write!(f, "{} pass {}/{} (pat {:02x}): ", p.direction, p.number, p.of, p.pattern)?;
        }
        write!(
            f,
            "{:6}/{:6} {:.1}/{:.1}MB {:4.1}% remaining={} read={:.1}MB/s write={:.1}MB/s",
            self.block_index,
            self.num_blocks,
            self.bytes_done / MB,
            self.bytes_per_pass / MB,
            self.percent,
            format_seconds(self.remaining_secs),
            self.read_rate / MB,
            self.write_rate / MB,
        )
    }
}

/// Compact `1h02m03s` rendering of a duration.
pub fn format_seconds(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 { secs.round() as u64 } else { 0 };
    let (h, m, s) = (total / 3600, total / 60 % 60, total % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Owns the status bar and decides when it may be redrawn.
pub struct ProgressReporter {
    bar: ProgressBar,
    last_progress_time: f64,
}

impl ProgressReporter {
    pub fn new(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] [{bar:30.cyan/blue}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self { bar, last_progress_time: 0.0 }
    }

    /// Never draws. Used when output is not a terminal and in tests.
    pub fn hidden() -> Self {
        Self::new(ProgressBar::hidden())
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    pub fn begin_pass(&mut self, now: f64, num_blocks: u64) {
        self.last_progress_time = now;
        self.bar.reset();
        self.bar.set_length(num_blocks);
        self.bar.set_message("");
    }

    /// Redraw if at least [`PROGRESS_INTERVAL`] has passed since the last redraw.
    pub fn update(
        &mut self,
        now: f64,
        geometry: &BlockGeometry,
        plan: &RunPlan,
        pass: &PassSpec,
        block_index: u64,
        totals: &RunTotals,
    ) -> Option<ProgressLine> {
        if now - self.last_progress_time < PROGRESS_INTERVAL {
            return None;
        }
        let line = ProgressLine::estimate(geometry, plan, pass, block_index, totals);
        self.bar.set_position(block_index);
        self.bar.set_message(line.to_string());
        self.last_progress_time = now;
        Some(line)
    }

    /// Clear the status line at the end of a pass.
    pub fn end_pass(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Totals;

    const MIB: u64 = 1024 * 1024;

    fn geometry() -> BlockGeometry {
        BlockGeometry::new("dev", 100 * MIB, MIB).unwrap()
    }

    #[test]
    fn updates_are_rate_limited() {
        let g = geometry();
        let plan = RunPlan::read_only();
        let pass = plan.passes()[0];
        let totals = RunTotals::default();
        let mut r = ProgressReporter::hidden();
        r.begin_pass(10.0, g.num_blocks());
        assert!(r.update(10.2, &g, &plan, &pass, 1, &totals).is_none());
        assert!(r.update(10.5, &g, &plan, &pass, 2, &totals).is_some());
        assert!(r.update(10.9, &g, &plan, &pass, 3, &totals).is_none());
        assert!(r.update(11.0, &g, &plan, &pass, 4, &totals).is_some());
    }

    #[test]
    fn read_only_eta_uses_read_rate() {
        let g = geometry();
        let plan = RunPlan::read_only();
        let totals = RunTotals {
            read: Totals { time: 2.0, bytes: 20 * MIB, errors: 0 },
            write: Totals::default(),
        };
        let line = ProgressLine::estimate(&g, &plan, &plan.passes()[0], 20, &totals);
        assert_eq!(line.pass, None);
        assert!((line.percent - 20.0).abs() < 1e-9);
        // 80 MiB left at 10 MiB/s
        assert!((line.remaining_secs - 8.0).abs() < 1e-9);
    }

    #[test]
    fn first_write_pass_approximates_reads_with_write_rate() {
        let g = geometry();
        let plan = RunPlan::write_read(&[0x55]);
        let totals = RunTotals {
            read: Totals::default(),
            write: Totals { time: 5.0, bytes: 50 * MIB, errors: 0 },
        };
        let line = ProgressLine::estimate(&g, &plan, &plan.passes()[0], 50, &totals);
        // 100 MiB to read plus 50 MiB to write, both at 10 MiB/s
        assert!((line.remaining_secs - 15.0).abs() < 1e-9);
        assert!((line.percent - 25.0).abs() < 1e-9);
        assert_eq!(
            line.pass,
            Some(PassLabel { direction: Direction::Write, number: 1, of: 2, pattern: 0x55 })
        );
    }

    #[test]
    fn later_read_pass_counts_completed_passes() {
        let g = geometry();
        let plan = RunPlan::write_read(&[0x55, 0xaa]);
        let totals = RunTotals {
            read: Totals { time: 10.0, bytes: 150 * MIB, errors: 0 },
            write: Totals { time: 40.0, bytes: 200 * MIB, errors: 0 },
        };
        let pass = plan.passes()[3];
        let line = ProgressLine::estimate(&g, &plan, &pass, 50, &totals);
        assert!((line.percent - 87.5).abs() < 1e-9);
        // 50 MiB left to read at 15 MiB/s, nothing left to write
        assert!((line.remaining_secs - 50.0 / 15.0).abs() < 1e-9);
        let text = line.to_string();
        assert!(text.starts_with("read pass 4/4 (pat aa): "), "{text}");
        assert!(text.contains("50.0/100.0MB"), "{text}");
    }

    #[test]
    fn seconds_are_compact() {
        assert_eq!(format_seconds(0.0), "0s");
        assert_eq!(format_seconds(59.4), "59s");
        assert_eq!(format_seconds(61.0), "1m01s");
        assert_eq!(format_seconds(3723.0), "1h02m03s");
        assert_eq!(format_seconds(f64::NAN), "0s");
    }
}
