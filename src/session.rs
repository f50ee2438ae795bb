//! Sequencing of passes over one device and the final verdict.

use std::fmt;

use serde_json::json;

use crate::clock::Clock;
use crate::config::ScanConfig;
use crate::device::BlockIo;
use crate::error::{Result, ScanError};
use crate::geometry::{largest_power_of_two_factor, BlockGeometry};
use crate::log::Logger;
use crate::pass::PassExecutor;
use crate::plan::RunPlan;
use crate::progress::ProgressReporter;
use crate::stats::{BlockRecord, PassSummary, RunTotals, GB, MB};

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub passes: Vec<PassSummary>,
    pub totals: RunTotals,
}

impl RunReport {
    /// Run-lifetime read throughput in MB/s.
    pub fn read_rate_mb(&self) -> f64 {
        self.totals.read.bytes_per_second() / MB
    }

    pub fn write_rate_mb(&self) -> f64 {
        self.totals.write.bytes_per_second() / MB
    }

    pub fn total_errors(&self) -> u64 {
        self.totals.errors()
    }

    pub fn is_ok(&self) -> bool {
        self.total_errors() == 0
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "ok": self.is_ok(),
            "read_mb_s": self.read_rate_mb(),
            "write_mb_s": self.write_rate_mb(),
            "read_errors": self.totals.read.errors,
            "write_errors": self.totals.write.errors,
            "read_bytes": self.totals.read.bytes,
            "write_bytes": self.totals.write.bytes,
            "passes": self.passes.iter().map(PassSummary::to_json).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Transfer rates: read={:.1}MB/s write={:.1}MB/s",
            self.read_rate_mb(),
            self.write_rate_mb()
        )?;
        if self.is_ok() {
            write!(f, "OK: No errors detected.")
        } else {
            write!(
                f,
                "ERROR: {} errors detected ({} read errors, {} write errors)",
                self.total_errors(),
                self.totals.read.errors,
                self.totals.write.errors
            )
        }
    }
}

/// Scans one device, either read-only or with write/verify passes.
pub struct BlockChecker<D: BlockIo, C: Clock> {
    device: D,
    clock: C,
    config: ScanConfig,
    geometry: BlockGeometry,
    log: Logger,
    progress: ProgressReporter,
    records: Vec<BlockRecord>,
    totals: RunTotals,
    passes: Vec<PassSummary>,
}

impl<D: BlockIo, C: Clock> BlockChecker<D, C> {
    /// Fails with `InvalidDevice` when the size cannot be determined or is zero.
    pub fn new(
        device: D,
        clock: C,
        config: ScanConfig,
        log: Logger,
        progress: ProgressReporter,
    ) -> Result<Self> {
        config.validate()?;
        let label = device.label();
        let size_bytes = device.size_bytes().map_err(|e| ScanError::InvalidDevice {
            path: label.clone(),
            reason: format!("cannot determine size ({})", e),
        })?;
        let geometry = BlockGeometry::new(&label, size_bytes, config.block_size)?;
        log.info(format!(
            "{}: Size={:.1} GB ({} bytes, numBlocks={}, blockSize={}, size is a multiple of {})",
            label,
            size_bytes as f64 / GB,
            size_bytes,
            geometry.num_blocks(),
            geometry.block_size(),
            largest_power_of_two_factor(size_bytes)
        ));

        Ok(Self {
            records: Vec::with_capacity(geometry.num_blocks() as usize),
            device,
            clock,
            config,
            geometry,
            log,
            progress,
            totals: RunTotals::default(),
            passes: Vec::new(),
        })
    }

    pub fn geometry(&self) -> &BlockGeometry {
        &self.geometry
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    /// Per-block records of the most recent pass, in index order.
    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }

    /// One unverified read pass.
    pub fn check_read_only(&mut self) -> Result<()> {
        self.run(&RunPlan::read_only())
    }

    /// A write pass followed by a verifying read pass for every configured pattern.
    pub fn check_write_read(&mut self) -> Result<()> {
        let plan = RunPlan::write_read(&self.config.patterns);
        self.run(&plan)
    }

    pub fn run(&mut self, plan: &RunPlan) -> Result<()> {
        for pass in plan.passes() {
            let executor = PassExecutor {
                device: &self.device,
                clock: &self.clock,
                geometry: &self.geometry,
                plan,
                log: &self.log,
                outfile_prefix: self.config.outfile_prefix.as_deref(),
            };
            let summary = executor.run(pass, &mut self.records, &mut self.totals, &mut self.progress)?;
            self.passes.push(summary);
        }
        Ok(())
    }

    pub fn report(&self) -> RunReport {
        RunReport { passes: self.passes.clone(), totals: self.totals }
    }
}
