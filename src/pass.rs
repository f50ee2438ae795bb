//! One sweep over every block of the device.

use std::path::Path;

use crate::clock::Clock;
use crate::device::{create_buffer, BlockHandle, BlockIo};
use crate::error::{BlockFault, Result, ScanError};
use crate::geometry::BlockGeometry;
use crate::log::Logger;
use crate::pattern::{fill_block, first_mismatch, stamp_index};
use crate::plan::{Direction, PassSpec, RunPlan};
use crate::progress::ProgressReporter;
use crate::stats::{self, BlockRecord, PassSummary, RunTotals};

/// Borrowed view of the run needed to execute a pass.
pub struct PassExecutor<'a, D: BlockIo, C: Clock> {
    pub device: &'a D,
    pub clock: &'a C,
    pub geometry: &'a BlockGeometry,
    pub plan: &'a RunPlan,
    pub log: &'a Logger,
    pub outfile_prefix: Option<&'a Path>,
}

impl<'a, D: BlockIo, C: Clock> PassExecutor<'a, D, C> {
    /// Run `pass` to completion. Block failures are counted in `records` and
    /// `totals`; only failing to open the device or the CSV file aborts.
    pub fn run(
        &self,
        pass: &PassSpec,
        records: &mut Vec<BlockRecord>,
        totals: &mut RunTotals,
        progress: &mut ProgressReporter,
    ) -> Result<PassSummary> {
        let num_blocks = self.geometry.num_blocks();
        records.clear();
        records.resize(num_blocks as usize, BlockRecord::default());
        progress.begin_pass(self.clock.now(), num_blocks);

        let mut handle = self.device.open(pass.direction).map_err(|source| ScanError::DeviceOpen {
            path: self.device.label(),
            direction: pass.direction,
            source,
        })?;
        self.log.debug(format!(
            "Opened {} for {} (pass {}/{})",
            self.device.label(),
            pass.direction,
            pass.index + 1,
            self.plan.len()
        ));

        let block_size = self.geometry.block_size() as usize;
        let mut buffer = create_buffer(block_size, self.device.needs_aligned_buffers());
        // Tail bytes of both buffers keep the pattern; only the index prefix changes per block.
        let mut expected = match (pass.direction, pass.pattern) {
            (Direction::Read, Some(p)) => {
                let mut e = vec![0u8; block_size];
                fill_block(&mut e, p, 0);
                Some(e)
            }
            _ => None,
        };
        if let (Direction::Write, Some(p)) = (pass.direction, pass.pattern) {
            fill_block(&mut buffer, p, 0);
        }

        for index in 0..num_blocks {
            let len = self.geometry.access_len(index);
            let offset = self.geometry.offset(index);

            let start = self.clock.now();
            let io_result = match pass.direction {
                Direction::Write => {
                    if let Some(p) = pass.pattern {
                        stamp_index(&mut buffer, p, index);
                    }
                    handle.write_at(offset, &buffer[..len])
                }
                Direction::Read => handle.read_at(offset, &mut buffer[..len]),
            };
            let elapsed = self.clock.now() - start;

            let record = &mut records[index as usize];
            let total = totals.get_mut(pass.direction);
            let fault = match io_result {
                Err(source) => Some(BlockFault::Io { direction: pass.direction, source }),
                Ok(()) => {
                    record.time += elapsed;
                    record.bytes += len as u64;
                    total.record(elapsed, len as u64);
                    match (expected.as_mut(), pass.pattern) {
                        (Some(expected), Some(p)) => {
                            stamp_index(expected, p, index);
                            first_mismatch(&expected[..len], &buffer[..len]).map(|(at, want, got)| {
                                BlockFault::Mismatch { offset: at, expected: want, actual: got }
                            })
                        }
                        _ => None,
                    }
                }
            };
            if let Some(fault) = fault {
                record.errors += 1;
                total.errors += 1;
                self.log.info(format!("Block {}: {}", index, fault));
            }
            self.log.trace(format!("block {} {} {} bytes in {:.6}s", index, pass.direction, len, elapsed));

            progress.update(self.clock.now(), self.geometry, self.plan, pass, index, totals);
        }

        drop(handle);
        progress.end_pass();
        self.finalize(pass, records)
    }

    /// Export, summarize and report a finished pass.
    fn finalize(&self, pass: &PassSpec, records: &[BlockRecord]) -> Result<PassSummary> {
        if let Some(prefix) = self.outfile_prefix {
            let path = stats::csv_file_name(prefix, pass.direction, pass.index, self.geometry.size_bytes());
            stats::write_block_csv(&path, records)?;
            self.log.debug(format!("Wrote block timings to {}", path.display()));
        }

        let summary = stats::summarize(
            pass.index,
            pass.direction,
            pass.pattern,
            records,
            self.geometry.size_bytes(),
        );
        self.log.info(format!(
            "pass {}/{} ({}): {} errors (min={:.1}MB/s avg={:.1}MB/s med={:.1}MB/s max={:.1}MB/s)",
            pass.index + 1,
            self.plan.len(),
            pass.direction,
            summary.errors,
            summary.min,
            summary.avg,
            summary.med,
            summary.max
        ));
        for slow in &summary.slow_blocks {
            self.log.warn(slow.to_string());
        }
        Ok(summary)
    }
}
