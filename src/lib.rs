//! Exhaustive block device verification.
//!
//! Every block of a disk is read, optionally after writing an index-stamped
//! pattern, and per-block throughput is summarized so that slow or failing
//! regions stand out.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod log;
pub mod pass;
pub mod pattern;
pub mod plan;
pub mod progress;
pub mod session;
pub mod stats;

#[cfg(test)]
mod sim;

pub use clock::{Clock, MonotonicClock};
pub use config::ScanConfig;
pub use device::{BlockHandle, BlockIo, FileDevice};
pub use error::{BlockFault, Result, ScanError};
pub use geometry::BlockGeometry;
pub use log::Logger;
pub use plan::{Direction, PassSpec, RunPlan};
pub use progress::ProgressReporter;
pub use session::{BlockChecker, RunReport};
pub use stats::{BlockRecord, PassSummary, RunTotals};
