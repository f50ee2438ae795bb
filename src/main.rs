//! src/main.rs
use std::io;
use std::panic;
use std::path::{Path, PathBuf};

use clap::Parser;
use indicatif::ProgressBar;

use scanblocks::config::{parse_patterns, parse_size_with_suffix};
use scanblocks::{
    BlockChecker, FileDevice, Logger, MonotonicClock, ProgressReporter, RunReport, ScanConfig, ScanError,
};

/// Check a block device by reading all blocks and optionally writing them first.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Block device (or file) to check.
    device: PathBuf,

    /// Granularity of reads/writes, with optional K/M/G/T suffix.
    #[clap(short, long, value_parser = parse_size_with_suffix, default_value = "4M")]
    block_size: u64,

    /// Overwrite the device with known patterns and read them back. This destroys
    /// all data on the device. Specify twice to skip the interactive confirmation.
    #[clap(short = 'w', long, action = clap::ArgAction::Count)]
    overwrite: u8,

    /// Comma-separated hexadecimal bytes for --overwrite. Each byte results in one
    /// write pass and one read pass, e.g. 55,aa,00,ff.
    #[clap(short, long, default_value = "00")]
    pattern: String,

    /// Write per-block timing data to PREFIX_{read|write}PASS_SIZE.txt files.
    #[clap(short, long, value_name = "PREFIX")]
    outfile: Option<PathBuf>,

    /// Increase verbosity. Specify multiple times to be more verbose.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Bypass the page cache.
    #[clap(long)]
    direct_io: bool,

    /// Append all messages to this file.
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Print the final report as JSON.
    #[clap(long)]
    json: bool,
}

fn setup_signal_handler(bar: ProgressBar, log: Logger) {
    let result = ctrlc::set_handler(move || {
        bar.finish_and_clear();
        log.info("Received Ctrl+C; scan interrupted.");
        std::process::exit(130);
    });
    if let Err(e) = result {
        eprintln!("Error setting Ctrl+C handler: {}", e);
    }
}

fn confirm_overwrite(path: &Path) -> io::Result<bool> {
    println!("Please enter OVERWRITE and press enter to confirm deleting all data on '{}':", path.display());
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end() == "OVERWRITE")
}

fn main() {
    let cli = Cli::parse();
    let bar = ProgressBar::new(0);
    let mut log = Logger::new(cli.verbose).with_bar(bar.clone());
    if let Some(path) = &cli.log_file {
        match log.clone().with_file(path) {
            Ok(with_file) => log = with_file,
            Err(e) => eprintln!("Failed to open log file '{}': {}. Logging to stderr only.", path.display(), e),
        }
    }
    setup_signal_handler(bar.clone(), log.clone());

    let main_result = panic::catch_unwind(panic::AssertUnwindSafe(|| main_logic(&cli, &log, bar.clone())));
    let exit_code = match main_result {
        Ok(Ok(Some(report))) => {
            if cli.json {
                println!("{:#}", report.to_json());
            } else {
                println!("{}", report);
            }
            if report.is_ok() { 0 } else { 1 }
        }
        Ok(Ok(None)) => 0,
        Ok(Err(e)) => {
            bar.finish_and_clear();
            log.info(format!("Error: {}", e));
            2
        }
        Err(panic_payload) => {
            let mut panic_msg = "A critical error occurred: scan panicked!".to_string();
            if let Some(s) = panic_payload.downcast_ref::<String>() { panic_msg.push_str(&format!("\nPanic message: {}", s)); }
            else if let Some(s) = panic_payload.downcast_ref::<&str>() { panic_msg.push_str(&format!("\nPanic message: {}", s)); }
            else { panic_msg.push_str("\nPanic payload: (type not recognized as string)"); }
            log.info(panic_msg);
            101
        }
    };
    std::process::exit(exit_code);
}

/// `Ok(None)` when the overwrite was not confirmed.
fn main_logic(cli: &Cli, log: &Logger, bar: ProgressBar) -> Result<Option<RunReport>, ScanError> {
    let config = ScanConfig {
        block_size: cli.block_size,
        patterns: parse_patterns(&cli.pattern).map_err(ScanError::Config)?,
        outfile_prefix: cli.outfile.clone(),
        verbosity: cli.verbose,
        direct_io: cli.direct_io,
    };
    log.debug(format!("Configuration: {:?}", config));

    let device = FileDevice::new(&cli.device).with_direct_io(config.direct_io);
    let mut checker = BlockChecker::new(
        device,
        MonotonicClock::new(),
        config,
        log.clone(),
        ProgressReporter::new(bar),
    )?;

    if cli.overwrite > 0 {
        if cli.overwrite < 2 {
            let confirmed = confirm_overwrite(&cli.device).map_err(|e| ScanError::Config(format!("cannot read confirmation: {}", e)))?;
            if !confirmed {
                println!("Not confirmed. Exiting.");
                return Ok(None);
            }
        }
        checker.check_write_read()?;
    } else {
        checker.check_read_only()?;
    }
    Ok(Some(checker.report()))
}
