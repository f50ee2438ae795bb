//! Timestamped messages to stderr and an optional log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use indicatif::ProgressBar;
use parking_lot::Mutex;

fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Cloning shares the log file.
#[derive(Clone, Default)]
pub struct Logger {
    file: Option<Arc<Mutex<File>>>,
    verbosity: u8,
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl Logger {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity, ..Self::default() }
    }

    /// Append every message to `path` as well.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> io::Result<Self> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(Arc::new(Mutex::new(f)));
        Ok(self)
    }

    /// Print through `bar` so an active status line is redrawn below the message.
    pub fn with_bar(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    /// Keep stderr silent; the log file still receives everything.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn info<S: AsRef<str>>(&self, msg: S) {
        self.emit(msg.as_ref());
    }

    pub fn warn<S: AsRef<str>>(&self, msg: S) {
        self.emit(&format!("Warning: {}", msg.as_ref()));
    }

    /// Shown from `-v` on.
    pub fn debug<S: AsRef<str>>(&self, msg: S) {
        if self.verbosity >= 1 {
            self.emit(msg.as_ref());
        }
    }

    /// Shown from `-vv` on.
    pub fn trace<S: AsRef<str>>(&self, msg: S) {
        if self.verbosity >= 2 {
            self.emit(msg.as_ref());
        }
    }

    fn emit(&self, msg: &str) {
        let full_message = format!("[{}] {}", current_timestamp(), msg);
        if !self.quiet {
            match &self.bar {
                Some(pb) => pb.suspend(|| eprintln!("{}", full_message)),
                None => eprintln!("{}", full_message),
            }
        }
        if let Some(ref lf_arc) = self.file {
            let mut lf_guard = lf_arc.lock();
            let _ = writeln!(*lf_guard, "{}", full_message);
            let _ = lf_guard.flush();
        }
    }
}
