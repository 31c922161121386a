//! Logging setup: human-readable lines on stderr plus a daily log file.
//!
//! `RUST_LOG` overrides the default filter. Files are named
//! `log_markify_<YYYY-MM-DD>.log`; the file writer switches to a new file at
//! local midnight. Old files are removed by [`sweep_logs`].

use crate::error::MarkifyError;
use crate::pipeline::retention::{sweep, SweepReport};
use chrono::NaiveDate;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "markify=debug,tower_http=debug"
    } else {
        "markify=info,tower_http=info"
    }
}

/// `log_dir/log_markify_<date>.log`.
pub fn log_file_path(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("log_markify_{}.log", date.format("%Y-%m-%d")))
}

/// Append-only log file that rolls over when the local date changes.
///
/// `&DailyLogFile` implements [`Write`], so an `Arc<DailyLogFile>` can be
/// handed to `fmt::layer().with_writer(..)` directly.
#[derive(Debug)]
pub struct DailyLogFile {
    dir: PathBuf,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl DailyLogFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: Mutex::new(None),
        }
    }

    /// Path of the file written for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        log_file_path(&self.dir, date)
    }

    /// Write `buf` to the file for `date`, opening it if the date changed.
    pub fn write_dated(&self, date: NaiveDate, buf: &[u8]) -> io::Result<usize> {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if !matches!(current.as_ref(), Some((open, _)) if *open == date) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(date))?;
            *current = Some((date, file));
        }
        match current.as_mut() {
            Some((_, file)) => file.write(buf),
            None => Ok(0),
        }
    }
}

impl Write for &DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_dated(chrono::Local::now().date_naive(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        match current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
///
/// Returns the path of today's log file.
pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<PathBuf, MarkifyError> {
    fs::create_dir_all(log_dir).map_err(|e| MarkifyError::io(log_dir, e))?;
    let daily = Arc::new(DailyLogFile::new(log_dir));
    let path = daily.path_for(chrono::Local::now().date_naive());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(daily),
        )
        .try_init()
        .map_err(|e| MarkifyError::Internal(format!("logging already initialised: {e}")))?;

    Ok(path)
}

/// Remove log files older than `retention_days`.
pub fn sweep_logs(log_dir: &Path, retention_days: u64) -> io::Result<SweepReport> {
    let report = sweep(log_dir, retention_days)?;
    if report.files_removed > 0 {
        tracing::info!(
            "Removed {} log files older than {} days",
            report.files_removed,
            retention_days
        );
    }
    Ok(report)
}
