//! Retention sweep: delete staged outputs older than a threshold.
//!
//! [`sweep`] walks a directory tree bottom-up, deletes files whose mtime is
//! older than the cutoff and removes subdirectories left empty. The root
//! passed in is never removed.
//!
//! [`RetentionSweeper`] puts a last-run guard in front of it: after one sweep
//! runs, further triggers inside `min_interval` return without touching the
//! filesystem. Requests trigger it after their own output is written, so the
//! walk never sees a half-written document, and freshly written files are by
//! construction younger than any sensible retention window.

use crate::config::RetentionSettings;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Counts of what one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
}

/// Remove files under `root` last modified more than `older_than_days` ago,
/// then any subdirectory that ends up empty.
///
/// A missing `root` is an empty sweep. Entries that vanish while the walk is
/// running are skipped.
pub fn sweep(root: &Path, older_than_days: u64) -> io::Result<SweepReport> {
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(older_than_days.saturating_mul(SECS_PER_DAY)))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut report = SweepReport::default();
    match sweep_dir(root, cutoff, &mut report) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(report),
        other => other.map(|_| report),
    }
}

fn sweep_dir(dir: &Path, cutoff: SystemTime, report: &mut SweepReport) -> io::Result<()> {
    let mut subdirs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        let path = entry.path();
        if file_type.is_dir() {
            subdirs.push(path);
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Swept {}", path.display());
                    report.files_removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }

    for sub in subdirs {
        match sweep_dir(&sub, cutoff, report) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            other => other?,
        }
        if is_empty_dir(&sub)? {
            match std::fs::remove_dir(&sub) {
                Ok(()) => report.dirs_removed += 1,
                // Vanished, or a sibling request staged a file into it meanwhile.
                Err(e)
                    if e.kind() == io::ErrorKind::NotFound
                        || e.kind() == io::ErrorKind::DirectoryNotEmpty => {}
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Rate-limited front end to [`sweep`].
#[derive(Debug)]
pub struct RetentionSweeper {
    older_than_days: u64,
    min_interval: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl RetentionSweeper {
    pub fn new(older_than_days: u64, min_interval: Duration) -> Self {
        Self {
            older_than_days,
            min_interval,
            last_run: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &RetentionSettings) -> Self {
        Self::new(
            settings.older_than_days,
            Duration::from_secs(settings.min_interval_secs),
        )
    }

    /// Claim the next sweep slot. True at most once per `min_interval`.
    fn claim(&self) -> bool {
        let mut last = self.last_run.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        match *last {
            Some(t) if now.duration_since(t) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Sweep `dir` unless a sweep already ran within the interval.
    ///
    /// Returns `None` when the call was coalesced.
    pub fn sweep_if_due(&self, dir: &Path) -> Option<io::Result<SweepReport>> {
        if !self.claim() {
            debug!("Retention sweep of {} skipped (ran recently)", dir.display());
            return None;
        }
        let result = sweep(dir, self.older_than_days);
        match &result {
            Ok(report) if report.files_removed + report.dirs_removed > 0 => info!(
                "Retention sweep of {}: {} files, {} dirs removed",
                dir.display(),
                report.files_removed,
                report.dirs_removed
            ),
            Ok(_) => debug!("Retention sweep of {}: nothing to remove", dir.display()),
            Err(e) => warn!("Retention sweep of {} failed: {}", dir.display(), e),
        }
        Some(result)
    }

    /// Run [`Self::sweep_if_due`] on the blocking pool without waiting for it.
    pub fn trigger(self: &Arc<Self>, dir: PathBuf) {
        let sweeper = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _ = sweeper.sweep_if_due(&dir);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn file_aged(path: &Path, days: u64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let f = File::create(path).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(days * SECS_PER_DAY);
        f.set_modified(mtime).unwrap();
    }

    #[test]
    fn removes_only_aged_files() {
        let root = tempfile::tempdir().unwrap();
        let doc = root.path().join("report");
        file_aged(&doc.join("old.md"), 40);
        file_aged(&doc.join("new.md"), 5);

        let report = sweep(root.path(), 30).unwrap();
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.dirs_removed, 0);
        assert!(!doc.join("old.md").exists());
        assert!(doc.join("new.md").exists());
    }

    #[test]
    fn removes_directories_left_empty() {
        let root = tempfile::tempdir().unwrap();
        let doc = root.path().join("scan");
        file_aged(&doc.join("scan.png"), 40);
        file_aged(&doc.join("images").join("page1_img1.png"), 45);

        let report = sweep(root.path(), 30).unwrap();
        assert_eq!(report.files_removed, 2);
        assert_eq!(report.dirs_removed, 2);
        assert!(!doc.exists());
        assert!(root.path().exists(), "root is never removed");
    }

    #[test]
    fn empty_subdirectories_are_pruned_even_without_files() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("a").join("images")).unwrap();
        let report = sweep(root.path(), 30).unwrap();
        assert_eq!(report.dirs_removed, 2);
    }

    #[test]
    fn second_sweep_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        file_aged(&root.path().join("d").join("old.txt"), 31);
        file_aged(&root.path().join("d").join("keep.txt"), 1);

        assert_eq!(sweep(root.path(), 30).unwrap().files_removed, 1);
        assert_eq!(sweep(root.path(), 30).unwrap(), SweepReport::default());
        assert!(root.path().join("d").join("keep.txt").exists());
    }

    #[test]
    fn missing_root_is_empty_sweep() {
        let root = tempfile::tempdir().unwrap();
        let report = sweep(&root.path().join("absent"), 30).unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn huge_retention_keeps_everything() {
        let root = tempfile::tempdir().unwrap();
        file_aged(&root.path().join("d").join("old.txt"), 3650);

        let report = sweep(root.path(), u64::MAX).unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(root.path().join("d").join("old.txt").exists());
    }

    #[test]
    fn sweeps_within_interval_are_coalesced() {
        let root = tempfile::tempdir().unwrap();
        let sweeper = RetentionSweeper::new(30, Duration::from_secs(1800));

        file_aged(&root.path().join("d").join("a.txt"), 40);
        assert!(sweeper.sweep_if_due(root.path()).is_some());

        file_aged(&root.path().join("d").join("b.txt"), 40);
        assert!(sweeper.sweep_if_due(root.path()).is_none());
        assert!(root.path().join("d").join("b.txt").exists());
    }

    #[test]
    fn zero_interval_never_coalesces() {
        let root = tempfile::tempdir().unwrap();
        let sweeper = RetentionSweeper::new(30, Duration::ZERO);
        assert!(sweeper.sweep_if_due(root.path()).is_some());
        assert!(sweeper.sweep_if_due(root.path()).is_some());
    }
}
