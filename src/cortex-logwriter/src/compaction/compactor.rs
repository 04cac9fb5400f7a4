//! Batch compression of closed log files.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{GZ_SUFFIX, LOG_SUFFIX, TEMP_SUFFIX};
use crate::error::Result;
use crate::worker::ActivePath;

use super::compressor::Compressor;
use super::gzip::has_suffix;

/// A file that could not be compressed during a pass.
#[derive(Debug, Clone, Serialize)]
pub struct CompactionFailure {
    pub path: PathBuf,
    pub error: String,
    /// Caller error rather than a failure a later pass could fix.
    pub precondition: bool,
}

/// Result of one compaction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompactionReport {
    /// `.gz` files produced, in processing order.
    pub compressed: Vec<PathBuf>,
    /// The active file, if it was present in the listing and skipped.
    pub skipped_active: Option<PathBuf>,
    /// Files left uncompressed.
    pub failures: Vec<CompactionFailure>,
    /// Orphaned temp files removed before the pass.
    pub orphans_removed: usize,
}

impl CompactionReport {
    /// Whether every eligible file was compressed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compresses every closed `.log` file in a directory.
///
/// Not re-entrant: run at most one pass per directory at a time.
#[derive(Debug, Clone)]
pub struct Compactor {
    compressor: Compressor,
    active: ActivePath,
}

impl Compactor {
    pub fn new(compressor: Compressor, active: ActivePath) -> Self {
        Self { compressor, active }
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Compress all closed log files in `dir`, oldest name first.
    ///
    /// One file's failure never stops the pass. Only a directory that cannot
    /// be listed is an error.
    pub fn compact(&self, dir: &Path) -> Result<CompactionReport> {
        let mut report = CompactionReport::default();

        if !dir.exists() {
            return Ok(report);
        }

        report.orphans_removed = remove_orphaned_temps(dir)?;

        // Listed before the active path is read: a file still open at listing
        // time was published before it was created.
        for file in list_log_files(dir)? {
            let active = self.active.get();
            if active.as_deref().is_some_and(|a| is_same_path(a, &file)) {
                debug!(path = %file.display(), "Skipping active log file");
                report.skipped_active = Some(file);
                continue;
            }

            match self.compressor.compress_one(&file) {
                Ok(gz) => report.compressed.push(gz),
                Err(e) => {
                    error!(path = %file.display(), error = %e, "Failed to gzip log file");
                    report.failures.push(CompactionFailure {
                        path: file,
                        error: e.to_string(),
                        precondition: e.is_precondition(),
                    });
                }
            }
        }

        info!(
            dir = %dir.display(),
            compressed = report.compressed.len(),
            failed = report.failures.len(),
            "Finished gzipping log files"
        );

        Ok(report)
    }
}

/// Regular files in `dir` whose name ends in `.log`, sorted by name.
pub fn list_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_file() && has_suffix(&path, LOG_SUFFIX) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Delete every `*.log.gz.temp` in `dir`. Returns how many were removed.
///
/// Only safe while no compaction pass is running on `dir`.
pub fn remove_orphaned_temps(dir: &Path) -> Result<usize> {
    let suffix = format!("{LOG_SUFFIX}{GZ_SUFFIX}{TEMP_SUFFIX}");
    let mut removed = 0;
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() || !has_suffix(&path, &suffix) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed orphaned temp file");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphaned temp file"),
        }
    }
    Ok(removed)
}

fn is_same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => match (std::path::absolute(a), std::path::absolute(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compaction::compressor::CompressHooks;
    use crate::compaction::gzip::read_gzip_to_string;
    use std::io;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Fails every copy while `bad` still exists.
    struct FailBad {
        bad: PathBuf,
    }

    impl CompressHooks for FailBad {
        fn copy(&self, _attempt: usize) -> io::Result<()> {
            if self.bad.exists() {
                Err(io::Error::other("disk contention"))
            } else {
                Ok(())
            }
        }
    }

    /// Fails verification whenever `b.log` is the file being compressed.
    struct FailOnB(PathBuf);

    impl CompressHooks for FailOnB {
        fn compare(&self, _attempt: usize) -> io::Result<()> {
            if self.0.join("b.log.gz.temp").exists() {
                Err(io::Error::other("disk contention"))
            } else {
                Ok(())
            }
        }
    }

    /// Publishes `next` as active while the first file is being compressed,
    /// the way the writer does when it rotates mid-pass.
    struct RotateDuringPass {
        active: ActivePath,
        next: PathBuf,
    }

    impl CompressHooks for RotateDuringPass {
        fn open_gzip(&self, _attempt: usize) -> io::Result<()> {
            self.active.set(Some(self.next.clone()));
            Ok(())
        }
    }

    fn compactor(active: ActivePath) -> Compactor {
        Compactor::new(Compressor::default(), active)
    }

    #[test]
    fn test_compact_compresses_closed_files_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for (name, body) in [("p-000001.log", "one\n"), ("p-000000.log", "zero\n")] {
            fs::write(dir.join(name), body).unwrap();
        }
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let report = compactor(ActivePath::new()).compact(dir).unwrap();

        assert!(report.is_clean());
        assert_eq!(
            report.compressed,
            vec![dir.join("p-000000.log.gz"), dir.join("p-000001.log.gz")]
        );
        assert_eq!(read_gzip_to_string(&dir.join("p-000000.log.gz")).unwrap(), "zero\n");
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn test_compact_skips_active_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("p-000000.log"), "closed\n").unwrap();
        fs::write(dir.join("p-000001.log"), "open\n").unwrap();

        let active = ActivePath::new();
        active.set(Some(dir.join("p-000001.log")));
        let report = compactor(active).compact(dir).unwrap();

        assert_eq!(report.compressed, vec![dir.join("p-000000.log.gz")]);
        assert_eq!(report.skipped_active, Some(dir.join("p-000001.log")));
        assert_eq!(fs::read_to_string(dir.join("p-000001.log")).unwrap(), "open\n");
        assert!(!dir.join("p-000001.log.gz").exists());
    }

    #[test]
    fn test_active_file_matched_by_canonical_path() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("p-000000.log"), "open\n").unwrap();

        let active = ActivePath::new();
        active.set(Some(dir.join(".").join("p-000000.log")));
        let report = compactor(active).compact(dir).unwrap();

        assert!(report.compressed.is_empty());
        assert!(report.skipped_active.is_some());
    }

    #[test]
    fn test_one_failure_does_not_block_others() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.log"), "fine\n").unwrap();
        fs::write(dir.join("b.log"), "bad\n").unwrap();
        fs::write(dir.join("c.log"), "fine too\n").unwrap();
        let compressor = Compressor::new(3).with_hooks(Arc::new(FailOnB(dir.to_path_buf())));
        let report = Compactor::new(compressor, ActivePath::new())
            .compact(dir)
            .unwrap();

        assert_eq!(report.compressed, vec![dir.join("a.log.gz"), dir.join("c.log.gz")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, dir.join("b.log"));
        assert!(!report.failures[0].precondition);
        assert!(report.failures[0].error.contains("3 attempts"));
        assert_eq!(fs::read_to_string(dir.join("b.log")).unwrap(), "bad\n");
    }

    #[test]
    fn test_hook_failure_keeps_every_original() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("x.log"), "x\n").unwrap();
        let bad = dir.join("x.log");
        let compressor = Compressor::new(2).with_hooks(Arc::new(FailBad { bad: bad.clone() }));

        let report = Compactor::new(compressor, ActivePath::new())
            .compact(dir)
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(bad.exists());
    }

    #[test]
    fn test_orphaned_temps_removed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("p-000000.log.gz.temp"), "partial").unwrap();
        fs::write(dir.join("other.temp"), "not ours").unwrap();

        let report = compactor(ActivePath::new()).compact(dir).unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert!(!dir.join("p-000000.log.gz.temp").exists());
        assert!(dir.join("other.temp").exists());
    }

    #[test]
    fn test_missing_dir_is_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let report = compactor(ActivePath::new())
            .compact(&temp_dir.path().join("nope"))
            .unwrap();
        assert!(report.is_clean());
        assert!(report.compressed.is_empty());
    }

    #[test]
    fn test_existing_gz_files_are_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("old.log.gz"), "already compressed").unwrap();

        let report = compactor(ActivePath::new()).compact(dir).unwrap();
        assert!(report.compressed.is_empty());
        assert_eq!(fs::read(dir.join("old.log.gz")).unwrap(), b"already compressed");
    }

    #[test]
    fn test_file_published_after_listing_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("p-000000.log"), "closed\n").unwrap();
        fs::write(dir.join("p-000001.log"), "").unwrap();

        let active = ActivePath::new();
        let hooks = RotateDuringPass {
            active: active.clone(),
            next: dir.join("p-000001.log"),
        };
        let compressor = Compressor::default().with_hooks(Arc::new(hooks));
        let report = Compactor::new(compressor, active).compact(dir).unwrap();

        assert_eq!(report.compressed, vec![dir.join("p-000000.log.gz")]);
        assert_eq!(report.skipped_active, Some(dir.join("p-000001.log")));
        assert!(dir.join("p-000001.log").exists());
        assert!(!dir.join("p-000001.log.gz").exists());
    }
}
