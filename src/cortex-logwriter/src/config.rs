//! Configuration for the log writer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Constants
// ============================================================================

/// Size in bytes after which the active file is rotated (10 MiB).
pub const ROTATE_SIZE: u64 = 10 * 1024 * 1024;

/// Compression attempts per file before giving up.
pub const MAX_ATTEMPTS: usize = 3;

/// Suffix of uncompressed log files.
pub const LOG_SUFFIX: &str = ".log";

/// Suffix appended to a compressed log file.
pub const GZ_SUFFIX: &str = ".gz";

/// Suffix appended to the in-progress compressed file.
pub const TEMP_SUFFIX: &str = ".temp";

/// chrono format of the per-instance file prefix.
pub const PREFIX_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f-";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for an [`AsyncLogger`](crate::AsyncLogger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogWriterConfig {
    /// Directory receiving the log files. Must already be writable.
    pub storage_dir: PathBuf,

    /// Rotation threshold in bytes.
    #[serde(default = "default_rotate_size")]
    pub rotate_size: u64,

    /// Compression attempts per file.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Whether a flush also syncs file data to disk.
    #[serde(default = "default_sync_on_flush")]
    pub sync_on_flush: bool,
}

fn default_rotate_size() -> u64 {
    ROTATE_SIZE
}

fn default_max_attempts() -> usize {
    MAX_ATTEMPTS
}

fn default_sync_on_flush() -> bool {
    true
}

impl LogWriterConfig {
    /// Create a configuration with defaults for `storage_dir`.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            rotate_size: ROTATE_SIZE,
            max_attempts: MAX_ATTEMPTS,
            sync_on_flush: true,
        }
    }

    /// Set the rotation threshold.
    pub fn with_rotate_size(mut self, rotate_size: u64) -> Self {
        self.rotate_size = rotate_size;
        self
    }

    /// Set the number of compression attempts per file.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set whether flushes sync to disk.
    pub fn with_sync_on_flush(mut self, sync_on_flush: bool) -> Self {
        self.sync_on_flush = sync_on_flush;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LogWriterConfig::new("/tmp/logs");
        assert_eq!(config.rotate_size, ROTATE_SIZE);
        assert_eq!(config.max_attempts, MAX_ATTEMPTS);
        assert!(config.sync_on_flush);
    }

    #[test]
    fn test_config_deserialize_fills_defaults() {
        let config: LogWriterConfig =
            serde_json::from_str(r#"{"storage_dir": "/var/log/app"}"#).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/var/log/app"));
        assert_eq!(config.rotate_size, 10 * 1024 * 1024);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_max_attempts_at_least_one() {
        let config = LogWriterConfig::new("/tmp").with_max_attempts(0);
        assert_eq!(config.max_attempts, 1);
    }
}
