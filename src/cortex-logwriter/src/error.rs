//! Error types for cortex-logwriter.

use std::path::PathBuf;
use thiserror::Error;

/// Log writer error types.
///
/// Only [`LogWriterError::Precondition`] is a hard failure for its immediate
/// caller. Everything else is local to one entry, one file or one attempt and
/// is logged by the loop that hit it.
#[derive(Debug, Error)]
pub enum LogWriterError {
    /// A single write to the active file failed.
    #[error("Failed to write to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The next log file could not be created.
    #[error("Failed to create log file {}: {source}", path.display())]
    Rotation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One compress-then-verify cycle failed.
    #[error("Failed attempt {attempt} of gzipping {}: {source}", path.display())]
    CompressionAttempt {
        path: PathBuf,
        attempt: usize,
        #[source]
        source: std::io::Error,
    },

    /// Every compression attempt for a file failed.
    #[error("Failed all {attempts} attempts to gzip {}", path.display())]
    CompressionExhausted { path: PathBuf, attempts: usize },

    /// Caller error, such as compressing a file that is already gzipped.
    #[error("{reason}: {}", path.display())]
    Precondition { path: PathBuf, reason: String },

    /// The logger has been closed.
    #[error("Logger is closed")]
    Stopped,

    /// IO error outside a write or compression attempt.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogWriterError {
    /// Create a new Precondition error.
    pub fn precondition(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Precondition {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failed operation may succeed on a later pass.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Precondition { .. } | Self::Stopped)
    }

    /// Whether this is a structural precondition violation.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }
}

/// Result type for log writer operations.
pub type Result<T> = std::result::Result<T, LogWriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_names_file_and_attempts() {
        let err = LogWriterError::CompressionExhausted {
            path: PathBuf::from("/logs/a0.log"),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("/logs/a0.log"));
        assert!(msg.contains('3'));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_precondition_is_not_retryable() {
        let err = LogWriterError::precondition("/logs/a0.log.gz", "Already compressed");
        assert!(err.is_precondition());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Already compressed: /logs/a0.log.gz");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LogWriterError = io_err.into();
        assert!(matches!(err, LogWriterError::Io(_)));
    }
}
