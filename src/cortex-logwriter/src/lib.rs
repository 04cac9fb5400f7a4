//! Asynchronous, crash-tolerant log writer for Cortex.
//!
//! Callers enqueue text entries without waiting on disk IO. A single
//! background thread persists them to size-rotated files, and a separate
//! compaction pass gzips closed files, verifying every compressed copy before
//! the original is deleted.
//!
//! # Features
//!
//! - **Non-blocking producers**: unbounded queue, `false` instead of errors
//! - **Size-based rotation**: `{prefix}{seq}.log`, 10 MiB by default
//! - **Verified compaction**: compress, read back, compare, rename, delete
//! - **Bounded retries**: a file that fails every attempt stays on disk
//!
//! # Example
//!
//! ```rust,no_run
//! use cortex_logwriter::{AsyncLogger, NoopKeepAlive, log_entry};
//!
//! let logger = AsyncLogger::new("/data/logs").expect("failed to start logger");
//!
//! logger.enqueue("service started");
//! log_entry!(logger, "accepted connection from {}", "10.0.0.7");
//!
//! // Later, from a maintenance thread
//! let report = logger.compact_with(&NoopKeepAlive).expect("compaction failed");
//! println!("Compressed {} files", report.compressed.len());
//!
//! logger.close();
//! ```

pub mod compaction;
pub mod config;
pub mod entry;
pub mod error;
pub mod file_writer;
pub mod logger;
pub mod rotation;
pub mod worker;

pub use compaction::{
    CompactionFailure, CompactionReport, Compactor, CompressHooks, Compressor, KeepAlive,
    KeepAliveGuard, NoHooks, NoopKeepAlive, content_equals_gzip, read_gzip_to_string,
    with_keep_alive,
};
pub use config::{
    GZ_SUFFIX, LOG_SUFFIX, LogWriterConfig, MAX_ATTEMPTS, ROTATE_SIZE, TEMP_SUFFIX,
};
pub use entry::{EntryQueue, LogEntry};
pub use error::{LogWriterError, Result};
pub use file_writer::FileWriter;
pub use logger::AsyncLogger;
pub use rotation::RotationPolicy;
pub use worker::{ActivePath, WorkerState};
