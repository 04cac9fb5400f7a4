//! Compaction of closed log files.
//!
//! Closed `.log` files are gzipped to `.log.gz`. The original is deleted only
//! after the compressed copy has been read back, compared byte for byte and
//! renamed into place. The active file is never touched.
//!
//! # On-disk artifacts
//!
//! - `{prefix}{seq}.log` closed or active log file
//! - `{prefix}{seq}.log.gz` compacted log file
//! - `{prefix}{seq}.log.gz.temp` in-progress compression, removed on success
//!   and deleted as an orphan at the start of the next pass

mod compactor;
mod compressor;
mod gzip;
mod keep_alive;

pub use compactor::{
    CompactionFailure, CompactionReport, Compactor, list_log_files, remove_orphaned_temps,
};
pub use compressor::{CompressHooks, Compressor, NoHooks};
pub use gzip::{append_suffix, content_equals_gzip, read_gzip_to_string};
pub use keep_alive::{KeepAlive, KeepAliveGuard, NoopKeepAlive, with_keep_alive};
