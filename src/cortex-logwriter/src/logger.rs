//! Asynchronous logger facade.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::compaction::{
    CompactionReport, Compactor, Compressor, KeepAlive, with_keep_alive,
};
use crate::config::LogWriterConfig;
use crate::entry::{EntryQueue, Request, entry_queue};
use crate::error::Result;
use crate::rotation::RotationPolicy;
use crate::worker::{self, ActivePath, WorkerState, WriterState};

/// Writes log entries to rotating files on a background thread.
///
/// Callers enqueue text without touching the disk. A single worker thread
/// owns the active file. Closed files can be gzipped with
/// [`compact`](Self::compact) from any other thread.
///
/// After [`close`](Self::close) the instance is finished for good: create a
/// new one, which gets a fresh file prefix, to keep logging.
pub struct AsyncLogger {
    queue: EntryQueue,
    config: LogWriterConfig,
    prefix: String,
    active: ActivePath,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for AsyncLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogger")
            .field("storage_dir", &self.config.storage_dir)
            .field("prefix", &self.prefix)
            .field("running", &self.is_running())
            .finish()
    }
}

impl AsyncLogger {
    /// Start logging into `storage_dir` with default settings.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(LogWriterConfig::new(storage_dir))
    }

    /// Start logging with `config`.
    pub fn with_config(config: LogWriterConfig) -> Result<Self> {
        fs::create_dir_all(&config.storage_dir)?;

        let policy = RotationPolicy::new(config.rotate_size);
        let prefix = policy.prefix().to_string();
        let active = ActivePath::new();
        let (queue, rx) = entry_queue();

        let state = WriterState::new(
            config.storage_dir.clone(),
            policy,
            config.sync_on_flush,
            active.clone(),
        );
        let handle = std::thread::Builder::new()
            .name("log-worker".to_string())
            .spawn(move || worker::run(state, rx))?;

        info!(
            dir = %config.storage_dir.display(),
            prefix = %prefix,
            rotate_size = config.rotate_size,
            "Async logger started"
        );

        Ok(Self {
            queue,
            config,
            prefix,
            active,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue `text` for writing. Never blocks on IO.
    ///
    /// Returns `false` if the entry was dropped, which includes every call
    /// made after [`close`](Self::close).
    pub fn enqueue(&self, text: impl Into<String>) -> bool {
        self.queue.enqueue(text)
    }

    /// Format `args` and queue the result. See [`log_entry!`](crate::log_entry).
    pub fn enqueue_fmt(&self, args: fmt::Arguments<'_>) -> bool {
        self.queue.enqueue_fmt(args)
    }

    /// A producer handle that can be moved to other threads.
    pub fn queue(&self) -> EntryQueue {
        self.queue.clone()
    }

    /// Close the active file and open the next one, out of band.
    ///
    /// Entries queued before this call go to the old file.
    pub fn roll(&self) -> bool {
        if !self.queue.is_accepting() {
            return false;
        }
        let (tx, rx) = flume::bounded(1);
        if !self.queue.send(Request::Roll(tx)) {
            return false;
        }
        rx.recv().unwrap_or(false)
    }

    /// Flush and close the active file and stop the worker.
    ///
    /// Entries queued before this call are written first. Entries enqueued
    /// concurrently may be dropped. Closing twice is a no-op.
    pub fn close(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        self.queue.shut();
        let (tx, rx) = flume::bounded(1);
        if self.queue.send(Request::Close(tx)) {
            let _ = rx.recv();
        }
        if handle.join().is_err() {
            error!("Log worker panicked");
        }

        info!(dir = %self.config.storage_dir.display(), "Async logger closed");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn state(&self) -> WorkerState {
        if self.is_running() {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    /// Path of the file currently accepting writes.
    pub fn active_file(&self) -> Option<PathBuf> {
        self.active.get()
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    pub fn file_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn config(&self) -> &LogWriterConfig {
        &self.config
    }

    /// A compactor that skips this logger's active file.
    pub fn compactor(&self) -> Compactor {
        Compactor::new(
            Compressor::new(self.config.max_attempts),
            self.active.clone(),
        )
    }

    /// Gzip every closed log file in the storage directory.
    pub fn compact(&self) -> Result<CompactionReport> {
        self.compactor().compact(&self.config.storage_dir)
    }

    /// [`compact`](Self::compact) while holding `scope`.
    pub fn compact_with(&self, scope: &dyn KeepAlive) -> Result<CompactionReport> {
        with_keep_alive(scope, || self.compact())
    }
}

impl Drop for AsyncLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Format and enqueue an entry on an [`AsyncLogger`] or [`EntryQueue`].
///
/// ```rust,no_run
/// use cortex_logwriter::{AsyncLogger, log_entry};
///
/// let logger = AsyncLogger::new("/tmp/logs").unwrap();
/// log_entry!(logger, "sensor {} read {:.2}", 3, 21.5);
/// ```
#[macro_export]
macro_rules! log_entry {
    ($logger:expr, $($arg:tt)+) => {
        $logger.enqueue_fmt(::std::format_args!($($arg)+))
    };
}
