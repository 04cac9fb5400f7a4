//! The single writer thread.
//!
//! All state touched by the writer lives in [`WriterState`], which is moved
//! into the thread. The only thing shared outward is the path of the active
//! file, published through [`ActivePath`] so compaction can skip it.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::entry::{EntryReceiver, LogEntry, Request};
use crate::error::{LogWriterError, Result};
use crate::file_writer::FileWriter;
use crate::rotation::RotationPolicy;

/// Snapshot handle on the path of the file currently accepting writes.
///
/// The writer publishes a path before creating the file and clears it only
/// after the file is closed, so a directory listing never sees an open file
/// that is not also visible here.
#[derive(Debug, Clone, Default)]
pub struct ActivePath {
    inner: Arc<RwLock<Option<PathBuf>>>,
}

impl ActivePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current active path.
    pub fn get(&self) -> Option<PathBuf> {
        self.inner.read().clone()
    }

    pub(crate) fn set(&self, path: Option<PathBuf>) {
        *self.inner.write() = path;
    }
}

/// Lifecycle of the writer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopped,
}

/// Everything the writer thread owns.
#[derive(Debug)]
pub(crate) struct WriterState {
    storage_dir: PathBuf,
    policy: RotationPolicy,
    sync_on_flush: bool,
    active: Option<FileWriter>,
    active_path: ActivePath,
    state: WorkerState,
}

impl WriterState {
    pub(crate) fn new(
        storage_dir: PathBuf,
        policy: RotationPolicy,
        sync_on_flush: bool,
        active_path: ActivePath,
    ) -> Self {
        Self {
            storage_dir,
            policy,
            sync_on_flush,
            active: None,
            active_path,
            state: WorkerState::Running,
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Entry(entry) => {
                if let Err(e) = self.write_entry(&entry) {
                    report(&e, "Failed to write log entry");
                }
            }
            Request::Roll(reply) => {
                let ok = match self.roll() {
                    Ok(()) => true,
                    Err(e) => {
                        report(&e, "Failed to roll log file");
                        false
                    }
                };
                let _ = reply.send(ok);
            }
            Request::Close(reply) => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    fn write_entry(&mut self, entry: &LogEntry) -> Result<()> {
        let needs_rotation = match &self.active {
            None => true,
            Some(active) if self.policy.should_rotate(active.bytes_written()) => {
                debug!(
                    path = %active.path().display(),
                    bytes = active.bytes_written(),
                    threshold = self.policy.threshold(),
                    "Log file over threshold, rotating"
                );
                true
            }
            Some(_) => false,
        };
        if needs_rotation {
            self.roll()?;
        }

        match self.active.as_mut() {
            Some(active) => active.write(&entry.render()),
            None => Err(LogWriterError::Stopped),
        }
    }

    /// Close the active file, if any, and open the next one.
    fn roll(&mut self) -> Result<()> {
        if self.state == WorkerState::Stopped {
            return Err(LogWriterError::Stopped);
        }
        self.close_active();
        self.start_new_file()
    }

    fn start_new_file(&mut self) -> Result<()> {
        let path = self.policy.next_path(&self.storage_dir);
        self.active_path.set(Some(path.clone()));
        match FileWriter::open(path, self.sync_on_flush) {
            Ok(writer) => {
                self.active = Some(writer);
                Ok(())
            }
            Err(e) => {
                self.active_path.set(None);
                Err(e)
            }
        }
    }

    fn close_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.close() {
                warn!(error = %e, "Failed to close log file");
            }
        }
        self.active_path.set(None);
    }

    fn flush_idle(&mut self) {
        if let Some(active) = self.active.as_mut() {
            if let Err(e) = active.flush() {
                warn!(error = %e, "Failed to flush idle log file");
            }
        }
    }

    fn shutdown(&mut self) {
        self.close_active();
        self.state = WorkerState::Stopped;
    }

    #[cfg(test)]
    fn active_file(&self) -> Option<&std::path::Path> {
        self.active.as_ref().map(|a| a.path())
    }
}

fn report(err: &LogWriterError, message: &str) {
    match err {
        LogWriterError::Rotation { .. } => error!(error = %err, "{message}"),
        _ => warn!(error = %err, "{message}"),
    }
}

/// Writer loop. Returns once a close request was handled or every producer
/// handle is gone.
pub(crate) fn run(mut state: WriterState, rx: EntryReceiver) {
    info!(dir = %state.storage_dir.display(), "Log worker is now running");

    while state.state() == WorkerState::Running {
        if rx.is_empty() {
            state.flush_idle();
        }
        match rx.take() {
            Some(request) => state.handle(request),
            None => state.shutdown(),
        }
    }

    let discarded = rx.drain();
    if discarded > 0 {
        warn!(discarded, "Discarded requests queued after close");
    }

    info!(dir = %state.storage_dir.display(), "Log worker stopped");
}
