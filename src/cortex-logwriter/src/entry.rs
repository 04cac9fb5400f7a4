//! Log entries and the queue that carries them to the writer thread.
//!
//! The queue is unbounded: producers never block and never see an error
//! beyond a `false` return. Control requests (`roll`, `close`) travel through
//! the same FIFO as entries so the worker observes them in submission order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, SecondsFormat};
use tracing::warn;

/// One timestamped unit of text to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    timestamp: DateTime<Local>,
    text: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(Local::now(), text)
    }

    /// Create an entry with an explicit timestamp.
    pub fn at(timestamp: DateTime<Local>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line written to the log file, newline included.
    ///
    /// Line breaks inside the text are written as `\n` and `\r` escapes so
    /// that one entry is always one line.
    pub fn render(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false);
        if self.text.contains(['\n', '\r']) {
            let text = self.text.replace('\r', "\\r").replace('\n', "\\n");
            format!("{timestamp} {text}\n")
        } else {
            format!("{timestamp} {}\n", self.text)
        }
    }
}

/// Work item consumed by the writer thread.
#[derive(Debug)]
pub(crate) enum Request {
    Entry(LogEntry),
    /// Close the active file and open the next one.
    Roll(flume::Sender<bool>),
    /// Flush and close the active file, then stop.
    Close(flume::Sender<()>),
}

/// Create a connected queue pair.
pub(crate) fn entry_queue() -> (EntryQueue, EntryReceiver) {
    let (tx, rx) = flume::unbounded();
    let queue = EntryQueue {
        tx,
        accepting: Arc::new(AtomicBool::new(true)),
    };
    (queue, EntryReceiver { rx })
}

/// Producer side of the queue. Cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct EntryQueue {
    tx: flume::Sender<Request>,
    accepting: Arc<AtomicBool>,
}

impl EntryQueue {
    /// Timestamp `text` and queue it for writing.
    ///
    /// Returns `false` if the entry was dropped.
    pub fn enqueue(&self, text: impl Into<String>) -> bool {
        if !self.is_accepting() {
            return false;
        }
        self.send(Request::Entry(LogEntry::new(text)))
    }

    /// Format `args`, then enqueue the result.
    ///
    /// A `Display` impl that reports an error drops the entry.
    pub fn enqueue_fmt(&self, args: fmt::Arguments<'_>) -> bool {
        let mut text = String::new();
        if let Err(e) = fmt::write(&mut text, args) {
            warn!(error = %e, "Failed to format log entry");
            return false;
        }
        self.enqueue(text)
    }

    /// Whether new entries are still accepted.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Number of requests waiting for the worker.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Stop accepting entries. Requests already queued are unaffected.
    pub(crate) fn shut(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn send(&self, request: Request) -> bool {
        match self.tx.send(request) {
            Ok(()) => true,
            Err(_) => {
                warn!("Writer thread is gone, dropping request");
                false
            }
        }
    }
}

/// Consumer side of the queue, owned by the writer thread.
#[derive(Debug)]
pub(crate) struct EntryReceiver {
    rx: flume::Receiver<Request>,
}

impl EntryReceiver {
    /// Block until a request arrives. `None` once every producer is gone.
    pub(crate) fn take(&self) -> Option<Request> {
        self.rx.recv().ok()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything still queued. Dropping a control request drops its
    /// reply sender, which wakes the waiting caller.
    pub(crate) fn drain(&self) -> usize {
        self.rx.drain().count()
    }
}
