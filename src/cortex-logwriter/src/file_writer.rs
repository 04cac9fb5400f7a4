//! The file currently accepting writes.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LogWriterError, Result};

/// Buffered writer over a freshly created log file.
///
/// Owned by the writer thread. `bytes_written` counts bytes handed to the
/// buffer, not bytes the OS has acknowledged.
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    bytes_written: u64,
    sync_on_flush: bool,
}

impl FileWriter {
    /// Create `path`. Fails if anything already exists there.
    pub fn open(path: impl Into<PathBuf>, sync_on_flush: bool) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| LogWriterError::Rotation {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Created log file");

        Ok(Self {
            path,
            out: Some(BufWriter::new(file)),
            bytes_written: 0,
            sync_on_flush,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_closed(&self) -> bool {
        self.out.is_none()
    }

    /// Append the UTF-8 bytes of `text`.
    pub fn write(&mut self, text: &str) -> Result<()> {
        let out = self.out.as_mut().ok_or_else(|| LogWriterError::Write {
            path: self.path.clone(),
            source: io::Error::other("log file is closed"),
        })?;
        out.write_all(text.as_bytes())
            .map_err(|source| LogWriterError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.bytes_written += text.len() as u64;
        Ok(())
    }

    /// Push buffered bytes to the file. A no-op once closed.
    pub fn flush(&mut self) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        flush_inner(out, self.sync_on_flush).map_err(|source| LogWriterError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Flush and release the handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        flush_inner(&mut out, true).map_err(|source| LogWriterError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            path = %self.path.display(),
            bytes = self.bytes_written,
            "Closed log file"
        );
        Ok(())
    }
}

fn flush_inner(out: &mut BufWriter<File>, sync: bool) -> io::Result<()> {
    out.flush()?;
    if sync {
        out.get_ref().sync_data()?;
    }
    Ok(())
}
