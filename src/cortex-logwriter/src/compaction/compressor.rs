//! Compress one closed log file, verify the result, then replace the original.
//!
//! Each attempt:
//! 1. Gzips `file` into `file.gz.temp`
//! 2. Decompresses the temp file and compares it byte for byte with `file`
//! 3. Renames the temp file to `file.gz`, then deletes `file`
//!
//! A failed attempt removes the temp file and starts over. The original is
//! only deleted after its compressed copy is verified and in place.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, error, warn};

use crate::config::{GZ_SUFFIX, MAX_ATTEMPTS, TEMP_SUFFIX};
use crate::error::{LogWriterError, Result};

use super::gzip::{append_suffix, content_equals_gzip, has_suffix};

/// Points inside a compression attempt where a failure can be injected.
///
/// Every method receives the 1-based attempt number. Returning an error makes
/// that attempt fail as if the corresponding IO step had failed.
pub trait CompressHooks: Send + Sync {
    /// Before the temp file is created.
    fn open_gzip(&self, _attempt: usize) -> io::Result<()> {
        Ok(())
    }

    /// Before the original is copied into the encoder.
    fn copy(&self, _attempt: usize) -> io::Result<()> {
        Ok(())
    }

    /// Before the encoder is finished. The encoder is closed either way.
    fn close_gzip(&self, _attempt: usize) -> io::Result<()> {
        Ok(())
    }

    /// Before the temp file is verified against the original.
    fn compare(&self, _attempt: usize) -> io::Result<()> {
        Ok(())
    }
}

/// Hooks that never fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl CompressHooks for NoHooks {}

/// Gzips single files with verification and bounded retries.
#[derive(Clone)]
pub struct Compressor {
    max_attempts: usize,
    level: Compression,
    hooks: Arc<dyn CompressHooks>,
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("max_attempts", &self.max_attempts)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS)
    }
}

impl Compressor {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            level: Compression::default(),
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CompressHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_level(mut self, level: Compression) -> Self {
        self.level = level;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Gzip `file` and delete it. Returns the path of the `.gz` file.
    ///
    /// Fails immediately for a file that is already gzipped. Otherwise fails
    /// with [`LogWriterError::CompressionExhausted`] once every attempt has
    /// failed, leaving `file` untouched.
    pub fn compress_one(&self, file: &Path) -> Result<PathBuf> {
        if has_suffix(file, GZ_SUFFIX) {
            return Err(LogWriterError::precondition(
                file,
                "Refusing to gzip a file that already ends with .gz",
            ));
        }

        let final_path = append_suffix(file, GZ_SUFFIX)?;
        let temp_path = append_suffix(&final_path, TEMP_SUFFIX)?;

        for attempt in 1..=self.max_attempts {
            match self.attempt(file, &temp_path, &final_path, attempt) {
                Ok(()) => {
                    debug!(
                        path = %file.display(),
                        gz = %final_path.display(),
                        attempt,
                        "Finished gzipping"
                    );
                    return Ok(final_path);
                }
                Err(e) => {
                    remove_temp(&temp_path);
                    if e.is_precondition() {
                        return Err(e);
                    }
                    warn!(error = %e, "Compression attempt failed");
                }
            }
        }

        error!(
            path = %file.display(),
            attempts = self.max_attempts,
            "Giving up on gzipping file"
        );
        Err(LogWriterError::CompressionExhausted {
            path: file.to_path_buf(),
            attempts: self.max_attempts,
        })
    }

    fn attempt(&self, file: &Path, temp: &Path, final_path: &Path, attempt: usize) -> Result<()> {
        let failed = |source: io::Error| LogWriterError::CompressionAttempt {
            path: file.to_path_buf(),
            attempt,
            source,
        };

        self.hooks.open_gzip(attempt).map_err(failed)?;
        self.write_temp(file, temp, attempt).map_err(failed)?;

        self.hooks.compare(attempt).map_err(failed)?;
        match content_equals_gzip(file, temp) {
            Ok(true) => {}
            Ok(false) => {
                return Err(failed(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Gzip output does not match original on attempt {attempt}"),
                )));
            }
            Err(LogWriterError::Io(source)) => return Err(failed(source)),
            Err(e) => return Err(e),
        }

        fs::rename(temp, final_path).map_err(failed)?;

        // The verified .gz is in place. A surviving original is gzipped again
        // on a later pass and the rename overwrites an identical artifact.
        if let Err(e) = fs::remove_file(file) {
            warn!(
                path = %file.display(),
                error = %e,
                "Failed to delete original after gzipping"
            );
        }
        Ok(())
    }

    /// Stream `file` through a gzip encoder into `temp`, closing the encoder
    /// even when the copy fails.
    fn write_temp(&self, file: &Path, temp: &Path, attempt: usize) -> io::Result<()> {
        let out = BufWriter::new(File::create(temp)?);
        let mut encoder = GzEncoder::new(out, self.level);

        let copied = self.hooks.copy(attempt).and_then(|()| {
            let mut input = BufReader::new(File::open(file)?);
            io::copy(&mut input, &mut encoder)
        });

        let close_hook = self.hooks.close_gzip(attempt);
        let finished = encoder.finish().and_then(|mut out| {
            out.flush()?;
            out.get_ref().sync_all()
        });

        copied?;
        close_hook?;
        finished
    }
}

fn remove_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp.display(), error = %e, "Failed to delete temp file"),
    }
}
