//! Gzip helpers and suffix handling.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::config::{GZ_SUFFIX, TEMP_SUFFIX};
use crate::error::{LogWriterError, Result};

/// Whether the file name of `path` ends with `suffix`.
pub(crate) fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Return `path` with `suffix` appended to its file name.
///
/// The suffix must be a dot followed by 1 to 10 lowercase ASCII letters, and
/// `path` must not already end with it.
pub fn append_suffix(path: &Path, suffix: &str) -> Result<PathBuf> {
    check_valid_suffix(path, suffix)?;
    if has_suffix(path, suffix) {
        return Err(LogWriterError::precondition(
            path,
            format!("File already has suffix {suffix}"),
        ));
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    Ok(PathBuf::from(name))
}

fn check_valid_suffix(path: &Path, suffix: &str) -> Result<()> {
    let reason = match suffix.strip_prefix('.') {
        None => format!("Suffix must start with a dot: \"{suffix}\""),
        Some("") => format!("Suffix \"{suffix}\" is too short"),
        Some(rest) if rest.len() > 10 => format!("Suffix \"{suffix}\" is too long"),
        Some(rest) if !rest.bytes().all(|b| b.is_ascii_lowercase()) => {
            format!("Suffix \"{suffix}\" contains weird characters")
        }
        Some(_) => return Ok(()),
    };
    Err(LogWriterError::precondition(path, reason))
}

/// Whether `gzipped_temp` decompresses to exactly the bytes of `uncompressed`.
///
/// Refuses to run when `uncompressed` is itself a `.gz` file or when
/// `gzipped_temp` is not a `.gz.temp` file.
pub fn content_equals_gzip(uncompressed: &Path, gzipped_temp: &Path) -> Result<bool> {
    if has_suffix(uncompressed, GZ_SUFFIX) {
        return Err(LogWriterError::precondition(
            uncompressed,
            "Refusing to compare an uncompressed file that ends with .gz",
        ));
    }
    let temp_suffix = format!("{GZ_SUFFIX}{TEMP_SUFFIX}");
    if !has_suffix(gzipped_temp, &temp_suffix) {
        return Err(LogWriterError::precondition(
            gzipped_temp,
            format!("Refusing to compare a gzip file that does not end with {temp_suffix}"),
        ));
    }

    let original = BufReader::new(File::open(uncompressed)?);
    let decoded = GzDecoder::new(BufReader::new(File::open(gzipped_temp)?));
    Ok(streams_equal(original, decoded)?)
}

/// Read a whole `.gz` file into memory as UTF-8.
pub fn read_gzip_to_string(gzipped: &Path) -> Result<String> {
    if !has_suffix(gzipped, GZ_SUFFIX) {
        return Err(LogWriterError::precondition(
            gzipped,
            "Refusing to read a gzip file that does not end with .gz",
        ));
    }
    let mut contents = String::new();
    GzDecoder::new(BufReader::new(File::open(gzipped)?)).read_to_string(&mut contents)?;
    Ok(contents)
}

const CHUNK: usize = 8 * 1024;

fn streams_equal(mut a: impl Read, mut b: impl Read) -> io::Result<bool> {
    let mut buf_a = [0u8; CHUNK];
    let mut buf_b = [0u8; CHUNK];
    loop {
        let n = read_full(&mut a, &mut buf_a)?;
        let m = read_full(&mut b, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` unless the reader hits EOF first.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
