use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class",
    ]
    .into_iter()
    .collect()
});

/// Returns true if `path` exists and is a regular file.
#[must_use]
pub fn is_regular_file(path: &Path) -> bool {
    path.metadata().is_ok_and(|m| m.is_file())
}

/// Reads a selected file as UTF-8 text.
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] if `path` is missing or not a regular
/// file, and [`Error::InvalidUtf8`] if the content is not valid UTF-8.
pub fn read_text(path: &Path) -> Result<String> {
    if !is_regular_file(path) {
        return Err(Error::file_not_found(path));
    }

    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })
}

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Known binary extensions short-circuit to `true`
/// 2. Reads the first 8KB of the file
/// 3. Checks for null bytes (binary indicator)
/// 4. A UTF-8 sample (possibly cut mid-character) is text
/// 5. Otherwise a low ratio of ASCII bytes means binary
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    if has_binary_extension(path) {
        return Ok(true);
    }

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    // UTF-8 text in non-Latin scripts is mostly non-ASCII. The sample may
    // end in the middle of a multi-byte character.
    let is_utf8 = match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    if is_utf8 {
        return Ok(false);
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}
