//! Loading and storing the target file.
//!
//! The whole file is read into a single owned `String` and written back in
//! one piece once every step has run. Nothing is written while steps are
//! still being applied.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How the transformed buffer is committed to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Open with truncation and write in place. A failure mid-write can
    /// leave the file partially written.
    #[default]
    Truncate,
    /// Write to a tempfile in the same directory, fsync, then rename over
    /// the target.
    Atomic,
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BufferError {
    fn from_read(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => BufferError::NotFound(path),
            io::ErrorKind::PermissionDenied => BufferError::PermissionDenied(path),
            io::ErrorKind::InvalidData => BufferError::InvalidUtf8 { path },
            _ => BufferError::Read { path, source },
        }
    }

    fn from_write(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => BufferError::PermissionDenied(path),
            _ => BufferError::Write { path, source },
        }
    }
}

/// Read the full content of `path` as UTF-8.
pub fn load(path: impl AsRef<Path>) -> Result<String, BufferError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| BufferError::from_read(path, e))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "loaded source buffer");
    Ok(content)
}

/// Overwrite `path` with `buffer`.
pub fn store(path: impl AsRef<Path>, buffer: &str, mode: WriteMode) -> Result<(), BufferError> {
    let path = path.as_ref();
    match mode {
        WriteMode::Truncate => fs::write(path, buffer),
        WriteMode::Atomic => atomic_write(path, buffer.as_bytes()),
    }
    .map_err(|e| BufferError::from_write(path, e))?;
    tracing::debug!(path = %path.display(), bytes = buffer.len(), ?mode, "stored source buffer");
    Ok(())
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
