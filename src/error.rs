//! Crate-wide error type.
//!
//! One enum covers every failure kind from the on-disk format down to the
//! public file handle, matching `FileCorruption` (MD5 mismatch, fatal to the
//! read but not to the actor) against the recoverable I/O variants.

use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum FileError {
    /// The file did not exist at open time.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// `create` without `overwrite` against a non-empty file.
    #[error("file already exists and is non-empty: {0}")]
    AlreadyExists(PathBuf),

    /// Any OS I/O failure, returned to the caller unchanged.
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Payload length did not fit in the chunk header's 31-bit length field.
    #[error("chunk payload of {len} bytes exceeds the maximum of {max}")]
    ChunkTooLarge { len: usize, max: usize },

    /// Signed header length did not fit in the header's 32-bit length field.
    #[error("header payload of {len} bytes exceeds the maximum of {max}")]
    HeaderTooLarge { len: usize, max: usize },

    /// MD5 mismatch on a chunk read. Fatal to the current call and to the
    /// actor that detected it — the file is considered unusable afterward.
    #[error("file corruption in {path} at position {position}")]
    FileCorruption { path: PathBuf, position: u64 },

    /// Backward header scan reached the start of the file without finding a
    /// validating header. Not an error condition by itself — returned as a
    /// value, never logged.
    #[error("no valid header found")]
    NoValidHeader,

    /// The file actor has already exited (closed, idle-timed-out, or the
    /// owner died) and can no longer accept requests.
    #[error("file actor is closed")]
    Closed,
}

impl FileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FileError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, FileError>;
