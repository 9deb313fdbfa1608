//! Open/lifecycle layer and the public handle, spec §4.5.

use std::fs::OpenOptions as StdOpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::warn;

use crate::actor::{self, ActorHandle};
use crate::config::OpenOptions;
use crate::error::{FileError, Result};

/// A handle to an open append-only file. Cheap to clone; every clone shares
/// the same underlying actor and file descriptor.
#[derive(Clone)]
pub struct LedgerFile {
    handle: ActorHandle,
    owner: Arc<Notify>,
}

impl LedgerFile {
    /// Open (and possibly create) the file at `path` under the given
    /// options, spawning its owning actor.
    pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();

        if options.create {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| FileError::io(parent, e))?;
                }
            }
        }

        let existed = path.exists();
        if !existed && !options.create {
            if !options.no_log_if_missing {
                warn!(path = %path.display(), "open failed: file not found");
            }
            return Err(FileError::NotFound(path));
        }

        let mut open = StdOpenOptions::new();
        if options.read_only {
            open.read(true);
        } else {
            open.read(true).write(true).create(options.create);
        }

        let file = open.open(&path).map_err(|e| FileError::io(&path, e))?;
        let metadata = file.metadata().map_err(|e| FileError::io(&path, e))?;
        let mut eof = metadata.len();

        if existed && eof > 0 && options.create && !options.overwrite {
            return Err(FileError::AlreadyExists(path));
        }

        if options.overwrite && eof > 0 {
            if options.read_only {
                return Err(FileError::io(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "cannot overwrite a read-only open"),
                ));
            }
            file.set_len(0).map_err(|e| FileError::io(&path, e))?;
            eof = 0;
        }

        let owner = Arc::new(Notify::new());
        let handle = actor::spawn(path, file, eof, options);
        handle.set_owner(owner.clone()).await?;

        Ok(LedgerFile { handle, owner })
    }

    /// Append a chunk carrying `payload`, optionally signed with an embedded
    /// MD5. Returns the file position the chunk was written at.
    pub async fn append(&self, payload: Vec<u8>, with_md5: bool) -> Result<u64> {
        self.handle.append_chunk(payload, with_md5).await
    }

    /// Append an already fully-encoded chunk (as produced by
    /// [`crate::chunk::encode`]) verbatim, without re-encoding its payload —
    /// used to copy a chunk byte-for-byte from one file into another.
    pub async fn append_raw(&self, encoded: Vec<u8>) -> Result<u64> {
        self.handle.append_raw(encoded).await
    }

    /// Read back the chunk written at `position`, verifying its MD5 if one
    /// was embedded.
    pub async fn pread(&self, position: u64) -> Result<Vec<u8>> {
        self.handle.pread_chunk(position).await
    }

    /// Write a new header checkpoint carrying `payload`. Returns the
    /// pre-write `eof`, i.e. the position the zero-padding (if any) starts
    /// at — not the block boundary the `0x01` header prefix itself lands
    /// on, which is `eof` rounded up to the next multiple of 4096.
    pub async fn write_header(&self, payload: Vec<u8>) -> Result<u64> {
        self.handle.write_header(payload).await
    }

    /// Recover the most recent valid header by scanning backward from the
    /// current end of file.
    pub async fn read_header(&self) -> Result<Vec<u8>> {
        self.handle.read_header().await
    }

    /// Truncate the file to `position`, discarding everything after it.
    pub async fn truncate(&self, position: u64) -> Result<()> {
        self.handle.truncate(position).await
    }

    /// Flush to durable storage.
    pub async fn sync(&self) -> Result<()> {
        self.handle.sync().await
    }

    /// Current end-of-file position.
    pub async fn bytes(&self) -> Result<u64> {
        self.handle.bytes().await
    }

    /// Request that the underlying actor close now, rather than waiting out
    /// the idle timer.
    pub async fn close(&self) {
        self.handle.close().await;
    }
}

impl Drop for LedgerFile {
    fn drop(&mut self) {
        // The actor keeps its own permanent clone of `owner` for the
        // lifetime of the task, so the count never reaches 1 while it's
        // running — 2 (this handle plus the actor's) means this is the last
        // caller-side clone going away.
        if Arc::strong_count(&self.owner) == 2 {
            self.owner.notify_one();
        }
    }
}
