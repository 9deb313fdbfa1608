//! The file actor — a single task that owns the file descriptor and `eof`
//! and serializes every request against them, spec §4.4 and §9.
//!
//! Every [`crate::file::LedgerFile`] handle is a cheap clone of an
//! `mpsc::Sender<Request>`; the actual [`std::fs::File`] and append pointer
//! never leave this task, so there is no locking anywhere in the read/write
//! path itself — only message passing.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{error, warn};

use crate::block::{self, BLOCK_SIZE};
use crate::chunk::{self, ChunkHeader};
use crate::config::OpenOptions;
use crate::error::{FileError, Result};
use crate::header;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Request {
    AppendChunk { payload: Vec<u8>, with_md5: bool, reply: Reply<u64> },
    AppendRaw { encoded: Vec<u8>, reply: Reply<u64> },
    PreadChunk { position: u64, reply: Reply<Vec<u8>> },
    WriteHeader { payload: Vec<u8>, reply: Reply<u64> },
    ReadHeader { reply: Reply<Vec<u8>> },
    Truncate { position: u64, reply: Reply<()> },
    Sync { reply: Reply<()> },
    Bytes { reply: oneshot::Sender<u64> },
    SetOwner { notify: Arc<Notify>, reply: oneshot::Sender<()> },
    Close { reply: oneshot::Sender<()> },
}

/// A clonable handle to a running file actor. Cloning is cheap (an `mpsc`
/// sender clone); every clone talks to the same underlying file.
#[derive(Clone)]
pub struct ActorHandle {
    tx: mpsc::Sender<Request>,
}

impl ActorHandle {
    pub async fn append_chunk(&self, payload: Vec<u8>, with_md5: bool) -> Result<u64> {
        self.call(|reply| Request::AppendChunk { payload, with_md5, reply }).await
    }

    /// Append bytes that are already a fully-encoded chunk (tagged-length
    /// header, optional MD5, payload) without re-encoding them — used when
    /// copying a chunk verbatim from one file to another, e.g. compaction.
    pub async fn append_raw(&self, encoded: Vec<u8>) -> Result<u64> {
        self.call(|reply| Request::AppendRaw { encoded, reply }).await
    }

    pub async fn pread_chunk(&self, position: u64) -> Result<Vec<u8>> {
        self.call(|reply| Request::PreadChunk { position, reply }).await
    }

    pub async fn write_header(&self, payload: Vec<u8>) -> Result<u64> {
        self.call(|reply| Request::WriteHeader { payload, reply }).await
    }

    pub async fn read_header(&self) -> Result<Vec<u8>> {
        self.call(|reply| Request::ReadHeader { reply }).await
    }

    pub async fn truncate(&self, position: u64) -> Result<()> {
        self.call(|reply| Request::Truncate { position, reply }).await
    }

    pub async fn sync(&self) -> Result<()> {
        self.call(|reply| Request::Sync { reply }).await
    }

    pub async fn bytes(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Bytes { reply }).await.map_err(|_| FileError::Closed)?;
        rx.await.map_err(|_| FileError::Closed)
    }

    /// Register `notify` as the single owner token for this actor. When the
    /// owner drops its last handle and calls [`Notify::notify_one`] on the
    /// same `Arc` (see [`crate::file::LedgerFile`]'s `Drop`), the actor
    /// closes immediately rather than waiting out the idle timer. Only the
    /// holder of this exact `Arc` can trigger that early close.
    pub async fn set_owner(&self, notify: Arc<Notify>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::SetOwner { notify, reply })
            .await
            .map_err(|_| FileError::Closed)?;
        rx.await.map_err(|_| FileError::Closed)
    }

    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| FileError::Closed)?;
        rx.await.map_err(|_| FileError::Closed)?
    }
}

/// Spawn a new file actor over `file`, whose current size is `eof`.
pub fn spawn(path: PathBuf, file: File, eof: u64, options: OpenOptions) -> ActorHandle {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(run(path, file, eof, options, rx));
    ActorHandle { tx }
}

/// Whether the actor should keep processing requests after handling one.
#[derive(PartialEq, Eq)]
enum Control {
    Continue,
    Stop,
}

struct Actor {
    path: PathBuf,
    file: File,
    eof: u64,
    read_only: bool,
    sys: bool,
    idle_initial_wait: Duration,
    idle_monitor_interval: Duration,
    owner: Option<Arc<Notify>>,
}

async fn run(
    path: PathBuf,
    file: File,
    eof: u64,
    options: OpenOptions,
    mut rx: mpsc::Receiver<Request>,
) {
    let mut actor = Actor {
        path,
        file,
        eof,
        read_only: options.read_only,
        sys: options.sys,
        idle_initial_wait: options.idle_initial_wait,
        idle_monitor_interval: options.idle_monitor_interval,
        owner: None,
    };
    tracing::debug!(path = %actor.path.display(), sys = actor.sys, eof, "file actor started");

    loop {
        let owner_died = owner_signal(&actor.owner);

        tokio::select! {
            biased;
            () = owner_died => {
                break;
            }
            maybe_req = rx.recv() => {
                match maybe_req {
                    Some(req) => {
                        if actor.handle(req) == Control::Stop {
                            break;
                        }
                    }
                    None => break,
                }
            }
            () = tokio::time::sleep(actor.idle_initial_wait) => {
                if !actor.idle_recheck_loop(&mut rx).await {
                    break;
                }
            }
        }
    }

    // Dropping `actor` here closes the underlying file descriptor, whether
    // we got here via `close()`, the idle timer, owner death, or the
    // mailbox's last sender going away.
    let path = actor.path.clone();
    drop(actor);
    tracing::debug!(path = %path.display(), "file actor closed");
}

/// Resolves once the registered owner signals it has gone away. Pending
/// forever if no owner is registered, so it never wins a `select!` by
/// default.
async fn owner_signal(owner: &Option<Arc<Notify>>) {
    match owner {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

impl Actor {
    /// Handle one request, returning whether the actor should keep running
    /// afterward. `Control::Stop` is returned for an explicit `close()` and
    /// for a `pread_chunk` that detected `FileCorruption` — both are
    /// terminal per spec §4.4's state machine and §7's "the actor forces
    /// its own exit" on corruption. The run loop breaks on `Stop`, which
    /// drops this `Actor` (and with it the open `File`) as it returns.
    fn handle(&mut self, req: Request) -> Control {
        match req {
            Request::AppendChunk { payload, with_md5, reply } => {
                let _ = reply.send(self.append_chunk(payload, with_md5));
                Control::Continue
            }
            Request::AppendRaw { encoded, reply } => {
                let _ = reply.send(self.append_raw(encoded));
                Control::Continue
            }
            Request::PreadChunk { position, reply } => {
                let result = self.pread_chunk(position);
                let stop = matches!(result, Err(FileError::FileCorruption { .. }));
                let _ = reply.send(result);
                if stop { Control::Stop } else { Control::Continue }
            }
            Request::WriteHeader { payload, reply } => {
                let _ = reply.send(self.write_header(payload));
                Control::Continue
            }
            Request::ReadHeader { reply } => {
                let _ = reply.send(self.read_header());
                Control::Continue
            }
            Request::Truncate { position, reply } => {
                let _ = reply.send(self.truncate(position));
                Control::Continue
            }
            Request::Sync { reply } => {
                let _ = reply.send(self.sync());
                Control::Continue
            }
            Request::Bytes { reply } => {
                let _ = reply.send(self.eof);
                Control::Continue
            }
            Request::SetOwner { notify, reply } => {
                self.owner = Some(notify);
                let _ = reply.send(());
                Control::Continue
            }
            Request::Close { reply } => {
                let _ = self.file.sync_all();
                let _ = reply.send(());
                Control::Stop
            }
        }
    }

    fn guard_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(FileError::io(
                &self.path,
                io::Error::new(io::ErrorKind::PermissionDenied, "file actor is read-only"),
            ));
        }
        Ok(())
    }

    fn append_chunk(&mut self, payload: Vec<u8>, with_md5: bool) -> Result<u64> {
        let digest = with_md5.then(|| chunk::md5_of(&payload));
        let encoded = chunk::encode(&payload, digest)?;
        self.append_raw(encoded)
    }

    /// Frame and write an already fully-encoded chunk at the current `eof`,
    /// without touching the chunk codec — the block framing is the only
    /// thing this layer adds.
    fn append_raw(&mut self, encoded: Vec<u8>) -> Result<u64> {
        self.guard_writable()?;
        let position = self.eof;
        let block_offset = position % BLOCK_SIZE;
        let raw = block::frame(block_offset, &encoded);

        self.file.write_at(&raw, position).map_err(|e| FileError::io(&self.path, e))?;
        self.eof = position + raw.len() as u64;
        Ok(position)
    }

    fn pread_chunk(&self, position: u64) -> Result<Vec<u8>> {
        let header_offset = position % BLOCK_SIZE;
        let header_raw_len = block::raw_read_len(header_offset, chunk::HEADER_LEN);

        // Read-ahead: opportunistically fetch two blocks' worth starting at
        // `position` in one call, on the theory that most chunks are small
        // enough the header and body both land inside it, saving a second
        // positioned read. A short read (near EOF) or I/O error just means
        // nothing was prefetched — `fetch_at` below falls back to an exact
        // minimal read per field, so the decoded result is identical either
        // way.
        let read_ahead_len = (2 * BLOCK_SIZE - header_offset) as usize;
        let mut read_ahead = vec![0u8; read_ahead_len];
        let prefetch: Option<&[u8]> = match self.file.read_at(&mut read_ahead, position) {
            Ok(got) if got as u64 >= header_raw_len => Some(&read_ahead[..got]),
            _ => None,
        };

        let header_raw = self.fetch_at(position, header_raw_len, prefetch, position)?;
        let header_bytes = block::unframe(header_offset, &header_raw);
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&header_bytes);
        let header = ChunkHeader::parse(buf);

        let body_pos = position + header_raw_len;
        let body_offset = body_pos % BLOCK_SIZE;
        let body_raw_len = block::raw_read_len(body_offset, header.body_len());
        let body_raw = self.fetch_at(body_pos, body_raw_len, prefetch, position)?;
        let body = block::unframe(body_offset, &body_raw);

        let (payload, digest) = chunk::split_body(header, &body);
        if let Some(expected) = digest {
            if chunk::md5_of(&payload) != expected {
                let err = FileError::FileCorruption { path: self.path.clone(), position };
                error!("{err}");
                return Err(err);
            }
        }
        Ok(payload)
    }

    /// Fetch exactly `len` raw bytes at `pos`, serving them from `prefetch`
    /// (a buffer starting at `prefetch_base`) when it already covers the
    /// range, otherwise issuing a fresh positioned read.
    fn fetch_at(&self, pos: u64, len: u64, prefetch: Option<&[u8]>, prefetch_base: u64) -> Result<Vec<u8>> {
        if let Some(buf) = prefetch {
            let start = (pos - prefetch_base) as usize;
            let end = start + len as usize;
            if end <= buf.len() {
                return Ok(buf[start..end].to_vec());
            }
        }
        let mut out = vec![0u8; len as usize];
        self.file.read_exact_at(&mut out, pos).map_err(|e| FileError::io(&self.path, e))?;
        Ok(out)
    }

    fn write_header(&mut self, payload: Vec<u8>) -> Result<u64> {
        self.guard_writable()?;
        let write = header::prepare_write(self.eof, &payload)?;
        self.file
            .write_at(&write.bytes, write.position)
            .map_err(|e| FileError::io(&self.path, e))?;
        self.eof = write.new_eof;
        Ok(write.position)
    }

    fn read_header(&self) -> Result<Vec<u8>> {
        if self.eof == 0 {
            return Err(FileError::NoValidHeader);
        }

        let mut block_index = (self.eof - 1) / BLOCK_SIZE;
        loop {
            if let Some(payload) = self.try_read_header_at(block_index) {
                return Ok(payload);
            }
            if block_index == 0 {
                return Err(FileError::NoValidHeader);
            }
            block_index -= 1;
        }
    }

    /// Try to decode a header starting at block `block_index`. Any failure —
    /// wrong prefix, truncated tail, MD5 mismatch — is ordinary scan noise,
    /// not file corruption, so it is swallowed and reported as `None`.
    fn try_read_header_at(&self, block_index: u64) -> Option<Vec<u8>> {
        let block_start = block_index * BLOCK_SIZE;
        let mut first_block = vec![0u8; BLOCK_SIZE as usize];
        let available = self.eof.saturating_sub(block_start).min(BLOCK_SIZE);
        self.file.read_exact_at(&mut first_block[..available as usize], block_start).ok()?;

        if available < header::SIGNED_PAYLOAD_OFFSET {
            return None;
        }
        let prefix = header::parse_prefix(&first_block)?;
        let needed = header::raw_len_needed(prefix.declared_len);

        let raw = if needed <= available - header::SIGNED_PAYLOAD_OFFSET {
            first_block[header::SIGNED_PAYLOAD_OFFSET as usize..(header::SIGNED_PAYLOAD_OFFSET + needed) as usize].to_vec()
        } else {
            let mut raw = first_block[header::SIGNED_PAYLOAD_OFFSET as usize..available as usize].to_vec();
            let remaining = needed - raw.len() as u64;
            let rest_pos = block_start + available;
            if rest_pos + remaining > self.eof {
                return None;
            }
            let mut rest = vec![0u8; remaining as usize];
            self.file.read_exact_at(&mut rest, rest_pos).ok()?;
            raw.extend_from_slice(&rest);
            raw
        };

        header::try_decode(prefix.declared_len, &raw)
    }

    fn truncate(&mut self, position: u64) -> Result<()> {
        self.guard_writable()?;
        self.file.set_len(position).map_err(|e| FileError::io(&self.path, e))?;
        self.eof = position;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all().map_err(|e| FileError::io(&self.path, e))
    }

    /// Enter the tighter idle recheck loop once the initial idle wait has
    /// elapsed. Returns `false` once the actor should shut down.
    async fn idle_recheck_loop(&mut self, rx: &mut mpsc::Receiver<Request>) -> bool {
        loop {
            let owner_died = owner_signal(&self.owner);
            tokio::select! {
                biased;
                () = owner_died => return false,
                maybe_req = rx.recv() => {
                    return match maybe_req {
                        Some(req) => self.handle(req) == Control::Continue,
                        None => false,
                    };
                }
                () = tokio::time::sleep(self.idle_monitor_interval) => {
                    if self.owner.is_some() {
                        continue;
                    }
                    warn!(path = %self.path.display(), "closing idle file actor");
                    return false;
                }
            }
        }
    }
}
