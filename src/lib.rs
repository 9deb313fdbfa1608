//! # ledgerfile — block-framed, append-only file store
//!
//! Format guarantees:
//! - The file is a sequence of 4 KiB blocks; byte 0 of every block is a
//!   prefix (`0x00` data, `0x01` header) never exposed to callers
//! - Chunks are tagged-length: a 4-byte big-endian header (1 tag bit + 31
//!   length bits) optionally followed by a 16-byte MD5, then the payload
//! - Header checkpoints are MD5-signed and always start at a fresh block;
//!   the most recent valid one is found by scanning backward from `eof`
//! - All mutating access to a given file is serialized through one owning
//!   actor task; there is no external locking
//! - Corruption (an MD5 mismatch on read) is fatal to the read and to the
//!   actor — the file is not self-healing

pub mod actor;
pub mod block;
pub mod chunk;
pub mod config;
pub mod delete;
pub mod error;
pub mod file;
pub mod header;

pub use config::OpenOptions;
pub use error::{FileError, Result};
pub use file::LedgerFile;
