//! Header codec — MD5-signed checkpoint records written at block boundaries,
//! and the pure per-candidate parsing logic the backward scanner drives
//! (spec §4.3).
//!
//! A header's logical *signed* payload is `md5(payload) ++ payload`. On disk:
//!
//! ```text
//! [ zero padding to the next block boundary ]   (only if eof isn't aligned)
//! [ 0x01 ]                                       header block prefix
//! [ n:4 bytes big-endian ]                       n = len(signed)
//! [ block-framed(signed) starting at offset 5 ]
//! ```
//!
//! This module holds the pure byte-assembly (`prepare_write`) and
//! per-candidate-block parsing (`parse_prefix`, `try_decode`) used by the
//! backward scan. The scan loop itself — deciding which block to try next
//! and issuing the positioned reads — lives in `actor.rs`, since it is the
//! only place that owns the file descriptor.

use crate::block::{self, BLOCK_PREFIX_HEADER, BLOCK_SIZE};
use crate::chunk::md5_of;
use crate::error::{FileError, Result};

/// Intra-block offset at which a header's signed payload begins: one byte
/// for the `0x01` prefix, four bytes for the length word.
pub const SIGNED_PAYLOAD_OFFSET: u64 = 5;

pub struct HeaderWrite {
    /// Absolute file offset at which these bytes must be written.
    pub position: u64,
    /// The complete on-disk bytes: padding + prefix + length + framed signed payload.
    pub bytes: Vec<u8>,
    /// The new `eof` after this write lands.
    pub new_eof: u64,
}

/// Build the bytes (and position) for writing a header whose logical
/// payload is `payload`, given the file's current `eof`.
pub fn prepare_write(eof: u64, payload: &[u8]) -> Result<HeaderWrite> {
    let digest = md5_of(payload);
    let mut signed = Vec::with_capacity(16 + payload.len());
    signed.extend_from_slice(&digest);
    signed.extend_from_slice(payload);

    let n = u32::try_from(signed.len()).map_err(|_| FileError::HeaderTooLarge {
        len: signed.len(),
        max: u32::MAX as usize,
    })?;

    let block_offset = eof % BLOCK_SIZE;
    let padding = if block_offset == 0 { 0 } else { BLOCK_SIZE - block_offset };

    let mut bytes = Vec::with_capacity(padding as usize + 5 + signed.len() + signed.len() / 4095 + 1);
    bytes.resize(padding as usize, 0u8);
    bytes.push(BLOCK_PREFIX_HEADER);
    bytes.extend_from_slice(&n.to_be_bytes());
    bytes.extend_from_slice(&block::frame(SIGNED_PAYLOAD_OFFSET, &signed));

    let new_eof = eof + bytes.len() as u64;
    // Padding starts right where the append pointer already is; there is no
    // real data between `eof` and the next block boundary to preserve.
    Ok(HeaderWrite { position: eof, bytes, new_eof })
}

/// Result of inspecting the first 4096 bytes of a candidate header block.
pub struct HeaderPrefix {
    /// `n` parsed from bytes 1..5 — the declared length of the signed payload.
    pub declared_len: u32,
}

/// Check whether `block` (exactly [`BLOCK_SIZE`] bytes, read at a block
/// boundary) begins a header record. Returns `None` if the prefix byte is
/// not `0x01` — the caller should then try the previous block.
pub fn parse_prefix(block: &[u8]) -> Option<HeaderPrefix> {
    if block.len() < 5 || block[0] != BLOCK_PREFIX_HEADER {
        return None;
    }
    let mut len_buf = [0u8; 4];
    len_buf.copy_from_slice(&block[1..5]);
    Some(HeaderPrefix { declared_len: u32::from_be_bytes(len_buf) })
}

/// Raw bytes needed, counted from intra-block offset 5, to recover a signed
/// payload of `declared_len` bytes once unframed.
pub fn raw_len_needed(declared_len: u32) -> u64 {
    block::raw_read_len(SIGNED_PAYLOAD_OFFSET, declared_len as u64)
}

/// Attempt to decode a header's user payload from the raw bytes starting at
/// intra-block offset 5 (exactly [`raw_len_needed`] bytes). Returns `None`
/// on any mismatch — malformed framing, or an MD5 that doesn't match — in
/// which case the scanner should fall back to the previous block. This is
/// deliberately *not* treated as [`FileError::FileCorruption`]: an
/// unrelated data block merely happening to start with `0x01` is expected,
/// ordinary scan noise, not evidence of a damaged file.
pub fn try_decode(declared_len: u32, raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() as u64 != raw_len_needed(declared_len) {
        return None;
    }
    let signed = block::unframe(SIGNED_PAYLOAD_OFFSET, raw);
    if signed.len() != declared_len as usize || signed.len() < 16 {
        return None;
    }
    let (digest, payload) = signed.split_at(16);
    if md5_of(payload) != digest {
        return None;
    }
    Some(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_write_pads_to_block_boundary() {
        let hw = prepare_write(10, b"payload").unwrap();
        assert_eq!(hw.position, 10);
        // 4086 bytes of padding to reach the next block boundary (4096),
        // then the header itself.
        assert_eq!(hw.position + 4086, 4096);
        assert_eq!(hw.bytes[4086], BLOCK_PREFIX_HEADER);
    }

    #[test]
    fn prepare_write_no_padding_when_aligned() {
        let hw = prepare_write(4096, b"payload").unwrap();
        assert_eq!(hw.position, 4096);
        assert_eq!(hw.bytes[0], BLOCK_PREFIX_HEADER);
    }

    #[test]
    fn write_then_scan_roundtrip_small_payload() {
        let payload = b"{\"foo\":1}".to_vec();
        let hw = prepare_write(0, &payload).unwrap();

        // Simulate reading back a full 4096-byte block at hw.position.
        let mut block = hw.bytes.clone();
        block.resize(4096, 0);
        let prefix = parse_prefix(&block).unwrap();

        let needed = raw_len_needed(prefix.declared_len) as usize;
        // Everything we need is already within the first block, past offset 5.
        let available = &block[5..];
        let raw = &available[..needed.min(available.len())];
        let decoded = try_decode(prefix.declared_len, raw).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn garbage_block_is_rejected_not_corrupted() {
        let block = vec![0u8; 4096];
        assert!(parse_prefix(&block).is_none());
    }
}
