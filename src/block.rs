//! Block framing — hides the per-block prefix byte from every upper layer.
//!
//! # On-disk layout
//!
//! The file is a sequence of 4 KiB blocks, each aligned on a 4096-byte
//! boundary. Byte 0 of every block is a **prefix byte**, never part of any
//! payload:
//!
//! ```text
//! Offset  Size   Field
//!    0      1    block prefix: 0x00 = data block, 0x01 = header block
//!    1   4095    payload bytes
//! ```
//!
//! [`frame`]/[`unframe`] only ever splice the ordinary `0x00` data-block
//! prefix — they are what the chunk codec uses directly, since chunks only
//! ever start at whatever offset `eof` happens to land on. The header codec
//! (`header.rs`) writes its own leading `0x01` prefix byte by hand (headers
//! always start a fresh block) and then calls `frame` starting at intra-block
//! offset 5, so any *further* blocks a long header spills into still get the
//! ordinary `0x00` prefix — only the very first byte of a header record is
//! special.
//!
//! Everything here is a pure function over byte slices — no I/O, no global
//! state — so it can be exhaustively property-tested and reused by both the
//! chunk codec and the header scanner.

pub const BLOCK_SIZE: u64 = 4096;
pub const BLOCK_PREFIX_DATA: u8 = 0x00;
pub const BLOCK_PREFIX_HEADER: u8 = 0x01;

/// Number of payload bytes available from `block_offset` to the next block
/// boundary (i.e. before a prefix byte must be inserted).
#[inline]
fn room(block_offset: u64) -> u64 {
    BLOCK_SIZE - block_offset
}

/// Splice `0x00` block-prefix bytes into `payload` as it is written starting
/// at intra-block offset `block_offset` (`0 <= block_offset < 4096`).
///
/// If `block_offset == 0`, the returned bytes begin with a prefix byte
/// before any payload — this is the only case where `frame` itself contributes
/// a leading prefix; the header codec's own `0x01` prefix is written
/// separately and `frame` is then invoked at offset 5, never 0, so it never
/// collides with the header marker.
pub fn frame(block_offset: u64, payload: &[u8]) -> Vec<u8> {
    assert!(block_offset < BLOCK_SIZE, "block_offset out of range");

    let mut out = Vec::with_capacity(payload.len() + payload.len() / 4095 + 1);
    let mut off = block_offset;
    let mut rest = payload;

    loop {
        if off == 0 {
            out.push(BLOCK_PREFIX_DATA);
            off = 1;
            continue;
        }

        let avail = room(off) as usize;
        if rest.len() <= avail {
            out.extend_from_slice(rest);
            break;
        }

        let (head, tail) = rest.split_at(avail);
        out.extend_from_slice(head);
        rest = tail;
        off = 0;
    }

    out
}

/// Inverse of [`frame`]: strip the prefix byte inserted at every block
/// boundary crossed while the original payload was written starting at
/// `block_offset`, recovering the original payload bytes from `raw`.
pub fn unframe(block_offset: u64, raw: &[u8]) -> Vec<u8> {
    assert!(block_offset < BLOCK_SIZE, "block_offset out of range");

    let mut out = Vec::with_capacity(raw.len());
    let mut off = block_offset;
    let mut rest = raw;

    loop {
        if rest.is_empty() {
            break;
        }

        if off == 0 {
            // The byte at this position is a prefix, not payload — discard it.
            rest = &rest[1..];
            off = 1;
            continue;
        }

        let avail = room(off) as usize;
        let take = avail.min(rest.len());
        out.extend_from_slice(&rest[..take]);
        rest = &rest[take..];
        off += take as u64;
        if off == BLOCK_SIZE {
            off = 0;
        }
    }

    out
}

/// The number of raw bytes that must be read starting at `block_offset` to
/// recover exactly `payload_len` payload bytes once unframed.
pub fn raw_read_len(block_offset: u64, payload_len: u64) -> u64 {
    assert!(block_offset < BLOCK_SIZE, "block_offset out of range");

    if block_offset == 0 {
        return raw_read_len(1, payload_len) + 1;
    }

    let remaining = room(block_offset);
    if payload_len <= remaining {
        return payload_len;
    }

    let overflow = payload_len - remaining;
    // Each subsequent full block holds 4095 payload bytes behind a 1-byte
    // prefix; round up since a partial trailing block still costs one prefix.
    let extra_prefixes = overflow.div_ceil(4095);
    payload_len + extra_prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_frames_to_nothing() {
        assert_eq!(frame(1, &[]), Vec::<u8>::new());
    }

    #[test]
    fn frame_at_zero_emits_leading_prefix() {
        let out = frame(0, b"hello");
        assert_eq!(out, b"\x00hello");
    }

    #[test]
    fn frame_continuation_blocks_use_data_prefix() {
        // A payload spanning two blocks from offset 0 carries the data
        // prefix (0x00) at both the start and the continuation block.
        let payload = vec![b'x'; 4096 + 10];
        let out = frame(0, &payload);
        assert_eq!(out[0], BLOCK_PREFIX_DATA);
        // layout: [0x00][4095 bytes][0x00][15 bytes]
        assert_eq!(out[1 + 4095], BLOCK_PREFIX_DATA);
    }

    #[test]
    fn frame_unframe_roundtrip_various_offsets() {
        for &off in &[0u64, 1, 4095, 10, 2000] {
            for &len in &[0usize, 1, 10, 4095, 4096, 4097, 8192, 8193, 20000] {
                let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let framed = frame(off, &payload);
                let raw_len = raw_read_len(off, len as u64);
                assert_eq!(framed.len() as u64, raw_len, "off={off} len={len}");
                let back = unframe(off, &framed);
                assert_eq!(back, payload, "off={off} len={len}");
            }
        }
    }

    #[test]
    fn raw_read_len_exact_fit_no_extra_prefix() {
        // Starting right after a prefix byte, room is 4095; exactly filling
        // it needs no further prefix byte.
        assert_eq!(raw_read_len(1, 4095), 4095);
    }

    #[test]
    fn raw_read_len_overflow_by_one_costs_one_prefix() {
        assert_eq!(raw_read_len(1, 4096), 4096 + 1);
    }

    #[test]
    fn raw_read_len_from_zero_includes_leading_prefix() {
        assert_eq!(raw_read_len(0, 5), raw_read_len(1, 5) + 1);
    }
}
