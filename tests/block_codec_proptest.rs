//! Property suite for the pure block/chunk codecs (spec §8, items 1-4).

use ledgerfile::block::{frame, raw_read_len, unframe, BLOCK_SIZE};
use ledgerfile::chunk::{self, ChunkHeader};
use proptest::prelude::*;

proptest! {
    /// Chunk round-trip without an embedded MD5: decoding what was encoded
    /// always recovers the original payload, with the header reporting no
    /// MD5 and the right length.
    #[test]
    fn chunk_roundtrip_no_md5(payload in prop::collection::vec(any::<u8>(), 0..8192)) {
        let encoded = chunk::encode(&payload, None).unwrap();
        let mut hdr_buf = [0u8; 4];
        hdr_buf.copy_from_slice(&encoded[..4]);
        let header = ChunkHeader::parse(hdr_buf);
        prop_assert!(!header.has_md5);
        prop_assert_eq!(header.payload_len as usize, payload.len());

        let (decoded, md5) = chunk::split_body(header, &encoded[4..]);
        prop_assert_eq!(decoded, payload);
        prop_assert_eq!(md5, None);
    }

    /// Chunk round-trip with an embedded MD5: the signature recorded at
    /// encode time matches the payload's digest after decoding.
    #[test]
    fn chunk_roundtrip_with_md5(payload in prop::collection::vec(any::<u8>(), 0..8192)) {
        let digest = chunk::md5_of(&payload);
        let encoded = chunk::encode(&payload, Some(digest)).unwrap();

        let mut hdr_buf = [0u8; 4];
        hdr_buf.copy_from_slice(&encoded[..4]);
        let header = ChunkHeader::parse(hdr_buf);
        prop_assert!(header.has_md5);

        let (decoded, md5) = chunk::split_body(header, &encoded[4..]);
        prop_assert_eq!(decoded, payload);
        prop_assert_eq!(md5, Some(digest));
    }

    /// Block framing is invariant across every intra-block starting offset:
    /// whatever was framed, unframing it recovers exactly the original bytes.
    #[test]
    fn block_framing_roundtrip_any_offset(
        block_offset in 0u64..BLOCK_SIZE,
        payload in prop::collection::vec(any::<u8>(), 0..9000),
    ) {
        let framed = frame(block_offset, &payload);
        let back = unframe(block_offset, &framed);
        prop_assert_eq!(back, payload);
    }

    /// `raw_read_len` always predicts exactly how many raw bytes `frame`
    /// produces for the same (offset, length) pair.
    #[test]
    fn raw_read_len_matches_frame_output_length(
        block_offset in 0u64..BLOCK_SIZE,
        len in 0usize..9000,
    ) {
        let payload = vec![0xABu8; len];
        let framed = frame(block_offset, &payload);
        prop_assert_eq!(framed.len() as u64, raw_read_len(block_offset, len as u64));
    }
}
