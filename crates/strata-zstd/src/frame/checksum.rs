//! XXHash64 content checksum.
//!
//! The frame trailer stores the low 32 bits of XXH64 (seed 0) over the
//! decompressed content of the frame.

use xxhash_rust::xxh64::xxh64;

/// XXHash64 of `data` with the given seed.
#[inline]
pub fn xxhash64(data: &[u8], seed: u64) -> u64 {
    xxh64(data, seed)
}

/// The 32-bit value stored in a frame's checksum trailer.
#[inline]
pub fn content_checksum(data: &[u8]) -> u32 {
    xxhash64(data, 0) as u32
}
