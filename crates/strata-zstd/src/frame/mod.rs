//! Zstandard frame format.
//!
//! Reads and writes the framing layer of RFC 8878: magic number, frame
//! header, block headers and the optional content checksum.
//!
//! ## Frame Structure
//!
//! ```text
//! +-------------------+
//! | Magic_Number      | 4 bytes (0xFD2FB528)
//! +-------------------+
//! | Frame_Header      | 2-14 bytes
//! +-------------------+
//! | Data_Block(s)     | variable
//! +-------------------+
//! | Content_Checksum  | 0-4 bytes (optional)
//! +-------------------+
//! ```
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1)

mod block;
mod checksum;
mod header;

pub use block::{BlockHeader, BlockType};
pub use checksum::{content_checksum, xxhash64};
pub use header::{
    read_frame_header, read_magic, verify_magic, write_frame_header, write_magic,
    FrameDescriptor, FrameHeader, WindowDescriptor, MAX_FRAME_HEADER_SIZE,
};

/// Zstd magic number (little-endian: 0xFD2FB528).
pub const ZSTD_MAGIC: u32 = 0xFD2FB528;

/// Skippable frame magic range: 0x184D2A50 to 0x184D2A5F.
pub const SKIPPABLE_MAGIC_LOW: u32 = 0x184D2A50;
pub const SKIPPABLE_MAGIC_HIGH: u32 = 0x184D2A5F;

/// Minimum window size (1 KB).
pub const MIN_WINDOW_SIZE: u64 = 1 << 10;

/// Largest block content, compressed or not (128 KB).
pub const MAX_BLOCK_SIZE: usize = 1 << 17;

/// Size of the content checksum trailer.
pub const CHECKSUM_SIZE: usize = 4;

/// True if `magic` marks a skippable frame.
#[inline]
pub fn is_skippable_magic(magic: u32) -> bool {
    (SKIPPABLE_MAGIC_LOW..=SKIPPABLE_MAGIC_HIGH).contains(&magic)
}
