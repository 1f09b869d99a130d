//! Zstd compression pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Input Data
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Match Finding (LZ77)               │
//! │  - Hash chains over the frame input │
//! │  - Greedy / lazy selection          │
//! │  - Repeat offset candidates         │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Block Encoding                     │
//! │  - Literals (Raw/RLE/Huffman)       │
//! │  - Sequences (RLE/Predefined/FSE/   │
//! │    Repeat)                          │
//! │  - Block type selection             │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Frame Assembly                     │
//! │  - Magic number                     │
//! │  - Frame header                     │
//! │  - Blocks                           │
//! │  - XXHash64 checksum                │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Entropy State
//!
//! Blocks of one frame share entropy state: repeat offsets, the last
//! Huffman table and the last FSE table of each sequence stream. The
//! decoder only learns about a table when a block using it is emitted, so
//! each block is encoded against a copy of [`EntropyState`] that replaces
//! the frame's state only if the compressed block is kept. A Huffman table
//! is additionally marked non-reusable whenever a block emits raw literals.
//!
//! ## Components
//!
//! - `params`: level to window/hash/chain/strategy mapping
//! - `match_finder`: LZ77 match finding using hash chains
//! - `literals`: literals section encoding
//! - `sequences`: sequences section encoding with table selection
//! - `block`: block type selection and emission

mod block;
mod literals;
mod match_finder;
mod params;
mod sequences;

pub use block::compress_block;
pub use literals::{encode_literals, min_gain, MIN_HUFFMAN_LITERALS};
pub use match_finder::{searches_matches, MatchFinder, SequenceRecord, SequenceStore};
pub use params::{CompressionParameters, Strategy, MAX_WINDOW_LOG, MIN_WINDOW_LOG};
pub use sequences::encode_sequences;

use tracing::debug;

use crate::block::RepeatOffsets;
use crate::cursor::ByteWriter;
use crate::frame::{
    content_checksum, write_frame_header, write_magic, BlockHeader, BlockType, MAX_BLOCK_SIZE,
};
use crate::fse::FseEncodeTable;
use crate::huffman::HuffmanEncoder;
use strata_core::{CompressionRatio, Error, Result};

/// Encoder-side state shared by the blocks of one frame.
#[derive(Debug, Clone, Default)]
pub struct EntropyState {
    pub repeat_offsets: RepeatOffsets,
    /// Last Huffman table emitted in a tree description.
    pub huffman: Option<HuffmanEncoder>,
    /// Whether `huffman` may be reused by treeless literals.
    pub huffman_reusable: bool,
    pub literal_lengths: Option<FseEncodeTable>,
    pub offsets: Option<FseEncodeTable>,
    pub match_lengths: Option<FseEncodeTable>,
}

impl EntropyState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Upper bound on the compressed size of `input_len` bytes.
///
/// Covers frame overhead for tiny inputs and block header overhead for
/// large ones: `n + n/256`, plus `(128K - n) / 2048` below 128 KiB.
pub fn max_compressed_length(input_len: usize) -> usize {
    let small_margin = if input_len < MAX_BLOCK_SIZE {
        (MAX_BLOCK_SIZE - input_len) >> 11
    } else {
        0
    };
    input_len + (input_len >> 8) + small_margin
}

/// Compress `input` as one frame into `output`.
///
/// Fails with a capacity error unless `output` holds at least
/// [`max_compressed_length`] bytes. Returns the frame size.
pub fn compress_frame(
    input: &[u8],
    output: &mut [u8],
    params: &CompressionParameters,
    checksum: bool,
) -> Result<usize> {
    let required = max_compressed_length(input.len());
    if output.len() < required {
        return Err(Error::buffer_too_small(required, output.len()));
    }

    let window_size = params.window_size(input.len());
    let block_size = usize::try_from(window_size)
        .map_or(MAX_BLOCK_SIZE, |window| window.min(MAX_BLOCK_SIZE));

    let mut writer = ByteWriter::new(output);
    write_magic(&mut writer)?;
    write_frame_header(&mut writer, input.len() as u64, window_size, checksum)?;

    if input.is_empty() {
        BlockHeader {
            last_block: true,
            block_type: BlockType::Raw,
            block_size: 0,
        }
        .write(&mut writer)?;
    }

    let mut finder =
        searches_matches(params).then(|| MatchFinder::new(params, window_size, input.len()));
    let mut state = EntropyState::new();
    let mut blocks = 0usize;
    let mut start = 0;
    while start < input.len() {
        let end = (start + block_size).min(input.len());
        compress_block(
            input,
            start,
            end,
            end == input.len(),
            finder.as_mut(),
            &mut state,
            &mut writer,
        )?;
        blocks += 1;
        start = end;
    }

    if checksum {
        writer.write_u32_le(content_checksum(input))?;
    }

    let written = writer.position();
    debug!(
        "Compressed frame: {} -> {} bytes in {} blocks (ratio {:.2}, window {})",
        input.len(),
        written,
        blocks,
        CompressionRatio::new(input.len(), written).ratio(),
        window_size
    );
    Ok(written)
}
