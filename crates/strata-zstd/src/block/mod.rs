//! Zstd block decoding.
//!
//! This module implements the decoding of Zstd compressed blocks,
//! including literals and sequences sections.
//!
//! ## Block Structure
//!
//! A compressed block contains:
//! 1. Literals Section - raw byte data
//! 2. Sequences Section - LZ77 commands (literal length, offset, match length)
//!
//! Sequences are executed as they are decoded, straight into the frame's
//! output region, so a bad back-reference is reported at the bitstream
//! position that produced it.
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1.1)

mod literals;
mod sequences;

pub use literals::{decode_literals, LiteralsBlockType, LiteralsHeader};
pub use sequences::{
    encode_sequence_count, literal_length_code, match_length_code, offset_code,
    read_sequence_count, RepeatOffsets, Sequence, SequenceDecoder, SequenceTables,
    SequencesHeader, SymbolMode, LITERAL_LENGTH_BASELINE, MATCH_LENGTH_BASELINE, MAX_LL_LOG,
    MAX_LL_SYMBOL, MAX_ML_LOG, MAX_ML_SYMBOL, MAX_OF_LOG, MAX_OF_SYMBOL, MAX_SEQUENCES,
    MIN_MATCH,
};

use crate::cursor::{ByteCursor, ByteWriter};
use crate::frame::MAX_BLOCK_SIZE;
use crate::huffman::HuffmanTable;
use strata_core::{Error, Result};

/// Entropy state carried from block to block within one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDecodeState {
    pub repeat_offsets: RepeatOffsets,
    pub huffman: Option<HuffmanTable>,
    pub tables: SequenceTables,
}

impl FrameDecodeState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decode a raw block (uncompressed).
pub fn decode_raw_block(content: &[u8], output: &mut ByteWriter<'_>) -> Result<()> {
    output.write_slice(content)
}

/// Decode an RLE block (single byte repeated).
pub fn decode_rle_block(byte: u8, size: usize, output: &mut ByteWriter<'_>) -> Result<()> {
    output.fill(byte, size)
}

/// Decode a compressed block.
///
/// `output` must cover exactly the current frame's region: match distances
/// are checked against the bytes it holds.
pub fn decode_compressed_block(
    mut block: ByteCursor<'_>,
    state: &mut FrameDecodeState,
    output: &mut ByteWriter<'_>,
) -> Result<()> {
    let block_start = block.offset();
    if block.is_empty() {
        return Err(Error::corrupted_at("empty compressed block", block_start));
    }

    let literals = decode_literals(&mut block, &mut state.huffman)?;
    let header = SequencesHeader::parse(&mut block)?;

    let produced_before = output.position();
    if header.num_sequences == 0 {
        if !block.is_empty() {
            return Err(Error::corrupted_at(
                "trailing bytes after empty sequences section",
                block.offset(),
            ));
        }
        output.write_slice(&literals)?;
    } else {
        state.tables.update(&header, &mut block)?;
        execute_sequences(
            &literals,
            &block,
            header.num_sequences,
            state,
            output,
        )?;
    }

    let produced = output.position() - produced_before;
    if produced > MAX_BLOCK_SIZE {
        return Err(Error::corrupted_at(
            format!("block decodes to {} bytes, above the block maximum", produced),
            block_start,
        ));
    }
    Ok(())
}

/// Decode and execute every sequence of the section's bitstream.
fn execute_sequences(
    literals: &[u8],
    stream: &ByteCursor<'_>,
    count: usize,
    state: &mut FrameDecodeState,
    output: &mut ByteWriter<'_>,
) -> Result<()> {
    let mut decoder = SequenceDecoder::new(&state.tables, stream.rest(), stream.offset(), count)?;
    let mut literal_pos = 0;
    let block_start = output.position();

    for _ in 0..count {
        let seq = decoder.next_sequence(&mut state.repeat_offsets)?;

        let produced = output.position() - block_start;
        if produced + seq.literal_length + seq.match_length > MAX_BLOCK_SIZE {
            return Err(Error::corrupted_at(
                format!(
                    "sequence of {} bytes runs past the block maximum after {} bytes",
                    seq.literal_length + seq.match_length,
                    produced
                ),
                decoder.offset(),
            ));
        }

        let literal_end = literal_pos + seq.literal_length;
        if literal_end > literals.len() {
            return Err(Error::corrupted_at(
                format!(
                    "literal length {} exceeds the {} literals left",
                    seq.literal_length,
                    literals.len() - literal_pos
                ),
                decoder.offset(),
            ));
        }
        output.write_slice(&literals[literal_pos..literal_end])?;
        literal_pos = literal_end;

        let available = output.position();
        if seq.distance > available {
            return Err(Error::corrupt_sequence(
                decoder.offset(),
                seq.distance,
                available,
            ));
        }
        output.copy_match(seq.distance, seq.match_length)?;
    }
    decoder.finish()?;

    output.write_slice(&literals[literal_pos..])
}

// =============================================================================
// Tests
// =============================================================================
