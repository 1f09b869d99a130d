//! Block-level encoding.
//!
//! Every block is tried as RLE, then as a compressed block, and stored raw
//! when compression does not save at least the minimum gain. Entropy state
//! changes made while building a compressed block only become visible to
//! later blocks when that block is actually emitted.

use tracing::trace;

use super::literals::{encode_literals, min_gain};
use super::match_finder::MatchFinder;
use super::sequences::encode_sequences;
use super::EntropyState;
use crate::cursor::ByteWriter;
use crate::frame::{BlockHeader, BlockType, MAX_BLOCK_SIZE};
use strata_core::Result;

/// Encode `input[start..end]` as one block.
///
/// `finder` is `None` when the level does not search for matches, in which
/// case blocks are only stored raw or as RLE.
pub fn compress_block(
    input: &[u8],
    start: usize,
    end: usize,
    last_block: bool,
    finder: Option<&mut MatchFinder>,
    state: &mut EntropyState,
    output: &mut ByteWriter<'_>,
) -> Result<BlockType> {
    let block = &input[start..end];
    debug_assert!(block.len() <= MAX_BLOCK_SIZE);

    if let Some((&byte, rest)) = block.split_first() {
        if rest.iter().all(|&b| b == byte) {
            BlockHeader {
                last_block,
                block_type: BlockType::Rle,
                block_size: block.len(),
            }
            .write(output)?;
            output.write_u8(byte)?;
            trace!("RLE block at {}: {} bytes", start, block.len());
            return Ok(BlockType::Rle);
        }
    }

    if let Some(finder) = finder {
        let mut tentative = state.clone();
        let body = encode_compressed(input, start, end, finder, &mut tentative)?;
        if body.len() + min_gain(block.len()) < block.len() {
            BlockHeader {
                last_block,
                block_type: BlockType::Compressed,
                block_size: body.len(),
            }
            .write(output)?;
            output.write_slice(&body)?;
            *state = tentative;
            trace!(
                "Compressed block at {}: {} -> {} bytes",
                start,
                block.len(),
                body.len()
            );
            return Ok(BlockType::Compressed);
        }
    }

    BlockHeader {
        last_block,
        block_type: BlockType::Raw,
        block_size: block.len(),
    }
    .write(output)?;
    output.write_slice(block)?;
    trace!("Raw block at {}: {} bytes", start, block.len());
    Ok(BlockType::Raw)
}

/// Build the literals and sequences sections of a compressed block.
fn encode_compressed(
    input: &[u8],
    start: usize,
    end: usize,
    finder: &mut MatchFinder,
    state: &mut EntropyState,
) -> Result<Vec<u8>> {
    let store = finder.find_sequences(input, start, end, &mut state.repeat_offsets);
    let mut body = Vec::with_capacity(end - start);
    encode_literals(&store.literals, state, &mut body)?;
    encode_sequences(&store.sequences, state, &mut body)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{decode_compressed_block, FrameDecodeState};
    use crate::compress::CompressionParameters;
    use crate::cursor::ByteCursor;

    struct Encoded {
        bytes: Vec<u8>,
        kinds: Vec<BlockType>,
    }

    fn encode_blocks(input: &[u8], block_size: usize) -> Encoded {
        let params = CompressionParameters::default();
        let window = params.window_size(input.len());
        let mut finder = MatchFinder::new(&params, window, input.len());
        let mut state = EntropyState::new();
        let mut out = vec![0u8; input.len() * 2 + 64];
        let mut writer = ByteWriter::new(&mut out);
        let mut kinds = Vec::new();

        let mut start = 0;
        while start < input.len() {
            let end = (start + block_size).min(input.len());
            let kind = compress_block(
                input,
                start,
                end,
                end == input.len(),
                Some(&mut finder),
                &mut state,
                &mut writer,
            )
            .unwrap();
            kinds.push(kind);
            start = end;
        }
        let len = writer.position();
        out.truncate(len);
        Encoded { bytes: out, kinds }
    }

    fn decode_blocks(encoded: &[u8], size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        let mut writer = ByteWriter::new(&mut out);
        let mut state = FrameDecodeState::new();
        let mut cursor = ByteCursor::new(encoded);
        while !cursor.is_empty() {
            let header = BlockHeader::parse(&mut cursor).unwrap();
            match header.block_type {
                BlockType::Raw => {
                    let content = cursor.read_slice(header.block_size).unwrap();
                    writer.write_slice(content).unwrap();
                }
                BlockType::Rle => {
                    let byte = cursor.read_u8().unwrap();
                    writer.fill(byte, header.block_size).unwrap();
                }
                BlockType::Compressed => {
                    let block = cursor.sub_cursor(header.block_size).unwrap();
                    decode_compressed_block(block, &mut state, &mut writer).unwrap();
                }
            }
        }
        let len = writer.position();
        out.truncate(len);
        out
    }

    fn sentence_text(len: usize) -> Vec<u8> {
        let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta"];
        let mut out = Vec::with_capacity(len);
        let mut i = 0usize;
        while out.len() < len {
            out.extend_from_slice(words[(i * 7 + i / 3) % words.len()].as_bytes());
            out.push(if i % 11 == 10 { b'\n' } else { b' ' });
            i += 1;
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_uniform_block_is_rle() {
        let input = vec![0x42u8; 20_000];
        let encoded = encode_blocks(&input, MAX_BLOCK_SIZE);
        assert_eq!(encoded.kinds, [BlockType::Rle]);
        assert_eq!(encoded.bytes.len(), 4);
        assert_eq!(decode_blocks(&encoded.bytes, input.len()), input);
    }

    #[test]
    fn test_text_block_is_compressed() {
        let input = sentence_text(50_000);
        let encoded = encode_blocks(&input, MAX_BLOCK_SIZE);
        assert_eq!(encoded.kinds, [BlockType::Compressed]);
        assert!(encoded.bytes.len() < input.len() / 4);
        assert_eq!(decode_blocks(&encoded.bytes, input.len()), input);
    }

    #[test]
    fn test_multiple_blocks_share_history() {
        let input = sentence_text(60_000);
        let encoded = encode_blocks(&input, 8192);
        assert!(encoded.kinds.len() > 1);
        assert!(encoded.kinds.iter().all(|&k| k == BlockType::Compressed));
        assert_eq!(decode_blocks(&encoded.bytes, input.len()), input);
    }

    #[test]
    fn test_incompressible_block_is_raw() {
        let mut seed = 0x2545_F491_4F6C_DD1Du64;
        let input: Vec<u8> = (0..4096)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                seed as u8
            })
            .collect();
        let encoded = encode_blocks(&input, MAX_BLOCK_SIZE);
        assert_eq!(encoded.kinds, [BlockType::Raw]);
        assert_eq!(encoded.bytes.len(), input.len() + 3);
        assert_eq!(decode_blocks(&encoded.bytes, input.len()), input);
    }

    #[test]
    fn test_discarded_block_keeps_state() {
        // Text, then noise that is stored raw, then text again: the third
        // block must only rely on state the decoder has actually seen.
        let mut input = sentence_text(10_000);
        let mut seed = 7u32;
        input.extend((0..10_000).map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as u8
        }));
        input.extend_from_slice(&sentence_text(10_000));

        let encoded = encode_blocks(&input, 10_000);
        assert_eq!(encoded.kinds[1], BlockType::Raw);
        assert_eq!(decode_blocks(&encoded.bytes, input.len()), input);
    }

    #[test]
    fn test_store_level_never_compresses() {
        let input = sentence_text(5000);
        let mut state = EntropyState::new();
        let mut out = vec![0u8; 6000];
        let mut writer = ByteWriter::new(&mut out);
        let kind = compress_block(&input, 0, input.len(), true, None, &mut state, &mut writer)
            .unwrap();
        assert_eq!(kind, BlockType::Raw);
        assert_eq!(writer.position(), input.len() + 3);
    }
}
