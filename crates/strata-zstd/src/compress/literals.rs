//! Literals section encoding.
//!
//! Chooses between raw, RLE and Huffman-coded literals. A Huffman table is
//! only offered for reuse (treeless literals) while it is known to be the
//! table the decoder currently holds.

use super::EntropyState;
use crate::block::LiteralsHeader;
use crate::cursor::ByteWriter;
use crate::huffman::HuffmanEncoder;
use strata_core::Result;

pub use crate::block::LiteralsBlockType;

/// Below this many literals Huffman coding is not attempted.
pub const MIN_HUFFMAN_LITERALS: usize = 64;

/// From this many literals on, four streams are used.
const FOUR_STREAM_THRESHOLD: usize = 256;

/// Smallest saving that justifies an encoding over storing `len` bytes.
#[inline]
pub fn min_gain(len: usize) -> usize {
    (len >> 6) + 2
}

/// Encode `literals` into `out`, returning the section type used.
///
/// `state` is updated with the table the decoder will hold afterwards.
pub fn encode_literals(
    literals: &[u8],
    state: &mut EntropyState,
    out: &mut Vec<u8>,
) -> Result<LiteralsBlockType> {
    if let Some((&first, rest)) = literals.split_first() {
        if !rest.is_empty() && rest.iter().all(|&b| b == first) {
            write_header(&LiteralsHeader::rle(literals.len()), out)?;
            out.push(first);
            return Ok(LiteralsBlockType::Rle);
        }
    }

    if literals.len() >= MIN_HUFFMAN_LITERALS {
        if let Some(kind) = encode_huffman(literals, state, out)? {
            return Ok(kind);
        }
    }

    write_raw(literals, state, out)
}

fn write_raw(
    literals: &[u8],
    state: &mut EntropyState,
    out: &mut Vec<u8>,
) -> Result<LiteralsBlockType> {
    write_header(&LiteralsHeader::raw(literals.len()), out)?;
    out.extend_from_slice(literals);
    state.huffman_reusable = false;
    Ok(LiteralsBlockType::Raw)
}

/// Try Huffman coding with a fresh or the previous table.
///
/// Returns `None` without touching `out` when it does not pay off.
fn encode_huffman(
    literals: &[u8],
    state: &mut EntropyState,
    out: &mut Vec<u8>,
) -> Result<Option<LiteralsBlockType>> {
    let mut counts = [0u32; 256];
    for &byte in literals {
        counts[byte as usize] += 1;
    }

    let four_streams = literals.len() >= FOUR_STREAM_THRESHOLD;
    let jump_table = if four_streams { 6 } else { 0 };

    let fresh = HuffmanEncoder::build(&counts);
    let fresh_cost = fresh.as_ref().and_then(|encoder| {
        let bits = encoder.estimate_bits(&counts)?;
        Some(encoder.description().len() + bits.div_ceil(8) + jump_table)
    });

    let reused_cost = match (&state.huffman, state.huffman_reusable) {
        (Some(previous), true) => previous
            .estimate_bits(&counts)
            .map(|bits| bits.div_ceil(8) + jump_table),
        _ => None,
    };

    let treeless = match (fresh_cost, reused_cost) {
        (_, Some(reused)) if fresh_cost.map_or(true, |f| reused <= f) => true,
        (Some(_), _) => false,
        _ => return Ok(None),
    };

    let encoder = if treeless {
        state.huffman.as_ref()
    } else {
        fresh.as_ref()
    };
    let Some(encoder) = encoder else {
        return Ok(None);
    };

    let payload = if four_streams {
        match encoder.encode_four_streams(literals) {
            Some(payload) => payload,
            None => return Ok(None),
        }
    } else {
        encoder.encode_stream(literals)
    };

    let description: &[u8] = if treeless { &[] } else { encoder.description() };
    let compressed_size = description.len() + payload.len();
    let header = LiteralsHeader::huffman(literals.len(), compressed_size, four_streams, treeless);
    let raw_size = LiteralsHeader::raw(literals.len()).size() + literals.len();
    if header.size() + compressed_size + min_gain(literals.len()) > raw_size {
        return Ok(None);
    }

    write_header(&header, out)?;
    out.extend_from_slice(description);
    out.extend_from_slice(&payload);

    if !treeless {
        state.huffman = fresh;
    }
    state.huffman_reusable = true;
    Ok(Some(header.block_type))
}

fn write_header(header: &LiteralsHeader, out: &mut Vec<u8>) -> Result<()> {
    let mut buf = [0u8; 5];
    let mut writer = ByteWriter::new(&mut buf);
    header.write(&mut writer)?;
    let len = writer.position();
    out.extend_from_slice(&buf[..len]);
    Ok(())
}
