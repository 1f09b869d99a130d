//! Huffman encoding for literals.
//!
//! Builds length-limited canonical codes, serializes them as Zstandard
//! weights (FSE-compressed when that is smaller, direct nibbles otherwise)
//! and encodes literal streams.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::decoder::read_weights;
use super::{HUFFMAN_MAX_BITS, HUFFMAN_MAX_WEIGHT_LOG};
use crate::cursor::ByteCursor;
use crate::fse::{
    normalize_counts, optimal_accuracy_log, write_normalized_counts, BitWriter, FseEncodeTable,
    FseEncoder,
};

/// Most weights the direct (4-bit) representation can carry.
const MAX_DIRECT_WEIGHTS: usize = 128;

/// Huffman code for one literal byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Code {
    bits: u16,
    len: u8,
}

/// Huffman encoder for literal bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanEncoder {
    codes: [Code; 256],
    max_bits: u8,
    /// Serialized tree description.
    description: Vec<u8>,
}

impl HuffmanEncoder {
    /// Build an encoder for the byte histogram `counts`.
    ///
    /// Returns `None` when at least two distinct symbols are not present or
    /// when the resulting weights cannot be described in a tree header.
    pub fn build(counts: &[u32; 256]) -> Option<Self> {
        let lengths = limited_code_lengths(counts, HUFFMAN_MAX_BITS)?;
        let max_bits = *lengths.iter().max()?;
        let last_symbol = lengths.iter().rposition(|&len| len > 0)?;

        let weights: Vec<u8> = lengths[..last_symbol]
            .iter()
            .map(|&len| if len > 0 { max_bits + 1 - len } else { 0 })
            .collect();
        let description = describe_weights(&weights)?;

        // Canonical assignment mirroring the decoder: longest codes take the
        // lowest prefixes, ascending symbol order within a length.
        let mut rank_count = [0usize; HUFFMAN_MAX_BITS as usize + 1];
        for &len in lengths.iter() {
            rank_count[len as usize] += 1;
        }
        let mut rank_idx = [0usize; HUFFMAN_MAX_BITS as usize + 1];
        let mut next = 0usize;
        for len in (1..=max_bits as usize).rev() {
            rank_idx[len] = next;
            next += rank_count[len] << (max_bits as usize - len);
        }

        let mut codes = [Code::default(); 256];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let shift = (max_bits - len) as usize;
            codes[symbol] = Code {
                bits: (rank_idx[len as usize] >> shift) as u16,
                len,
            };
            rank_idx[len as usize] += 1 << shift;
        }

        Some(Self {
            codes,
            max_bits,
            description,
        })
    }

    #[inline]
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    /// Serialized tree description (header byte plus weights).
    pub fn description(&self) -> &[u8] {
        &self.description
    }

    /// Payload bits needed to code `counts`, or `None` if a present symbol has no code.
    pub fn estimate_bits(&self, counts: &[u32; 256]) -> Option<usize> {
        let mut total = 0usize;
        for (code, &count) in self.codes.iter().zip(counts.iter()) {
            if count == 0 {
                continue;
            }
            if code.len == 0 {
                return None;
            }
            total += count as usize * code.len as usize;
        }
        Some(total)
    }

    /// Encode one stream; the first literal ends up in the highest bits.
    pub fn encode_stream(&self, literals: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(literals.len() * self.max_bits as usize / 8 + 8);
        for &byte in literals.iter().rev() {
            let code = self.codes[byte as usize];
            writer.write_bits(u64::from(code.bits), u32::from(code.len));
        }
        writer.close()
    }

    /// Encode four streams with their jump table.
    ///
    /// Returns `None` if one of the first three streams exceeds the 16-bit
    /// size field.
    pub fn encode_four_streams(&self, literals: &[u8]) -> Option<Vec<u8>> {
        let segment = literals.len().div_ceil(4);
        let streams = self.encode_segments(literals, segment);

        let mut out = Vec::with_capacity(6 + streams.iter().map(Vec::len).sum::<usize>());
        for stream in &streams[..3] {
            let size = u16::try_from(stream.len()).ok()?;
            out.extend_from_slice(&size.to_le_bytes());
        }
        for stream in &streams {
            out.extend_from_slice(stream);
        }
        Some(out)
    }

    #[cfg(not(feature = "parallel"))]
    fn encode_segments(&self, literals: &[u8], segment: usize) -> Vec<Vec<u8>> {
        split_segments(literals, segment)
            .into_iter()
            .map(|part| self.encode_stream(part))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn encode_segments(&self, literals: &[u8], segment: usize) -> Vec<Vec<u8>> {
        use rayon::prelude::*;

        split_segments(literals, segment)
            .into_par_iter()
            .map(|part| self.encode_stream(part))
            .collect()
    }
}

fn split_segments(literals: &[u8], segment: usize) -> Vec<&[u8]> {
    let (first, rest) = literals.split_at(segment);
    let (second, rest) = rest.split_at(segment);
    let (third, fourth) = rest.split_at(segment);
    vec![first, second, third, fourth]
}

// =============================================================================
// Code lengths
// =============================================================================

/// Huffman code lengths for `counts`, limited to `max_len` bits.
///
/// The result is always a complete prefix code. Returns `None` for fewer
/// than two present symbols.
fn limited_code_lengths(counts: &[u32; 256], max_len: u8) -> Option<[u8; 256]> {
    let present: Vec<usize> = (0..256).filter(|&s| counts[s] > 0).collect();
    if present.len() < 2 {
        return None;
    }

    // Plain Huffman construction; node ids >= 256 are internal.
    let mut parent = vec![usize::MAX; 512];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = present
        .iter()
        .map(|&s| Reverse((u64::from(counts[s]), s)))
        .collect();
    let mut next_internal = 256;
    while heap.len() > 1 {
        let Reverse((w1, n1)) = heap.pop()?;
        let Reverse((w2, n2)) = heap.pop()?;
        parent[n1] = next_internal;
        parent[n2] = next_internal;
        heap.push(Reverse((w1 + w2, next_internal)));
        next_internal += 1;
    }

    let mut lengths = [0u8; 256];
    for &s in &present {
        let mut depth = 0u32;
        let mut node = s;
        while parent[node] != usize::MAX {
            node = parent[node];
            depth += 1;
        }
        lengths[s] = depth.min(u32::from(max_len)) as u8;
    }

    // Kraft sum in units of 2^-max_len must equal exactly 2^max_len.
    let capacity = 1u64 << max_len;
    let kraft = |lengths: &[u8; 256]| -> u64 {
        present
            .iter()
            .map(|&s| 1u64 << (max_len - lengths[s]))
            .sum()
    };

    let mut total = kraft(&lengths);
    while total > capacity {
        // Lengthen the least costly code that still has room.
        let s = *present
            .iter()
            .filter(|&&s| lengths[s] < max_len)
            .max_by_key(|&&s| (lengths[s], Reverse(counts[s])))?;
        total -= 1u64 << (max_len - lengths[s] - 1);
        lengths[s] += 1;
    }
    while total < capacity {
        // Shorten the most frequent code whose gain fits the slack.
        let slack = capacity - total;
        let s = *present
            .iter()
            .filter(|&&s| lengths[s] > 1 && (1u64 << (max_len - lengths[s])) <= slack)
            .max_by_key(|&&s| (counts[s], lengths[s]))?;
        total += 1u64 << (max_len - lengths[s]);
        lengths[s] -= 1;
    }

    Some(lengths)
}

// =============================================================================
// Weight serialization
// =============================================================================

/// Serialize transmitted weights, preferring the FSE-compressed form.
fn describe_weights(weights: &[u8]) -> Option<Vec<u8>> {
    let compressed = compress_weights(weights);
    let direct = (weights.len() <= MAX_DIRECT_WEIGHTS).then(|| direct_weights(weights));

    match (compressed, direct) {
        (Some(c), Some(d)) => Some(if c.len() < d.len() { c } else { d }),
        (Some(c), None) => Some(c),
        (None, d) => d,
    }
}

fn direct_weights(weights: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + weights.len().div_ceil(2));
    out.push(127 + weights.len() as u8);
    for pair in weights.chunks(2) {
        let high = pair[0] << 4;
        let low = pair.get(1).copied().unwrap_or(0);
        out.push(high | low);
    }
    out
}

/// FSE-compress weights with two interleaved states.
///
/// The result is decoded again before being accepted: the decoder stops on
/// stream overrun, which some distributions never trigger at the right point.
fn compress_weights(weights: &[u8]) -> Option<Vec<u8>> {
    if weights.len() < 2 {
        return None;
    }
    let mut counts = [0u32; HUFFMAN_MAX_BITS as usize + 1];
    for &w in weights {
        counts[w as usize] += 1;
    }
    let max_symbol = counts.iter().rposition(|&c| c > 0)? as u8;
    let counts = &counts[..=max_symbol as usize];
    if counts.iter().any(|&c| c as usize == weights.len()) {
        return None;
    }

    let log = optimal_accuracy_log(HUFFMAN_MAX_WEIGHT_LOG, weights.len(), max_symbol);
    let normalized = normalize_counts(counts, log)?;
    let table = FseEncodeTable::new(&normalized, log);

    let mut header = BitWriter::new();
    write_normalized_counts(&normalized, log, &mut header);
    let mut out = vec![0u8];
    out.extend_from_slice(&header.finish());

    let mut bits = BitWriter::new();
    let mut symbols = weights.iter().rev();
    let (mut state1, mut state2);
    if weights.len() % 2 == 1 {
        state1 = FseEncoder::new(&table, *symbols.next()?);
        state2 = FseEncoder::new(&table, *symbols.next()?);
        state1.encode(&table, *symbols.next()?, &mut bits);
    } else {
        state2 = FseEncoder::new(&table, *symbols.next()?);
        state1 = FseEncoder::new(&table, *symbols.next()?);
    }
    while let Some(&w2) = symbols.next() {
        state2.encode(&table, w2, &mut bits);
        let w1 = *symbols.next()?;
        state1.encode(&table, w1, &mut bits);
    }
    state2.flush(&table, &mut bits);
    state1.flush(&table, &mut bits);
    out.extend_from_slice(&bits.close());

    let size = out.len() - 1;
    if size >= 128 {
        return None;
    }
    out[0] = size as u8;

    let decoded = read_weights(&mut ByteCursor::new(&out)).ok()?;
    (decoded == weights).then_some(out)
}
