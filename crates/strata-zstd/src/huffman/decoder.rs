//! Huffman tree descriptions and stream decoding.

use super::{HUFFMAN_MAX_BITS, HUFFMAN_MAX_WEIGHT_LOG};
use crate::cursor::ByteCursor;
use crate::fse::{BackwardBitReader, FseState, FseTable};
use strata_core::{Error, Result};

/// Largest symbol value a compressed weight stream may contain.
const MAX_WEIGHT_SYMBOL: u8 = 15;

/// Upper bound on transmitted weights (the last symbol's weight is implied).
const MAX_TRANSMITTED_WEIGHTS: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HuffmanEntry {
    symbol: u8,
    num_bits: u8,
}

/// Huffman decoding table indexed by the next `max_bits` bits of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    entries: Vec<HuffmanEntry>,
    max_bits: u8,
}

impl HuffmanTable {
    /// Read a tree description from `cursor` and build the table.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.offset();
        let weights = read_weights(cursor)?;
        Self::from_weights(&weights, start)
    }

    /// Build a table from transmitted weights; the final symbol's weight is implied.
    pub fn from_weights(weights: &[u8], offset: usize) -> Result<Self> {
        if weights.is_empty() || weights.len() > MAX_TRANSMITTED_WEIGHTS {
            return Err(Error::corrupted_at("invalid number of Huffman weights", offset));
        }

        let mut weight_sum = 0u32;
        for &w in weights {
            if w > HUFFMAN_MAX_BITS {
                return Err(Error::corrupted_at("Huffman weight too large", offset));
            }
            if w > 0 {
                weight_sum += 1 << (w - 1);
            }
        }
        if weight_sum == 0 {
            return Err(Error::corrupted_at("Huffman weights are all zero", offset));
        }

        let max_bits = 32 - weight_sum.leading_zeros();
        if max_bits > u32::from(HUFFMAN_MAX_BITS) {
            return Err(Error::corrupted_at(
                format!("Huffman code length {} exceeds maximum", max_bits),
                offset,
            ));
        }
        let left_over = (1u32 << max_bits) - weight_sum;
        if !left_over.is_power_of_two() {
            return Err(Error::corrupted_at(
                "Huffman weights do not form a complete code",
                offset,
            ));
        }
        let last_weight = left_over.trailing_zeros() + 1;

        let mut lengths: Vec<u8> = weights
            .iter()
            .map(|&w| if w > 0 { (max_bits + 1 - u32::from(w)) as u8 } else { 0 })
            .collect();
        lengths.push((max_bits + 1 - last_weight) as u8);

        Self::from_lengths(&lengths, max_bits as u8, offset)
    }

    fn from_lengths(lengths: &[u8], max_bits: u8, offset: usize) -> Result<Self> {
        let mut rank_count = [0u32; HUFFMAN_MAX_BITS as usize + 1];
        for &len in lengths {
            rank_count[len as usize] += 1;
        }

        let table_size = 1usize << max_bits;
        let mut rank_idx = [0usize; HUFFMAN_MAX_BITS as usize + 1];
        let mut entries = vec![HuffmanEntry::default(); table_size];

        // Longest codes take the lowest table indices.
        let mut next = 0usize;
        for len in (1..=max_bits as usize).rev() {
            rank_idx[len] = next;
            let span = rank_count[len] as usize * (1 << (max_bits as usize - len));
            next += span;
            if next > table_size {
                return Err(Error::corrupted_at("Huffman code overflows table", offset));
            }
            for entry in &mut entries[rank_idx[len]..next] {
                entry.num_bits = len as u8;
            }
        }
        if next != table_size {
            return Err(Error::corrupted_at("Huffman code is incomplete", offset));
        }

        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let span = 1usize << (max_bits - len);
            let code = rank_idx[len as usize];
            for entry in &mut entries[code..code + span] {
                entry.symbol = symbol as u8;
            }
            rank_idx[len as usize] += span;
        }

        Ok(Self { entries, max_bits })
    }

    #[inline]
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    /// Decode exactly `out.len()` symbols from one stream.
    ///
    /// The stream must be consumed exactly: after the last symbol the reader
    /// sits `max_bits` bits before the stream start.
    pub fn decode_stream(&self, data: &[u8], base: usize, out: &mut [u8]) -> Result<()> {
        let mut bits = BackwardBitReader::new(data, base)?;
        let max_bits = u32::from(self.max_bits);
        let mask = (1usize << max_bits) - 1;

        let mut state = bits.read_bits(max_bits) as usize;
        for byte in out.iter_mut() {
            let entry = self.entries[state];
            *byte = entry.symbol;
            let nb = u32::from(entry.num_bits);
            state = ((state << nb) | bits.read_bits(nb) as usize) & mask;
        }

        if bits.remaining() != -(max_bits as isize) {
            return Err(Error::corrupted_at(
                "Huffman stream not consumed exactly",
                base,
            ));
        }
        Ok(())
    }

    /// Decode four interleaved streams preceded by a 6-byte jump table.
    pub fn decode_four_streams(&self, data: &[u8], base: usize, out: &mut [u8]) -> Result<()> {
        let mut cursor = ByteCursor::with_base(data, base);
        let sizes = [
            cursor.read_u16_le()? as usize,
            cursor.read_u16_le()? as usize,
            cursor.read_u16_le()? as usize,
        ];
        let first_three: usize = sizes.iter().sum();
        if first_three >= cursor.remaining() {
            return Err(Error::corrupted_at(
                "Huffman jump table exceeds literals size",
                base,
            ));
        }

        let regenerated = out.len();
        let segment = regenerated.div_ceil(4);
        if segment * 3 > regenerated {
            return Err(Error::corrupted_at(
                "too few literals for four Huffman streams",
                base,
            ));
        }

        let mut remaining_out = out;
        for (i, &size) in sizes.iter().enumerate() {
            let stream = cursor.sub_cursor(size)?;
            let (head, tail) = std::mem::take(&mut remaining_out).split_at_mut(segment);
            self.decode_stream(stream.rest(), stream.offset(), head)
                .map_err(|e| annotate_stream(e, i))?;
            remaining_out = tail;
        }
        let last = cursor.rest();
        self.decode_stream(last, cursor.offset(), remaining_out)
            .map_err(|e| annotate_stream(e, 3))
    }
}

fn annotate_stream(err: Error, stream: usize) -> Error {
    match err {
        Error::CorruptedData { offset, message } => {
            Error::corrupted_at(format!("{} (stream {})", message, stream + 1), offset)
        }
        other => other,
    }
}

// =============================================================================
// Weight parsing
// =============================================================================

/// Read the transmitted Huffman weights of a tree description.
pub fn read_weights(cursor: &mut ByteCursor<'_>) -> Result<Vec<u8>> {
    let header = cursor.read_u8()?;
    if header < 128 {
        let compressed = cursor.sub_cursor(header as usize)?;
        decode_fse_weights(compressed)
    } else {
        let count = header as usize - 127;
        let packed = cursor.read_slice(count.div_ceil(2))?;
        let mut weights = Vec::with_capacity(count);
        for &byte in packed {
            weights.push(byte >> 4);
            weights.push(byte & 0x0F);
        }
        weights.truncate(count);
        Ok(weights)
    }
}

/// Decode FSE-compressed weights: two interleaved states sharing one table.
fn decode_fse_weights(mut cursor: ByteCursor<'_>) -> Result<Vec<u8>> {
    let start = cursor.offset();
    if cursor.is_empty() {
        return Err(Error::corrupted_at("empty Huffman weight stream", start));
    }
    let table = FseTable::parse(&mut cursor, MAX_WEIGHT_SYMBOL, HUFFMAN_MAX_WEIGHT_LOG)?;
    let mut bits = BackwardBitReader::new(cursor.rest(), cursor.offset())?;

    let mut state1 = FseState::new(&table, &mut bits);
    let mut state2 = FseState::new(&table, &mut bits);
    let mut weights = Vec::with_capacity(MAX_TRANSMITTED_WEIGHTS);

    loop {
        if weights.len() + 2 > MAX_TRANSMITTED_WEIGHTS {
            return Err(Error::corrupted_at("too many Huffman weights", start));
        }
        weights.push(state1.decode(&table, &mut bits));
        if bits.is_overflowed() {
            weights.push(state2.symbol(&table));
            break;
        }
        weights.push(state2.decode(&table, &mut bits));
        if bits.is_overflowed() {
            weights.push(state1.symbol(&table));
            break;
        }
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_symbol_table() {
        // One transmitted weight of 1; implied last weight 1 -> two 1-bit codes.
        let table = HuffmanTable::from_weights(&[1], 0).unwrap();
        assert_eq!(table.max_bits(), 1);
        // Longest codes first, ascending symbol order: symbol 0 -> index 0.
        assert_eq!(table.entries[0].symbol, 0);
        assert_eq!(table.entries[1].symbol, 1);
    }

    #[test]
    fn test_implied_last_weight() {
        // Weights 2,1,1 give 2 + 1 + 1 = 4 = 2^2, leaving 4 for the last
        // symbol: weight 3, so max_bits rises to 3.
        let table = HuffmanTable::from_weights(&[2, 1, 1], 0).unwrap();
        assert_eq!(table.max_bits(), 3);
        let lengths: Vec<u8> = (0..4u8)
            .map(|s| {
                table
                    .entries
                    .iter()
                    .find(|e| e.symbol == s)
                    .map(|e| e.num_bits)
                    .unwrap()
            })
            .collect();
        assert_eq!(lengths, vec![2, 3, 3, 1]);
    }

    #[test]
    fn test_rejects_incomplete_code() {
        // Sum 1 + 2 = 3, leftover 1 -> fine; sum 2 + 2 + 1 = 5, leftover 3 -> invalid.
        assert!(HuffmanTable::from_weights(&[1, 2], 0).is_ok());
        assert!(HuffmanTable::from_weights(&[2, 2, 1], 0).is_err());
        assert!(HuffmanTable::from_weights(&[0, 0], 0).is_err());
        assert!(HuffmanTable::from_weights(&[12], 0).is_err());
    }

    #[test]
    fn test_direct_weights() {
        // header 127 + 3 weights, nibbles high first: [1, 2] [1, pad]
        let data = [130u8, 0x12, 0x10];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(read_weights(&mut cursor).unwrap(), vec![1, 2, 1]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_single_stream() {
        // Two 1-bit codes: symbol 0 = '0', symbol 1 = '1'.
        let table = HuffmanTable::from_weights(&[1], 0).unwrap();
        // Symbols decoded first come from the highest bits. Stream bits
        // (below the sentinel at bit 3): 1, 0, 1 -> symbols 1, 0, 1.
        let data = [0b0000_1101u8];
        let mut out = [0u8; 3];
        table.decode_stream(&data, 0, &mut out).unwrap();
        assert_eq!(out, [1, 0, 1]);

        // Asking for a different count leaves the stream misaligned.
        let mut out = [0u8; 2];
        assert!(table.decode_stream(&data, 0, &mut out).is_err());
    }

    #[test]
    fn test_four_streams_reject_bad_jump_table() {
        let table = HuffmanTable::from_weights(&[1], 0).unwrap();
        let data = [0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01];
        let mut out = [0u8; 8];
        assert!(table.decode_four_streams(&data, 0, &mut out).is_err());
    }
}
