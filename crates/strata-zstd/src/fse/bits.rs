//! Bit-level readers and writers for Zstandard entropy streams.
//!
//! Table headers (FSE normalized counts) are read front to back. Entropy
//! payloads (Huffman streams, FSE-coded weights, sequence bitstreams) are
//! written front to back but read back to front, starting from a sentinel
//! `1` bit in the final byte.

use strata_core::{Error, Result};

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Loads up to 8 bytes starting at `idx` as a little-endian word, zero-filled past the end.
#[inline]
fn load_word(data: &[u8], idx: usize) -> u64 {
    if idx + 8 <= data.len() {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[idx..idx + 8]);
        return u64::from_le_bytes(bytes);
    }
    let mut bytes = [0u8; 8];
    if idx < data.len() {
        let tail = &data[idx..];
        bytes[..tail.len()].copy_from_slice(tail);
    }
    u64::from_le_bytes(bytes)
}

// =============================================================================
// Backward reader
// =============================================================================

/// Reads a bitstream from its last bit towards its first.
///
/// Reading past the start yields zero bits and drives [`remaining`] negative,
/// which callers check to detect over-consumption.
///
/// [`remaining`]: BackwardBitReader::remaining
#[derive(Debug, Clone)]
pub struct BackwardBitReader<'a> {
    data: &'a [u8],
    base: usize,
    remaining: isize,
}

impl<'a> BackwardBitReader<'a> {
    /// Position the reader just below the sentinel bit of the last byte.
    ///
    /// `base` is the absolute input offset of `data[0]`, used for error reporting.
    pub fn new(data: &'a [u8], base: usize) -> Result<Self> {
        let last = match data.last() {
            Some(&b) => b,
            None => return Err(Error::corrupted_at("empty bitstream", base)),
        };
        if last == 0 {
            return Err(Error::corrupted_at(
                "bitstream missing end marker",
                base + data.len() - 1,
            ));
        }
        let sentinel = 7 - last.leading_zeros() as isize;
        Ok(Self {
            data,
            base,
            remaining: (data.len() as isize - 1) * 8 + sentinel,
        })
    }

    /// Unread bits; negative once the reader has overrun the stream start.
    #[inline]
    pub fn remaining(&self) -> isize {
        self.remaining
    }

    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.remaining < 0
    }

    /// Absolute input offset of the byte holding the next unread bit.
    pub fn offset(&self) -> usize {
        self.base + (self.remaining.max(0) as usize) / 8
    }

    /// Read `bits` bits (at most 56).
    #[inline]
    pub fn read_bits(&mut self, bits: u32) -> u64 {
        debug_assert!(bits <= 56);
        if bits == 0 {
            return 0;
        }
        let start = self.remaining - bits as isize;
        self.remaining = start;

        if start >= 0 {
            let start = start as usize;
            let word = load_word(self.data, start / 8);
            (word >> (start % 8)) & mask(bits)
        } else {
            let available = start + bits as isize;
            if available <= 0 {
                return 0;
            }
            let word = load_word(self.data, 0);
            (word & mask(available as u32)) << (-start) as u32
        }
    }
}

// =============================================================================
// Forward reader
// =============================================================================

/// Reads little-endian bits front to back, as used by FSE table headers.
#[derive(Debug)]
pub struct ForwardBitReader<'a> {
    data: &'a [u8],
    base: usize,
    bit_pos: usize,
}

impl<'a> ForwardBitReader<'a> {
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            base,
            bit_pos: 0,
        }
    }

    /// Read `bits` bits (at most 32), zero-filled past the end.
    ///
    /// Overruns are reported by [`check`](ForwardBitReader::check), since a
    /// reader may legitimately peek one bit too far and then rewind it.
    pub fn read_bits(&mut self, bits: u32) -> u32 {
        debug_assert!(bits <= 32);
        let word = load_word(self.data, self.bit_pos / 8);
        let value = (word >> (self.bit_pos % 8)) & mask(bits);
        self.bit_pos += bits as usize;
        value as u32
    }

    /// Fail if more bits were consumed than the input holds.
    pub fn check(&self) -> Result<()> {
        if self.bit_pos > self.data.len() * 8 {
            return Err(Error::corrupted_at(
                "table header truncated",
                self.base + self.data.len(),
            ));
        }
        Ok(())
    }

    /// Give back `bits` bits that were read but not used.
    pub fn rewind(&mut self, bits: u32) {
        self.bit_pos -= bits as usize;
    }

    /// Whole bytes consumed, rounding a partial byte up.
    pub fn bytes_consumed(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }

    pub fn offset(&self) -> usize {
        self.base + self.bit_pos / 8
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Accumulates little-endian bits into a byte vector.
///
/// The same writer serves forward headers and backward streams: a backward
/// stream is simply written in reverse symbol order and terminated with
/// [`close`](BitWriter::close), which appends the sentinel bit.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    container: u64,
    bit_count: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            container: 0,
            bit_count: 0,
        }
    }

    /// Append the low `bits` bits of `value` (at most 56).
    #[inline]
    pub fn write_bits(&mut self, value: u64, bits: u32) {
        debug_assert!(bits <= 56);
        self.container |= (value & mask(bits)) << self.bit_count;
        self.bit_count += bits;
        while self.bit_count >= 8 {
            self.bytes.push(self.container as u8);
            self.container >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Pad the final partial byte with zeros.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.container as u8);
        }
        self.bytes
    }

    /// Append the end-of-stream marker bit and pad.
    pub fn close(mut self) -> Vec<u8> {
        self.write_bits(1, 1);
        self.finish()
    }
}
