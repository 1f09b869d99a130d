//! FSE decoding tables.
//!
//! ## Table Parsing
//!
//! FSE tables are described by a normalized-count header (RFC 8878
//! Section 4.1.1):
//! - 4 bits: accuracy_log - 5
//! - Variable-length encoded symbol probabilities, with 2-bit repeat flags
//!   after every zero probability

use super::bits::{BackwardBitReader, ForwardBitReader};
use crate::cursor::ByteCursor;
use strata_core::{Error, Result};

/// Smallest accuracy log a table header can describe.
pub const FSE_MIN_ACCURACY_LOG: u8 = 5;

/// Largest accuracy log any Zstandard table may use.
pub const FSE_MAX_ACCURACY_LOG: u8 = 9;

/// A single entry in an FSE decoding table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FseTableEntry {
    /// The symbol this state decodes to.
    pub symbol: u8,
    /// Number of bits to read from the bitstream for the next state.
    pub num_bits: u8,
    /// Base value to add to the read bits to get the next state.
    pub baseline: u16,
}

/// FSE decoding table.
///
/// The table size is always a power of 2, determined by the accuracy log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseTable {
    entries: Vec<FseTableEntry>,
    accuracy_log: u8,
}

impl FseTable {
    /// Build a decoding table from a normalized distribution.
    ///
    /// `-1` marks a "less than one" probability: the symbol gets a single
    /// state at the top of the table that resets with a full read.
    pub fn build(normalized: &[i16], accuracy_log: u8) -> Result<Self> {
        if accuracy_log > 15 {
            return Err(Error::corrupted_at(
                format!("FSE accuracy log {} exceeds maximum of 15", accuracy_log),
                0,
            ));
        }
        if normalized.len() > 256 {
            return Err(Error::corrupted_at("FSE alphabet larger than 256 symbols", 0));
        }

        let table_size = 1usize << accuracy_log;
        let slots: i32 = normalized
            .iter()
            .map(|&f| if f == -1 { 1 } else { i32::from(f) })
            .sum();
        if slots != table_size as i32 || normalized.iter().any(|&f| f < -1) {
            return Err(Error::corrupted_at(
                format!(
                    "FSE frequencies sum to {} but expected {}",
                    slots, table_size
                ),
                0,
            ));
        }

        let mut entries = vec![FseTableEntry::default(); table_size];
        let mut next_state = vec![0u32; normalized.len()];

        // Less-than-one symbols take the highest positions.
        let mut high_threshold = table_size;
        for (symbol, &freq) in normalized.iter().enumerate() {
            if freq == -1 {
                high_threshold -= 1;
                entries[high_threshold].symbol = symbol as u8;
                next_state[symbol] = 1;
            }
        }

        let step = (table_size >> 1) + (table_size >> 3) + 3;
        let mask = table_size - 1;
        let mut position = 0;
        for (symbol, &freq) in normalized.iter().enumerate() {
            if freq <= 0 {
                continue;
            }
            next_state[symbol] = freq as u32;
            for _ in 0..freq {
                entries[position].symbol = symbol as u8;
                loop {
                    position = (position + step) & mask;
                    if position < high_threshold {
                        break;
                    }
                }
            }
        }
        if position != 0 {
            return Err(Error::corrupted_at("FSE symbol spread did not close", 0));
        }

        for entry in entries.iter_mut() {
            let state = next_state[entry.symbol as usize];
            next_state[entry.symbol as usize] += 1;
            let num_bits = accuracy_log as u32 - (31 - state.leading_zeros());
            entry.num_bits = num_bits as u8;
            entry.baseline = ((state << num_bits) as usize - table_size) as u16;
        }

        Ok(Self {
            entries,
            accuracy_log,
        })
    }

    /// A table that always decodes `symbol` and never reads state bits.
    pub fn rle(symbol: u8) -> Self {
        Self {
            entries: vec![FseTableEntry {
                symbol,
                num_bits: 0,
                baseline: 0,
            }],
            accuracy_log: 0,
        }
    }

    /// Parse a normalized-count header from `cursor` and build its table.
    pub fn parse(cursor: &mut ByteCursor<'_>, max_symbol: u8, max_log: u8) -> Result<Self> {
        let start = cursor.offset();
        let (normalized, accuracy_log) = read_normalized_counts(cursor, max_symbol, max_log)?;
        Self::build(&normalized, accuracy_log).map_err(|e| match e {
            Error::CorruptedData { message, .. } => Error::corrupted_at(message, start),
            other => other,
        })
    }

    #[inline]
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn entry(&self, state: usize) -> &FseTableEntry {
        &self.entries[state]
    }

    /// Largest symbol any state decodes to.
    pub fn max_symbol(&self) -> u8 {
        self.entries.iter().map(|e| e.symbol).max().unwrap_or(0)
    }
}

/// Read a normalized-count header, returning the distribution and its accuracy log.
///
/// The cursor advances past the header, rounded up to a whole byte.
pub fn read_normalized_counts(
    cursor: &mut ByteCursor<'_>,
    max_symbol: u8,
    max_log: u8,
) -> Result<(Vec<i16>, u8)> {
    let start = cursor.offset();
    let mut bits = ForwardBitReader::new(cursor.rest(), start);

    let accuracy_log = FSE_MIN_ACCURACY_LOG + bits.read_bits(4) as u8;
    if accuracy_log > max_log {
        return Err(Error::corrupted_at(
            format!(
                "FSE accuracy log {} exceeds maximum {}",
                accuracy_log, max_log
            ),
            start,
        ));
    }

    let mut remaining: i32 = 1 << accuracy_log;
    let mut normalized: Vec<i16> = Vec::with_capacity(max_symbol as usize + 1);

    while remaining > 0 {
        if normalized.len() > max_symbol as usize {
            return Err(Error::corrupted_at(
                "FSE distribution exceeds symbol limit",
                bits.offset(),
            ));
        }

        let width = 32 - (remaining + 1).leading_zeros();
        let lower_mask = (1u32 << (width - 1)) - 1;
        let threshold = (1u32 << width) - 1 - (remaining as u32 + 1);

        let mut value = bits.read_bits(width);
        if value & lower_mask < threshold {
            bits.rewind(1);
            value &= lower_mask;
        } else if value > lower_mask {
            value -= threshold;
        }

        let probability = value as i32 - 1;
        remaining -= probability.abs();
        normalized.push(probability as i16);

        if probability == 0 {
            loop {
                let repeat = bits.read_bits(2);
                for _ in 0..repeat {
                    if normalized.len() > max_symbol as usize {
                        return Err(Error::corrupted_at(
                            "FSE zero run exceeds symbol limit",
                            bits.offset(),
                        ));
                    }
                    normalized.push(0);
                }
                if repeat != 3 {
                    break;
                }
            }
        }
        bits.check()?;
    }

    if remaining != 0 {
        return Err(Error::corrupted_at(
            "FSE distribution does not sum to table size",
            bits.offset(),
        ));
    }

    bits.check()?;
    cursor.skip(bits.bytes_consumed())?;
    Ok((normalized, accuracy_log))
}

// =============================================================================
// Decoder state
// =============================================================================

/// One FSE decoding state walking a table.
#[derive(Debug, Clone, Copy)]
pub struct FseState {
    state: usize,
}

impl FseState {
    /// Initialise by reading `accuracy_log` bits.
    #[inline]
    pub fn new(table: &FseTable, bits: &mut BackwardBitReader<'_>) -> Self {
        Self {
            state: bits.read_bits(u32::from(table.accuracy_log())) as usize,
        }
    }

    /// Symbol of the current state.
    #[inline]
    pub fn symbol(&self, table: &FseTable) -> u8 {
        table.entry(self.state).symbol
    }

    /// Advance to the next state.
    #[inline]
    pub fn update(&mut self, table: &FseTable, bits: &mut BackwardBitReader<'_>) {
        let entry = table.entry(self.state);
        let low = bits.read_bits(u32::from(entry.num_bits)) as usize;
        self.state = entry.baseline as usize + low;
    }

    /// Return the current symbol and advance.
    #[inline]
    pub fn decode(&mut self, table: &FseTable, bits: &mut BackwardBitReader<'_>) -> u8 {
        let symbol = self.symbol(table);
        self.update(table, bits);
        symbol
    }
}

// =============================================================================
// Predefined distributions
// =============================================================================

/// Default distribution for Literal Length codes (accuracy_log = 6).
/// From RFC 8878 Section 3.1.1.3.2.2.1
pub const LITERAL_LENGTH_DEFAULT_DISTRIBUTION: [i16; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];

/// Default distribution for Match Length codes (accuracy_log = 6).
/// From RFC 8878 Section 3.1.1.3.2.2.2
pub const MATCH_LENGTH_DEFAULT_DISTRIBUTION: [i16; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];

/// Default distribution for Offset codes (accuracy_log = 5).
/// From RFC 8878 Section 3.1.1.3.2.2.3
pub const OFFSET_DEFAULT_DISTRIBUTION: [i16; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];
