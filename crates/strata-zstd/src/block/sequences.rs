//! Sequences section decoding.
//!
//! Sequences are LZ77-style commands: (literal_length, offset, match_length).
//!
//! ## Repeat Offsets
//!
//! Offset values 1-3 refer to the three most recently used offsets, which
//! start every frame as [1, 4, 8] (RFC 8878 Section 3.1.2.5).
//!
//! ## Symbol Compression Modes
//!
//! Each of LL/OF/ML picks its own mode:
//! - Predefined: hardcoded FSE distributions
//! - RLE: a single code used by every sequence
//! - FSE: a table described in the block
//! - Repeat: the table used by the previous block of the frame

use crate::cursor::ByteCursor;
use crate::fse::{
    cached_ll_table, cached_ml_table, cached_of_table, BackwardBitReader, FseState, FseTable,
};
use strata_core::{Error, Result};

/// Largest literal length code.
pub const MAX_LL_SYMBOL: u8 = 35;
/// Largest offset code this decoder accepts.
pub const MAX_OF_SYMBOL: u8 = 31;
/// Largest match length code.
pub const MAX_ML_SYMBOL: u8 = 52;

/// Largest accuracy log of a literal length table.
pub const MAX_LL_LOG: u8 = 9;
/// Largest accuracy log of an offset table.
pub const MAX_OF_LOG: u8 = 8;
/// Largest accuracy log of a match length table.
pub const MAX_ML_LOG: u8 = 9;

/// Shortest match the format can express.
pub const MIN_MATCH: usize = 3;

/// Largest sequence count the 3-byte count encoding can hold.
pub const MAX_SEQUENCES: usize = 0x7F00 + 0xFFFF;

// =============================================================================
// Repeat offsets
// =============================================================================

/// The three most recently used match offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOffsets {
    offsets: [usize; 3],
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        Self { offsets: [1, 4, 8] }
    }
}

impl RepeatOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, index: usize) -> usize {
        self.offsets[index]
    }

    /// Resolve an offset value to a match distance, updating the history.
    ///
    /// Values above 3 carry `distance + 3`. Values 1-3 select a repeat
    /// offset; with a zero literal length they shift by one and value 3
    /// means `rep[0] - 1`. Returns `None` if that yields distance zero.
    pub fn resolve(&mut self, offset_value: usize, literal_length: usize) -> Option<usize> {
        if offset_value > 3 {
            let distance = offset_value - 3;
            self.push(distance);
            return Some(distance);
        }

        let index = if literal_length == 0 {
            offset_value
        } else {
            offset_value - 1
        };
        match index {
            0 => Some(self.offsets[0]),
            1 => {
                self.offsets.swap(0, 1);
                Some(self.offsets[0])
            }
            2 => {
                self.offsets.rotate_right(1);
                Some(self.offsets[0])
            }
            _ => {
                let distance = self.offsets[0].checked_sub(1).filter(|&d| d > 0)?;
                self.push(distance);
                Some(distance)
            }
        }
    }

    /// Offset value that makes [`resolve`](Self::resolve) return `distance`.
    ///
    /// Uses a repeat code when the history allows it.
    pub fn offset_value(&self, distance: usize, literal_length: usize) -> usize {
        let [rep0, rep1, rep2] = self.offsets;
        if literal_length > 0 {
            if distance == rep0 {
                return 1;
            }
            if distance == rep1 {
                return 2;
            }
            if distance == rep2 {
                return 3;
            }
        } else {
            if distance == rep1 {
                return 1;
            }
            if distance == rep2 {
                return 2;
            }
            if rep0 > 1 && distance == rep0 - 1 {
                return 3;
            }
        }
        distance + 3
    }

    fn push(&mut self, distance: usize) {
        self.offsets[2] = self.offsets[1];
        self.offsets[1] = self.offsets[0];
        self.offsets[0] = distance;
    }
}

// =============================================================================
// Baseline Tables (RFC 8878)
// =============================================================================

/// Literal length code to (extra bits, baseline) mapping.
pub const LITERAL_LENGTH_BASELINE: [(u8, u32); 36] = [
    (0, 0),
    (0, 1),
    (0, 2),
    (0, 3),
    (0, 4),
    (0, 5),
    (0, 6),
    (0, 7),
    (0, 8),
    (0, 9),
    (0, 10),
    (0, 11),
    (0, 12),
    (0, 13),
    (0, 14),
    (0, 15),
    (1, 16),
    (1, 18),
    (1, 20),
    (1, 22),
    (2, 24),
    (2, 28),
    (3, 32),
    (3, 40),
    (4, 48),
    (6, 64),
    (7, 128),
    (8, 256),
    (9, 512),
    (10, 1024),
    (11, 2048),
    (12, 4096),
    (13, 8192),
    (14, 16384),
    (15, 32768),
    (16, 65536),
];

/// Match length code to (extra bits, baseline) mapping.
pub const MATCH_LENGTH_BASELINE: [(u8, u32); 53] = [
    // Codes 0-31: no extra bits, lengths 3-34
    (0, 3),
    (0, 4),
    (0, 5),
    (0, 6),
    (0, 7),
    (0, 8),
    (0, 9),
    (0, 10),
    (0, 11),
    (0, 12),
    (0, 13),
    (0, 14),
    (0, 15),
    (0, 16),
    (0, 17),
    (0, 18),
    (0, 19),
    (0, 20),
    (0, 21),
    (0, 22),
    (0, 23),
    (0, 24),
    (0, 25),
    (0, 26),
    (0, 27),
    (0, 28),
    (0, 29),
    (0, 30),
    (0, 31),
    (0, 32),
    (0, 33),
    (0, 34),
    (1, 35),
    (1, 37),
    (1, 39),
    (1, 41),
    (2, 43),
    (2, 47),
    (3, 51),
    (3, 59),
    (4, 67),
    (4, 83),
    (5, 99),
    (7, 131),
    (8, 259),
    (9, 515),
    (10, 1027),
    (11, 2051),
    (12, 4099),
    (13, 8195),
    (14, 16387),
    (15, 32771),
    (16, 65539),
];

/// Code whose range holds `value` in a baseline table.
#[inline]
fn code_for(table: &[(u8, u32)], value: u32) -> u8 {
    (table.partition_point(|&(_, base)| base <= value) - 1) as u8
}

/// Literal length code for `literal_length`.
#[inline]
pub fn literal_length_code(literal_length: u32) -> u8 {
    code_for(&LITERAL_LENGTH_BASELINE, literal_length)
}

/// Match length code for `match_length` (at least [`MIN_MATCH`]).
#[inline]
pub fn match_length_code(match_length: u32) -> u8 {
    code_for(&MATCH_LENGTH_BASELINE, match_length.max(MIN_MATCH as u32))
}

/// Offset code for an offset value: the position of its highest set bit.
#[inline]
pub fn offset_code(offset_value: u32) -> u8 {
    debug_assert!(offset_value > 0);
    (31 - offset_value.leading_zeros()) as u8
}

// =============================================================================
// Section header
// =============================================================================

/// How the codes of one sequence field are entropy coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolMode {
    /// Predefined FSE distribution.
    Predefined,
    /// RLE mode - single symbol repeated.
    Rle,
    /// FSE compressed.
    Fse,
    /// Repeat previous FSE table.
    Repeat,
}

impl SymbolMode {
    /// Parse mode from 2-bit field.
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => SymbolMode::Predefined,
            1 => SymbolMode::Rle,
            2 => SymbolMode::Fse,
            _ => SymbolMode::Repeat,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            SymbolMode::Predefined => 0,
            SymbolMode::Rle => 1,
            SymbolMode::Fse => 2,
            SymbolMode::Repeat => 3,
        }
    }
}

/// Sequence count and per-field modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencesHeader {
    pub num_sequences: usize,
    pub literal_lengths: SymbolMode,
    pub offsets: SymbolMode,
    pub match_lengths: SymbolMode,
}

impl SequencesHeader {
    /// Parse the count and, when sequences are present, the modes byte.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let num_sequences = read_sequence_count(cursor)?;
        if num_sequences == 0 {
            return Ok(Self {
                num_sequences,
                literal_lengths: SymbolMode::Predefined,
                offsets: SymbolMode::Predefined,
                match_lengths: SymbolMode::Predefined,
            });
        }

        let offset = cursor.offset();
        let modes = cursor.read_u8()?;
        if modes & 0x03 != 0 {
            return Err(Error::corrupted_at(
                "reserved bits set in sequence compression modes",
                offset,
            ));
        }
        Ok(Self {
            num_sequences,
            literal_lengths: SymbolMode::from_field(modes >> 6),
            offsets: SymbolMode::from_field(modes >> 4),
            match_lengths: SymbolMode::from_field(modes >> 2),
        })
    }

    /// The modes byte as written after the sequence count.
    pub fn modes_byte(&self) -> u8 {
        (self.literal_lengths.field() << 6)
            | (self.offsets.field() << 4)
            | (self.match_lengths.field() << 2)
    }
}

/// Read the 1 to 3 byte sequence count.
pub fn read_sequence_count(cursor: &mut ByteCursor<'_>) -> Result<usize> {
    let first = cursor.read_u8()? as usize;
    Ok(match first {
        0..=127 => first,
        128..=254 => ((first - 128) << 8) + cursor.read_u8()? as usize,
        _ => cursor.read_u16_le()? as usize + 0x7F00,
    })
}

/// Encode a sequence count, returning the bytes used (1 to 3).
pub fn encode_sequence_count(count: usize) -> Option<([u8; 3], usize)> {
    if count < 128 {
        Some(([count as u8, 0, 0], 1))
    } else if count < 0x7F00 {
        Some(([((count >> 8) + 128) as u8, count as u8, 0], 2))
    } else if count <= MAX_SEQUENCES {
        let rest = (count - 0x7F00) as u16;
        let [low, high] = rest.to_le_bytes();
        Some(([255, low, high], 3))
    } else {
        None
    }
}

// =============================================================================
// Decoding tables
// =============================================================================

/// The frame's current LL/OF/ML decoding tables, kept for repeat mode.
#[derive(Debug, Clone, Default)]
pub struct SequenceTables {
    literal_lengths: Option<FseTable>,
    offsets: Option<FseTable>,
    match_lengths: Option<FseTable>,
}

impl SequenceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the table descriptions of a section, in LL, OF, ML order.
    pub fn update(&mut self, header: &SequencesHeader, cursor: &mut ByteCursor<'_>) -> Result<()> {
        read_table(
            &mut self.literal_lengths,
            header.literal_lengths,
            cursor,
            MAX_LL_SYMBOL,
            MAX_LL_LOG,
            cached_ll_table,
        )?;
        read_table(
            &mut self.offsets,
            header.offsets,
            cursor,
            MAX_OF_SYMBOL,
            MAX_OF_LOG,
            cached_of_table,
        )?;
        read_table(
            &mut self.match_lengths,
            header.match_lengths,
            cursor,
            MAX_ML_SYMBOL,
            MAX_ML_LOG,
            cached_ml_table,
        )
    }

    fn tables(&self, offset: usize) -> Result<(&FseTable, &FseTable, &FseTable)> {
        match (&self.literal_lengths, &self.offsets, &self.match_lengths) {
            (Some(ll), Some(of), Some(ml)) => Ok((ll, of, ml)),
            _ => Err(Error::corrupted_at("sequence tables not initialized", offset)),
        }
    }
}

fn read_table(
    slot: &mut Option<FseTable>,
    mode: SymbolMode,
    cursor: &mut ByteCursor<'_>,
    max_symbol: u8,
    max_log: u8,
    predefined: fn() -> &'static FseTable,
) -> Result<()> {
    let offset = cursor.offset();
    match mode {
        SymbolMode::Predefined => *slot = Some(predefined().clone()),
        SymbolMode::Rle => {
            let symbol = cursor.read_u8()?;
            if symbol > max_symbol {
                return Err(Error::corrupted_at(
                    format!("RLE sequence code {} exceeds maximum {}", symbol, max_symbol),
                    offset,
                ));
            }
            *slot = Some(FseTable::rle(symbol));
        }
        SymbolMode::Fse => *slot = Some(FseTable::parse(cursor, max_symbol, max_log)?),
        SymbolMode::Repeat => {
            if slot.is_none() {
                return Err(Error::corrupted_at(
                    "repeat mode without a previous sequence table",
                    offset,
                ));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Sequence stream
// =============================================================================

/// A decoded sequence with its offset already resolved to a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub literal_length: usize,
    pub match_length: usize,
    pub distance: usize,
}

/// Decodes sequences one at a time from the section's bitstream.
pub struct SequenceDecoder<'a, 't> {
    bits: BackwardBitReader<'a>,
    ll_table: &'t FseTable,
    of_table: &'t FseTable,
    ml_table: &'t FseTable,
    ll_state: FseState,
    of_state: FseState,
    ml_state: FseState,
    remaining: usize,
}

impl<'a, 't> SequenceDecoder<'a, 't> {
    /// Start decoding `count` sequences from `stream`, whose first byte sits
    /// at absolute offset `base`.
    pub fn new(
        tables: &'t SequenceTables,
        stream: &'a [u8],
        base: usize,
        count: usize,
    ) -> Result<Self> {
        let (ll_table, of_table, ml_table) = tables.tables(base)?;
        let mut bits = BackwardBitReader::new(stream, base)?;
        let ll_state = FseState::new(ll_table, &mut bits);
        let of_state = FseState::new(of_table, &mut bits);
        let ml_state = FseState::new(ml_table, &mut bits);

        Ok(Self {
            bits,
            ll_table,
            of_table,
            ml_table,
            ll_state,
            of_state,
            ml_state,
            remaining: count,
        })
    }

    /// Absolute offset of the bitstream position reached so far.
    pub fn offset(&self) -> usize {
        self.bits.offset()
    }

    /// Decode the next sequence, resolving its offset against `repeats`.
    pub fn next_sequence(&mut self, repeats: &mut RepeatOffsets) -> Result<Sequence> {
        let ll_code = self.ll_state.symbol(self.ll_table);
        let of_code = self.of_state.symbol(self.of_table);
        let ml_code = self.ml_state.symbol(self.ml_table);

        // Table construction bounds every code by its field's maximum.
        let offset_value =
            (1usize << of_code) + self.bits.read_bits(u32::from(of_code)) as usize;
        let (ml_bits, ml_base) = MATCH_LENGTH_BASELINE[ml_code as usize];
        let match_length = ml_base as usize + self.bits.read_bits(u32::from(ml_bits)) as usize;
        let (ll_bits, ll_base) = LITERAL_LENGTH_BASELINE[ll_code as usize];
        let literal_length = ll_base as usize + self.bits.read_bits(u32::from(ll_bits)) as usize;

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            self.ll_state.update(self.ll_table, &mut self.bits);
            self.ml_state.update(self.ml_table, &mut self.bits);
            self.of_state.update(self.of_table, &mut self.bits);
        }

        if self.bits.is_overflowed() {
            return Err(Error::corrupted_at(
                "sequence bitstream overrun",
                self.offset(),
            ));
        }

        let distance = repeats
            .resolve(offset_value, literal_length)
            .ok_or_else(|| Error::corrupted_at("repeat offset resolves to zero", self.offset()))?;

        Ok(Sequence {
            literal_length,
            match_length,
            distance,
        })
    }

    /// Fail unless the bitstream was consumed exactly.
    pub fn finish(&self) -> Result<()> {
        if self.bits.remaining() != 0 {
            return Err(Error::corrupted_at(
                format!(
                    "sequence bitstream not fully consumed: {} bits left",
                    self.bits.remaining()
                ),
                self.offset(),
            ));
        }
        Ok(())
    }
}
