//! Finite State Entropy (FSE) coding.
//!
//! FSE is the tANS entropy coder Zstandard uses for sequence codes and for
//! compressed Huffman weights.
//!
//! ## Performance
//!
//! The predefined tables are built once on first use and cached in
//! `OnceLock`s, so blocks using predefined mode pay no table construction.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.1](https://datatracker.ietf.org/doc/html/rfc8878#section-4.1)

pub mod bits;
mod encoder;
mod table;

use std::sync::OnceLock;

pub use bits::{BackwardBitReader, BitWriter, ForwardBitReader};
pub use encoder::{
    normalize_counts, optimal_accuracy_log, write_normalized_counts, FseEncodeTable, FseEncoder,
};
pub use table::{
    read_normalized_counts, FseState, FseTable, FseTableEntry, FSE_MAX_ACCURACY_LOG,
    FSE_MIN_ACCURACY_LOG, LITERAL_LENGTH_DEFAULT_DISTRIBUTION, MATCH_LENGTH_DEFAULT_DISTRIBUTION,
    OFFSET_DEFAULT_DISTRIBUTION,
};

/// Accuracy log of the predefined literal-length table.
pub const LITERAL_LENGTH_ACCURACY_LOG: u8 = 6;

/// Accuracy log of the predefined match-length table.
pub const MATCH_LENGTH_ACCURACY_LOG: u8 = 6;

/// Accuracy log of the predefined offset table.
pub const OFFSET_ACCURACY_LOG: u8 = 5;

// =============================================================================
// Static Cached Predefined FSE Tables
// =============================================================================

struct Predefined {
    decode: FseTable,
    encode: FseEncodeTable,
}

impl Predefined {
    fn new(distribution: &[i16], accuracy_log: u8) -> Self {
        let decode = match FseTable::build(distribution, accuracy_log) {
            Ok(table) => table,
            // The distributions are compile-time constants that sum correctly.
            Err(e) => unreachable!("predefined FSE distribution rejected: {e}"),
        };
        Self {
            decode,
            encode: FseEncodeTable::new(distribution, accuracy_log),
        }
    }
}

static LITERAL_LENGTHS: OnceLock<Predefined> = OnceLock::new();
static MATCH_LENGTHS: OnceLock<Predefined> = OnceLock::new();
static OFFSETS: OnceLock<Predefined> = OnceLock::new();

fn literal_lengths() -> &'static Predefined {
    LITERAL_LENGTHS.get_or_init(|| {
        Predefined::new(
            &LITERAL_LENGTH_DEFAULT_DISTRIBUTION,
            LITERAL_LENGTH_ACCURACY_LOG,
        )
    })
}

fn match_lengths() -> &'static Predefined {
    MATCH_LENGTHS.get_or_init(|| {
        Predefined::new(&MATCH_LENGTH_DEFAULT_DISTRIBUTION, MATCH_LENGTH_ACCURACY_LOG)
    })
}

fn offsets() -> &'static Predefined {
    OFFSETS.get_or_init(|| Predefined::new(&OFFSET_DEFAULT_DISTRIBUTION, OFFSET_ACCURACY_LOG))
}

/// Cached predefined literal-length decoding table.
#[inline]
pub fn cached_ll_table() -> &'static FseTable {
    &literal_lengths().decode
}

/// Cached predefined match-length decoding table.
#[inline]
pub fn cached_ml_table() -> &'static FseTable {
    &match_lengths().decode
}

/// Cached predefined offset decoding table.
#[inline]
pub fn cached_of_table() -> &'static FseTable {
    &offsets().decode
}

/// Cached predefined literal-length encoding table.
#[inline]
pub fn cached_ll_encoder() -> &'static FseEncodeTable {
    &literal_lengths().encode
}

/// Cached predefined match-length encoding table.
#[inline]
pub fn cached_ml_encoder() -> &'static FseEncodeTable {
    &match_lengths().encode
}

/// Cached predefined offset encoding table.
#[inline]
pub fn cached_of_encoder() -> &'static FseEncodeTable {
    &offsets().encode
}
