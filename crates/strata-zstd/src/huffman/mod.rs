//! Huffman coding for Zstandard literals.
//!
//! Literal sections carry a tree description (a list of weights, optionally
//! FSE-compressed) followed by one or four backward bitstreams. Codes are
//! canonical and limited to [`HUFFMAN_MAX_BITS`] bits.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8878#section-4.2)

mod decoder;
mod encoder;

pub use decoder::{read_weights, HuffmanTable};
pub use encoder::HuffmanEncoder;

/// Longest Huffman code the format allows.
pub const HUFFMAN_MAX_BITS: u8 = 11;

/// Largest accuracy log of the FSE table used for compressed weights.
pub const HUFFMAN_MAX_WEIGHT_LOG: u8 = 6;
