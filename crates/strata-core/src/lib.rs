//! # Strata Core
//!
//! Shared error taxonomy and level types for the Strata codecs.
//!
//! Every codec in the workspace reports failures through [`Error`], which
//! separates usage errors (bad buffer capacity, unrepresentable parameters)
//! from corruption errors (malformed input, with the offending offset).

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{CompressionLevel, CompressionRatio};
