//! Compression parameters per level.

use crate::frame::{WindowDescriptor, MIN_WINDOW_SIZE};
use strata_core::{CompressionLevel, Error, Result};

/// Smallest window log a frame can carry.
pub const MIN_WINDOW_LOG: u8 = 10;

/// Largest window log accepted for compression.
pub const MAX_WINDOW_LOG: u8 = 31;

/// Match search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// No match search: blocks are stored (or run-length encoded).
    Store,
    /// Take the first acceptable match at each position.
    Greedy,
    /// Check whether the next position offers a better match.
    Lazy,
    /// Look up to two positions ahead.
    Lazy2,
}

impl Strategy {
    /// Positions examined ahead of a found match.
    pub fn lookahead(self) -> usize {
        match self {
            Strategy::Store | Strategy::Greedy => 0,
            Strategy::Lazy => 1,
            Strategy::Lazy2 => 2,
        }
    }
}

/// Tuning knobs of the block compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParameters {
    /// Log2 of the largest match distance.
    pub window_log: u8,
    /// Log2 of the hash table size.
    pub hash_log: u8,
    /// Log2 of the hash chain size.
    pub chain_log: u8,
    /// Chain candidates examined per position.
    pub search_depth: usize,
    pub strategy: Strategy,
}

impl CompressionParameters {
    /// Parameters for a compression level.
    pub fn for_level(level: CompressionLevel) -> Self {
        let (window_log, hash_log, chain_log, search_depth, strategy) = match level.to_level() {
            i32::MIN..=0 => (17, 6, 6, 0, Strategy::Store),
            1..=2 => (19, 16, 15, 4, Strategy::Greedy),
            3..=5 => (20, 17, 16, 8, Strategy::Lazy),
            6..=9 => (21, 17, 17, 24, Strategy::Lazy),
            10..=15 => (22, 18, 18, 64, Strategy::Lazy2),
            _ => (23, 20, 20, 256, Strategy::Lazy2),
        };
        Self {
            window_log,
            hash_log,
            chain_log,
            search_depth,
            strategy,
        }
    }

    /// Replace the window log, rejecting values outside the format's range.
    pub fn with_window_log(mut self, window_log: u8) -> Result<Self> {
        if !(MIN_WINDOW_LOG..=MAX_WINDOW_LOG).contains(&window_log) {
            return Err(Error::invalid_window(format!(
                "window log {} outside {}..={}",
                window_log, MIN_WINDOW_LOG, MAX_WINDOW_LOG
            )));
        }
        self.window_log = window_log;
        Ok(self)
    }

    /// Window written to the frame header for `input_len` bytes of content.
    ///
    /// Never larger than the configured window, never larger than needed
    /// (rounded up to a representable size), never below the format minimum.
    pub fn window_size(&self, input_len: usize) -> u64 {
        let configured = 1u64 << self.window_log;
        let needed = (input_len as u64).max(MIN_WINDOW_SIZE);
        WindowDescriptor::round_up(needed.min(configured))
    }
}

impl Default for CompressionParameters {
    fn default() -> Self {
        Self::for_level(CompressionLevel::Default)
    }
}
