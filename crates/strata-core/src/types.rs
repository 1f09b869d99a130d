//! Level presets and ratio reporting shared by the codecs.

use crate::error::{Error, Result};

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionLevel {
    /// Store only: blocks are kept raw or run-length encoded.
    None,

    /// Greedy matching with shallow search (level 1).
    Fast,

    /// Lazy matching, the default trade-off (level 6).
    #[default]
    Default,

    /// Deeper lazy search (level 9).
    Best,

    /// Two-step lazy search with long chains (level 12).
    Ultra,

    /// Custom numeric level in `MIN_LEVEL..=MAX_LEVEL`.
    Custom(i32),
}

impl CompressionLevel {
    /// Lowest accepted numeric level.
    pub const MIN_LEVEL: i32 = 0;

    /// Highest accepted numeric level.
    pub const MAX_LEVEL: i32 = 22;

    /// Numeric level used to look up codec parameters.
    pub fn to_level(self) -> i32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
            CompressionLevel::Ultra => 12,
            CompressionLevel::Custom(level) => level,
        }
    }

    /// Create from numeric level, rejecting values outside the accepted range.
    pub fn from_level(level: i32) -> Result<Self> {
        match level {
            0 => Ok(CompressionLevel::None),
            1 => Ok(CompressionLevel::Fast),
            6 => Ok(CompressionLevel::Default),
            9 => Ok(CompressionLevel::Best),
            12 => Ok(CompressionLevel::Ultra),
            Self::MIN_LEVEL..=Self::MAX_LEVEL => Ok(CompressionLevel::Custom(level)),
            _ => Err(Error::InvalidLevel {
                level,
                min: Self::MIN_LEVEL,
                max: Self::MAX_LEVEL,
            }),
        }
    }
}

/// Sizes before and after compression.
#[derive(Debug, Clone, Copy)]
pub struct CompressionRatio {
    /// Original uncompressed size in bytes.
    pub original_size: usize,
    /// Compressed size in bytes.
    pub compressed_size: usize,
}

impl CompressionRatio {
    pub fn new(original: usize, compressed: usize) -> Self {
        CompressionRatio {
            original_size: original,
            compressed_size: compressed,
        }
    }

    /// `original / compressed`; 0 for an empty output.
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    /// Whether the output is smaller than the input.
    pub fn is_effective(&self) -> bool {
        self.compressed_size < self.original_size
    }
}
