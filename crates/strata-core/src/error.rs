//! Error types for compression operations.
//!
//! Errors fall into two families. Usage errors (`BufferTooSmall`,
//! `InvalidWindowSize`, `InvalidLevel`) depend only on the arguments of a
//! call and indicate a programming mistake. Corruption errors depend on the
//! bytes being decoded and always carry the input offset at which the
//! problem was detected.

use thiserror::Error;

/// Result type alias for compression operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Compression error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Destination buffer cannot hold the output.
    #[error("buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    /// Requested window size is not representable in a frame header.
    #[error("invalid window size: {0}")]
    InvalidWindowSize(String),

    /// Invalid compression level specified.
    #[error("invalid compression level {level}: must be in range [{min}, {max}]")]
    InvalidLevel { level: i32, min: i32, max: i32 },

    /// A frame does not start with a recognised magic number.
    #[error("invalid magic prefix at offset {offset}: found 0x{found:08x}")]
    InvalidMagic { offset: usize, found: u32 },

    /// Input data is corrupted or truncated.
    #[error("input is corrupted: offset={offset}: {message}")]
    CorruptedData { offset: usize, message: String },

    /// A decoded match points before the start of the frame output.
    #[error(
        "input is corrupted: offset={offset}: match distance {distance} exceeds {available} bytes produced"
    )]
    CorruptSequence {
        offset: usize,
        distance: usize,
        available: usize,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Unsupported feature or format.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create a corrupted data error at an absolute input offset.
    pub fn corrupted_at(message: impl Into<String>, offset: usize) -> Self {
        Error::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        Error::BufferTooSmall { required, provided }
    }

    /// Create an invalid window size error.
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Error::InvalidWindowSize(message.into())
    }

    /// Create an invalid magic error.
    pub fn invalid_magic(offset: usize, found: u32) -> Self {
        Error::InvalidMagic { offset, found }
    }

    /// Create an invalid back-reference error.
    pub fn corrupt_sequence(offset: usize, distance: usize, available: usize) -> Self {
        Error::CorruptSequence {
            offset,
            distance,
            available,
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, actual: u32) -> Self {
        Error::ChecksumMismatch { expected, actual }
    }

    /// True for errors caused by the bytes being decoded.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::InvalidMagic { .. }
                | Error::CorruptedData { .. }
                | Error::CorruptSequence { .. }
                | Error::ChecksumMismatch { .. }
                | Error::Unsupported(_)
        )
    }

    /// True for errors caused by the arguments of the call.
    pub fn is_usage(&self) -> bool {
        !self.is_corruption()
    }

    /// Input offset at which corruption was detected, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::InvalidMagic { offset, .. }
            | Error::CorruptedData { offset, .. }
            | Error::CorruptSequence { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Get error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::BufferTooSmall { .. } => "buffer_too_small",
            Error::InvalidWindowSize(_) => "invalid_window_size",
            Error::InvalidLevel { .. } => "invalid_level",
            Error::InvalidMagic { .. } => "invalid_magic",
            Error::CorruptedData { .. } => "corrupted_data",
            Error::CorruptSequence { .. } => "corrupt_sequence",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::Unsupported(_) => "unsupported",
        }
    }
}
