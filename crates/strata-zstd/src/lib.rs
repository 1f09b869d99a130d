//! # Strata Zstd
//!
//! Native Rust implementation of Zstandard compression (RFC 8878).
//!
//! Frames written here decode with the reference zstd library, and frames
//! written by the reference library decode here, including concatenated
//! and skippable frames.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_zstd::{ZstdCodec, ZstdCompressor, ZstdDecompressor};
//! use strata_core::CompressionLevel;
//!
//! // Using the codec (compression + decompression)
//! let codec = ZstdCodec::new();
//! let compressed = codec.compress(b"Hello, World!").unwrap();
//! let original = codec.decompress(&compressed).unwrap();
//! assert_eq!(original, b"Hello, World!");
//!
//! // With compression level and a content checksum
//! let compressor = ZstdCompressor::with_level(CompressionLevel::Best).with_checksum(true);
//! let compressed = compressor.compress(b"test data").unwrap();
//! assert_eq!(ZstdDecompressor::new().decompress(&compressed).unwrap(), b"test data");
//! ```
//!
//! ## Caller-Owned Buffers
//!
//! `compress_to` and `decompress_to` only touch the slice they are given, so
//! callers with padded buffers pass the sub-slice they want filled:
//!
//! ```rust
//! use strata_zstd::{max_compressed_length, ZstdCompressor, ZstdDecompressor};
//!
//! let input = b"padded buffers";
//! let mut frame = vec![0u8; max_compressed_length(input.len())];
//! let size = ZstdCompressor::new().compress_to(input, &mut frame).unwrap();
//!
//! let mut buffer = [0xAAu8; 64];
//! let n = ZstdDecompressor::new()
//!     .decompress_to(&frame[..size], &mut buffer[8..40])
//!     .unwrap();
//! assert_eq!(&buffer[8..8 + n], input);
//! assert_eq!(buffer[7], 0xAA);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      strata-zstd                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  compress/          │  decompress.rs                        │
//! │  ├── params.rs      │  (frame loop, skippable frames,       │
//! │  ├── match_finder   │   checksum, size peeking)             │
//! │  ├── literals.rs    │                                       │
//! │  ├── sequences.rs   │                                       │
//! │  └── block.rs       │                                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  huffman/           │  fse/                                 │
//! │  ├── encoder.rs     │  ├── encoder.rs                       │
//! │  └── decoder.rs     │  ├── bits.rs                          │
//! │                     │  └── table.rs                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  frame/             │  block/                               │
//! │  ├── header.rs      │  ├── literals.rs                      │
//! │  ├── block.rs       │  └── sequences.rs                     │
//! │  └── checksum.rs    │                                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cursor.rs (bounds-checked ByteCursor / ByteWriter)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`strata_core::Error`]. Usage errors (an output
//! buffer below [`max_compressed_length`], an unrepresentable window) are
//! distinguishable from corruption errors, which carry the input offset at
//! which the problem was detected.
//!
//! ## References
//!
//! - [RFC 8878 - Zstandard Compression](https://datatracker.ietf.org/doc/html/rfc8878)
//! - [Zstd Format Specification](https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md)

pub mod block;
pub mod compress;
pub mod cursor;
pub mod decompress;
pub mod frame;
pub mod fse;
pub mod huffman;

pub use compress::{max_compressed_length, CompressionParameters, Strategy};
pub use decompress::{decompressed_bound, decompressed_size};
pub use frame::{MIN_WINDOW_SIZE, ZSTD_MAGIC};
pub use strata_core::{CompressionLevel, Error, Result};

/// Zstandard compressor.
///
/// Immutable configuration; every call compresses one complete frame.
///
/// ```rust
/// use strata_zstd::ZstdCompressor;
/// use strata_core::CompressionLevel;
///
/// let compressor = ZstdCompressor::with_level(CompressionLevel::Fast)
///     .with_window_log(16)
///     .unwrap();
/// let compressed = compressor.compress(&[7u8; 1000]).unwrap();
/// assert!(compressed.len() < 20);
/// ```
#[derive(Debug, Clone)]
pub struct ZstdCompressor {
    level: CompressionLevel,
    params: CompressionParameters,
    checksum: bool,
}

impl ZstdCompressor {
    /// Create a new Zstd compressor with default settings.
    pub fn new() -> Self {
        Self::with_level(CompressionLevel::Default)
    }

    /// Create with compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self {
            level,
            params: CompressionParameters::for_level(level),
            checksum: false,
        }
    }

    /// Append a content checksum to every frame.
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// Cap the window (largest match distance) at `1 << window_log` bytes.
    pub fn with_window_log(mut self, window_log: u8) -> Result<Self> {
        self.params = self.params.with_window_log(window_log)?;
        Ok(self)
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn parameters(&self) -> &CompressionParameters {
        &self.params
    }

    /// Compress `input` into a newly allocated frame.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; max_compressed_length(input.len())];
        let size = self.compress_to(input, &mut output)?;
        output.truncate(size);
        Ok(output)
    }

    /// Compress `input` into `output`, returning the frame size.
    ///
    /// `output` must hold at least [`max_compressed_length`] bytes.
    pub fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        compress::compress_frame(input, output, &self.params, self.checksum)
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Zstandard decompressor.
///
/// Decodes every frame of its input; skippable frames are ignored.
#[derive(Debug, Clone)]
pub struct ZstdDecompressor {
    verify_checksum: bool,
}

impl ZstdDecompressor {
    /// Create a new Zstd decompressor that verifies checksums.
    pub fn new() -> Self {
        Self {
            verify_checksum: true,
        }
    }

    /// Enable or disable content checksum verification.
    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Decompress every frame of `input` into a newly allocated buffer.
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let bound = decompressed_bound(input)?;
        let capacity = usize::try_from(bound).map_err(|_| {
            Error::Unsupported(format!("decompressed size {} exceeds address space", bound))
        })?;
        let mut output = vec![0u8; capacity];
        let size = self.decompress_to(input, &mut output)?;
        output.truncate(size);
        Ok(output)
    }

    /// Decompress every frame of `input` into `output`, returning the bytes written.
    pub fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        decompress::decompress_into(input, output, self.verify_checksum)
    }
}

impl Default for ZstdDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Zstandard codec combining compression and decompression.
#[derive(Debug, Clone, Default)]
pub struct ZstdCodec {
    compressor: ZstdCompressor,
    decompressor: ZstdDecompressor,
}

impl ZstdCodec {
    /// Create a new Zstd codec with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self {
            compressor: ZstdCompressor::with_level(level),
            decompressor: ZstdDecompressor::new(),
        }
    }

    /// Write and verify content checksums.
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.compressor = self.compressor.with_checksum(checksum);
        self
    }

    pub fn level(&self) -> CompressionLevel {
        self.compressor.level()
    }

    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.compressor.compress(input)
    }

    pub fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.compressor.compress_to(input, output)
    }

    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decompressor.decompress(input)
    }

    pub fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.decompressor.decompress_to(input, output)
    }

    /// Upper bound on the compressed size of `input_len` bytes.
    pub fn max_compressed_length(&self, input_len: usize) -> usize {
        max_compressed_length(input_len)
    }
}

// =============================================================================
// Tests
// =============================================================================
