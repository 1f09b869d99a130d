//! Zstd frame header encoding and parsing.
//!
//! The frame header contains the frame descriptor and optional fields:
//!
//! ```text
//! Frame_Header_Descriptor   1 byte
//! Window_Descriptor         0-1 byte  (absent in single-segment frames)
//! Dictionary_ID             0-4 bytes
//! Frame_Content_Size        0-8 bytes
//! ```

use super::{MIN_WINDOW_SIZE, ZSTD_MAGIC};
use crate::cursor::{ByteCursor, ByteWriter};
use strata_core::{Error, Result};

/// Largest frame header, excluding the magic number.
pub const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Content size at which the 2-byte field stops being able to hold a value.
const TWO_BYTE_CONTENT_LIMIT: u64 = 65536 + 256;

// =============================================================================
// Magic number
// =============================================================================

/// Write the 4-byte frame magic.
pub fn write_magic(writer: &mut ByteWriter<'_>) -> Result<usize> {
    writer.write_u32_le(ZSTD_MAGIC)?;
    Ok(4)
}

/// Read a 4-byte magic value, failing with an invalid-magic error if the input ends first.
pub fn read_magic(cursor: &mut ByteCursor<'_>) -> Result<u32> {
    let offset = cursor.offset();
    if cursor.remaining() < 4 {
        let partial = cursor
            .rest()
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        return Err(Error::invalid_magic(offset, partial));
    }
    cursor.read_u32_le()
}

/// Consume the frame magic, failing unless it is the Zstandard magic.
pub fn verify_magic(cursor: &mut ByteCursor<'_>) -> Result<()> {
    let offset = cursor.offset();
    let magic = read_magic(cursor)?;
    if magic != ZSTD_MAGIC {
        return Err(Error::invalid_magic(offset, magic));
    }
    Ok(())
}

// =============================================================================
// Frame descriptor
// =============================================================================

/// Frame header descriptor byte.
///
/// ```text
/// Bit 7-6: Frame_Content_Size_flag
/// Bit 5:   Single_Segment_flag
/// Bit 4:   Unused_bit (must be 0)
/// Bit 3:   Reserved_bit (must be 0)
/// Bit 2:   Content_Checksum_flag
/// Bit 1-0: Dictionary_ID_flag
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    raw: u8,
}

impl FrameDescriptor {
    /// Parse a frame descriptor byte read at `offset`.
    pub fn new(byte: u8, offset: usize) -> Result<Self> {
        if byte & 0x08 != 0 {
            return Err(Error::corrupted_at(
                "reserved bit in frame descriptor must be 0",
                offset,
            ));
        }
        Ok(Self { raw: byte })
    }

    /// Compose a descriptor byte.
    pub fn compose(content_size_flag: u8, single_segment: bool, checksum: bool) -> Self {
        Self {
            raw: (content_size_flag << 6)
                | (u8::from(single_segment) << 5)
                | (u8::from(checksum) << 2),
        }
    }

    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    /// Get the Frame_Content_Size_flag (bits 7-6).
    #[inline]
    pub fn frame_content_size_flag(&self) -> u8 {
        self.raw >> 6
    }

    /// Get the number of bytes for the frame content size field.
    pub fn frame_content_size_bytes(&self) -> usize {
        match self.frame_content_size_flag() {
            0 => usize::from(self.single_segment_flag()),
            1 => 2,
            2 => 4,
            _ => 8,
        }
    }

    /// Get the Single_Segment_flag (bit 5).
    /// When set, window size is derived from frame content size.
    #[inline]
    pub fn single_segment_flag(&self) -> bool {
        self.raw & 0x20 != 0
    }

    /// Get the Content_Checksum_flag (bit 2).
    #[inline]
    pub fn content_checksum_flag(&self) -> bool {
        self.raw & 0x04 != 0
    }

    /// Get the number of bytes for the dictionary ID field.
    pub fn dictionary_id_bytes(&self) -> usize {
        match self.raw & 0x03 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        }
    }
}

// =============================================================================
// Window descriptor
// =============================================================================

/// Window size encoded as a 5-bit exponent and 3-bit mantissa.
///
/// `window = 2^(10 + exponent) + mantissa * 2^(10 + exponent) / 8`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDescriptor {
    raw: u8,
}

impl WindowDescriptor {
    pub fn from_byte(raw: u8) -> Self {
        Self { raw }
    }

    /// Encode an exact window size, rejecting values the format cannot represent.
    pub fn encode(window_size: u64) -> Result<Self> {
        if window_size < MIN_WINDOW_SIZE {
            return Err(Error::invalid_window("minimum window size is 1024"));
        }
        let magnitude = 63 - window_size.leading_zeros();
        let exponent = magnitude - 10;
        if exponent > 31 {
            return Err(Error::invalid_window(format!(
                "window size {} exceeds maximum of 2^41 + 7 * 2^38",
                window_size
            )));
        }
        let base = 1u64 << magnitude;
        let granularity = base >> 3;
        let remainder = window_size - base;
        if remainder % granularity != 0 {
            return Err(Error::invalid_window(format!(
                "window size of magnitude 2^{} must be a multiple of {}",
                magnitude, granularity
            )));
        }
        let mantissa = (remainder / granularity) as u8;
        Ok(Self {
            raw: ((exponent as u8) << 3) | mantissa,
        })
    }

    /// Smallest representable window that is at least `requested`.
    pub fn round_up(requested: u64) -> u64 {
        if requested <= MIN_WINDOW_SIZE {
            return MIN_WINDOW_SIZE;
        }
        let magnitude = 63 - requested.leading_zeros();
        let granularity = 1u64 << (magnitude - 3);
        requested.div_ceil(granularity) * granularity
    }

    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    /// Decoded window size in bytes.
    pub fn window_size(&self) -> u64 {
        let exponent = u32::from(self.raw >> 3);
        let mantissa = u64::from(self.raw & 0x07);
        let base = 1u64 << (10 + exponent);
        base + (base >> 3) * mantissa
    }
}

// =============================================================================
// Frame header
// =============================================================================

/// Parsed Zstd frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Header length in bytes, excluding the magic number.
    pub header_size: usize,
    /// Window size; `None` for single-segment frames, whose window is the content size.
    pub window_size: Option<u64>,
    /// Frame content size, when recorded.
    pub content_size: Option<u64>,
    /// Dictionary ID, when recorded.
    pub dictionary_id: Option<u32>,
    /// Whether a 4-byte content checksum follows the last block.
    pub has_checksum: bool,
    /// Whether the frame is a single segment.
    pub single_segment: bool,
}

/// Write a frame header for `input_size` bytes of content.
///
/// The frame is single-segment whenever the window covers the whole input.
/// Returns the number of bytes written.
pub fn write_frame_header(
    writer: &mut ByteWriter<'_>,
    input_size: u64,
    window_size: u64,
    checksum: bool,
) -> Result<usize> {
    writer.ensure(MAX_FRAME_HEADER_SIZE)?;
    let window = WindowDescriptor::encode(window_size)?;

    let single_segment = window_size >= input_size;
    let content_size_flag = u8::from(input_size >= 256)
        + u8::from(input_size >= TWO_BYTE_CONTENT_LIMIT)
        + u8::from(input_size >= 1 << 32);
    let descriptor = FrameDescriptor::compose(content_size_flag, single_segment, checksum);

    let start = writer.position();
    writer.write_u8(descriptor.raw())?;
    if !single_segment {
        writer.write_u8(window.raw())?;
    }
    match descriptor.frame_content_size_bytes() {
        0 => {}
        2 => writer.write_le(input_size - 256, 2)?,
        width => writer.write_le(input_size, width)?,
    }
    Ok(writer.position() - start)
}

/// Parse a frame header; the cursor must be positioned just after the magic.
pub fn read_frame_header(cursor: &mut ByteCursor<'_>) -> Result<FrameHeader> {
    let start = cursor.position();
    let descriptor_offset = cursor.offset();
    let descriptor = FrameDescriptor::new(cursor.read_u8()?, descriptor_offset)?;
    let single_segment = descriptor.single_segment_flag();

    let window_size = if single_segment {
        None
    } else {
        Some(WindowDescriptor::from_byte(cursor.read_u8()?).window_size())
    };

    let dictionary_id = match descriptor.dictionary_id_bytes() {
        0 => None,
        width => Some(cursor.read_le(width)? as u32),
    };

    let content_size = match descriptor.frame_content_size_bytes() {
        0 => None,
        2 => Some(cursor.read_le(2)? + 256),
        width => Some(cursor.read_le(width)?),
    };

    Ok(FrameHeader {
        header_size: cursor.position() - start,
        window_size,
        content_size,
        dictionary_id,
        has_checksum: descriptor.content_checksum_flag(),
        single_segment,
    })
}
