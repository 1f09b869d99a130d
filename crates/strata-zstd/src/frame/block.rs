//! Zstd block headers.
//!
//! Each data block in a Zstd frame has a 3-byte header.

use crate::cursor::{ByteCursor, ByteWriter};
use strata_core::{Error, Result};

/// Block types in Zstd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Raw block - uncompressed data.
    Raw,
    /// RLE block - single byte repeated.
    Rle,
    /// Compressed block - literals and sequences sections.
    Compressed,
}

impl BlockType {
    /// Parse block type from the type field (2 bits).
    pub fn from_field(field: u8, offset: usize) -> Result<Self> {
        match field & 0x03 {
            0 => Ok(BlockType::Raw),
            1 => Ok(BlockType::Rle),
            2 => Ok(BlockType::Compressed),
            _ => Err(Error::corrupted_at("reserved block type", offset)),
        }
    }

    fn field(self) -> u32 {
        match self {
            BlockType::Raw => 0,
            BlockType::Rle => 1,
            BlockType::Compressed => 2,
        }
    }
}

/// Parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Whether this is the last block in the frame.
    pub last_block: bool,
    /// Block type.
    pub block_type: BlockType,
    /// Block size in bytes.
    /// For Raw: size of uncompressed data
    /// For RLE: decompressed size (compressed is 1 byte)
    /// For Compressed: size of compressed data
    pub block_size: usize,
}

impl BlockHeader {
    /// Block header size in bytes.
    pub const SIZE: usize = 3;

    /// Largest value the 21-bit size field can hold.
    pub const MAX_FIELD_SIZE: usize = (1 << 21) - 1;

    /// Parse a block header.
    ///
    /// ```text
    /// Byte 0-2 (little-endian):
    ///   Bit 0:     Last_Block flag
    ///   Bits 1-2:  Block_Type
    ///   Bits 3-23: Block_Size (21 bits)
    /// ```
    ///
    /// The full 21-bit size is returned; limits that depend on the frame are
    /// enforced by the caller.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.offset();
        let header = cursor.read_u24_le()?;

        Ok(Self {
            last_block: header & 0x01 != 0,
            block_type: BlockType::from_field((header >> 1) as u8, offset)?,
            block_size: (header >> 3) as usize,
        })
    }

    /// Write this header as 3 bytes.
    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<()> {
        if self.block_size > Self::MAX_FIELD_SIZE {
            return Err(Error::Unsupported(format!(
                "block size {} does not fit in 21 bits",
                self.block_size
            )));
        }
        let header = u32::from(self.last_block)
            | (self.block_type.field() << 1)
            | ((self.block_size as u32) << 3);
        writer.write_u24_le(header)
    }

    /// Bytes of block content following the header.
    /// For RLE blocks, this is 1 (the byte to repeat).
    pub fn content_size(&self) -> usize {
        match self.block_type {
            BlockType::Raw | BlockType::Compressed => self.block_size,
            BlockType::Rle => 1,
        }
    }
}
