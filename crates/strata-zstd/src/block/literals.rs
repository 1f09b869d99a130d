//! Literals section decoding.
//!
//! The literals section carries the bytes that sequences copy verbatim into
//! the output. It is either stored, a single repeated byte, or Huffman coded
//! with a fresh or a previously transmitted tree.

use std::borrow::Cow;

use crate::cursor::{ByteCursor, ByteWriter};
use crate::frame::MAX_BLOCK_SIZE;
use crate::huffman::HuffmanTable;
use strata_core::{Error, Result};

/// Literals block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsBlockType {
    /// Raw literals - uncompressed bytes.
    Raw,
    /// RLE literals - single byte repeated.
    Rle,
    /// Huffman compressed literals with new tree.
    Compressed,
    /// Huffman compressed using previous tree.
    Treeless,
}

impl LiteralsBlockType {
    /// Parse block type from 2-bit field.
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => LiteralsBlockType::Raw,
            1 => LiteralsBlockType::Rle,
            2 => LiteralsBlockType::Compressed,
            _ => LiteralsBlockType::Treeless,
        }
    }

    fn field(self) -> u64 {
        match self {
            LiteralsBlockType::Raw => 0,
            LiteralsBlockType::Rle => 1,
            LiteralsBlockType::Compressed => 2,
            LiteralsBlockType::Treeless => 3,
        }
    }

    fn is_huffman(self) -> bool {
        matches!(
            self,
            LiteralsBlockType::Compressed | LiteralsBlockType::Treeless
        )
    }
}

/// Parsed literals section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralsHeader {
    pub block_type: LiteralsBlockType,
    /// Number of literal bytes after decoding.
    pub regenerated_size: usize,
    /// Payload size for Huffman types, including any tree description.
    pub compressed_size: usize,
    /// Whether the Huffman payload is split into four streams.
    pub four_streams: bool,
}

impl LiteralsHeader {
    /// Stored literals.
    pub fn raw(size: usize) -> Self {
        Self {
            block_type: LiteralsBlockType::Raw,
            regenerated_size: size,
            compressed_size: size,
            four_streams: false,
        }
    }

    /// A single repeated byte.
    pub fn rle(size: usize) -> Self {
        Self {
            block_type: LiteralsBlockType::Rle,
            regenerated_size: size,
            compressed_size: 1,
            four_streams: false,
        }
    }

    /// Huffman-coded literals; `treeless` reuses the previous tree.
    pub fn huffman(
        regenerated_size: usize,
        compressed_size: usize,
        four_streams: bool,
        treeless: bool,
    ) -> Self {
        Self {
            block_type: if treeless {
                LiteralsBlockType::Treeless
            } else {
                LiteralsBlockType::Compressed
            },
            regenerated_size,
            compressed_size,
            four_streams,
        }
    }

    /// Parse a literals section header.
    ///
    /// ```text
    /// Raw / RLE (size format in bits 2-3):
    ///   x0: 1 byte,  5-bit size
    ///   01: 2 bytes, 12-bit size
    ///   11: 3 bytes, 20-bit size
    /// Compressed / Treeless:
    ///   00: 3 bytes, 10-bit sizes, one stream
    ///   01: 3 bytes, 10-bit sizes, four streams
    ///   10: 4 bytes, 14-bit sizes, four streams
    ///   11: 5 bytes, 18-bit sizes, four streams
    /// ```
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.offset();
        let first = cursor.peek_u8()?;
        let block_type = LiteralsBlockType::from_field(first);
        let size_format = (first >> 2) & 0x03;

        let header = if block_type.is_huffman() {
            let (width, size_bits) = match size_format {
                0 | 1 => (3, 10),
                2 => (4, 14),
                _ => (5, 18),
            };
            let raw = cursor.read_le(width)?;
            let mask = (1u64 << size_bits) - 1;
            Self {
                block_type,
                regenerated_size: ((raw >> 4) & mask) as usize,
                compressed_size: ((raw >> (4 + size_bits)) & mask) as usize,
                four_streams: size_format != 0,
            }
        } else {
            let size = match size_format {
                0 | 2 => (cursor.read_u8()? >> 3) as usize,
                1 => (cursor.read_le(2)? >> 4) as usize,
                _ => (cursor.read_le(3)? >> 4) as usize,
            };
            if block_type == LiteralsBlockType::Raw {
                Self::raw(size)
            } else {
                Self::rle(size)
            }
        };

        if header.regenerated_size > MAX_BLOCK_SIZE {
            return Err(Error::corrupted_at(
                format!(
                    "literals size {} exceeds maximum block size",
                    header.regenerated_size
                ),
                offset,
            ));
        }
        Ok(header)
    }

    /// Bytes the header occupies when written.
    pub fn size(&self) -> usize {
        if self.block_type.is_huffman() {
            let largest = self.regenerated_size.max(self.compressed_size);
            match largest {
                0..=0x3FF => 3,
                0x400..=0x3FFF => 4,
                _ => 5,
            }
        } else {
            match self.regenerated_size {
                0..=31 => 1,
                32..=4095 => 2,
                _ => 3,
            }
        }
    }

    /// Write the header using the smallest size format that fits.
    ///
    /// A single Huffman stream is only representable with the 3-byte format.
    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<()> {
        let field = self.block_type.field();
        let width = self.size();

        if self.block_type.is_huffman() {
            let (size_format, size_bits) = match width {
                3 => (u64::from(self.four_streams), 10),
                4 => (2, 14),
                _ => (3, 18),
            };
            if !self.four_streams && width != 3 {
                return Err(Error::Unsupported(format!(
                    "{} literals do not fit a single Huffman stream header",
                    self.regenerated_size
                )));
            }
            if self.regenerated_size.max(self.compressed_size) >= 1 << 18 {
                return Err(Error::Unsupported(
                    "literals section too large for its header".into(),
                ));
            }
            let value = field
                | (size_format << 2)
                | ((self.regenerated_size as u64) << 4)
                | ((self.compressed_size as u64) << (4 + size_bits));
            writer.write_le(value, width)
        } else {
            let size = self.regenerated_size as u64;
            if size >= 1 << 20 {
                return Err(Error::Unsupported(
                    "literals section too large for its header".into(),
                ));
            }
            match width {
                1 => writer.write_u8((field | (size << 3)) as u8),
                2 => writer.write_le(field | (1 << 2) | (size << 4), 2),
                _ => writer.write_le(field | (3 << 2) | (size << 4), 3),
            }
        }
    }
}

/// Decode the literals section at `cursor`.
///
/// `huffman` holds the frame's most recent Huffman table: it is replaced when
/// the section carries a new tree and required when the section is treeless.
pub fn decode_literals<'a>(
    cursor: &mut ByteCursor<'a>,
    huffman: &mut Option<HuffmanTable>,
) -> Result<Cow<'a, [u8]>> {
    let header = LiteralsHeader::parse(cursor)?;
    let size = header.regenerated_size;

    match header.block_type {
        LiteralsBlockType::Raw => Ok(Cow::Borrowed(cursor.read_slice(size)?)),
        LiteralsBlockType::Rle => Ok(Cow::Owned(vec![cursor.read_u8()?; size])),
        LiteralsBlockType::Compressed | LiteralsBlockType::Treeless => {
            let mut payload = cursor.sub_cursor(header.compressed_size)?;

            if header.block_type == LiteralsBlockType::Compressed {
                *huffman = Some(HuffmanTable::parse(&mut payload)?);
            }
            let table = huffman.as_ref().ok_or_else(|| {
                Error::corrupted_at(
                    "treeless literals without a previous Huffman table",
                    payload.offset(),
                )
            })?;

            let mut literals = vec![0u8; size];
            if header.four_streams {
                table.decode_four_streams(payload.rest(), payload.offset(), &mut literals)?;
            } else {
                table.decode_stream(payload.rest(), payload.offset(), &mut literals)?;
            }
            Ok(Cow::Owned(literals))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_header(header: &LiteralsHeader) -> Vec<u8> {
        let mut buf = vec![0u8; 8];
        let mut writer = ByteWriter::new(&mut buf);
        header.write(&mut writer).unwrap();
        let len = writer.position();
        assert_eq!(len, header.size());
        buf.truncate(len);
        buf
    }

    #[test]
    fn test_raw_header_widths() {
        for (size, width) in [(0, 1), (31, 1), (32, 2), (4095, 2), (4096, 3), (MAX_BLOCK_SIZE, 3)] {
            let header = LiteralsHeader::raw(size);
            let bytes = write_header(&header);
            assert_eq!(bytes.len(), width);
            let parsed = LiteralsHeader::parse(&mut ByteCursor::new(&bytes)).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn test_huffman_header_widths() {
        let cases = [
            (LiteralsHeader::huffman(200, 120, false, false), 3),
            (LiteralsHeader::huffman(1000, 700, true, true), 3),
            (LiteralsHeader::huffman(10_000, 6000, true, false), 4),
            (LiteralsHeader::huffman(MAX_BLOCK_SIZE, 90_000, true, false), 5),
        ];
        for (header, width) in cases {
            let bytes = write_header(&header);
            assert_eq!(bytes.len(), width);
            let parsed = LiteralsHeader::parse(&mut ByteCursor::new(&bytes)).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn test_single_stream_needs_short_header() {
        let header = LiteralsHeader::huffman(2000, 1500, false, false);
        let mut buf = [0u8; 8];
        assert!(header.write(&mut ByteWriter::new(&mut buf)).is_err());
    }

    #[test]
    fn test_decode_raw_literals_borrow_input() {
        // Raw, 1-byte header, size 5.
        let data = [5 << 3, b'h', b'e', b'l', b'l', b'o', 0xAA];
        let mut cursor = ByteCursor::new(&data);
        let mut huffman = None;
        let literals = decode_literals(&mut cursor, &mut huffman).unwrap();
        assert!(matches!(literals, Cow::Borrowed(_)));
        assert_eq!(&literals[..], b"hello");
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_decode_rle_literals() {
        let data = [(3 << 3) | 1, b'z'];
        let mut huffman = None;
        let literals = decode_literals(&mut ByteCursor::new(&data), &mut huffman).unwrap();
        assert_eq!(&literals[..], b"zzz");
    }

    #[test]
    fn test_treeless_without_table_is_corruption() {
        let header = LiteralsHeader::huffman(4, 1, false, true);
        let mut data = write_header(&header);
        data.push(0x80);
        let mut huffman = None;
        let err = decode_literals(&mut ByteCursor::new(&data), &mut huffman).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_oversized_literals_rejected() {
        // Raw, 3-byte header, size 2^20 - 1.
        let value: u32 = (3 << 2) | (((1 << 20) - 1) << 4);
        let bytes = value.to_le_bytes();
        let err = LiteralsHeader::parse(&mut ByteCursor::new(&bytes[..3])).unwrap_err();
        assert!(err.is_corruption());
    }
}
