//! Full Zstd decompression pipeline.
//!
//! Walks every frame of the input, skipping skippable frames, decodes each
//! Zstandard frame into its own region of the output and verifies the
//! optional checksum and the recorded content size.

use tracing::{debug, trace};

use crate::block::{
    decode_compressed_block, decode_raw_block, decode_rle_block, FrameDecodeState,
};
use crate::cursor::{ByteCursor, ByteWriter};
use crate::frame::{
    content_checksum, is_skippable_magic, read_frame_header, read_magic, BlockHeader, BlockType,
    FrameHeader, CHECKSUM_SIZE, MAX_BLOCK_SIZE, ZSTD_MAGIC,
};
use strata_core::{Error, Result};

/// Decompress every frame of `input` into `output`.
///
/// Returns the number of bytes written. Each frame is decoded into the part
/// of `output` following the previous frame, and its matches may only reach
/// back into that part.
pub fn decompress_into(input: &[u8], output: &mut [u8], verify_checksum: bool) -> Result<usize> {
    let mut cursor = ByteCursor::new(input);
    let mut produced = 0;
    let mut frames = 0usize;

    loop {
        let frame_offset = cursor.offset();
        let magic = read_magic(&mut cursor)?;

        if magic == ZSTD_MAGIC {
            let written = decode_frame(&mut cursor, &mut output[produced..], verify_checksum)
                .map_err(|e| relocate_capacity(e, produced))?;
            debug!(
                "Decoded frame {} at offset {}: {} bytes",
                frames, frame_offset, written
            );
            produced += written;
            frames += 1;
        } else if is_skippable_magic(magic) {
            let size = skip_skippable_frame(&mut cursor)?;
            debug!("Skipped skippable frame at offset {}: {} bytes", frame_offset, size);
        } else {
            return Err(Error::invalid_magic(frame_offset, magic));
        }

        if cursor.is_empty() {
            return Ok(produced);
        }
    }
}

/// Report capacity errors against the whole output rather than one frame's region.
fn relocate_capacity(err: Error, produced: usize) -> Error {
    match err {
        Error::BufferTooSmall { required, provided } => Error::BufferTooSmall {
            required: required.saturating_add(produced),
            provided: provided + produced,
        },
        other => other,
    }
}

fn skip_skippable_frame(cursor: &mut ByteCursor<'_>) -> Result<usize> {
    let size = cursor.read_u32_le()? as usize;
    cursor.skip(size)?;
    Ok(size)
}

/// Decode one frame whose magic has already been consumed.
fn decode_frame(
    cursor: &mut ByteCursor<'_>,
    output: &mut [u8],
    verify_checksum: bool,
) -> Result<usize> {
    let header = read_frame_header(cursor)?;
    check_dictionary(&header)?;

    // A frame that records its size is decoded into exactly that many bytes.
    let declared = match header.content_size {
        Some(size) => match usize::try_from(size) {
            Ok(size) if size <= output.len() => Some(size),
            _ => {
                return Err(Error::buffer_too_small(
                    usize::try_from(size).unwrap_or(usize::MAX),
                    output.len(),
                ))
            }
        },
        None => None,
    };
    let region = match declared {
        Some(size) => &mut output[..size],
        None => output,
    };

    let mut writer = ByteWriter::new(region);
    let mut state = FrameDecodeState::new();

    loop {
        let header_offset = cursor.offset();
        let block = BlockHeader::parse(cursor)?;
        if block.block_size > MAX_BLOCK_SIZE {
            return Err(Error::corrupted_at(
                format!(
                    "block size {} exceeds maximum of {}",
                    block.block_size, MAX_BLOCK_SIZE
                ),
                header_offset,
            ));
        }
        let content = cursor.sub_cursor(block.content_size())?;
        trace!(
            "Block at offset {}: {:?}, size {}, last {}",
            header_offset,
            block.block_type,
            block.block_size,
            block.last_block
        );

        let decoded = match block.block_type {
            BlockType::Raw => decode_raw_block(content.rest(), &mut writer),
            BlockType::Rle => content
                .peek_u8()
                .and_then(|byte| decode_rle_block(byte, block.block_size, &mut writer)),
            BlockType::Compressed => decode_compressed_block(content, &mut state, &mut writer),
        };
        decoded.map_err(|e| exceeds_declared(e, declared.is_some(), header_offset))?;

        if block.last_block {
            break;
        }
    }

    if header.has_checksum {
        let offset = cursor.offset();
        let expected = cursor.read_u32_le()?;
        if verify_checksum {
            let actual = content_checksum(writer.written());
            if actual != expected {
                debug!("Checksum mismatch in frame ending at offset {}", offset);
                return Err(Error::checksum_mismatch(expected, actual));
            }
        }
    }

    let written = writer.position();
    if let Some(size) = header.content_size {
        if size != written as u64 {
            return Err(Error::corrupted_at(
                format!(
                    "frame content size mismatch: header says {}, decoded {}",
                    size, written
                ),
                cursor.offset(),
            ));
        }
    }
    Ok(written)
}

/// Overflowing a frame's declared size is a property of the data, not of the
/// caller's buffer.
fn exceeds_declared(err: Error, bounded: bool, block_offset: usize) -> Error {
    match err {
        Error::BufferTooSmall { .. } if bounded => {
            Error::corrupted_at("frame content exceeds declared size", block_offset)
        }
        other => other,
    }
}

fn check_dictionary(header: &FrameHeader) -> Result<()> {
    match header.dictionary_id {
        Some(id) if id != 0 => Err(Error::Unsupported(format!(
            "frame requires dictionary {}",
            id
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// Size queries
// =============================================================================

/// Content size recorded by the first Zstandard frame, skipping leading
/// skippable frames. Bytes after that frame's header are never examined.
pub fn decompressed_size(input: &[u8]) -> Result<Option<u64>> {
    let mut cursor = ByteCursor::new(input);
    loop {
        let offset = cursor.offset();
        let magic = read_magic(&mut cursor)?;
        if magic == ZSTD_MAGIC {
            return Ok(read_frame_header(&mut cursor)?.content_size);
        }
        if !is_skippable_magic(magic) {
            return Err(Error::invalid_magic(offset, magic));
        }
        skip_skippable_frame(&mut cursor)?;
    }
}

/// Upper bound on the decompressed size of every frame in `input`.
///
/// Only frame and block headers are read. A frame's bound is the smaller of
/// its recorded content size and what its blocks can produce.
pub fn decompressed_bound(input: &[u8]) -> Result<u64> {
    let mut cursor = ByteCursor::new(input);
    let mut total = 0u64;

    loop {
        let offset = cursor.offset();
        let magic = read_magic(&mut cursor)?;
        if magic == ZSTD_MAGIC {
            total = total.saturating_add(frame_bound(&mut cursor)?);
        } else if is_skippable_magic(magic) {
            skip_skippable_frame(&mut cursor)?;
        } else {
            return Err(Error::invalid_magic(offset, magic));
        }

        if cursor.is_empty() {
            return Ok(total);
        }
    }
}

fn frame_bound(cursor: &mut ByteCursor<'_>) -> Result<u64> {
    let header = read_frame_header(cursor)?;
    let mut blocks = 0u64;

    loop {
        let block = BlockHeader::parse(cursor)?;
        cursor.skip(block.content_size())?;
        let produced = match block.block_type {
            BlockType::Raw | BlockType::Rle => block.block_size,
            BlockType::Compressed => MAX_BLOCK_SIZE,
        };
        blocks = blocks.saturating_add(produced as u64);
        if block.last_block {
            break;
        }
    }
    if header.has_checksum {
        cursor.skip(CHECKSUM_SIZE)?;
    }

    Ok(header.content_size.map_or(blocks, |size| size.min(blocks)))
}
