//! Bounds-checked byte views over caller-owned buffers.
//!
//! All byte-level I/O in the codec goes through [`ByteCursor`] (reading) and
//! [`ByteWriter`] (writing). Neither type can step outside the slice it was
//! created over; running past the end is reported as an error instead.

use strata_core::{Error, Result};

// =============================================================================
// Reading
// =============================================================================

/// Read cursor over an input slice.
///
/// `base` is the absolute offset of `data[0]` within the caller's input, so
/// errors raised from nested cursors still report absolute positions.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Create a cursor whose first byte sits at absolute offset `base`.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Position relative to the start of this cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute offset of the next byte to be read.
    #[inline]
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Unread bytes, without advancing.
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn truncated(&self, needed: usize) -> Error {
        Error::corrupted_at(
            format!(
                "unexpected end of input: need {} bytes, {} available",
                needed,
                self.remaining()
            ),
            self.offset(),
        )
    }

    /// Read `len` bytes and advance.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Split off the next `len` bytes as an independent cursor and advance past them.
    pub fn sub_cursor(&mut self, len: usize) -> Result<ByteCursor<'a>> {
        let base = self.offset();
        let slice = self.read_slice(len)?;
        Ok(ByteCursor::with_base(slice, base))
    }

    /// Advance by `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_slice(len).map(|_| ())
    }

    #[inline]
    pub fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.truncated(1))
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(self.read_le(2)? as u16)
    }

    pub fn read_u24_le(&mut self) -> Result<u32> {
        Ok(self.read_le(3)? as u32)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(self.read_le(4)? as u32)
    }

    /// Read a little-endian unsigned integer of 1 to 8 bytes.
    pub fn read_le(&mut self, width: usize) -> Result<u64> {
        debug_assert!(width <= 8);
        let bytes = self.read_slice(width)?;
        Ok(bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }
}

// =============================================================================
// Writing
// =============================================================================

/// Write cursor over an output slice.
///
/// The writer never grows its buffer: every write checks capacity first and
/// fails with [`Error::BufferTooSmall`] when the slice is exhausted.
#[derive(Debug)]
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total capacity of the underlying slice.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Everything written so far.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Fail unless at least `len` more bytes fit.
    #[inline]
    pub fn ensure(&self, len: usize) -> Result<()> {
        if len > self.remaining() {
            return Err(Error::buffer_too_small(
                self.pos.saturating_add(len),
                self.buf.len(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.ensure(1)?;
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    pub fn write_u24_le(&mut self, value: u32) -> Result<()> {
        debug_assert!(value < 1 << 24);
        self.write_le(u64::from(value), 3)
    }

    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_le(u64::from(value), 4)
    }

    /// Write the low `width` bytes of `value`, little-endian.
    pub fn write_le(&mut self, value: u64, width: usize) -> Result<()> {
        debug_assert!(width <= 8);
        self.write_slice(&value.to_le_bytes()[..width])
    }

    pub fn write_slice(&mut self, data: &[u8]) -> Result<()> {
        self.ensure(data.len())?;
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    /// Write `byte` repeated `len` times.
    pub fn fill(&mut self, byte: u8, len: usize) -> Result<()> {
        self.ensure(len)?;
        self.buf[self.pos..self.pos + len].fill(byte);
        self.pos += len;
        Ok(())
    }

    /// Copy `length` bytes starting `distance` bytes back from the write position.
    ///
    /// Source and destination may overlap (distance < length), in which case
    /// the already-copied bytes are repeated, as LZ77 matches require. The
    /// caller validates `distance` against its frame; this only guarantees
    /// the copy stays inside the slice.
    pub fn copy_match(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > self.pos {
            return Err(Error::corrupted_at(
                "match reaches before start of output",
                self.pos,
            ));
        }
        self.ensure(length)?;

        let src = self.pos - distance;
        if distance >= length {
            self.buf.copy_within(src..src + length, self.pos);
        } else {
            // The region [src, pos + copied) repeats with period `distance`,
            // and `copied` stays a multiple of it, so each pass may double.
            let mut copied = 0;
            while copied < length {
                let chunk = (length - copied).min(distance + copied);
                self.buf.copy_within(src..src + chunk, self.pos + copied);
                copied += chunk;
            }
        }
        self.pos += length;
        Ok(())
    }
}
