//! Little-endian byte cursors over in-memory buffers
//!
//! [`ByteReader`] borrows an immutable buffer and keeps a read position.
//! Every `read_*` call has a positionless `read_*_at` twin that takes an
//! explicit offset and leaves the position untouched, so random access never
//! disturbs a sequential scan. [`ByteWriter`] owns a growable buffer and
//! overwrites or appends at its position.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{Cursor, Write};

use crate::dbc::float::{decode_f32, encode_f32};
use crate::error::{Error, Result};

/// Bounds-checked reader over a borrowed byte buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move the cursor, failing if the target lies past the end
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::OutOfBounds(format!(
                "seek to {} past end of {}-byte buffer",
                position,
                self.data.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(&self.data[offset..end]),
            _ => Err(Error::OutOfBounds(format!(
                "read of {} bytes at offset {} exceeds buffer length {}",
                len,
                offset,
                self.data.len()
            ))),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.slice_at(self.position, len)?;
        self.position += len;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_bytes_at(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        Ok(self.slice_at(offset, len)?.to_vec())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.slice_at(offset, 1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u16_at(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.slice_at(offset, 2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u32_at(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.slice_at(offset, 4)?))
    }

    // Signed readers reinterpret the unsigned value as two's complement

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i8_at(&self, offset: usize) -> Result<i8> {
        Ok(self.read_u8_at(offset)? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i16_at(&self, offset: usize) -> Result<i16> {
        Ok(self.read_u16_at(offset)? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.read_u32_at(offset)? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(decode_f32(self.read_u32()?))
    }

    pub fn read_f32_at(&self, offset: usize) -> Result<f32> {
        Ok(decode_f32(self.read_u32_at(offset)?))
    }

    /// Read a fixed-length string, lossily decoded as UTF-8
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    pub fn read_string_at(&self, offset: usize, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.slice_at(offset, len)?).into_owned())
    }

    /// Read a NUL-terminated string and advance past the terminator
    pub fn read_cstring(&mut self) -> Result<String> {
        let (value, consumed) = self.scan_cstring(self.position)?;
        self.position += consumed;
        Ok(value)
    }

    pub fn read_cstring_at(&self, offset: usize) -> Result<String> {
        Ok(self.scan_cstring(offset)?.0)
    }

    fn scan_cstring(&self, offset: usize) -> Result<(String, usize)> {
        if offset > self.data.len() {
            return Err(Error::OutOfBounds(format!(
                "string offset {} past end of {}-byte buffer",
                offset,
                self.data.len()
            )));
        }

        let end = self.data[offset..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::UnterminatedString(offset))?;

        let value = String::from_utf8_lossy(&self.data[offset..offset + end]).into_owned();
        Ok((value, end + 1))
    }
}

/// Growable little-endian writer
///
/// Writes past the current end extend the buffer; gaps are zero-filled.
#[derive(Debug, Default)]
pub struct ByteWriter {
    inner: Cursor<Vec<u8>>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Cursor::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    pub fn seek(&mut self, position: usize) {
        self.inner.set_position(position as u64);
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }

    /// Zero-extend the buffer to at least `len` bytes and move the cursor there
    pub fn pad_to(&mut self, len: usize) {
        let buf = self.inner.get_mut();
        if buf.len() < len {
            buf.resize(len, 0);
        }
        self.inner.set_position(len as u64);
    }

    /// Run `write` at `offset`, then restore the cursor
    fn at<F>(&mut self, offset: usize, write: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let saved = self.position();
        self.seek(offset);
        let result = write(self);
        self.seek(saved);
        result
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_bytes_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.at(offset, |w| w.write_bytes(bytes))
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        Ok(())
    }

    pub fn write_u8_at(&mut self, offset: usize, value: u8) -> Result<()> {
        self.at(offset, |w| w.write_u8(value))
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u16_at(&mut self, offset: usize, value: u16) -> Result<()> {
        self.at(offset, |w| w.write_u16(value))
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u32_at(&mut self, offset: usize, value: u32) -> Result<()> {
        self.at(offset, |w| w.write_u32(value))
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_u16(value as u16)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_i32_at(&mut self, offset: usize, value: i32) -> Result<()> {
        self.at(offset, |w| w.write_i32(value))
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(encode_f32(value))
    }

    pub fn write_f32_at(&mut self, offset: usize, value: f32) -> Result<()> {
        self.at(offset, |w| w.write_f32(value))
    }

    /// Write a string, truncated or zero-padded to `pad_len` when given
    pub fn write_string(&mut self, value: &str, pad_len: Option<usize>) -> Result<()> {
        let bytes = value.as_bytes();
        match pad_len {
            Some(len) if bytes.len() >= len => self.write_bytes(&bytes[..len]),
            Some(len) => {
                self.write_bytes(bytes)?;
                self.write_bytes(&vec![0u8; len - bytes.len()])
            }
            None => self.write_bytes(bytes),
        }
    }

    /// Write a string followed by a NUL terminator
    pub fn write_cstring(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())?;
        self.write_u8(0)
    }
}
