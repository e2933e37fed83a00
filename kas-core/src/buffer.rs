//! Endian-aware, seekable byte buffer used to build resource blobs and
//! whole container files.
//!
//! Writes never shrink the buffer. A write that starts before the end
//! overwrites bytes in place and appends whatever runs past the end; a
//! seek past the end is materialised as zero bytes on the next write.

use crate::charset;
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

#[derive(Debug, Clone)]
pub struct BinaryBuffer {
    bytes: Vec<u8>,
    order: ByteOrder,
    cursor: usize,
}

impl Default for BinaryBuffer {
    fn default() -> Self {
        Self::new(ByteOrder::Big)
    }
}

impl BinaryBuffer {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            bytes: Vec::new(),
            order,
            cursor: 0,
        }
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Total length, independent of the cursor.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn seek(&mut self, position: usize) {
        self.cursor = position;
    }

    pub fn seek_to_end(&mut self) {
        self.cursor = self.bytes.len();
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn put(&mut self, data: &[u8]) {
        if self.cursor > self.bytes.len() {
            self.bytes.resize(self.cursor, 0);
        }
        for &byte in data {
            if self.cursor < self.bytes.len() {
                self.bytes[self.cursor] = byte;
            } else {
                self.bytes.push(byte);
            }
            self.cursor += 1;
        }
    }

    /// Write the low `width` bytes of `value` in the buffer's byte order.
    fn put_sized(&mut self, value: u64, width: usize) {
        let be = value.to_be_bytes();
        let tail = &be[be.len() - width..];
        match self.order {
            ByteOrder::Big => self.put(tail),
            ByteOrder::Little => {
                let reversed: Vec<u8> = tail.iter().rev().copied().collect();
                self.put(&reversed);
            }
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.put_sized(u64::from(value), 2);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Three-byte integer, as used by the classic resource map data offsets.
    pub fn write_u24(&mut self, value: u32) {
        self.put_sized(u64::from(value & 0x00FF_FFFF), 3);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.put_sized(u64::from(value), 4);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.put_sized(value, 8);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    /// Two's-complement integer of `width` bytes (1, 2, 4 or 8).
    pub fn write_integer(&mut self, value: i128, width: usize) -> Result<(), CompileError> {
        match width {
            1 | 2 | 4 | 8 => {
                self.put_sized(value as u64, width);
                Ok(())
            }
            other => Err(CompileError::layout(format!(
                "unsupported integer width of {other} bytes"
            ))),
        }
    }

    /// Length-prefixed string: one length byte (capped at 255) then the
    /// legacy charset bytes.
    pub fn write_pstr(&mut self, text: &str) {
        let mut encoded = charset::encode(text);
        encoded.truncate(u8::MAX as usize);
        self.write_u8(encoded.len() as u8);
        self.put(&encoded);
    }

    /// C string. A `length` of zero writes the text followed by a NUL;
    /// otherwise exactly `length` bytes are written, truncated or padded
    /// with zeros.
    pub fn write_cstr(&mut self, text: &str, length: usize) {
        let mut encoded = charset::encode(text);
        if length == 0 {
            encoded.push(0);
        } else {
            encoded.resize(length, 0);
        }
        self.put(&encoded);
    }

    /// Append raw bytes. The cursor must be at the end of the buffer.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), CompileError> {
        if self.cursor < self.bytes.len() {
            return Err(CompileError::layout(format!(
                "raw data may only be appended (cursor at {}, buffer is {} bytes)",
                self.cursor,
                self.bytes.len()
            )));
        }
        self.put(data);
        Ok(())
    }

    /// Write zeros from the cursor until the buffer holds `size` bytes.
    pub fn pad_to(&mut self, size: usize) {
        if self.cursor > self.bytes.len() {
            self.bytes.resize(self.cursor, 0);
        }
        if size > self.bytes.len() {
            self.bytes.resize(size, 0);
        }
        self.cursor = self.cursor.max(size);
    }
}
