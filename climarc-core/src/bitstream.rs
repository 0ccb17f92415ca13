//! MSB-first bit cursor and writer for bit-packed records.
//!
//! Records in a climarc dataset are not byte-aligned: every field consumes
//! exactly its declared width and the next field continues mid-byte. Bits are
//! taken from the most significant end of each byte first, so a run of fields
//! whose widths are multiples of eight reads exactly like big-endian integers.
//!
//! # Example
//!
//! ```
//! use climarc_core::bitstream::{BitCursor, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0x3FF, 10);
//! let data = writer.finish();
//!
//! let mut cursor = BitCursor::new(&data);
//! assert_eq!(cursor.read_bits(3).unwrap(), 0b101);
//! assert_eq!(cursor.read_bits(10).unwrap(), 0x3FF);
//! ```

use crate::error::{ClimarcError, Result};

/// Widest field a single read or write may span.
pub const MAX_FIELD_BITS: u8 = 32;

/// MSB-first bit reader over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    /// Input data.
    data: &'a [u8],
    /// Absolute bit position of the next bit to read.
    bit_pos: u64,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor positioned at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Total bits consumed so far.
    pub fn bit_position(&self) -> u64 {
        self.bit_pos
    }

    /// Number of bytes touched so far (a partially read byte counts).
    pub fn byte_position(&self) -> usize {
        self.bit_pos.div_ceil(8) as usize
    }

    /// Bits left before the end of the buffer.
    pub fn remaining_bits(&self) -> u64 {
        (self.data.len() as u64 * 8).saturating_sub(self.bit_pos)
    }

    /// Whether the next read starts on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    /// Read `count` bits (0-32) as an unsigned value, first bit most significant.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        if count > MAX_FIELD_BITS {
            return Err(ClimarcError::invalid_bit_width("read_bits", count));
        }
        if count == 0 {
            return Ok(0);
        }
        if self.remaining_bits() < count as u64 {
            return Err(ClimarcError::premature_end(self.data.len() as u64));
        }

        let mut value = 0u64;
        let mut remaining = count as u32;

        while remaining > 0 {
            let byte = self.data[(self.bit_pos >> 3) as usize];
            let available = 8 - (self.bit_pos & 7) as u32;
            let take = available.min(remaining);
            let bits = (byte >> (available - take)) as u32 & ((1u32 << take) - 1);

            value = (value << take) | bits as u64;
            remaining -= take;
            self.bit_pos += take as u64;
        }

        Ok(value as u32)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Read 8 bits.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Read 32 bits, big-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bits(32)
    }

    /// Read an IEEE-754 single from 32 big-endian bits.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_bits(32)?))
    }

    /// Read `N` whole bytes (not necessarily byte-aligned).
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        for byte in &mut out {
            *byte = self.read_u8()?;
        }
        Ok(out)
    }
}

/// MSB-first bit writer producing a byte vector.
#[derive(Debug, Default)]
pub struct BitWriter {
    /// Completed bytes.
    output: Vec<u8>,
    /// Pending bits, right-aligned.
    buffer: u64,
    /// Number of pending bits (always < 8 between calls).
    bits_in_buffer: u8,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with an output capacity hint in bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            output: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> u64 {
        self.output.len() as u64 * 8 + self.bits_in_buffer as u64
    }

    /// Write the low `count` bits (0-32) of `value`, most significant first.
    ///
    /// Bits above `count` are masked off.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= MAX_FIELD_BITS, "cannot write more than 32 bits");
        if count == 0 {
            return;
        }

        let mask = (1u64 << count) - 1;
        self.buffer = (self.buffer << count) | (value as u64 & mask);
        self.bits_in_buffer += count;

        while self.bits_in_buffer >= 8 {
            self.bits_in_buffer -= 8;
            self.output.push((self.buffer >> self.bits_in_buffer) as u8);
        }
        self.buffer &= (1u64 << self.bits_in_buffer) - 1;
    }

    /// Write 8 bits.
    pub fn write_u8(&mut self, value: u8) {
        self.write_bits(value as u32, 8);
    }

    /// Write an IEEE-754 single as 32 big-endian bits.
    pub fn write_f32(&mut self, value: f32) {
        self.write_bits(value.to_bits(), 32);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_u8(byte);
        }
    }

    /// Pad the final partial byte with zero bits and return the output.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.output.push((self.buffer << pad) as u8);
        }
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_roundtrip_mixed_widths() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b1100, 4);
        writer.write_bits(0xFF, 8);
        writer.write_bits(0x1234_5678, 32);
        writer.write_bits(1, 1);

        let data = writer.finish();
        assert_eq!(data.len(), 6);

        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_bits(3).unwrap(), 0b101);
        assert_eq!(cursor.read_bits(4).unwrap(), 0b1100);
        assert_eq!(cursor.read_bits(8).unwrap(), 0xFF);
        assert_eq!(cursor.read_bits(32).unwrap(), 0x1234_5678);
        assert!(cursor.read_bit().unwrap());
        assert_eq!(cursor.bit_position(), 48);
    }

    #[test]
    fn test_byte_widths_read_big_endian() {
        let data = [0x43, 0x43, 0x45, 0x03, 0x00, 0x00, 0x01, 0x02];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(&cursor.read_array::<3>().unwrap(), b"CCE");
        assert_eq!(cursor.read_u8().unwrap(), 3);
        assert_eq!(cursor.read_u32().unwrap(), 0x0102);
        assert!(cursor.is_byte_aligned());
    }

    #[test]
    fn test_float_mid_byte() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b11, 2);
        writer.write_f32(-12.5);
        writer.write_f32(47.25);
        let data = writer.finish();

        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_bits(2).unwrap(), 0b11);
        assert_eq!(cursor.read_f32().unwrap(), -12.5);
        assert_eq!(cursor.read_f32().unwrap(), 47.25);
        assert!(!cursor.is_byte_aligned());
    }

    #[test]
    fn test_zero_width_reads_nothing() {
        let mut cursor = BitCursor::new(&[]);
        assert_eq!(cursor.read_bits(0).unwrap(), 0);
        assert_eq!(cursor.bit_position(), 0);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0xAB];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_bits(5).unwrap(), 0b10101);
        let err = cursor.read_bits(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEndOfInput);
        // A failed read does not move the cursor.
        assert_eq!(cursor.bit_position(), 5);
        assert_eq!(cursor.read_bits(3).unwrap(), 0b011);
    }

    #[test]
    fn test_width_over_32_rejected() {
        let data = [0u8; 8];
        let mut cursor = BitCursor::new(&data);
        let err = cursor.read_bits(33).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBitWidth);
    }

    #[test]
    fn test_writer_masks_high_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFFFF, 4);
        writer.write_bits(0, 4);
        assert_eq!(writer.finish(), vec![0xF0]);
    }

    #[test]
    fn test_writer_padding() {
        let mut writer = BitWriter::with_capacity(2);
        writer.write_bits(0b1, 1);
        assert_eq!(writer.bit_len(), 1);
        assert_eq!(writer.finish(), vec![0x80]);
    }
}
