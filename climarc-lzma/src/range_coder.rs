//! Range decoder for LZMA decompression.
//!
//! The range coder is an entropy coding method similar to arithmetic coding.
//! LZMA uses a specific variant with:
//! - 32-bit range and code registers
//! - Normalization (one byte shifted in) whenever range drops below 2^24
//! - 11-bit adaptive probabilities (1024 = 50%)

use climarc_core::error::{ClimarcError, Result};

/// Number of bits in probability model.
pub const PROB_BITS: u32 = 11;

/// Initial probability (50%).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Probability scale.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Number of bits to shift for probability update.
pub const MOVE_BITS: u32 = 5;

/// Top value for range normalization.
const TOP_VALUE: u32 = 1 << 24;

/// Bytes consumed by range decoder initialization.
pub const INIT_BYTES: usize = 5;

/// Sequential byte cursor over the compressed input.
#[derive(Debug, Clone)]
pub struct ByteSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteSource<'a> {
    /// Create a source reading `data` from the beginning.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a source that starts reading at `offset`.
    ///
    /// Error offsets stay relative to the start of `data`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            pos: offset.min(data.len()),
        }
    }

    /// Read the next byte.
    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                Ok(byte)
            }
            None => Err(ClimarcError::premature_end(self.pos as u64)),
        }
    }

    /// Offset of the next byte to read.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Range decoder for LZMA decompression.
#[derive(Debug)]
pub struct RangeDecoder<'a> {
    source: ByteSource<'a>,
    range: u32,
    code: u32,
}

impl<'a> RangeDecoder<'a> {
    /// Create a new range decoder, consuming the 5 initialization bytes.
    ///
    /// The first byte carries no information and is skipped; the next four
    /// form the initial code big-endian.
    pub fn new(mut source: ByteSource<'a>) -> Result<Self> {
        source.read_byte()?;

        let mut code = 0u32;
        for _ in 1..INIT_BYTES {
            code = (code << 8) | source.read_byte()? as u32;
        }

        Ok(Self {
            source,
            range: 0xFFFF_FFFF,
            code,
        })
    }

    /// Normalize the range (refill when range gets small).
    #[inline]
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.code = (self.code << 8) | self.source.read_byte()? as u32;
        }
        Ok(())
    }

    /// Decode a single bit with the given probability, adapting it.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        let bit = if self.code < bound {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            0
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            1
        };

        self.normalize()?;
        Ok(bit)
    }

    /// Decode `count` bits with fixed 50% probability, most significant first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0u32;

        for _ in 0..count {
            self.range >>= 1;
            let bit = if self.code >= self.range {
                self.code -= self.range;
                1
            } else {
                0
            };
            result = (result << 1) | bit;
            self.normalize()?;
        }

        Ok(result)
    }

    /// Bytes consumed from the source, including the initialization bytes.
    pub fn position(&self) -> usize {
        self.source.position()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.source.remaining()
    }
}

/// Range encoder used to craft streams in tests.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct RangeEncoder {
    buffer: Vec<u8>,
    range: u32,
    low: u64,
    cache: u8,
    cache_size: u64,
}

#[cfg(test)]
impl RangeEncoder {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::new(),
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
        }
    }

    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut tmp = self.cache;
            loop {
                self.buffer.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    fn normalize(&mut self) {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    pub(crate) fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);
        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }
        self.normalize();
    }

    pub(crate) fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.range >>= 1;
            if (value >> i) & 1 != 0 {
                self.low += self.range as u64;
            }
            self.normalize();
        }
    }

    pub(crate) fn encode_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut index = 1usize;
        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[index], bit);
            index = (index << 1) | bit as usize;
        }
    }

    pub(crate) fn encode_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut index = 1usize;
        for i in 0..num_bits {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[index], bit);
            index = (index << 1) | bit as usize;
        }
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.buffer
    }
}
