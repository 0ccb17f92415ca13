//! # climarc LZMA
//!
//! LZMA (Lempel-Ziv-Markov chain Algorithm) decompression.
//!
//! Climate archives are shipped as `.lzma` streams; this crate turns them
//! back into the raw dataset bytes. Only decoding is implemented.
//!
//! ## Usage
//!
//! ```ignore
//! use climarc_lzma::decompress;
//!
//! let compressed = std::fs::read("climate.cce.lzma")?;
//! let raw = decompress(&compressed)?;
//! ```
//!
//! ## LZMA Format
//!
//! An LZMA stream consists of:
//! 1. Properties byte (`(pb * 5 + lp) * 9 + lc`)
//! 2. Dictionary size (4 bytes, little-endian)
//! 3. Uncompressed size (8 bytes, little-endian, 0xFFFFFFFFFFFFFFFF = unknown);
//!    absent in the [`HeaderLayout::PropertiesOnly`] layout
//! 4. Range-coded data
//!
//! The algorithm uses:
//! - LZ77-style dictionary compression with sliding window
//! - Range coding for entropy encoding
//! - Context-dependent probability models

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod model;
pub mod range_coder;

// Re-exports
pub use decoder::{LzmaDecoder, decompress, decompress_raw, decompress_with_layout};
pub use model::{HeaderLayout, LzmaModel, State, StreamProperties};
pub use range_coder::{ByteSource, RangeDecoder};

/// Read only the stream properties from the start of `data`.
pub fn read_properties(data: &[u8], layout: HeaderLayout) -> climarc_core::Result<StreamProperties> {
    StreamProperties::parse(data, layout)
}
