//! # climarc Core
//!
//! Core components shared by every climarc crate:
//!
//! - [`bitstream`]: MSB-first bit cursor/writer for non-byte-aligned records
//! - [`window`]: Output window (sliding dictionary) for LZMA decompression
//! - [`error`]: Error taxonomy
//!
//! ## Architecture
//!
//! climarc is layered like an archiver stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: Pipeline                                            │
//! │     load(), Worker, CLI                                 │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Container                                           │
//! │     CCE v3 dataset header and bit-packed records        │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     LZMA (range coder + LZ77 window)                    │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitCursor/BitWriter, OutputWindow, errors           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use climarc_core::bitstream::BitCursor;
//!
//! let data = [0xAB, 0xCD];
//! let mut cursor = BitCursor::new(&data);
//! assert_eq!(cursor.read_bits(12).unwrap(), 0xABC);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod error;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitCursor, BitWriter};
pub use error::{ClimarcError, ErrorKind, Result};
pub use window::OutputWindow;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitCursor, BitWriter};
    pub use crate::error::{ClimarcError, ErrorKind, Result};
    pub use crate::window::OutputWindow;
}
