//! # climarc Dataset
//!
//! Reader and writer for CCE v3, the bit-packed climate record format found
//! inside decompressed climarc archives.
//!
//! A dataset holds three arrays behind a fixed header:
//!
//! - quantized monthly temperatures,
//! - lookup bins, each a run of consecutive months for one location,
//! - locations, each pointing at its first lookup bin.
//!
//! Fields are packed MSB-first with the widths the header declares, so
//! records do not start on byte boundaries.
//!
//! ## Example
//!
//! ```rust
//! use climarc_dataset::{DatasetWriter, YearMonth, parse};
//!
//! let mut writer = DatasetWriter::new().temperature_bits(12);
//! writer.add_location(52.52, 13.40, [
//!     (YearMonth::new(2020, 0).unwrap(), -1.5),
//!     (YearMonth::new(2020, 1).unwrap(), 0.5),
//! ]).unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let dataset = parse(&bytes).unwrap();
//! assert_eq!(dataset.temperatures.len(), 2);
//! assert_eq!(dataset.samples_for_location(0).unwrap().count(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dataset;
pub mod header;
pub mod parser;
pub mod quantize;
pub mod schema;
pub mod writer;

// Re-exports
pub use dataset::{Dataset, Location, LookupBin};
pub use header::{DatasetHeader, DateBounds, TemperatureBounds, YearMonth};
pub use parser::{DatasetParser, encoded_len, parse, parse_header};
pub use schema::{BitWidths, HEADER_SIZE, MAGIC, VERSION};
pub use writer::{DatasetWriter, bits_for, write_dataset};
