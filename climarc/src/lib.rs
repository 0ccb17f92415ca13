//! # climarc
//!
//! Loads climate archives: LZMA-compressed, bit-packed CCE v3 datasets of
//! monthly temperatures per location.
//!
//! Loading has two stages. [`decompress`] turns the archive into raw dataset
//! bytes, [`parse`] turns those bytes into a [`Dataset`]. [`load`] runs both.
//!
//! ## Example
//!
//! ```rust,no_run
//! use climarc::{LoadConfig, load};
//!
//! let archive = std::fs::read("temperatures.cce.lzma").unwrap();
//! let dataset = load(&archive, &LoadConfig::default()).unwrap();
//!
//! for (month, temperature) in dataset.samples_for_location(0).unwrap() {
//!     println!("{month}: {temperature:.2}");
//! }
//! ```
//!
//! ## Background loading
//!
//! [`Worker`] runs loads on a dedicated thread and answers over async
//! channels, for callers that must not block.
//!
//! ## Feature Flags
//!
//! - `parallel`: decode the archives passed to [`load_many`] concurrently
//!   with rayon.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod pipeline;
pub mod worker;

// Re-exports
pub use climarc_core::{ClimarcError, ErrorKind, Result};
pub use climarc_dataset::{
    Dataset, DatasetHeader, DateBounds, Location, LookupBin, TemperatureBounds, YearMonth,
};
pub use climarc_lzma::{HeaderLayout, StreamProperties};
pub use config::LoadConfig;
pub use pipeline::{
    LoadReport, LoadedDataset, decompress, load, load_many, load_with_report, parse,
};
pub use worker::Worker;
