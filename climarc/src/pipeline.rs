//! Two-stage loading: LZMA decompression, then CCE v3 parsing.
//!
//! Decompression always finishes before parsing starts. Both stages run on
//! the calling thread.

use crate::config::LoadConfig;
use climarc_core::error::Result;
use climarc_dataset::Dataset;
use climarc_lzma::{LzmaDecoder, read_properties};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Sizes and timings of one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Size of the archive.
    pub compressed_size: u64,
    /// Size of the decompressed dataset.
    pub decompressed_size: u64,
    /// Time spent decompressing.
    pub decompress_time: Duration,
    /// Time spent parsing.
    pub parse_time: Duration,
}

impl LoadReport {
    /// Compressed size divided by decompressed size.
    pub fn ratio(&self) -> f64 {
        if self.decompressed_size == 0 {
            0.0
        } else {
            self.compressed_size as f64 / self.decompressed_size as f64
        }
    }
}

/// A dataset together with the report of how it was loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    /// Parsed records.
    pub dataset: Dataset,
    /// Sizes and timings.
    pub report: LoadReport,
}

/// Decompress an archive into raw dataset bytes.
///
/// Limits from `config` are checked against the stream header before the
/// window is allocated.
pub fn decompress(data: &[u8], config: &LoadConfig) -> Result<Vec<u8>> {
    let layout = config.header_layout;
    let props = config.check_properties(read_properties(data, layout)?)?;
    debug!(?layout, ?props, "archive header accepted");

    let start = Instant::now();
    let mut decoder = LzmaDecoder::with_properties(data, layout.header_len(), props)?;
    decoder.set_output_limit(Some(config.max_output_size));
    let out = decoder.decompress()?;

    info!(
        "LZMA Decompression [{} -> {} bytes; {:.1?}]",
        data.len(),
        out.len(),
        start.elapsed()
    );
    Ok(out)
}

/// Parse decompressed dataset bytes.
pub fn parse(data: &[u8]) -> Result<Dataset> {
    let start = Instant::now();
    let dataset = climarc_dataset::parse(data)?;
    info!(
        "Read {} entries @ {} locations with {} bins [{:.1?}]",
        dataset.temperatures.len(),
        dataset.locations.len(),
        dataset.bins.len(),
        start.elapsed()
    );
    Ok(dataset)
}

/// Decompress and parse an archive.
pub fn load(data: &[u8], config: &LoadConfig) -> Result<Dataset> {
    load_with_report(data, config).map(|loaded| loaded.dataset)
}

/// Decompress and parse an archive, reporting sizes and timings.
pub fn load_with_report(data: &[u8], config: &LoadConfig) -> Result<LoadedDataset> {
    let start = Instant::now();
    let raw = decompress(data, config)?;
    let decompress_time = start.elapsed();

    let start = Instant::now();
    let dataset = parse(&raw)?;
    let parse_time = start.elapsed();

    Ok(LoadedDataset {
        dataset,
        report: LoadReport {
            compressed_size: data.len() as u64,
            decompressed_size: raw.len() as u64,
            decompress_time,
            parse_time,
        },
    })
}

/// Load several independent archives.
///
/// With the `parallel` feature the archives are decoded concurrently on the
/// rayon pool. Results keep the order of `archives`.
pub fn load_many<T>(archives: &[T], config: &LoadConfig) -> Vec<Result<Dataset>>
where
    T: AsRef<[u8]> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        archives
            .par_iter()
            .map(|data| load(data.as_ref(), config))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        archives
            .iter()
            .map(|data| load(data.as_ref(), config))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climarc_core::{ClimarcError, ErrorKind};
    use climarc_lzma::HeaderLayout;

    const ARCHIVE: &[u8] = include_bytes!("../tests/fixtures/stations.cce.lzma");
    const RAW: &[u8] = include_bytes!("../tests/fixtures/stations.cce");

    #[test]
    fn test_decompress_fixture() {
        let out = decompress(ARCHIVE, &LoadConfig::default()).unwrap();
        assert_eq!(out, RAW);
    }

    #[test]
    fn test_load_with_report() {
        let loaded = load_with_report(ARCHIVE, &LoadConfig::default()).unwrap();
        assert_eq!(loaded.report.compressed_size, ARCHIVE.len() as u64);
        assert_eq!(loaded.report.decompressed_size, RAW.len() as u64);
        assert!(loaded.report.ratio() > 0.0);
        assert_eq!(loaded.dataset.temperatures.len(), 20);
    }

    #[test]
    fn test_dictionary_limit_checked_first() {
        let config = LoadConfig::default().with_max_dictionary_size(1024);
        let err = decompress(ARCHIVE, &config).unwrap_err();
        assert!(matches!(
            err,
            ClimarcError::LimitExceeded {
                what: "dictionary size",
                value: 4096,
                limit: 1024
            }
        ));
    }

    #[test]
    fn test_output_limit() {
        let config = LoadConfig::default().with_max_output_size(50);
        let err = decompress(ARCHIVE, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[test]
    fn test_properties_only_layout() {
        let mut stream = ARCHIVE[..5].to_vec();
        stream.extend_from_slice(&ARCHIVE[13..]);

        let config = LoadConfig::default()
            .with_header_layout(HeaderLayout::PropertiesOnly)
            .with_expected_size(Some(RAW.len() as u64));
        assert_eq!(decompress(&stream, &config).unwrap(), RAW);

        // Without a size the stream's end marker terminates it.
        let config = config.with_expected_size(None);
        assert_eq!(decompress(&stream, &config).unwrap(), RAW);
    }

    #[test]
    fn test_load_many_keeps_order() {
        let archives = vec![ARCHIVE.to_vec(), b"not an archive".to_vec(), ARCHIVE.to_vec()];
        let results = load_many(&archives, &LoadConfig::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[0].as_ref().ok(), results[2].as_ref().ok());
    }
}
