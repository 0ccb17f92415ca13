//! Loading a real archive end to end.

use climarc::{ErrorKind, HeaderLayout, LoadConfig, YearMonth, load, load_with_report};

fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(&path).unwrap_or_else(|e| panic!("cannot read {path}: {e}"))
}

#[test]
fn test_stations_archive() {
    let dataset = load(&fixture("stations.cce.lzma"), &LoadConfig::default()).unwrap();
    let header = &dataset.header;

    assert_eq!(header.count_temperatures, 20);
    assert_eq!(header.count_locations, 3);
    assert_eq!(header.count_bins, 5);
    assert_eq!(header.dates.first, YearMonth::new(1990, 0).unwrap());
    assert_eq!(header.dates.last, YearMonth::new(1995, 11).unwrap());
    assert_eq!(header.temperatures.min, -12.5);
    assert_eq!(header.temperatures.max, 31.0);
    assert_eq!(header.widths.temperature, 10);

    // Codes are (i * 53) % 1024.
    let step = (31.0 + 12.5) / 1023.0;
    for (i, &t) in dataset.temperatures.iter().enumerate() {
        let code = (i * 53 % 1024) as f32;
        assert!((t - (-12.5 + code * step)).abs() < 1e-4, "temperature {i}: {t}");
    }
    assert!((dataset.temperatures[1] - -10.246_334).abs() < 1e-4);

    let latitudes: Vec<f32> = dataset.locations.iter().map(|l| l.latitude).collect();
    assert_eq!(latitudes, vec![35.6895, -33.8688, 64.1466]);

    assert_eq!(dataset.location_bins(0), Some(0..2));
    assert_eq!(dataset.location_bins(1), Some(2..3));
    assert_eq!(dataset.location_bins(2), Some(3..5));
    assert_eq!(dataset.sample_count(0), Some(10));
    assert_eq!(dataset.sample_count(1), Some(5));
    assert_eq!(dataset.sample_count(2), Some(5));

    let months: Vec<String> = dataset
        .samples_for_location(2)
        .unwrap()
        .map(|(m, _)| m.to_string())
        .collect();
    assert_eq!(
        months,
        vec!["1995-01", "1995-02", "1995-03", "1995-07", "1995-08"]
    );
}

#[test]
fn test_report() {
    let archive = fixture("stations.cce.lzma");
    let loaded = load_with_report(&archive, &LoadConfig::default()).unwrap();
    assert_eq!(loaded.report.compressed_size, archive.len() as u64);
    assert_eq!(loaded.report.decompressed_size, 92);
}

#[test]
fn test_raw_dataset_is_not_an_archive() {
    // A raw CCE file has no LZMA header: 'C' = 67 is a valid props byte, but
    // the decoded stream is garbage.
    let err = load(&fixture("stations.cce"), &LoadConfig::default()).unwrap_err();
    assert_ne!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_truncated_archive() {
    let archive = fixture("stations.cce.lzma");
    for len in [0, 4, 12, 13, 17, archive.len() / 2, archive.len() - 1] {
        let err = load(&archive[..len], &LoadConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEndOfInput, "length {len}");
    }
}

#[test]
fn test_wrong_layout() {
    let archive = fixture("stations.cce.lzma");
    let config = LoadConfig::default().with_header_layout(HeaderLayout::PropertiesOnly);
    assert!(load(&archive, &config).is_err());
}
