//! Parsing hand-assembled CCE v3 buffers.

use climarc_core::{ClimarcError, ErrorKind};
use climarc_dataset::{DatasetWriter, HEADER_SIZE, YearMonth, parse, parse_header, write_dataset};

/// Byte-aligned dataset: three 8-bit temperatures, one bin, one location.
fn byte_aligned() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"CCE\x03");
    data.extend_from_slice(&3u32.to_be_bytes()); // temperatures
    data.extend_from_slice(&1u32.to_be_bytes()); // locations
    data.extend_from_slice(&1u32.to_be_bytes()); // bins
    data.extend_from_slice(&1995u16.to_be_bytes());
    data.push(0);
    data.extend_from_slice(&1995u16.to_be_bytes());
    data.push(11);
    data.extend_from_slice(&(-10.0f32).to_be_bytes());
    data.extend_from_slice(&30.0f32.to_be_bytes());
    data.extend_from_slice(&[8, 8, 8, 8]);
    assert_eq!(data.len(), HEADER_SIZE);

    data.extend_from_slice(&[0, 128, 255]);
    data.extend_from_slice(&[4, 0]);
    data.extend_from_slice(&47.37f32.to_be_bytes());
    data.extend_from_slice(&8.54f32.to_be_bytes());
    data.push(0);
    data
}

#[test]
fn test_byte_aligned_dataset() {
    let dataset = parse(&byte_aligned()).unwrap();

    assert_eq!(dataset.temperatures.len(), 3);
    assert_eq!(dataset.bins.len(), 1);
    assert_eq!(dataset.locations.len(), 1);

    assert_eq!(dataset.temperatures[0], -10.0);
    assert!((dataset.temperatures[1] - 10.0784).abs() < 1e-3);
    assert_eq!(dataset.temperatures[2], 30.0);

    let location = dataset.locations[0];
    assert_eq!(location.latitude, 47.37);
    assert_eq!(location.longitude, 8.54);

    let samples: Vec<_> = dataset.samples_for_location(0).unwrap().collect();
    assert_eq!(samples.len(), 3);
    assert_eq!(samples[0].0, YearMonth::new(1995, 4).unwrap());
    assert_eq!(samples[2].0.to_string(), "1995-07");
}

#[test]
fn test_identification_checked_before_records() {
    // Records are garbage, but the version byte is reported first.
    let mut data = byte_aligned();
    data[3] = 2;
    data.truncate(HEADER_SIZE);
    let err = parse(&data).unwrap_err();
    assert!(matches!(
        err,
        ClimarcError::UnsupportedVersion {
            found: 2,
            supported: 3
        }
    ));

    let mut data = byte_aligned();
    data[..3].copy_from_slice(b"XZ\0");
    assert_eq!(parse(&data).unwrap_err().kind(), ErrorKind::MagicMismatch);
}

#[test]
fn test_truncation_anywhere_fails() {
    let data = byte_aligned();
    for len in 0..data.len() {
        let err = parse(&data[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEndOfInput, "length {len}");
    }
}

#[test]
fn test_header_widths_validated() {
    let mut data = byte_aligned();
    data[30] = 0; // bc_temperature
    assert_eq!(parse(&data).unwrap_err().kind(), ErrorKind::InvalidBitWidth);

    let mut data = byte_aligned();
    data[33] = 33; // bc_bin_index
    assert_eq!(parse(&data).unwrap_err().kind(), ErrorKind::InvalidBitWidth);

    let mut data = byte_aligned();
    data[18] = 12; // first month
    assert_eq!(parse_header(&data).unwrap_err().kind(), ErrorKind::InvalidHeader);
}

#[test]
fn test_rewrite_is_stable() {
    let data = byte_aligned();
    let dataset = parse(&data).unwrap();
    assert_eq!(write_dataset(&dataset).unwrap(), data);
}

#[test]
fn test_writer_layout_parses_back() {
    let mut writer = DatasetWriter::new();
    for (i, (lat, lon)) in [(35.68f32, 139.69f32), (-22.9, -43.2), (64.1, -21.9)]
        .into_iter()
        .enumerate()
    {
        let samples = (0..48u32)
            .filter(|m| (m / 12) as usize != i)
            .map(|m| {
                let month = YearMonth::new(2010 + (m / 12) as u16, (m % 12) as u8).unwrap();
                (month, lat.abs() / 3.0 + (m % 12) as f32)
            });
        writer.add_location(lat, lon, samples).unwrap();
    }

    let bytes = writer.finish().unwrap();
    let dataset = parse(&bytes).unwrap();
    assert_eq!(dataset.locations.len(), 3);
    // The first location misses 2010, the others have a gap in the middle.
    assert_eq!(dataset.bins.len(), 5);

    let tolerance = dataset.header.temperatures.max_error(16);
    for (i, location) in dataset.locations.iter().enumerate() {
        assert_eq!(dataset.sample_count(i), Some(36));
        for (month, t) in dataset.samples_for_location(i).unwrap() {
            let expected = location.latitude.abs() / 3.0 + month.month as f32;
            assert!((t - expected).abs() <= tolerance, "{month}: {t} vs {expected}");
        }
    }
}
