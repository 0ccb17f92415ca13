//! CCE v3 dataset writer.
//!
//! [`DatasetWriter`] collects monthly samples per location and lays them out
//! the way the archive producer does: samples sorted by month, duplicate
//! months averaged, runs of consecutive months grouped into lookup bins, and
//! index fields given the smallest width that holds their counts.
//! [`write_dataset`] serializes an already built [`Dataset`].

use crate::dataset::{Dataset, Location, LookupBin};
use crate::header::{DateBounds, DatasetHeader, TemperatureBounds, YearMonth};
use crate::parser::encoded_len;
use crate::schema::{BIN_FIELDS, BitWidths, LOCATION_FIELDS, TEMPERATURE_FIELDS, write_record};
use climarc_core::bitstream::BitWriter;
use climarc_core::error::{ClimarcError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Default width of a quantized temperature code.
pub const DEFAULT_TEMPERATURE_BITS: u8 = 16;

/// Bits needed to store `count` as an unsigned value.
#[inline]
pub fn bits_for(count: u64) -> u8 {
    (u64::BITS - count.leading_zeros()) as u8
}

#[derive(Debug, Clone)]
struct Station {
    latitude: f32,
    longitude: f32,
    /// Month -> (sum, count) for averaging duplicates.
    months: BTreeMap<YearMonth, (f64, u32)>,
}

/// Builder for CCE v3 datasets.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    temperature_bits: u8,
    stations: Vec<Station>,
}

impl Default for DatasetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetWriter {
    /// Create an empty writer using [`DEFAULT_TEMPERATURE_BITS`].
    pub fn new() -> Self {
        Self {
            temperature_bits: DEFAULT_TEMPERATURE_BITS,
            stations: Vec::new(),
        }
    }

    /// Set the width of quantized temperature codes.
    pub fn temperature_bits(mut self, bits: u8) -> Self {
        self.temperature_bits = bits;
        self
    }

    /// Add samples for the location at `(latitude, longitude)`.
    ///
    /// Samples for a location that was already added are merged into it.
    /// NaN temperatures are dropped.
    pub fn add_location<I>(&mut self, latitude: f32, longitude: f32, samples: I) -> Result<()>
    where
        I: IntoIterator<Item = (YearMonth, f32)>,
    {
        let index = match self.stations.iter().position(|s| {
            s.latitude.to_bits() == latitude.to_bits()
                && s.longitude.to_bits() == longitude.to_bits()
        }) {
            Some(index) => index,
            None => {
                self.stations.push(Station {
                    latitude,
                    longitude,
                    months: BTreeMap::new(),
                });
                self.stations.len() - 1
            }
        };
        let station = &mut self.stations[index];

        for (month, temperature) in samples {
            let month = YearMonth::new(month.year, month.month)?;
            if temperature.is_nan() {
                continue;
            }
            let entry = station.months.entry(month).or_insert((0.0, 0));
            entry.0 += temperature as f64;
            entry.1 += 1;
        }
        Ok(())
    }

    /// Number of locations holding at least one sample.
    pub fn location_count(&self) -> usize {
        self.stations.iter().filter(|s| !s.months.is_empty()).count()
    }

    /// Lay out the collected samples as a dataset.
    ///
    /// Temperatures in the result are the values a parser reads back, that
    /// is, quantized and dequantized again.
    pub fn build(&self) -> Result<Dataset> {
        let stations: Vec<&Station> = self
            .stations
            .iter()
            .filter(|s| !s.months.is_empty())
            .collect();

        let mut months = stations.iter().flat_map(|s| s.months.keys().copied());
        let Some(start) = months.next() else {
            return Err(ClimarcError::invalid_header("dataset has no samples"));
        };
        let (first, last) = months.fold((start, start), |(lo, hi), m| (lo.min(m), hi.max(m)));
        let dates = DateBounds { first, last };

        let mut raw = Vec::new();
        let mut bins = Vec::new();
        let mut locations = Vec::with_capacity(stations.len());

        for station in &stations {
            locations.push(Location {
                latitude: station.latitude,
                longitude: station.longitude,
                bin_index_min: bins.len() as u32,
            });

            let mut previous: Option<u32> = None;
            for (&month, &(sum, count)) in &station.months {
                let delta = month.months_since(first).unwrap_or(0);
                if previous.is_none_or(|p| delta != p + 1) {
                    bins.push(LookupBin {
                        month_delta: delta,
                        temperature_index_min: raw.len() as u32,
                    });
                }
                previous = Some(delta);
                raw.push((sum / count as f64) as f32);
            }
        }

        let (min, max) = raw
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });
        let header = DatasetHeader {
            count_temperatures: count_u32("temperatures", raw.len())?,
            count_locations: count_u32("locations", locations.len())?,
            count_bins: count_u32("bins", bins.len())?,
            dates,
            temperatures: TemperatureBounds { min, max },
            widths: BitWidths {
                temperature: self.temperature_bits,
                temperature_index: bits_for(raw.len() as u64),
                month_delta: bits_for(dates.month_span() as u64),
                bin_index: bits_for(bins.len() as u64),
            },
        };
        header.validate()?;

        let width = header.widths.temperature;
        let temperatures = raw
            .iter()
            .map(|&t| header.dequantize(header.temperatures.quantize(t, width)))
            .collect();

        debug!(
            temperatures = header.count_temperatures,
            locations = header.count_locations,
            bins = header.count_bins,
            widths = ?header.widths,
            "dataset laid out"
        );

        Ok(Dataset {
            header,
            temperatures,
            bins,
            locations,
        })
    }

    /// Build and serialize the dataset.
    pub fn finish(&self) -> Result<Vec<u8>> {
        write_dataset(&self.build()?)
    }
}

fn count_u32(what: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count)
        .map_err(|_| ClimarcError::limit_exceeded(what, count as u64, u32::MAX as u64))
}

/// Serialize `dataset` as CCE v3 bytes.
///
/// Temperatures are quantized against the header bounds. Array lengths must
/// match the header counts.
pub fn write_dataset(dataset: &Dataset) -> Result<Vec<u8>> {
    let header = &dataset.header;
    for (what, len, count) in [
        (
            "temperatures",
            dataset.temperatures.len(),
            header.count_temperatures,
        ),
        ("bins", dataset.bins.len(), header.count_bins),
        ("locations", dataset.locations.len(), header.count_locations),
    ] {
        if len != count as usize {
            return Err(ClimarcError::invalid_header(format!(
                "header declares {count} {what}, dataset holds {len}"
            )));
        }
    }

    let widths = &header.widths;
    let mut writer = BitWriter::with_capacity(encoded_len(header) as usize);
    header.write(&mut writer)?;

    for &t in &dataset.temperatures {
        let code = header.temperatures.quantize(t, widths.temperature);
        write_record(&mut writer, &TEMPERATURE_FIELDS, widths, &[code])?;
    }
    for bin in &dataset.bins {
        write_record(
            &mut writer,
            &BIN_FIELDS,
            widths,
            &[bin.month_delta, bin.temperature_index_min],
        )?;
    }
    for location in &dataset.locations {
        write_record(
            &mut writer,
            &LOCATION_FIELDS,
            widths,
            &[
                location.latitude.to_bits(),
                location.longitude.to_bits(),
                location.bin_index_min,
            ],
        )?;
    }

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use climarc_core::ErrorKind;

    fn ym(year: u16, month: u8) -> YearMonth {
        YearMonth { year, month }
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(255), 8);
        assert_eq!(bits_for(256), 9);
        assert_eq!(bits_for(u32::MAX as u64), 32);
    }

    #[test]
    fn test_bins_split_on_gaps() {
        let mut writer = DatasetWriter::new().temperature_bits(12);
        writer
            .add_location(
                10.0,
                20.0,
                [
                    (ym(2001, 1), 3.0),
                    (ym(2000, 11), 1.0),
                    (ym(2001, 0), 2.0),
                    (ym(2001, 5), 4.0),
                ],
            )
            .unwrap();
        writer
            .add_location(-5.0, 7.5, [(ym(2000, 11), -1.0), (ym(2001, 0), 0.0)])
            .unwrap();

        let ds = writer.build().unwrap();
        assert_eq!(ds.header.dates.first, ym(2000, 11));
        assert_eq!(ds.header.dates.last, ym(2001, 5));
        assert_eq!(
            ds.bins,
            vec![
                LookupBin {
                    month_delta: 0,
                    temperature_index_min: 0
                },
                LookupBin {
                    month_delta: 6,
                    temperature_index_min: 3
                },
                LookupBin {
                    month_delta: 0,
                    temperature_index_min: 4
                },
            ]
        );
        assert_eq!(ds.locations[1].bin_index_min, 2);
        assert_eq!(ds.header.temperatures.min, -1.0);
        assert_eq!(ds.header.temperatures.max, 4.0);
        assert_eq!(ds.header.widths.temperature_index, 3);
        assert_eq!(ds.header.widths.month_delta, 3);
        assert_eq!(ds.header.widths.bin_index, 2);
    }

    #[test]
    fn test_duplicates_averaged_and_nan_dropped() {
        let mut writer = DatasetWriter::new();
        writer
            .add_location(
                1.0,
                2.0,
                [(ym(1990, 3), 10.0), (ym(1990, 4), f32::NAN), (ym(1990, 3), 20.0)],
            )
            .unwrap();
        writer.add_location(1.0, 2.0, [(ym(1990, 4), 0.0)]).unwrap();
        writer.add_location(9.0, 9.0, [(ym(1990, 4), f32::NAN)]).unwrap();
        assert_eq!(writer.location_count(), 1);

        let ds = writer.build().unwrap();
        assert_eq!(ds.temperatures, vec![15.0, 0.0]);
        assert_eq!(ds.bins.len(), 1);
    }

    #[test]
    fn test_written_bytes_parse_back() {
        let mut writer = DatasetWriter::new().temperature_bits(10);
        for i in 0..4u16 {
            let samples = (0..30u32).filter(|m| m % 7 != i as u32).map(|m| {
                (
                    ym(1980 + (m / 12) as u16, (m % 12) as u8),
                    (m as f32 * 0.7 + i as f32).sin() * 25.0,
                )
            });
            writer
                .add_location(i as f32 * 1.5, -(i as f32) * 2.25, samples)
                .unwrap();
        }

        let built = writer.build().unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len() as u64, encoded_len(&built.header));

        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, built);
        assert_eq!(parsed.samples_for_location(2).unwrap().count(), 26);
    }

    #[test]
    fn test_errors() {
        let err = DatasetWriter::new().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHeader);

        let mut writer = DatasetWriter::new();
        let err = writer.add_location(0.0, 0.0, [(ym(2000, 12), 1.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHeader);

        let mut writer = DatasetWriter::new().temperature_bits(0);
        writer.add_location(0.0, 0.0, [(ym(2000, 1), 1.0)]).unwrap();
        assert_eq!(writer.build().unwrap_err().kind(), ErrorKind::InvalidBitWidth);

        let mut writer = DatasetWriter::new();
        writer.add_location(0.0, 0.0, [(ym(2000, 1), 1.0)]).unwrap();
        let mut ds = writer.build().unwrap();
        ds.temperatures.push(2.0);
        assert_eq!(write_dataset(&ds).unwrap_err().kind(), ErrorKind::InvalidHeader);
    }
}
