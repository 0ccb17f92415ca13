//! Parsed records and lookups over them.

use crate::header::{DatasetHeader, YearMonth};
use std::ops::Range;

/// A contiguous run of monthly temperatures for one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupBin {
    /// Months between the dataset's first month and this bin's first sample.
    pub month_delta: u32,
    /// Index of the bin's first temperature.
    pub temperature_index_min: u32,
}

/// A measuring location and the first of its lookup bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f32,
    /// Longitude in degrees.
    pub longitude: f32,
    /// Index of the location's first lookup bin.
    pub bin_index_min: u32,
}

/// A fully decoded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Header the records were read with.
    pub header: DatasetHeader,
    /// Dequantized temperatures.
    pub temperatures: Vec<f32>,
    /// Lookup bins.
    pub bins: Vec<LookupBin>,
    /// Locations.
    pub locations: Vec<Location>,
}

impl Dataset {
    /// Temperature indices covered by bin `index`.
    ///
    /// A bin runs up to the next bin's first index, the last one to the end
    /// of the temperature array.
    pub fn bin_range(&self, index: usize) -> Option<Range<usize>> {
        let bin = self.bins.get(index)?;
        let end = self
            .bins
            .get(index + 1)
            .map_or(self.temperatures.len(), |next| next.temperature_index_min as usize);
        Some(bin.temperature_index_min as usize..end)
    }

    /// Bin indices belonging to location `index`.
    pub fn location_bins(&self, index: usize) -> Option<Range<usize>> {
        let location = self.locations.get(index)?;
        let end = self
            .locations
            .get(index + 1)
            .map_or(self.bins.len(), |next| next.bin_index_min as usize);
        Some(location.bin_index_min as usize..end)
    }

    /// All samples of location `index` as `(month, temperature)`, in file order.
    pub fn samples_for_location(
        &self,
        index: usize,
    ) -> Option<impl Iterator<Item = (YearMonth, f32)> + '_> {
        let first = self.header.dates.first;
        let bins = self.location_bins(index)?;

        Some(bins.flat_map(move |b| {
            let month_delta = self.bins[b].month_delta;
            let range = self.bin_range(b).unwrap_or_default();
            self.temperatures[range]
                .iter()
                .enumerate()
                .map(move |(k, &t)| (first.offset(month_delta + k as u32), t))
        }))
    }

    /// Number of samples recorded for location `index`.
    pub fn sample_count(&self, index: usize) -> Option<usize> {
        let bins = self.location_bins(index)?;
        Some(bins.filter_map(|b| self.bin_range(b)).map(|r| r.len()).sum())
    }

    /// Index of the location closest to `(latitude, longitude)` in plain degrees.
    pub fn nearest_location(&self, latitude: f32, longitude: f32) -> Option<usize> {
        self.locations
            .iter()
            .enumerate()
            .map(|(i, loc)| {
                let dlat = loc.latitude - latitude;
                let dlon = loc.longitude - longitude;
                (i, dlat * dlat + dlon * dlon)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}
