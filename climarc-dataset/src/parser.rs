//! CCE v3 dataset parser.
//!
//! Layout (all fields big-endian, MSB-first, no padding between fields):
//!
//! ```text
//! "CCE" u8:version                       identification
//! counts, date bounds, temperature bounds, bit widths   header
//! count_temperatures × code                          temperatures
//! count_bins × {month_delta, temperature_index_min}  lookup bins
//! count_locations × {lat f32, lon f32, bin_index_min} locations
//! ```
//!
//! Bits after the last location (padding of the final byte) are ignored.

use crate::dataset::{Dataset, Location, LookupBin};
use crate::header::DatasetHeader;
use crate::schema::{
    BIN_FIELDS, HEADER_SIZE, LOCATION_FIELDS, TEMPERATURE_FIELDS, as_f32, read_record,
    record_bits,
};
use climarc_core::bitstream::BitCursor;
use climarc_core::error::{ClimarcError, Result};
use tracing::{debug, warn};

/// Streaming reader over one dataset buffer.
#[derive(Debug)]
pub struct DatasetParser<'a> {
    data: &'a [u8],
    cursor: BitCursor<'a>,
}

impl<'a> DatasetParser<'a> {
    /// Create a parser over decompressed dataset bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cursor: BitCursor::new(data),
        }
    }

    /// Read and validate the header, then check the buffer can hold every record.
    pub fn read_header(&mut self) -> Result<DatasetHeader> {
        let header = DatasetHeader::read(&mut self.cursor)?;
        debug!(
            temperatures = header.count_temperatures,
            locations = header.count_locations,
            bins = header.count_bins,
            first = %header.dates.first,
            last = %header.dates.last,
            min = header.temperatures.min,
            max = header.temperatures.max,
            widths = ?header.widths,
            "dataset header"
        );

        let needed = body_bits(&header);
        let available = self.cursor.remaining_bits();
        if needed > available {
            debug!(needed, available, "record arrays exceed buffer");
            return Err(ClimarcError::premature_end(self.data.len() as u64));
        }
        Ok(header)
    }

    /// Read and dequantize all temperatures.
    pub fn read_temperatures(&mut self, header: &DatasetHeader) -> Result<Vec<f32>> {
        let widths = &header.widths;
        let mut temperatures = Vec::with_capacity(header.count_temperatures as usize);
        for _ in 0..header.count_temperatures {
            let [code] = read_record(&mut self.cursor, &TEMPERATURE_FIELDS, widths)?;
            temperatures.push(header.dequantize(code));
        }
        Ok(temperatures)
    }

    /// Read all lookup bins, checking their temperature indices.
    pub fn read_bins(&mut self, header: &DatasetHeader) -> Result<Vec<LookupBin>> {
        let widths = &header.widths;
        let span = header.dates.month_span() as u64;
        let mut bins: Vec<LookupBin> = Vec::with_capacity(header.count_bins as usize);

        for i in 0..header.count_bins as usize {
            let [month_delta, temperature_index_min] =
                read_record(&mut self.cursor, &BIN_FIELDS, widths)?;

            check_index(
                "bin",
                i,
                temperature_index_min,
                bins.last().map(|b| b.temperature_index_min),
                header.count_temperatures,
            )?;
            if month_delta as u64 >= span.max(1) {
                return Err(ClimarcError::index_out_of_range(
                    "bin month",
                    i,
                    month_delta as u64,
                    span,
                ));
            }

            bins.push(LookupBin {
                month_delta,
                temperature_index_min,
            });
        }

        // Each bin's run of months must stay inside the date bounds.
        for (i, bin) in bins.iter().enumerate() {
            let end = bins
                .get(i + 1)
                .map_or(header.count_temperatures, |next| next.temperature_index_min);
            let last_month = bin.month_delta as u64 + (end - bin.temperature_index_min) as u64;
            if last_month > span {
                return Err(ClimarcError::index_out_of_range(
                    "bin month",
                    i,
                    last_month,
                    span,
                ));
            }
        }

        Ok(bins)
    }

    /// Read all locations, checking their bin indices.
    pub fn read_locations(&mut self, header: &DatasetHeader) -> Result<Vec<Location>> {
        let widths = &header.widths;
        let mut locations: Vec<Location> = Vec::with_capacity(header.count_locations as usize);

        for i in 0..header.count_locations as usize {
            let [latitude, longitude, bin_index_min] =
                read_record(&mut self.cursor, &LOCATION_FIELDS, widths)?;

            check_index(
                "location",
                i,
                bin_index_min,
                locations.last().map(|l| l.bin_index_min),
                header.count_bins,
            )?;

            locations.push(Location {
                latitude: as_f32(latitude),
                longitude: as_f32(longitude),
                bin_index_min,
            });
        }

        Ok(locations)
    }

    /// Read everything after the header.
    pub fn read_body(&mut self, header: DatasetHeader) -> Result<Dataset> {
        let temperatures = self.read_temperatures(&header)?;
        let bins = self.read_bins(&header)?;
        let locations = self.read_locations(&header)?;

        let trailing = self.data.len() - self.cursor.byte_position();
        if trailing > 0 {
            warn!(trailing, "ignoring bytes after the last location record");
        }
        debug!(
            temperatures = temperatures.len(),
            bins = bins.len(),
            locations = locations.len(),
            "dataset records read"
        );

        Ok(Dataset {
            header,
            temperatures,
            bins,
            locations,
        })
    }

    /// Read the whole dataset.
    pub fn parse(mut self) -> Result<Dataset> {
        let header = self.read_header()?;
        self.read_body(header)
    }

    /// Bits consumed so far.
    pub fn bit_position(&self) -> u64 {
        self.cursor.bit_position()
    }
}

/// Bits needed by the record arrays a header announces.
pub fn body_bits(header: &DatasetHeader) -> u64 {
    let widths = &header.widths;
    header.count_temperatures as u64 * record_bits(&TEMPERATURE_FIELDS, widths)
        + header.count_bins as u64 * record_bits(&BIN_FIELDS, widths)
        + header.count_locations as u64 * record_bits(&LOCATION_FIELDS, widths)
}

/// Total size in bytes of a dataset with this header.
pub fn encoded_len(header: &DatasetHeader) -> u64 {
    HEADER_SIZE as u64 + body_bits(header).div_ceil(8)
}

/// An index must not exceed `limit` and must not decrease.
fn check_index(
    record: &'static str,
    index: usize,
    value: u32,
    previous: Option<u32>,
    limit: u32,
) -> Result<()> {
    if value > limit {
        return Err(ClimarcError::index_out_of_range(
            record,
            index,
            value as u64,
            limit as u64,
        ));
    }
    if let Some(previous) = previous {
        if value < previous {
            return Err(ClimarcError::index_out_of_range(
                record,
                index,
                value as u64,
                previous as u64,
            ));
        }
    }
    Ok(())
}

/// Parse a decompressed dataset.
pub fn parse(data: &[u8]) -> Result<Dataset> {
    DatasetParser::new(data).parse()
}

/// Parse only the header of a decompressed dataset.
pub fn parse_header(data: &[u8]) -> Result<DatasetHeader> {
    DatasetParser::new(data).read_header()
}
