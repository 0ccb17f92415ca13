//! Dataset header: counts, date and temperature bounds, declared bit widths.

use crate::quantize;
use crate::schema::{BitWidths, HEADER_FIELDS, MAGIC, VERSION, as_f32, read_record, write_record};
use climarc_core::bitstream::{BitCursor, BitWriter};
use climarc_core::error::{ClimarcError, Result};
use std::fmt;

/// Number of months in a year.
pub const MONTHS_PER_YEAR: u32 = 12;

/// A calendar month; `month` is zero-based (0 = January).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct YearMonth {
    /// Year.
    pub year: u16,
    /// Zero-based month (0-11).
    pub month: u8,
}

impl YearMonth {
    /// Create a year/month pair, rejecting months above 11.
    pub fn new(year: u16, month: u8) -> Result<Self> {
        if month as u32 >= MONTHS_PER_YEAR {
            return Err(ClimarcError::invalid_header(format!(
                "month {month} out of range 0-11"
            )));
        }
        Ok(Self { year, month })
    }

    /// Months elapsed since year 0.
    pub fn month_index(self) -> u32 {
        self.year as u32 * MONTHS_PER_YEAR + self.month as u32
    }

    /// The month `months` after this one (saturating at the last representable month).
    pub fn offset(self, months: u32) -> YearMonth {
        let index = self.month_index().saturating_add(months);
        let year = (index / MONTHS_PER_YEAR).min(u16::MAX as u32);
        YearMonth {
            year: year as u16,
            month: (index % MONTHS_PER_YEAR) as u8,
        }
    }

    /// Months from `earlier` to `self`, or `None` if `earlier` is later.
    pub fn months_since(self, earlier: YearMonth) -> Option<u32> {
        self.month_index().checked_sub(earlier.month_index())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month + 1)
    }
}

/// Inclusive range of months covered by a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    /// First month with data.
    pub first: YearMonth,
    /// Last month with data (inclusive).
    pub last: YearMonth,
}

impl DateBounds {
    /// Number of months from `first` to `last`, both included.
    pub fn month_span(&self) -> u32 {
        self.last.months_since(self.first).map_or(0, |m| m + 1)
    }

    /// Whether `month` lies inside the bounds.
    pub fn contains(&self, month: YearMonth) -> bool {
        self.first <= month && month <= self.last
    }
}

/// Range used to quantize temperatures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBounds {
    /// Smallest representable temperature.
    pub min: f32,
    /// Largest representable temperature.
    pub max: f32,
}

impl TemperatureBounds {
    /// Temperature for a `width`-bit code.
    pub fn dequantize(&self, code: u32, width: u8) -> f32 {
        quantize::dequantize(code, self.min, self.max, width)
    }

    /// Nearest `width`-bit code for a temperature.
    pub fn quantize(&self, value: f32, width: u8) -> u32 {
        quantize::quantize(value, self.min, self.max, width)
    }

    /// Worst-case reconstruction error at `width` bits.
    pub fn max_error(&self, width: u8) -> f32 {
        quantize::max_error(self.min, self.max, width)
    }
}

/// Fixed header of a CCE v3 dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetHeader {
    /// Number of temperature samples.
    pub count_temperatures: u32,
    /// Number of locations.
    pub count_locations: u32,
    /// Number of lookup bins.
    pub count_bins: u32,
    /// Months covered.
    pub dates: DateBounds,
    /// Quantization range.
    pub temperatures: TemperatureBounds,
    /// Declared field widths.
    pub widths: BitWidths,
}

impl DatasetHeader {
    /// Read magic, version and header fields, then validate them.
    pub fn read(cursor: &mut BitCursor<'_>) -> Result<Self> {
        read_identification(cursor)?;

        let v = read_record(cursor, &HEADER_FIELDS, &BitWidths::default())?;
        let header = Self {
            count_temperatures: v[0],
            count_locations: v[1],
            count_bins: v[2],
            dates: DateBounds {
                first: YearMonth {
                    year: v[3] as u16,
                    month: v[4] as u8,
                },
                last: YearMonth {
                    year: v[5] as u16,
                    month: v[6] as u8,
                },
            },
            temperatures: TemperatureBounds {
                min: as_f32(v[7]),
                max: as_f32(v[8]),
            },
            widths: BitWidths {
                temperature: v[9] as u8,
                temperature_index: v[10] as u8,
                month_delta: v[11] as u8,
                bin_index: v[12] as u8,
            },
        };

        header.validate()?;
        Ok(header)
    }

    /// Write magic, version and header fields.
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_bytes(&MAGIC);
        writer.write_u8(VERSION);

        let values = [
            self.count_temperatures,
            self.count_locations,
            self.count_bins,
            self.dates.first.year as u32,
            self.dates.first.month as u32,
            self.dates.last.year as u32,
            self.dates.last.month as u32,
            self.temperatures.min.to_bits(),
            self.temperatures.max.to_bits(),
            self.widths.temperature as u32,
            self.widths.temperature_index as u32,
            self.widths.month_delta as u32,
            self.widths.bin_index as u32,
        ];
        write_record(writer, &HEADER_FIELDS, &BitWidths::default(), &values)
    }

    /// Check widths, dates and temperature bounds for consistency.
    pub fn validate(&self) -> Result<()> {
        self.widths.validate()?;

        let DateBounds { first, last } = self.dates;
        YearMonth::new(first.year, first.month)?;
        YearMonth::new(last.year, last.month)?;
        if last < first {
            return Err(ClimarcError::invalid_header(format!(
                "last month {last} precedes first month {first}"
            )));
        }

        let TemperatureBounds { min, max } = self.temperatures;
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ClimarcError::invalid_header(format!(
                "invalid temperature bounds [{min}, {max}]"
            )));
        }

        Ok(())
    }

    /// Temperature for a code read with this header's width.
    #[inline]
    pub fn dequantize(&self, code: u32) -> f32 {
        self.temperatures.dequantize(code, self.widths.temperature)
    }
}

/// Check the magic bytes and version at the cursor.
fn read_identification(cursor: &mut BitCursor<'_>) -> Result<()> {
    let available = (cursor.remaining_bits() / 8).min(MAGIC.len() as u64) as usize;
    let mut found = Vec::with_capacity(MAGIC.len());
    for _ in 0..available {
        found.push(cursor.read_u8()?);
    }
    if found[..] != MAGIC[..available] {
        return Err(ClimarcError::magic_mismatch(MAGIC.to_vec(), found));
    }
    if available < MAGIC.len() {
        return Err(ClimarcError::premature_end(available as u64));
    }

    let version = cursor.read_u8()?;
    if version != VERSION {
        return Err(ClimarcError::unsupported_version(version, VERSION));
    }
    Ok(())
}
