//! Field layouts of the CCE v3 format.
//!
//! Every record kind is described by an ordered list of [`Field`]s. A field
//! either has a fixed width or takes the width the header declares for it.
//! [`read_record`] and [`write_record`] walk such a list with the shared bit
//! cursor, so the byte layout lives in one place.

use climarc_core::bitstream::{BitCursor, BitWriter, MAX_FIELD_BITS};
use climarc_core::error::{ClimarcError, Result};

/// File identification bytes.
pub const MAGIC: [u8; 3] = *b"CCE";

/// The only format version this crate reads and writes.
pub const VERSION: u8 = 3;

/// How many bits a field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Always this many bits.
    Fixed(u8),
    /// The width declared in the header.
    Declared(DeclaredWidth),
}

/// Widths the header declares for variable-width fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredWidth {
    /// Quantized temperature code.
    Temperature,
    /// Index into the temperature array.
    TemperatureIndex,
    /// Month offset from the first month of the dataset.
    MonthDelta,
    /// Index into the lookup bin array.
    BinIndex,
}

/// How the raw bits of a field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Unsigned integer.
    Unsigned,
    /// IEEE-754 single precision, stored as its 32 raw bits.
    Float32,
}

/// One field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name, used in error messages.
    pub name: &'static str,
    /// Bit width.
    pub width: Width,
    /// Interpretation of the bits.
    pub kind: Kind,
}

impl Field {
    const fn unsigned(name: &'static str, bits: u8) -> Self {
        Self {
            name,
            width: Width::Fixed(bits),
            kind: Kind::Unsigned,
        }
    }

    const fn float(name: &'static str) -> Self {
        Self {
            name,
            width: Width::Fixed(32),
            kind: Kind::Float32,
        }
    }

    const fn declared(name: &'static str, width: DeclaredWidth) -> Self {
        Self {
            name,
            width: Width::Declared(width),
            kind: Kind::Unsigned,
        }
    }
}

/// Header fields following the magic and version bytes.
pub const HEADER_FIELDS: [Field; 13] = [
    Field::unsigned("count_temperatures", 32),
    Field::unsigned("count_locations", 32),
    Field::unsigned("count_bins", 32),
    Field::unsigned("first_year", 16),
    Field::unsigned("first_month", 8),
    Field::unsigned("last_year", 16),
    Field::unsigned("last_month", 8),
    Field::float("min_temperature"),
    Field::float("max_temperature"),
    Field::unsigned("bc_temperature", 8),
    Field::unsigned("bc_temperature_index", 8),
    Field::unsigned("bc_month_delta", 8),
    Field::unsigned("bc_bin_index", 8),
];

/// One quantized temperature.
pub const TEMPERATURE_FIELDS: [Field; 1] =
    [Field::declared("temperature", DeclaredWidth::Temperature)];

/// One lookup bin.
pub const BIN_FIELDS: [Field; 2] = [
    Field::declared("month_delta", DeclaredWidth::MonthDelta),
    Field::declared("temperature_index_min", DeclaredWidth::TemperatureIndex),
];

/// One location.
pub const LOCATION_FIELDS: [Field; 3] = [
    Field::float("latitude"),
    Field::float("longitude"),
    Field::declared("bin_index_min", DeclaredWidth::BinIndex),
];

/// Size of the identification bytes plus header, in bytes.
pub const HEADER_SIZE: usize = MAGIC.len() + 1 + 30;

/// Bit widths declared by a dataset header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitWidths {
    /// Width of a quantized temperature code (1-32).
    pub temperature: u8,
    /// Width of a temperature index (0-32).
    pub temperature_index: u8,
    /// Width of a month delta (0-32).
    pub month_delta: u8,
    /// Width of a bin index (0-32).
    pub bin_index: u8,
}

impl BitWidths {
    /// Width for a declared field.
    pub fn get(&self, which: DeclaredWidth) -> u8 {
        match which {
            DeclaredWidth::Temperature => self.temperature,
            DeclaredWidth::TemperatureIndex => self.temperature_index,
            DeclaredWidth::MonthDelta => self.month_delta,
            DeclaredWidth::BinIndex => self.bin_index,
        }
    }

    /// Width of `field` under these declarations.
    pub fn resolve(&self, field: &Field) -> u8 {
        match field.width {
            Width::Fixed(bits) => bits,
            Width::Declared(which) => self.get(which),
        }
    }

    /// Check that every width can be read with the bit cursor.
    pub fn validate(&self) -> Result<()> {
        if self.temperature == 0 || self.temperature > MAX_FIELD_BITS {
            return Err(ClimarcError::invalid_bit_width(
                "bc_temperature",
                self.temperature,
            ));
        }
        for (name, width) in [
            ("bc_temperature_index", self.temperature_index),
            ("bc_month_delta", self.month_delta),
            ("bc_bin_index", self.bin_index),
        ] {
            if width > MAX_FIELD_BITS {
                return Err(ClimarcError::invalid_bit_width(name, width));
            }
        }
        Ok(())
    }
}

/// Total bits of one record.
pub fn record_bits(fields: &[Field], widths: &BitWidths) -> u64 {
    fields.iter().map(|f| widths.resolve(f) as u64).sum()
}

/// Read one record as raw field values.
///
/// Float fields come back as their bit patterns; see [`as_f32`].
pub fn read_record<const N: usize>(
    cursor: &mut BitCursor<'_>,
    fields: &[Field; N],
    widths: &BitWidths,
) -> Result<[u32; N]> {
    let mut values = [0u32; N];
    for (value, field) in values.iter_mut().zip(fields) {
        *value = cursor.read_bits(widths.resolve(field))?;
    }
    Ok(values)
}

/// Write one record.
///
/// Fails with `InvalidBitWidth` when a value does not fit its field.
pub fn write_record<const N: usize>(
    writer: &mut BitWriter,
    fields: &[Field; N],
    widths: &BitWidths,
    values: &[u32; N],
) -> Result<()> {
    for (&value, field) in values.iter().zip(fields) {
        let bits = widths.resolve(field);
        if bits < 32 && (value >> bits) != 0 {
            return Err(ClimarcError::invalid_bit_width(field.name, bits));
        }
        writer.write_bits(value, bits);
    }
    Ok(())
}

/// Interpret raw field bits as a float.
#[inline]
pub fn as_f32(bits: u32) -> f32 {
    f32::from_bits(bits)
}
