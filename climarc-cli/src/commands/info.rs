//! Info command implementation.

use super::{GlobalOptions, dataset_bytes};
use crate::utils::{format_count, format_size};
use climarc::{DatasetHeader, StreamProperties};
use climarc_dataset::{encoded_len, parse_header};
use climarc_lzma::read_properties;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct StreamJson {
    lc: u32,
    lp: u32,
    pb: u32,
    dictionary_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    uncompressed_size: Option<u64>,
}

impl From<&StreamProperties> for StreamJson {
    fn from(props: &StreamProperties) -> Self {
        Self {
            lc: props.lc,
            lp: props.lp,
            pb: props.pb,
            dictionary_size: props.dictionary_size,
            uncompressed_size: props.uncompressed_size,
        }
    }
}

#[derive(Debug, Serialize)]
struct HeaderJson {
    count_temperatures: u32,
    count_locations: u32,
    count_bins: u32,
    first_month: String,
    last_month: String,
    months: u32,
    min_temperature: f32,
    max_temperature: f32,
    quantization_step: f32,
    bits_temperature: u8,
    bits_temperature_index: u8,
    bits_month_delta: u8,
    bits_bin_index: u8,
}

impl From<&DatasetHeader> for HeaderJson {
    fn from(header: &DatasetHeader) -> Self {
        Self {
            count_temperatures: header.count_temperatures,
            count_locations: header.count_locations,
            count_bins: header.count_bins,
            first_month: header.dates.first.to_string(),
            last_month: header.dates.last.to_string(),
            months: header.dates.month_span(),
            min_temperature: header.temperatures.min,
            max_temperature: header.temperatures.max,
            quantization_step: header.temperatures.max_error(header.widths.temperature),
            bits_temperature: header.widths.temperature,
            bits_temperature_index: header.widths.temperature_index,
            bits_month_delta: header.widths.month_delta,
            bits_bin_index: header.widths.bin_index,
        }
    }
}

#[derive(Debug, Serialize)]
struct InfoJson {
    file: String,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<StreamJson>,
    decompressed_size: u64,
    dataset: HeaderJson,
}

pub fn cmd_info(
    file: &Path,
    json: bool,
    options: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(file)?;
    let size = data.len() as u64;
    let stream = if options.raw {
        None
    } else {
        Some(read_properties(&data, options.header_layout.into())?)
    };

    let raw = dataset_bytes(data, options)?;
    let header = parse_header(&raw)?;

    if json {
        let output = InfoJson {
            file: file.display().to_string(),
            size,
            stream: stream.as_ref().map(StreamJson::from),
            decompressed_size: raw.len() as u64,
            dataset: HeaderJson::from(&header),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Archive Information");
    println!("===================");
    println!("File: {}", file.display());
    println!("Size: {} ({} bytes)", format_size(size), size);

    if let Some(props) = &stream {
        println!();
        println!("LZMA Stream:");
        println!("  lc/lp/pb: {}/{}/{}", props.lc, props.lp, props.pb);
        println!(
            "  Dictionary size: {}",
            format_size(props.dictionary_size as u64)
        );
        match props.uncompressed_size {
            Some(declared) => println!("  Declared size: {declared} bytes"),
            None => println!("  Declared size: unknown (end marker)"),
        }
        println!("  Decompressed size: {} bytes", raw.len());
    }

    let widths = &header.widths;
    println!();
    println!("Dataset (CCE v{}):", climarc_dataset::VERSION);
    println!(
        "  Temperatures: {}",
        format_count(header.count_temperatures as u64)
    );
    println!("  Locations: {}", format_count(header.count_locations as u64));
    println!("  Lookup bins: {}", format_count(header.count_bins as u64));
    println!(
        "  Months: {} to {} ({} months)",
        header.dates.first,
        header.dates.last,
        header.dates.month_span()
    );
    println!(
        "  Temperature range: {:.3} to {:.3} (step {:.4})",
        header.temperatures.min,
        header.temperatures.max,
        header.temperatures.max_error(widths.temperature)
    );
    println!(
        "  Bit widths: temperature={}, temperature_index={}, month_delta={}, bin_index={}",
        widths.temperature, widths.temperature_index, widths.month_delta, widths.bin_index
    );

    let expected = encoded_len(&header);
    if expected != raw.len() as u64 {
        println!(
            "  Note: records need {expected} bytes, dataset holds {}",
            raw.len()
        );
    }

    Ok(())
}
