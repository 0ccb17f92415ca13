//! Verify command implementation.

use super::GlobalOptions;
use crate::utils::{create_spinner, format_count, format_duration, format_size};
use climarc::{LoadReport, LoadedDataset, load_with_report, parse};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Serialize)]
struct VerifyJson {
    file: String,
    ok: bool,
    compressed_size: u64,
    decompressed_size: u64,
    decompress_ms: f64,
    parse_ms: f64,
    temperatures: usize,
    locations: usize,
    bins: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn cmd_verify(
    file: &Path,
    json: bool,
    options: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(file)?;

    let spinner = create_spinner("Verifying", !options.quiet && !json);
    let result = if options.raw {
        let start = Instant::now();
        parse(&data).map(|dataset| LoadedDataset {
            dataset,
            report: LoadReport {
                compressed_size: data.len() as u64,
                decompressed_size: data.len() as u64,
                parse_time: start.elapsed(),
                ..LoadReport::default()
            },
        })
    } else {
        load_with_report(&data, &options.config())
    };
    spinner.finish_and_clear();

    if json {
        let mut output = VerifyJson {
            file: file.display().to_string(),
            ok: result.is_ok(),
            compressed_size: data.len() as u64,
            decompressed_size: 0,
            decompress_ms: 0.0,
            parse_ms: 0.0,
            temperatures: 0,
            locations: 0,
            bins: 0,
            error: None,
        };
        match &result {
            Ok(loaded) => {
                let report = &loaded.report;
                output.decompressed_size = report.decompressed_size;
                output.decompress_ms = report.decompress_time.as_secs_f64() * 1e3;
                output.parse_ms = report.parse_time.as_secs_f64() * 1e3;
                output.temperatures = loaded.dataset.temperatures.len();
                output.locations = loaded.dataset.locations.len();
                output.bins = loaded.dataset.bins.len();
            }
            Err(e) => output.error = Some(format!("{} ({})", e, e.kind())),
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return match result {
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
    }

    println!("Verifying {}", file.display());
    let loaded = result?;
    let report = &loaded.report;
    let dataset = &loaded.dataset;

    if !options.raw {
        println!(
            "  LZMA Decompression [{} -> {}; {}]",
            format_size(report.compressed_size),
            format_size(report.decompressed_size),
            format_duration(report.decompress_time)
        );
    }
    println!(
        "  Read {} entries @ {} locations with {} bins [{}]",
        format_count(dataset.temperatures.len() as u64),
        format_count(dataset.locations.len() as u64),
        format_count(dataset.bins.len() as u64),
        format_duration(report.parse_time)
    );
    println!(
        "  Months {} to {}, quantization step {:.4}",
        dataset.header.dates.first,
        dataset.header.dates.last,
        dataset
            .header
            .temperatures
            .max_error(dataset.header.widths.temperature)
    );
    println!("OK");
    Ok(())
}
