//! Dump command implementation.

use super::{GlobalOptions, dataset_bytes};
use crate::utils::format_count;
use climarc::{Dataset, parse};
use serde::Serialize;
use std::path::Path;

/// JSON row for one location.
#[derive(Debug, Serialize)]
struct LocationJson {
    index: usize,
    latitude: f32,
    longitude: f32,
    bins: usize,
    samples: usize,
}

/// JSON row for one sample.
#[derive(Debug, Serialize)]
struct SampleJson {
    month: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct LocationSamplesJson {
    location: LocationJson,
    samples: Vec<SampleJson>,
}

/// Options for dumping dataset records.
pub struct DumpOptions {
    /// Location whose samples are printed.
    pub location: Option<usize>,
    /// Pick the location closest to these coordinates instead.
    pub near: Option<(f32, f32)>,
    /// Maximum number of rows; 0 prints all.
    pub limit: usize,
    /// Print JSON.
    pub json: bool,
}

fn location_row(dataset: &Dataset, index: usize) -> Option<LocationJson> {
    let location = dataset.locations.get(index)?;
    Some(LocationJson {
        index,
        latitude: location.latitude,
        longitude: location.longitude,
        bins: dataset.location_bins(index)?.len(),
        samples: dataset.sample_count(index)?,
    })
}

pub fn cmd_dump(
    file: &Path,
    dump: &DumpOptions,
    options: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = dataset_bytes(std::fs::read(file)?, options)?;
    let dataset = parse(&raw)?;
    let limit = if dump.limit == 0 { usize::MAX } else { dump.limit };

    let selected = match (dump.location, dump.near) {
        (Some(index), _) => Some(index),
        (None, Some((lat, lon))) => Some(
            dataset
                .nearest_location(lat, lon)
                .ok_or("dataset has no locations")?,
        ),
        (None, None) => None,
    };

    match selected {
        Some(index) => dump_location(&dataset, index, limit, dump.json),
        None => dump_locations(&dataset, limit, dump.json),
    }
}

fn dump_locations(
    dataset: &Dataset,
    limit: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows: Vec<LocationJson> = (0..dataset.locations.len())
        .take(limit)
        .filter_map(|i| location_row(dataset, i))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:>8} {:>10} {:>11} {:>6} {:>8}",
        "Index", "Latitude", "Longitude", "Bins", "Samples"
    );
    println!("{}", "-".repeat(47));
    for row in &rows {
        println!(
            "{:>8} {:>10.4} {:>11.4} {:>6} {:>8}",
            row.index, row.latitude, row.longitude, row.bins, row.samples
        );
    }
    println!("{}", "-".repeat(47));
    println!(
        "{} of {} locations, {} samples",
        rows.len(),
        format_count(dataset.locations.len() as u64),
        format_count(dataset.temperatures.len() as u64)
    );
    Ok(())
}

fn dump_location(
    dataset: &Dataset,
    index: usize,
    limit: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let location = location_row(dataset, index).ok_or_else(|| {
        format!(
            "location {index} out of range ({} locations)",
            dataset.locations.len()
        )
    })?;
    let samples: Vec<SampleJson> = dataset
        .samples_for_location(index)
        .into_iter()
        .flatten()
        .take(limit)
        .map(|(month, temperature)| SampleJson {
            month: month.to_string(),
            temperature,
        })
        .collect();

    if json {
        let output = LocationSamplesJson { location, samples };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Location {} ({:.4}, {:.4}): {} samples in {} bins",
        location.index, location.latitude, location.longitude, location.samples, location.bins
    );
    println!();
    for sample in &samples {
        println!("  {}  {:>8.3}", sample.month, sample.temperature);
    }
    if samples.len() < location.samples {
        println!("  ... {} more", location.samples - samples.len());
    }
    Ok(())
}
