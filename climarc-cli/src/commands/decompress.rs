//! Decompress command implementation.

use super::{GlobalOptions, dataset_bytes};
use crate::utils::format_size;
use std::path::Path;

pub fn cmd_decompress(
    file: &Path,
    output: &Path,
    options: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.raw {
        return Err("--raw input is already decompressed".into());
    }

    let data = std::fs::read(file)?;
    let size = data.len() as u64;
    let raw = dataset_bytes(data, options)?;
    std::fs::write(output, &raw)?;

    if !options.quiet {
        println!(
            "{} ({}) -> {} ({})",
            file.display(),
            format_size(size),
            output.display(),
            format_size(raw.len() as u64)
        );
    }
    Ok(())
}
