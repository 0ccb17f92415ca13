//! Command implementations for the climarc CLI.

pub mod decompress;
pub mod dump;
pub mod info;
pub mod verify;

pub use decompress::cmd_decompress;
pub use dump::{DumpOptions, cmd_dump};
pub use info::cmd_info;
pub use verify::cmd_verify;

use crate::utils::create_spinner;
use clap::{Args, ValueEnum};
use climarc::config::{DEFAULT_MAX_DICTIONARY_SIZE, DEFAULT_MAX_OUTPUT_SIZE};
use climarc::{HeaderLayout, LoadConfig};

/// Header layout of the input archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LayoutArg {
    /// 13-byte `.lzma` header with the uncompressed size
    #[default]
    Alone,
    /// 5-byte header: properties and dictionary size only
    PropertiesOnly,
}

impl From<LayoutArg> for HeaderLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Alone => HeaderLayout::Alone,
            LayoutArg::PropertiesOnly => HeaderLayout::PropertiesOnly,
        }
    }
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Input is an already decompressed CCE dataset
    #[arg(long, global = true)]
    pub raw: bool,

    /// Header layout of the LZMA stream
    #[arg(long, global = true, value_enum, default_value = "alone")]
    pub header_layout: LayoutArg,

    /// Uncompressed size, for headers that do not declare one
    #[arg(long, global = true)]
    pub expected_size: Option<u64>,

    /// Largest decompressed size accepted, in bytes
    #[arg(long, global = true, env = "CLIMARC_MAX_OUTPUT", default_value_t = DEFAULT_MAX_OUTPUT_SIZE)]
    pub max_output: u64,

    /// Largest LZMA dictionary accepted, in bytes
    #[arg(long, global = true, env = "CLIMARC_MAX_DICTIONARY", default_value_t = DEFAULT_MAX_DICTIONARY_SIZE)]
    pub max_dictionary: u32,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "climarc_lzma=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Hide progress spinners
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalOptions {
    /// Load configuration built from the flags.
    pub fn config(&self) -> LoadConfig {
        LoadConfig::new()
            .with_header_layout(self.header_layout.into())
            .with_expected_size(self.expected_size)
            .with_max_dictionary_size(self.max_dictionary)
            .with_max_output_size(self.max_output)
    }
}

/// Decompress input bytes unless `--raw` is given.
pub fn dataset_bytes(
    data: Vec<u8>,
    options: &GlobalOptions,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if options.raw {
        return Ok(data);
    }

    let spinner = create_spinner("Decompressing", !options.quiet);
    let result = climarc::decompress(&data, &options.config());
    spinner.finish_and_clear();
    Ok(result?)
}
