//! climarc CLI - inspect, unpack and verify climate archives.
//!
//! Archives are LZMA streams wrapping a bit-packed CCE v3 dataset of monthly
//! temperatures per location.

mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::{DumpOptions, GlobalOptions, cmd_decompress, cmd_dump, cmd_info, cmd_verify};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "climarc")]
#[command(author, version, about = "Inspect and verify LZMA-compressed climate archives")]
#[command(long_about = "
climarc reads LZMA-compressed CCE v3 climate datasets.

Examples:
  climarc info temperatures.cce.lzma
  climarc info --json temperatures.cce.lzma
  climarc decompress temperatures.cce.lzma -o temperatures.cce
  climarc dump temperatures.cce.lzma --limit 20
  climarc dump temperatures.cce.lzma --location 42
  climarc dump temperatures.cce.lzma --near 52.52 13.40
  climarc verify temperatures.cce.lzma
  climarc verify --raw temperatures.cce
")]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream properties and the dataset header
    #[command(alias = "i")]
    Info {
        /// Archive to inspect
        file: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Write the decompressed dataset bytes to a file
    #[command(alias = "d")]
    Decompress {
        /// Archive to decompress
        file: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print locations, or the samples of one location
    Dump {
        /// Archive to read
        file: PathBuf,

        /// Print the samples of this location
        #[arg(short, long, conflicts_with = "near")]
        location: Option<usize>,

        /// Print the samples of the location closest to LAT LON
        #[arg(long, num_args = 2, value_names = ["LAT", "LON"], allow_negative_numbers = true)]
        near: Option<Vec<f32>>,

        /// Maximum number of rows (0 for all)
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Load the whole archive and report sizes and timings
    #[command(alias = "t")]
    Verify {
        /// Archive to verify
        file: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },
}

/// `--log-level` if it parses, otherwise `RUST_LOG`, otherwise "warn".
fn log_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn init_tracing(options: &GlobalOptions) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(options.log_level.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.options);
    let options = &cli.options;

    let result = match cli.command {
        Commands::Info { file, json } => cmd_info(&file, json, options),
        Commands::Decompress { file, output } => cmd_decompress(&file, &output, options),
        Commands::Dump {
            file,
            location,
            near,
            limit,
            json,
        } => {
            let dump = DumpOptions {
                location,
                near: near.and_then(|v| match v[..] {
                    [lat, lon] => Some((lat, lon)),
                    _ => None,
                }),
                limit,
                json,
            };
            cmd_dump(&file, &dump, options)
        }
        Commands::Verify { file, json } => cmd_verify(&file, json, options),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_info_json() {
        let cli = Cli::try_parse_from(["climarc", "info", "--json", "a.cce.lzma"]).unwrap();
        match cli.command {
            Commands::Info { file, json } => {
                assert_eq!(file, PathBuf::from("a.cce.lzma"));
                assert!(json);
            }
            _ => panic!("expected info"),
        }
        assert!(!cli.options.raw);
    }

    #[test]
    fn test_parse_dump_near_negative() {
        let cli =
            Cli::try_parse_from(["climarc", "dump", "a.cce.lzma", "--near", "-33.9", "151.2"])
                .unwrap();
        match cli.command {
            Commands::Dump {
                near, location, limit, ..
            } => {
                assert_eq!(near, Some(vec![-33.9, 151.2]));
                assert_eq!(location, None);
                assert_eq!(limit, 20);
            }
            _ => panic!("expected dump"),
        }
    }

    #[test]
    fn test_parse_dump_location_conflicts_with_near() {
        let result = Cli::try_parse_from([
            "climarc",
            "dump",
            "a.cce.lzma",
            "--location",
            "1",
            "--near",
            "1",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "climarc",
            "verify",
            "a.cce",
            "--raw",
            "--header-layout",
            "properties-only",
            "--expected-size",
            "92",
            "-q",
        ])
        .unwrap();
        assert!(cli.options.raw);
        assert!(cli.options.quiet);
        assert_eq!(cli.options.expected_size, Some(92));
        assert!(matches!(cli.command, Commands::Verify { json: false, .. }));
    }

    #[test]
    fn test_decompress_requires_output() {
        assert!(Cli::try_parse_from(["climarc", "decompress", "a.cce.lzma"]).is_err());
    }

    #[test]
    fn test_log_filter_explicit_level() {
        assert_eq!(
            log_filter(Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn test_log_filter_invalid_level_falls_back_to_warn() {
        assert_eq!(
            log_filter(Some("climarc=loud")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
    }
}
