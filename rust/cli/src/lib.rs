pub mod commands;
pub mod config;
pub mod error;
pub mod fvecs;

use std::io;

use clap::{Parser, Subcommand};

use crate::commands::decode::{decode, DecodeArgs};
use crate::commands::distances::{distances, DistancesArgs};
use crate::commands::encode::{encode, EncodeArgs};
use crate::commands::info::{info, InfoArgs};
use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Subcommand, Debug)]
enum Command {
    /// Quantize float vectors into descriptors
    Encode(EncodeArgs),
    /// Reconstruct float vectors from descriptors
    Decode(DecodeArgs),
    /// Cosine distance matrix between two descriptor sets
    Distances(DistancesArgs),
    /// Show engine parameters and the selected batch strategy
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
#[command(name = "descrint")]
#[command(version = "0.1.0")]
#[command(about = "Quantized descriptor codec and cosine distance engine", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a YAML config file. Default: ./descrint.yaml")]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

pub fn descrint_cli(args: Vec<String>) -> Result<(), CliError> {
    let cli = Cli::parse_from(args);

    let config = match &cli.config {
        Some(path) if !std::path::Path::new(path).exists() => {
            return Err(CliError::FileNotFound(path.clone()));
        }
        Some(path) => CliConfig::load_from_path(path)?,
        None => CliConfig::load()?,
    };
    descrint_tracing::init_stdout_tracing(&config.log_filters);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Encode(args) => encode(&mut out, &config, args),
        Command::Decode(args) => decode(&mut out, &config, args),
        Command::Distances(args) => distances(&mut out, &config, args),
        Command::Info(args) => info(&mut out, &config, args),
    }
}
