use std::io::Write;

use clap::Parser;

use super::engine_for;
use crate::config::CliConfig;
use crate::error::CliError;
use crate::fvecs::{read_codes, write_fvecs};

#[derive(Parser, Debug)]
pub struct DecodeArgs {
    #[clap(long, help = "Encoded descriptors")]
    input: String,
    #[clap(long, help = "Output vectors in .fvecs format")]
    output: String,
    #[clap(long, help = "Descriptor dimension. Default: from config")]
    dim: Option<usize>,
    #[clap(long, help = "Bits per component (4 to 8). Default: from config")]
    depth: Option<usize>,
}

pub fn decode<W: Write>(out: &mut W, config: &CliConfig, args: DecodeArgs) -> Result<(), CliError> {
    let engine = engine_for(&config.engine, args.dim, args.depth)?;
    let codes = read_codes(&args.input, engine.encoded_size())?;
    let count = codes.len() / engine.encoded_size();
    let mut decoded = vec![0f32; count * engine.decoded_size()];
    engine.decode32f_batch(&codes, &mut decoded);
    write_fvecs(&args.output, engine.decoded_size(), &decoded)?;

    tracing::info!(count, output = %args.output, "Decoded descriptors");
    writeln!(out, "Decoded {count} descriptors to {}", args.output)?;
    Ok(())
}
