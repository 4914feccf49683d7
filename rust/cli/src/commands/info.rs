use std::io::Write;

use clap::Parser;

use super::engine_for;
use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[clap(long, help = "Descriptor dimension. Default: from config")]
    dim: Option<usize>,
    #[clap(long, help = "Bits per component (4 to 8). Default: from config")]
    depth: Option<usize>,
    #[clap(long, requires = "n", help = "Rows of a batch to report the strategy for")]
    m: Option<usize>,
    #[clap(long, requires = "m", help = "Columns of a batch to report the strategy for")]
    n: Option<usize>,
}

pub fn info<W: Write>(out: &mut W, config: &CliConfig, args: InfoArgs) -> Result<(), CliError> {
    let engine = engine_for(&config.engine, args.dim, args.depth)?;
    writeln!(out, "dimension:     {}", engine.dimension())?;
    writeln!(out, "depth:         {}", engine.depth())?;
    writeln!(out, "encoded size:  {} bytes", engine.encoded_size())?;
    writeln!(out, "backend:       {}", engine.backend())?;
    writeln!(out, "cpu supports:  {}", descrint::backend::detect())?;
    if let (Some(m), Some(n)) = (args.m, args.n) {
        writeln!(out, "strategy:      {} ({m}x{n})", engine.batch_strategy(m, n))?;
    }
    Ok(())
}
