use std::io::Write;

use clap::Parser;
use descrint::f16;

use super::engine_for;
use crate::config::CliConfig;
use crate::error::CliError;
use crate::fvecs::{read_fvecs, write_bytes};

#[derive(Parser, Debug)]
pub struct EncodeArgs {
    #[clap(long, help = "Input vectors in .fvecs format")]
    input: String,
    #[clap(long, help = "Output file for the encoded descriptors")]
    output: String,
    #[clap(long, help = "Bits per component (4 to 8). Default: from config")]
    depth: Option<usize>,
    #[clap(long, help = "Round the input through float16 and encode from half precision")]
    half: bool,
}

pub fn encode<W: Write>(out: &mut W, config: &CliConfig, args: EncodeArgs) -> Result<(), CliError> {
    let (dim, data) = read_fvecs(&args.input)?;
    let engine = engine_for(&config.engine, Some(dim), args.depth)?;
    let count = data.len() / dim;
    let mut encoded = vec![0u8; count * engine.encoded_size()];

    if args.half {
        let mut half = vec![f16::ZERO; dim];
        for (x, dst) in data
            .chunks_exact(dim)
            .zip(encoded.chunks_exact_mut(engine.encoded_size()))
        {
            for (h, &v) in half.iter_mut().zip(x) {
                *h = f16::from_f32(v);
            }
            engine.encode16f(&half, dst);
        }
    } else {
        engine.encode32f_batch(&data, &mut encoded);
    }

    write_bytes(&args.output, &encoded)?;
    tracing::info!(count, dim, depth = engine.depth(), output = %args.output, "Encoded descriptors");
    writeln!(
        out,
        "Encoded {count} descriptors ({dim}d, {} bits, {} bytes each) to {}",
        engine.depth(),
        engine.encoded_size(),
        args.output
    )?;
    Ok(())
}
