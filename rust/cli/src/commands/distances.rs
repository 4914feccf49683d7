use std::io::Write;

use clap::Parser;
use descrint::Engine;
use rayon::prelude::*;

use super::engine_for;
use crate::config::CliConfig;
use crate::error::CliError;
use crate::fvecs::{read_codes, write_bytes};

/// Row blocks handed out per worker thread.
const TASKS_PER_THREAD: usize = 4;

#[derive(Parser, Debug)]
pub struct DistancesArgs {
    #[clap(long, help = "Encoded descriptors for the rows of the matrix")]
    a: String,
    #[clap(long, help = "Encoded descriptors for the columns of the matrix")]
    b: String,
    #[clap(long, help = "Descriptor dimension. Default: from config")]
    dim: Option<usize>,
    #[clap(long, help = "Bits per component (4 to 8). Default: from config")]
    depth: Option<usize>,
    #[clap(long, help = "Write the row-major matrix as little-endian f32 instead of printing it")]
    output: Option<String>,
    #[clap(long, help = "Worker threads. Default: one per core")]
    threads: Option<usize>,
}

/// Computes the full matrix, splitting the rows of `a` across the pool.
pub(crate) fn parallel_distances(
    engine: &Engine,
    pool: &rayon::ThreadPool,
    a: &[u8],
    b: &[u8],
) -> Vec<f32> {
    let size = engine.encoded_size();
    let (m, n) = (a.len() / size, b.len() / size);
    let mut distances = vec![0f32; m * n];
    if m == 0 || n == 0 {
        return distances;
    }
    let tasks = pool.current_num_threads() * TASKS_PER_THREAD;
    let rows = m.div_ceil(tasks).max(1);
    pool.install(|| {
        distances
            .par_chunks_mut(rows * n)
            .zip(a.par_chunks(rows * size))
            .for_each(|(out, a_rows)| engine.cosine_distances_mxn_p(a_rows, b, out));
    });
    distances
}

pub fn distances<W: Write>(
    out: &mut W,
    config: &CliConfig,
    args: DistancesArgs,
) -> Result<(), CliError> {
    let engine = engine_for(&config.engine, args.dim, args.depth)?;
    let a = read_codes(&args.a, engine.encoded_size())?;
    let b = read_codes(&args.b, engine.encoded_size())?;
    let (m, n) = (a.len() / engine.encoded_size(), b.len() / engine.encoded_size());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.unwrap_or(0))
        .build()?;
    tracing::info!(
        m,
        n,
        threads = pool.current_num_threads(),
        strategy = %engine.batch_strategy(m, n),
        "Computing distance matrix"
    );
    let matrix = parallel_distances(&engine, &pool, &a, &b);

    match &args.output {
        Some(path) => {
            let bytes: Vec<u8> = matrix.iter().flat_map(|d| d.to_le_bytes()).collect();
            write_bytes(path, &bytes)?;
            writeln!(out, "Wrote {m}x{n} distances to {path}")?;
        }
        None => {
            for row in matrix.chunks(n.max(1)) {
                let line: Vec<String> = row.iter().map(|d| format!("{d:.6}")).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
    }
    Ok(())
}
