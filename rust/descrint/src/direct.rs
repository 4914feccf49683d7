//! Direct batch engine.
//!
//! Walks the output matrix in 2x4 tiles (1x4 for a trailing odd row). Inside
//! a tile every descriptor is unpacked once per block of codes and reused for
//! all the cells it touches. Columns past the last full tile fall back to the
//! pairwise kernel. At depth 8 the payload already holds one code per byte and
//! is read in place.

use std::array;

use crate::codec::{Codec, BLOCK};
use crate::descriptor::{DescrHeader, HEADER_SIZE};
use crate::pairwise;

const TILE_ROWS: usize = 2;
const TILE_COLS: usize = 4;

/// Fills the row-major `a.len() x b.len()` matrix `distances`.
pub(crate) fn cosine_distances(codec: &Codec, a: &[&[u8]], b: &[&[u8]], distances: &mut [f32]) {
    let (m, n) = (a.len(), b.len());
    debug_assert!(distances.len() >= m * n);
    let full_rows = m - m % TILE_ROWS;
    let full_cols = n - n % TILE_COLS;

    for i in (0..full_rows).step_by(TILE_ROWS) {
        for j in (0..full_cols).step_by(TILE_COLS) {
            tile::<TILE_ROWS, TILE_COLS>(codec, &a[i..], &b[j..], &mut distances[i * n + j..], n);
        }
    }
    if full_rows < m {
        let i = full_rows;
        for j in (0..full_cols).step_by(TILE_COLS) {
            tile::<1, TILE_COLS>(codec, &a[i..], &b[j..], &mut distances[i * n + j..], n);
        }
    }
    for (i, descr) in a.iter().enumerate() {
        for j in full_cols..n {
            distances[i * n + j] = pairwise::cosine_distance(codec, descr, b[j]);
        }
    }
}

/// Computes the `R x C` block of distances between `rows[..R]` and `cols[..C]`,
/// writing it at the start of `out` with row stride `stride`.
fn tile<const R: usize, const C: usize>(
    codec: &Codec,
    rows: &[&[u8]],
    cols: &[&[u8]],
    out: &mut [f32],
    stride: usize,
) {
    let sums = if codec.depth() == 8 {
        correlate_in_place::<R, C>(codec, rows, cols)
    } else {
        correlate_unpacked::<R, C>(codec, rows, cols)
    };
    let col_headers: [DescrHeader; C] = array::from_fn(|c| DescrHeader::read(cols[c]));
    for r in 0..R {
        let row_header = DescrHeader::read(rows[r]);
        let line = &mut out[r * stride..r * stride + C];
        for c in 0..C {
            line[c] = pairwise::distance(sums[r][c] as f32, &row_header, &col_headers[c]);
        }
    }
}

fn accumulate<const R: usize, const C: usize>(
    codec: &Codec,
    a: &[&[u8]; R],
    b: &[&[u8]; C],
    sums: &mut [[u64; C]; R],
) {
    let kernel = codec.kernel();
    for r in 0..R {
        for c in 0..C {
            sums[r][c] += u64::from(kernel.dot_u8(a[r], b[c]));
        }
    }
}

fn correlate_in_place<const R: usize, const C: usize>(
    codec: &Codec,
    rows: &[&[u8]],
    cols: &[&[u8]],
) -> [[u64; C]; R] {
    let dim = codec.dim();
    let mut sums = [[0u64; C]; R];
    for start in (0..dim).step_by(BLOCK) {
        let range = HEADER_SIZE + start..HEADER_SIZE + dim.min(start + BLOCK);
        let a: [&[u8]; R] = array::from_fn(|r| &rows[r][range.clone()]);
        let b: [&[u8]; C] = array::from_fn(|c| &cols[c][range.clone()]);
        accumulate(codec, &a, &b, &mut sums);
    }
    sums
}

fn correlate_unpacked<const R: usize, const C: usize>(
    codec: &Codec,
    rows: &[&[u8]],
    cols: &[&[u8]],
) -> [[u64; C]; R] {
    let dim = codec.dim();
    let packing = codec.packing();
    let mut sums = [[0u64; C]; R];
    let mut a_codes = [[0u8; BLOCK]; R];
    let mut b_codes = [[0u8; BLOCK]; C];
    for start in (0..dim).step_by(BLOCK) {
        let len = BLOCK.min(dim - start);
        for (buf, descr) in a_codes.iter_mut().zip(rows) {
            packing.unpack_at(&descr[HEADER_SIZE..], start, &mut buf[..len]);
        }
        for (buf, descr) in b_codes.iter_mut().zip(cols) {
            packing.unpack_at(&descr[HEADER_SIZE..], start, &mut buf[..len]);
        }
        let a: [&[u8]; R] = array::from_fn(|r| &a_codes[r][..len]);
        let b: [&[u8]; C] = array::from_fn(|c| &b_codes[c][..len]);
        accumulate(codec, &a, &b, &mut sums);
    }
    sums
}
