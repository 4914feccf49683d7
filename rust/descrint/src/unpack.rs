//! Unpack batch engine.
//!
//! Both sides are unpacked once into one byte per code. A stays row-major; B
//! is regrouped into panels of [`PANEL_WIDTH`] vectors with their codes
//! interleaved in groups of [`PANEL_STEP`], so the micro kernel streams a
//! panel with plain contiguous loads. The macro loop walks blocks of A rows
//! sized to `macro_block_bytes` against every panel.
//!
//! A gets no panel layout: the micro kernel broadcasts [`PANEL_STEP`] codes
//! of each A row at a time, and those are already contiguous in a row-major
//! buffer.
//!
//! The dimension is walked in spans of at most [`PANEL_CHUNK`] codes; each
//! span's 32-bit correlations are widened into 64-bit totals.
//!
//! The vectorized micro kernel multiplies codes as signed bytes, so this
//! engine only serves depths 4 to 7.

use crate::backend::{MICRO_ROWS, PANEL_CHUNK, PANEL_STEP, PANEL_WIDTH};
use crate::codec::Codec;
use crate::descriptor::DescrHeader;
use crate::pairwise;

/// B regrouped into panels.
pub(crate) struct Panels {
    dim: usize,
    data: Vec<u8>,
    headers: Vec<DescrHeader>,
}

impl Panels {
    /// Unpacks and interleaves `b`. A trailing partial panel is padded with
    /// copies of the last vector.
    pub(crate) fn new(codec: &Codec, b: &[&[u8]]) -> Self {
        let dim = codec.dim();
        let count = b.len().div_ceil(PANEL_WIDTH);
        let mut data = vec![0u8; count * PANEL_WIDTH * dim];
        let mut codes = vec![0u8; dim];
        for (p, panel) in data.chunks_exact_mut(PANEL_WIDTH * dim).enumerate() {
            for j in 0..PANEL_WIDTH {
                let source = (p * PANEL_WIDTH + j).min(b.len() - 1);
                codec.unpack_codes(b[source], &mut codes);
                for (g, group) in codes.chunks_exact(PANEL_STEP).enumerate() {
                    let at = (g * PANEL_WIDTH + j) * PANEL_STEP;
                    panel[at..at + PANEL_STEP].copy_from_slice(group);
                }
            }
        }
        Self {
            dim,
            data,
            headers: b.iter().map(|descr| DescrHeader::read(descr)).collect(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.data.len() / (PANEL_WIDTH * self.dim)
    }

    pub(crate) fn panel(&self, p: usize) -> &[u8] {
        let size = PANEL_WIDTH * self.dim;
        &self.data[p * size..(p + 1) * size]
    }

    pub(crate) fn header(&self, j: usize) -> &DescrHeader {
        &self.headers[j]
    }
}

/// Rows of A per macro block: as many as fit in `budget` bytes, at least one
/// micro tile, rounded down to whole micro tiles.
pub(crate) fn macro_rows(budget: usize, dim: usize) -> usize {
    let rows = (budget / dim.max(1)).max(MICRO_ROWS);
    rows - rows % MICRO_ROWS
}

/// Fills the row-major `a.len() x b.len()` matrix `distances`.
pub(crate) fn cosine_distances(
    codec: &Codec,
    macro_block_bytes: usize,
    a: &[&[u8]],
    b: &[&[u8]],
    distances: &mut [f32],
) {
    debug_assert!(codec.depth() < 8);
    let (m, n) = (a.len(), b.len());
    debug_assert!(distances.len() >= m * n);
    if m == 0 || n == 0 {
        return;
    }
    let dim = codec.dim();
    let kernel = codec.kernel();

    let mut a_codes = vec![0u8; m * dim];
    for (descr, row) in a.iter().zip(a_codes.chunks_exact_mut(dim)) {
        codec.unpack_codes(descr, row);
    }
    let a_headers: Vec<DescrHeader> = a.iter().map(|descr| DescrHeader::read(descr)).collect();
    let panels = Panels::new(codec, b);

    let block_rows = macro_rows(macro_block_bytes, dim);
    let span = PANEL_CHUNK.min(dim);
    let mut partial = [[0u32; PANEL_WIDTH]; MICRO_ROWS];
    let mut sums = [[0u64; PANEL_WIDTH]; MICRO_ROWS];
    for i0 in (0..m).step_by(block_rows) {
        let i1 = m.min(i0 + block_rows);
        for p in 0..panels.count() {
            let panel = panels.panel(p);
            let j0 = p * PANEL_WIDTH;
            let cols = PANEL_WIDTH.min(n - j0);
            for i in (i0..i1).step_by(MICRO_ROWS) {
                let count = MICRO_ROWS.min(i1 - i);
                let sums = &mut sums[..count];
                sums.iter_mut().for_each(|row| *row = [0; PANEL_WIDTH]);
                for k0 in (0..dim).step_by(span) {
                    let k1 = dim.min(k0 + span);
                    let rows: [&[u8]; MICRO_ROWS] = std::array::from_fn(|r| {
                        if r < count {
                            &a_codes[(i + r) * dim + k0..(i + r) * dim + k1]
                        } else {
                            Default::default()
                        }
                    });
                    kernel.panel_correlation(
                        &rows[..count],
                        &panel[k0 * PANEL_WIDTH..k1 * PANEL_WIDTH],
                        &mut partial[..count],
                    );
                    for (total, part) in sums.iter_mut().zip(&partial[..count]) {
                        for (t, &v) in total.iter_mut().zip(part) {
                            *t += u64::from(v);
                        }
                    }
                }
                for (r, row_sums) in sums.iter().enumerate() {
                    let line = &mut distances[(i + r) * n + j0..(i + r) * n + j0 + cols];
                    for (c, cell) in line.iter_mut().enumerate() {
                        *cell = pairwise::distance(
                            row_sums[c] as f32,
                            &a_headers[i + r],
                            panels.header(j0 + c),
                        );
                    }
                }
            }
        }
    }
}
