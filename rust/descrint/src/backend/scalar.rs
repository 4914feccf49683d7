use super::{BackendKind, Kernel, MICRO_ROWS, PANEL_CHUNK, PANEL_STEP, PANEL_WIDTH};

/// Portable fallback, available everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarKernel;

#[inline]
pub(crate) fn quantize_one(x: f32, scale: f32, min: f32, max_code: u8) -> u8 {
    // `max` discards NaN, so a NaN component maps to code 0.
    ((x - min) * scale)
        .round_ties_even()
        .max(0.0)
        .min(f32::from(max_code)) as u8
}

impl Kernel for ScalarKernel {
    fn kind(&self) -> BackendKind {
        BackendKind::Scalar
    }

    fn min_max(&self, src: &[f32]) -> (f32, f32) {
        src.iter()
            .fold((f32::MAX, -f32::MAX), |(lo, hi), &x| (lo.min(x), hi.max(x)))
    }

    fn quantize(
        &self,
        src: &[f32],
        scale: f32,
        min: f32,
        max_code: u8,
        dst: &mut [u8],
    ) -> (u64, u64) {
        let mut sum = 0u64;
        let mut sqsum = 0u64;
        for (&x, code) in src.iter().zip(dst.iter_mut()) {
            *code = quantize_one(x, scale, min, max_code);
            let c = u64::from(*code);
            sum += c;
            sqsum += c * c;
        }
        (sum, sqsum)
    }

    fn dequantize(&self, codes: &[u8], scale: f32, shift: f32, dst: &mut [f32]) {
        for (&code, x) in codes.iter().zip(dst.iter_mut()) {
            *x = f32::from(code) * scale + shift;
        }
    }

    fn dot_u8(&self, a: &[u8], b: &[u8]) -> u32 {
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(b)
            .map(|(&x, &y)| u32::from(x) * u32::from(y))
            .sum()
    }

    fn panel_correlation(&self, rows: &[&[u8]], panel: &[u8], out: &mut [[u32; PANEL_WIDTH]]) {
        debug_assert!(rows.len() <= MICRO_ROWS);
        debug_assert!(rows.iter().all(|row| row.len() <= PANEL_CHUNK));
        for (row, acc) in rows.iter().zip(out.iter_mut()) {
            *acc = [0; PANEL_WIDTH];
            let groups = row.chunks_exact(PANEL_STEP);
            let blocks = panel.chunks_exact(PANEL_STEP * PANEL_WIDTH);
            for (a, block) in groups.zip(blocks) {
                for (sum, b) in acc.iter_mut().zip(block.chunks_exact(PANEL_STEP)) {
                    *sum += a
                        .iter()
                        .zip(b)
                        .map(|(&x, &y)| u32::from(x) * u32::from(y))
                        .sum::<u32>();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_rounds_and_clamps() {
        let src = [0.0, 0.5, 1.5, 2.5, -3.0, 100.0, f32::NAN, 7.0];
        let mut codes = [0u8; 8];
        let (sum, sqsum) = ScalarKernel.quantize(&src, 1.0, 0.0, 15, &mut codes);
        assert_eq!(codes, [0, 0, 2, 2, 0, 15, 0, 7]);
        assert_eq!(sum, 26);
        assert_eq!(sqsum, 4 + 4 + 225 + 49);
    }

    #[test]
    fn test_min_max_skips_nan() {
        let src = [3.0, f32::NAN, -1.0, 2.0];
        assert_eq!(ScalarKernel.min_max(&src), (-1.0, 3.0));
    }

    #[test]
    fn test_panel_correlation_layout() {
        let dim = 8;
        let vectors: Vec<Vec<u8>> = (0..PANEL_WIDTH)
            .map(|j| (0..dim).map(|k| (j * dim + k) as u8 % 17).collect())
            .collect();
        let mut panel = vec![0u8; dim * PANEL_WIDTH];
        for (j, v) in vectors.iter().enumerate() {
            for (k, &code) in v.iter().enumerate() {
                panel[(k / PANEL_STEP * PANEL_WIDTH + j) * PANEL_STEP + k % PANEL_STEP] = code;
            }
        }
        let row: Vec<u8> = (0..dim as u8).map(|k| k + 1).collect();
        let mut out = [[0u32; PANEL_WIDTH]; 1];
        ScalarKernel.panel_correlation(&[&row], &panel, &mut out);
        for (j, v) in vectors.iter().enumerate() {
            assert_eq!(out[0][j], ScalarKernel.dot_u8(&row, v));
        }
    }
}
