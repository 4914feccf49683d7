//! AVX2 kernel.
//!
//! Every entry point checks slice lengths before touching raw pointers, and
//! the kernel itself is only handed out once the CPU reported `avx2`.

use std::arch::x86_64::*;

use super::{detect, BackendKind, Kernel, MICRO_ROWS, PANEL_CHUNK, PANEL_STEP, PANEL_WIDTH};
use crate::backend::scalar::quantize_one;

#[derive(Debug)]
pub struct Avx2Kernel {
    _probed: (),
}

static KERNEL: Avx2Kernel = Avx2Kernel { _probed: () };

impl Avx2Kernel {
    /// The kernel, if this CPU supports AVX2.
    pub fn get() -> Option<&'static Avx2Kernel> {
        (detect() == BackendKind::Avx2).then_some(&KERNEL)
    }
}

impl Kernel for Avx2Kernel {
    fn kind(&self) -> BackendKind {
        BackendKind::Avx2
    }

    fn min_max(&self, src: &[f32]) -> (f32, f32) {
        // SAFETY: `Avx2Kernel` exists only after AVX2 was detected.
        unsafe { min_max(src) }
    }

    fn quantize(
        &self,
        src: &[f32],
        scale: f32,
        min: f32,
        max_code: u8,
        dst: &mut [u8],
    ) -> (u64, u64) {
        assert!(dst.len() >= src.len());
        // SAFETY: AVX2 detected, lengths checked above.
        unsafe { quantize(src, scale, min, max_code, dst) }
    }

    fn dequantize(&self, codes: &[u8], scale: f32, shift: f32, dst: &mut [f32]) {
        assert!(dst.len() >= codes.len());
        // SAFETY: AVX2 detected, lengths checked above.
        unsafe { dequantize(codes, scale, shift, dst) }
    }

    fn dot_u8(&self, a: &[u8], b: &[u8]) -> u32 {
        assert_eq!(a.len(), b.len());
        // SAFETY: AVX2 detected, lengths checked above.
        unsafe { dot_u8(a, b) }
    }

    fn panel_correlation(&self, rows: &[&[u8]], panel: &[u8], out: &mut [[u32; PANEL_WIDTH]]) {
        assert!(rows.len() <= MICRO_ROWS && out.len() >= rows.len());
        let Some(first) = rows.first() else {
            return;
        };
        let dim = first.len();
        assert!(dim % PANEL_STEP == 0 && dim <= PANEL_CHUNK && panel.len() >= dim * PANEL_WIDTH);
        assert!(rows.iter().all(|row| row.len() == dim));
        // SAFETY: AVX2 detected, shapes checked above.
        unsafe { panel_correlation(rows, dim, panel, out) }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn hsum_epi32(v: __m256i) -> u32 {
    let lo = _mm256_castsi256_si128(v);
    let hi = _mm256_extracti128_si256(v, 1);
    let s = _mm_add_epi32(lo, hi);
    let s = _mm_add_epi32(s, _mm_shuffle_epi32(s, 0x4E));
    let s = _mm_add_epi32(s, _mm_shuffle_epi32(s, 0xB1));
    _mm_cvtsi128_si32(s) as u32
}

#[target_feature(enable = "avx2")]
unsafe fn min_max(src: &[f32]) -> (f32, f32) {
    let mut lo = _mm256_set1_ps(f32::MAX);
    let mut hi = _mm256_set1_ps(-f32::MAX);
    let chunks = src.chunks_exact(8);
    let tail = chunks.remainder();
    for chunk in chunks {
        let v = _mm256_loadu_ps(chunk.as_ptr());
        // With a NaN in `v` the second operand is returned.
        lo = _mm256_min_ps(v, lo);
        hi = _mm256_max_ps(v, hi);
    }
    let mut lanes_lo = [0f32; 8];
    let mut lanes_hi = [0f32; 8];
    _mm256_storeu_ps(lanes_lo.as_mut_ptr(), lo);
    _mm256_storeu_ps(lanes_hi.as_mut_ptr(), hi);
    let init = (
        lanes_lo.iter().copied().fold(f32::MAX, f32::min),
        lanes_hi.iter().copied().fold(-f32::MAX, f32::max),
    );
    tail.iter()
        .fold(init, |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

#[target_feature(enable = "avx2")]
unsafe fn quantize(src: &[f32], scale: f32, min: f32, max_code: u8, dst: &mut [u8]) -> (u64, u64) {
    let scale8 = _mm256_set1_ps(scale);
    let min8 = _mm256_set1_ps(min);
    let zero = _mm256_setzero_si256();
    let floor = _mm256_setzero_ps();
    let top = _mm256_set1_ps(f32::from(max_code));
    let mut sum8 = _mm256_setzero_si256();
    let mut sqsum8 = _mm256_setzero_si256();
    let mut sum = 0u64;
    let mut sqsum = 0u64;
    let mut lanes = [0i32; 8];

    let chunks = src.chunks_exact(8);
    let tail = chunks.remainder();
    for (i, chunk) in chunks.enumerate() {
        let x = _mm256_loadu_ps(chunk.as_ptr());
        let v = _mm256_mul_ps(_mm256_sub_ps(x, min8), scale8);
        // Clamp before converting: infinities saturate and NaN takes the
        // second operand of `max_ps`, i.e. 0. Conversion rounds to nearest even.
        let v = _mm256_min_ps(_mm256_max_ps(v, floor), top);
        let v = _mm256_cvtps_epi32(v);
        sum8 = _mm256_add_epi32(sum8, v);
        sqsum8 = _mm256_add_epi32(sqsum8, _mm256_madd_epi16(v, v));
        _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, v);
        for (code, &lane) in dst[i * 8..i * 8 + 8].iter_mut().zip(&lanes) {
            *code = lane as u8;
        }
        // Flush before 32-bit lanes can overflow.
        if i % 1024 == 1023 {
            sum += u64::from(hsum_epi32(sum8));
            sqsum += u64::from(hsum_epi32(sqsum8));
            sum8 = zero;
            sqsum8 = zero;
        }
    }
    sum += u64::from(hsum_epi32(sum8));
    sqsum += u64::from(hsum_epi32(sqsum8));

    let done = src.len() - tail.len();
    for (&x, code) in tail.iter().zip(dst[done..].iter_mut()) {
        *code = quantize_one(x, scale, min, max_code);
        let c = u64::from(*code);
        sum += c;
        sqsum += c * c;
    }
    (sum, sqsum)
}

#[target_feature(enable = "avx2")]
unsafe fn dequantize(codes: &[u8], scale: f32, shift: f32, dst: &mut [f32]) {
    let scale8 = _mm256_set1_ps(scale);
    let shift8 = _mm256_set1_ps(shift);
    let chunks = codes.chunks_exact(8);
    let tail = chunks.remainder();
    for (i, chunk) in chunks.enumerate() {
        let c = _mm_loadl_epi64(chunk.as_ptr() as *const __m128i);
        let x = _mm256_cvtepi32_ps(_mm256_cvtepu8_epi32(c));
        // Separate multiply and add keep results identical to the scalar kernel.
        let x = _mm256_add_ps(_mm256_mul_ps(x, scale8), shift8);
        _mm256_storeu_ps(dst[i * 8..].as_mut_ptr(), x);
    }
    let done = codes.len() - tail.len();
    for (&code, x) in tail.iter().zip(dst[done..].iter_mut()) {
        *x = f32::from(code) * scale + shift;
    }
}

#[target_feature(enable = "avx2")]
unsafe fn dot_u8(a: &[u8], b: &[u8]) -> u32 {
    let mut acc = _mm256_setzero_si256();
    let chunks_a = a.chunks_exact(16);
    let tail_a = chunks_a.remainder();
    let chunks_b = b.chunks_exact(16);
    let tail_b = chunks_b.remainder();
    for (ca, cb) in chunks_a.zip(chunks_b) {
        let va = _mm256_cvtepu8_epi16(_mm_loadu_si128(ca.as_ptr() as *const __m128i));
        let vb = _mm256_cvtepu8_epi16(_mm_loadu_si128(cb.as_ptr() as *const __m128i));
        acc = _mm256_add_epi32(acc, _mm256_madd_epi16(va, vb));
    }
    let tail: u32 = tail_a
        .iter()
        .zip(tail_b)
        .map(|(&x, &y)| u32::from(x) * u32::from(y))
        .sum();
    hsum_epi32(acc).wrapping_add(tail)
}

#[target_feature(enable = "avx2")]
unsafe fn panel_correlation(
    rows: &[&[u8]],
    dim: usize,
    panel: &[u8],
    out: &mut [[u32; PANEL_WIDTH]],
) {
    let ones = _mm256_set1_epi16(1);
    let mut acc = [_mm256_setzero_si256(); MICRO_ROWS];
    let count = rows.len();
    let mut k = 0;
    while k < dim {
        let b = _mm256_loadu_si256(panel.as_ptr().add(k * PANEL_WIDTH) as *const __m256i);
        for r in 0..count {
            let a = _mm256_set1_epi32(std::ptr::read_unaligned(
                rows[r].as_ptr().add(k) as *const i32
            ));
            // Row codes are the signed operand, so they must not exceed 127.
            let products = _mm256_madd_epi16(_mm256_maddubs_epi16(b, a), ones);
            acc[r] = _mm256_add_epi32(acc[r], products);
        }
        k += PANEL_STEP;
    }
    for r in 0..count {
        _mm256_storeu_si256(out[r].as_mut_ptr() as *mut __m256i, acc[r]);
    }
}
