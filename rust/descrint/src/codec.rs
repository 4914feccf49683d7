//! Affine quantization of float descriptors into `b`-bit codes.
//!
//! Encoding scans for `(min, max)`, maps every component onto
//! `round((x - min) * (2^b - 1) / (max - min))` and stores a [`DescrHeader`]
//! from which both decoding and the pairwise kernel work.

use half::f16;

use crate::backend::Kernel;
use crate::descriptor::{encoded_size, DescrHeader, HEADER_SIZE, NORM_EPS};
use crate::packing::Packing;

/// Codes processed per step; sized to keep every scratch buffer on the stack.
pub(crate) const BLOCK: usize = 64;

/// Codec bound to one `(dim, depth)` shape and one backend.
#[derive(Clone, Copy, Debug)]
pub struct Codec {
    dim: usize,
    packing: Packing,
    kernel: &'static dyn Kernel,
}

impl Codec {
    pub(crate) fn new(dim: usize, packing: Packing, kernel: &'static dyn Kernel) -> Self {
        Self {
            dim,
            packing,
            kernel,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn depth(&self) -> usize {
        self.packing.depth()
    }

    pub fn encoded_size(&self) -> usize {
        encoded_size(self.dim, self.packing.depth())
    }

    pub(crate) fn kernel(&self) -> &'static dyn Kernel {
        self.kernel
    }

    pub(crate) fn packing(&self) -> &Packing {
        &self.packing
    }

    fn packed_block(&self) -> usize {
        self.packing.packed_len(BLOCK)
    }

    fn check_encoded(&self, encoded: &[u8]) {
        debug_assert!(
            encoded.len() >= self.encoded_size(),
            "encoded descriptor holds {} bytes, expected {}",
            encoded.len(),
            self.encoded_size()
        );
    }

    // ── Encode ────────────────────────────────────────────────────────────────

    pub fn encode32f(&self, src: &[f32], dst: &mut [u8]) {
        debug_assert_eq!(src.len(), self.dim);
        self.check_encoded(dst);
        let (min, max) = normalize_range(self.kernel.min_max(src));
        self.encode_with(min, max, dst, |start, buf| {
            buf.copy_from_slice(&src[start..start + buf.len()])
        });
    }

    pub fn encode16f(&self, src: &[f16], dst: &mut [u8]) {
        debug_assert_eq!(src.len(), self.dim);
        self.check_encoded(dst);
        let mut wide = [0f32; BLOCK];
        let mut range = (f32::MAX, -f32::MAX);
        for block in src.chunks(BLOCK) {
            let wide = widen(block, &mut wide);
            let (lo, hi) = self.kernel.min_max(wide);
            range = (range.0.min(lo), range.1.max(hi));
        }
        let (min, max) = normalize_range(range);
        self.encode_with(min, max, dst, |start, buf| {
            widen(&src[start..start + buf.len()], buf);
        });
    }

    /// Quantizes block by block; `load(start, buf)` fills `buf` with the
    /// components starting at `start`.
    fn encode_with<F>(&self, min: f32, max: f32, dst: &mut [u8], mut load: F)
    where
        F: FnMut(usize, &mut [f32]),
    {
        let max_code = self.packing.max_code();
        let scale = if max > min {
            f32::from(max_code) / (max - min)
        } else {
            0.0
        };

        let (header, payload) = dst.split_at_mut(HEADER_SIZE);
        let mut floats = [0f32; BLOCK];
        let mut codes = [0u8; BLOCK];
        let mut sum = 0u64;
        let mut sqsum = 0u64;
        for (start, out) in (0..self.dim)
            .step_by(BLOCK)
            .zip(payload.chunks_mut(self.packed_block()))
        {
            let len = BLOCK.min(self.dim - start);
            load(start, &mut floats[..len]);
            let (s, q) = self
                .kernel
                .quantize(&floats[..len], scale, min, max_code, &mut codes[..len]);
            sum += s;
            sqsum += q;
            self.packing.pack(&codes[..len], out);
        }
        self.header(min, max, sum, sqsum).write(header);
    }

    /// Derives the stored profile from the encode-time accumulators.
    ///
    /// With `x'[i] = scale * c[i] + min`:
    /// `mean = scale * sum + D * min / 2` splits the cross terms of `a' . b'`
    /// evenly between both sides, and `norm = |x'|`.
    fn header(&self, min: f32, max: f32, sum: u64, sqsum: u64) -> DescrHeader {
        let scale = if max > min {
            (max - min) / f32::from(self.packing.max_code())
        } else {
            0.0
        };
        let s = f64::from(scale);
        let m = f64::from(min);
        let d = self.dim as f64;
        let sum = sum as f64;
        let sqsum = sqsum as f64;
        let mean = sum * s + 0.5 * d * m;
        let norm_sq = sqsum * s * s + 2.0 * sum * s * m + d * m * m;
        DescrHeader {
            scale,
            shift: min,
            mean: mean as f32,
            norm: (norm_sq.max(0.0).sqrt() as f32).max(NORM_EPS),
        }
    }

    // ── Decode ────────────────────────────────────────────────────────────────

    pub fn decode32f(&self, src: &[u8], dst: &mut [f32]) {
        self.check_encoded(src);
        debug_assert_eq!(dst.len(), self.dim);
        let header = DescrHeader::read(src);
        let mut codes = [0u8; BLOCK];
        for (packed, out) in src[HEADER_SIZE..]
            .chunks(self.packed_block())
            .zip(dst.chunks_mut(BLOCK))
        {
            let codes = &mut codes[..out.len()];
            self.packing.unpack(packed, codes);
            self.kernel
                .dequantize(codes, header.scale, header.shift, out);
        }
    }

    pub fn decode16f(&self, src: &[u8], dst: &mut [f16]) {
        self.check_encoded(src);
        debug_assert_eq!(dst.len(), self.dim);
        let header = DescrHeader::read(src);
        let mut codes = [0u8; BLOCK];
        let mut wide = [0f32; BLOCK];
        for (packed, out) in src[HEADER_SIZE..]
            .chunks(self.packed_block())
            .zip(dst.chunks_mut(BLOCK))
        {
            let codes = &mut codes[..out.len()];
            let wide = &mut wide[..out.len()];
            self.packing.unpack(packed, codes);
            self.kernel
                .dequantize(codes, header.scale, header.shift, wide);
            for (x, &w) in out.iter_mut().zip(wide.iter()) {
                *x = f16::from_f32(w);
            }
        }
    }

    // ── Codes ─────────────────────────────────────────────────────────────────

    /// Unpacks all codes of an encoded descriptor, one per byte.
    pub(crate) fn unpack_codes(&self, encoded: &[u8], dst: &mut [u8]) {
        self.check_encoded(encoded);
        self.packing.unpack(&encoded[HEADER_SIZE..], &mut dst[..self.dim]);
    }

    /// Exact integer correlation `sum(a[i] * b[i])` of two encoded descriptors.
    pub(crate) fn correlation(&self, a: &[u8], b: &[u8]) -> u64 {
        self.check_encoded(a);
        self.check_encoded(b);
        let a = &a[HEADER_SIZE..];
        let b = &b[HEADER_SIZE..];
        let mut sum = 0u64;
        if self.depth() == 8 {
            for (x, y) in a[..self.dim].chunks(BLOCK).zip(b[..self.dim].chunks(BLOCK)) {
                sum += u64::from(self.kernel.dot_u8(x, y));
            }
            return sum;
        }
        let mut a_codes = [0u8; BLOCK];
        let mut b_codes = [0u8; BLOCK];
        for start in (0..self.dim).step_by(BLOCK) {
            let len = BLOCK.min(self.dim - start);
            self.packing.unpack_at(a, start, &mut a_codes[..len]);
            self.packing.unpack_at(b, start, &mut b_codes[..len]);
            sum += u64::from(self.kernel.dot_u8(&a_codes[..len], &b_codes[..len]));
        }
        sum
    }
}

/// Maps a range without any non-NaN component onto zero. Adding `0.0` turns
/// a `-0.0` bound into `+0.0`, whichever zero the backend's scan kept.
fn normalize_range((min, max): (f32, f32)) -> (f32, f32) {
    if min > max {
        (0.0, 0.0)
    } else {
        (min + 0.0, max + 0.0)
    }
}

fn widen<'a>(src: &[f16], buf: &'a mut [f32]) -> &'a [f32] {
    let buf = &mut buf[..src.len()];
    for (w, &h) in buf.iter_mut().zip(src) {
        *w = h.to_f32();
    }
    buf
}
