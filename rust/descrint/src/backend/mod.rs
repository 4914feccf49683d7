//! Compute backends.
//!
//! A backend is a [`Kernel`]: the handful of primitives the codec and both
//! batch engines are written against. [`detect`] probes the CPU once per
//! process and reports the widest backend it can run.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "x86_64")]
pub mod avx2;
pub mod scalar;

/// Vectors per unpacked panel.
pub const PANEL_WIDTH: usize = 8;

/// Codes of one vector stored contiguously inside a panel.
pub const PANEL_STEP: usize = 4;

/// Rows of A handled by one panel correlation call.
pub const MICRO_ROWS: usize = 4;

/// Most codes one panel correlation call may span. `PANEL_CHUNK * 127 * 127`
/// stays below `i32::MAX`, so no 32-bit lane can wrap.
pub const PANEL_CHUNK: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Scalar,
    Avx2,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Scalar => write!(f, "scalar"),
            BackendKind::Avx2 => write!(f, "avx2"),
        }
    }
}

/// Primitives every backend provides.
///
/// All integer results are exact, so every backend produces the same
/// correlations and therefore the same distances.
pub trait Kernel: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Minimum and maximum of `src`. NaN components are skipped.
    fn min_max(&self, src: &[f32]) -> (f32, f32);

    /// Quantizes `src` (a multiple of 8 components) into one code per byte:
    /// `round((x - min) * scale)` clamped to `[0, max_code]`, ties to even.
    /// Returns the sum and the sum of squares of the written codes.
    fn quantize(&self, src: &[f32], scale: f32, min: f32, max_code: u8, dst: &mut [u8])
        -> (u64, u64);

    /// Writes `code * scale + shift` for every code.
    fn dequantize(&self, codes: &[u8], scale: f32, shift: f32, dst: &mut [f32]);

    /// Integer correlation of two one-byte-per-code streams of equal length.
    fn dot_u8(&self, a: &[u8], b: &[u8]) -> u32;

    /// Correlates up to [`MICRO_ROWS`] unpacked rows against one panel.
    ///
    /// Every row holds `dim` codes no larger than 127, with `dim` a multiple
    /// of [`PANEL_STEP`] and at most [`PANEL_CHUNK`]. The panel stores
    /// [`PANEL_WIDTH`] vectors with groups of [`PANEL_STEP`] codes interleaved:
    /// byte `(k / 4 * PANEL_WIDTH + j) * 4 + k % 4` is code `k` of vector `j`.
    /// `out[r][j]` receives the correlation of row `r` with vector `j`.
    fn panel_correlation(&self, rows: &[&[u8]], panel: &[u8], out: &mut [[u32; PANEL_WIDTH]]);
}

impl fmt::Debug for dyn Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kernel({})", self.kind())
    }
}

static DETECTED: Lazy<BackendKind> = Lazy::new(probe);

fn probe() -> BackendKind {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return BackendKind::Avx2;
        }
    }
    BackendKind::Scalar
}

/// Widest backend this CPU supports.
pub fn detect() -> BackendKind {
    *DETECTED
}

/// Whether `kind` can run on this CPU.
pub fn is_supported(kind: BackendKind) -> bool {
    match kind {
        BackendKind::Scalar => true,
        BackendKind::Avx2 => detect() == BackendKind::Avx2,
    }
}

/// Kernel implementing `kind`, or `None` if the CPU cannot run it.
pub(crate) fn kernel(kind: BackendKind) -> Option<&'static dyn Kernel> {
    match kind {
        BackendKind::Scalar => Some(&scalar::ScalarKernel),
        BackendKind::Avx2 => avx2_kernel(),
    }
}

#[cfg(target_arch = "x86_64")]
fn avx2_kernel() -> Option<&'static dyn Kernel> {
    avx2::Avx2Kernel::get().map(|kernel| kernel as &'static dyn Kernel)
}

#[cfg(not(target_arch = "x86_64"))]
fn avx2_kernel() -> Option<&'static dyn Kernel> {
    None
}
