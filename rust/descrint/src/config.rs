use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, PANEL_WIDTH};
use crate::codec::BLOCK;

fn default_dimension() -> usize {
    128
}

fn default_depth() -> usize {
    8
}

fn default_min_unpack_rows() -> usize {
    4
}

fn default_min_unpack_cols() -> usize {
    PANEL_WIDTH
}

fn default_unpack_cost_per_code() -> f64 {
    1.0
}

fn default_panel_cost_per_code() -> f64 {
    0.5
}

fn default_direct_cost_per_code() -> f64 {
    1.0
}

fn default_macro_block_bytes() -> usize {
    16 * 1024
}

/// Backend to bind at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    /// Widest backend the CPU supports.
    #[default]
    Auto,
    Scalar,
    Avx2,
}

impl BackendChoice {
    /// The explicitly requested backend, if any.
    pub fn requested(&self) -> Option<BackendKind> {
        match self {
            BackendChoice::Auto => None,
            BackendChoice::Scalar => Some(BackendKind::Scalar),
            BackendChoice::Avx2 => Some(BackendKind::Avx2),
        }
    }
}

/// Which batch engine to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyChoice {
    /// Let the cost model decide.
    #[default]
    Auto,
    Direct,
    Unpack,
}

/// The engine a batch call was routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    Direct,
    Unpack,
}

impl fmt::Display for BatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStrategy::Direct => write!(f, "direct"),
            BatchStrategy::Unpack => write!(f, "unpack"),
        }
    }
}

/// Tunables of the batch strategy selector.
///
/// Costs are relative, per code and per unit of work:
/// - `unpack_cost_per_code`: expanding one packed code into a byte.
/// - `direct_cost_per_code`: one multiply-accumulate in the direct engine.
/// - `panel_cost_per_code`: one multiply-accumulate in the panel micro kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub strategy: StrategyChoice,
    #[serde(default = "default_min_unpack_rows")]
    pub min_unpack_rows: usize,
    #[serde(default = "default_min_unpack_cols")]
    pub min_unpack_cols: usize,
    #[serde(default = "default_unpack_cost_per_code")]
    pub unpack_cost_per_code: f64,
    #[serde(default = "default_panel_cost_per_code")]
    pub panel_cost_per_code: f64,
    #[serde(default = "default_direct_cost_per_code")]
    pub direct_cost_per_code: f64,
    /// Bytes of unpacked A rows processed against each panel.
    #[serde(default = "default_macro_block_bytes")]
    pub macro_block_bytes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyChoice::default(),
            min_unpack_rows: default_min_unpack_rows(),
            min_unpack_cols: default_min_unpack_cols(),
            unpack_cost_per_code: default_unpack_cost_per_code(),
            panel_cost_per_code: default_panel_cost_per_code(),
            direct_cost_per_code: default_direct_cost_per_code(),
            macro_block_bytes: default_macro_block_bytes(),
        }
    }
}

impl BatchConfig {
    /// Picks the engine for an `m x n` batch of `dim`-dimensional descriptors.
    ///
    /// Depth 8 always runs direct. Otherwise the direct engine re-unpacks
    /// every operand once per tile (2 rows and 4 columns per 8 cells), while
    /// the unpack engine unpacks every operand exactly once and then pays the
    /// cheaper panel rate per cell.
    pub fn choose(&self, depth: usize, dim: usize, m: usize, n: usize) -> BatchStrategy {
        if depth >= 8 {
            return BatchStrategy::Direct;
        }
        match self.strategy {
            StrategyChoice::Direct => BatchStrategy::Direct,
            StrategyChoice::Unpack => BatchStrategy::Unpack,
            StrategyChoice::Auto => {
                if m < self.min_unpack_rows || n < self.min_unpack_cols {
                    return BatchStrategy::Direct;
                }
                let cells = (m * n) as f64;
                let codes = dim as f64;
                let direct = cells * codes * (0.75 * self.unpack_cost_per_code + self.direct_cost_per_code);
                let operands = (m + n.div_ceil(PANEL_WIDTH) * PANEL_WIDTH) as f64;
                let unpack = operands * codes * self.unpack_cost_per_code
                    + cells * codes * self.panel_cost_per_code;
                if unpack < direct {
                    BatchStrategy::Unpack
                } else {
                    BatchStrategy::Direct
                }
            }
        }
    }

    pub(crate) fn macro_block_bytes(&self) -> usize {
        self.macro_block_bytes.max(BLOCK)
    }
}

/// Everything needed to construct an [`crate::Engine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_depth")]
    pub depth: usize,
    #[serde(default)]
    pub backend: BackendChoice,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            depth: default_depth(),
            backend: BackendChoice::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(dimension: usize, depth: usize) -> Self {
        Self {
            dimension,
            depth,
            ..Default::default()
        }
    }
}
