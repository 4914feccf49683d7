//! Integer descriptors with fast cosine distance.
//!
//! An [`Engine`] quantizes float descriptors of a fixed dimension into
//! `b`-bit codes (`b` in 4..=8) behind a 16-byte header, and computes cosine
//! distances between encoded descriptors, either one pair at a time or as a
//! whole `M x N` matrix. Batch calls are routed to one of two engines (a
//! tiled direct engine or an unpack-then-correlate engine) and return the
//! same numbers as the pairwise kernel either way.
//!
//! ```
//! use descrint::Engine;
//!
//! let engine = Engine::new(8, 8).unwrap();
//! let a = engine.encode32f_vec(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
//! let b = engine.encode32f_vec(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
//! assert!(engine.cosine_distance(&a, &b) < 0.01);
//! ```

pub mod backend;
mod codec;
pub mod config;
pub mod descriptor;
mod direct;
mod engine;
mod error;
mod packing;
mod pairwise;
mod unpack;

pub use backend::BackendKind;
pub use config::{BackendChoice, BatchConfig, BatchStrategy, EngineConfig, StrategyChoice};
pub use descriptor::{encoded_size, DescrHeader, EncodedDescr, HEADER_SIZE};
pub use engine::Engine;
pub use error::ConfigurationError;
pub use half::f16;
