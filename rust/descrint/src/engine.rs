use half::f16;

use crate::backend::{self, BackendKind};
use crate::codec::Codec;
use crate::config::{BatchConfig, BatchStrategy, EngineConfig};
use crate::descriptor::{self, DescrHeader};
use crate::direct;
use crate::error::ConfigurationError;
use crate::packing::Packing;
use crate::pairwise;
use crate::unpack;

/// Descriptor codec and cosine distance engine for one `(dimension, depth)`.
///
/// Immutable after construction and safe to share between threads. Buffer
/// shapes are the caller's responsibility: an encoded descriptor holds
/// [`Engine::encoded_size`] bytes and a decoded one [`Engine::decoded_size`]
/// components. Wrong sizes, or descriptors produced for another shape, trip a
/// debug assertion or a slice bounds check.
#[derive(Clone, Debug)]
pub struct Engine {
    codec: Codec,
    batch: BatchConfig,
}

impl Engine {
    /// Whether `dimension` and `depth` can be used to construct an engine.
    pub fn valid(dimension: usize, depth: usize) -> bool {
        descriptor::valid(dimension, depth)
    }

    /// Engine with default batch tuning on the widest available backend.
    pub fn new(dimension: usize, depth: usize) -> Result<Self, ConfigurationError> {
        Self::from_config(&EngineConfig::new(dimension, depth))
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigurationError> {
        let (dimension, depth) = (config.dimension, config.depth);
        if dimension < 8 || dimension % 8 != 0 {
            return Err(ConfigurationError::InvalidDimension(dimension));
        }
        let packing = Packing::for_depth(depth).ok_or(ConfigurationError::InvalidDepth(depth))?;
        let kind = config.backend.requested().unwrap_or_else(backend::detect);
        let Some(kernel) = backend::kernel(kind) else {
            tracing::warn!(backend = %kind, "Requested backend is not supported by this CPU");
            return Err(ConfigurationError::UnsupportedBackend(kind));
        };

        let engine = Self {
            codec: Codec::new(dimension, packing, kernel),
            batch: config.batch.clone(),
        };
        tracing::debug!(
            dimension,
            depth,
            backend = %kind,
            encoded_size = engine.encoded_size(),
            "Constructed descriptor engine"
        );
        Ok(engine)
    }

    pub fn dimension(&self) -> usize {
        self.codec.dim()
    }

    pub fn depth(&self) -> usize {
        self.codec.depth()
    }

    pub fn backend(&self) -> BackendKind {
        self.codec.kernel().kind()
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Bytes per encoded descriptor: 16 header bytes plus the packed codes.
    pub fn encoded_size(&self) -> usize {
        self.codec.encoded_size()
    }

    /// Components per decoded descriptor.
    pub fn decoded_size(&self) -> usize {
        self.codec.dim()
    }

    // ── Codec ─────────────────────────────────────────────────────────────────

    pub fn encode32f(&self, src: &[f32], dst: &mut [u8]) {
        self.codec.encode32f(src, dst)
    }

    pub fn encode16f(&self, src: &[f16], dst: &mut [u8]) {
        self.codec.encode16f(src, dst)
    }

    pub fn decode32f(&self, src: &[u8], dst: &mut [f32]) {
        self.codec.decode32f(src, dst)
    }

    pub fn decode16f(&self, src: &[u8], dst: &mut [f16]) {
        self.codec.decode16f(src, dst)
    }

    pub fn encode32f_vec(&self, src: &[f32]) -> Vec<u8> {
        let mut dst = vec![0u8; self.encoded_size()];
        self.encode32f(src, &mut dst);
        dst
    }

    pub fn decode32f_vec(&self, src: &[u8]) -> Vec<f32> {
        let mut dst = vec![0f32; self.decoded_size()];
        self.decode32f(src, &mut dst);
        dst
    }

    /// Encodes `src.len() / dimension` contiguous descriptors into `dst`.
    pub fn encode32f_batch(&self, src: &[f32], dst: &mut [u8]) {
        debug_assert_eq!(src.len() % self.decoded_size(), 0);
        for (x, out) in src
            .chunks_exact(self.decoded_size())
            .zip(dst.chunks_exact_mut(self.encoded_size()))
        {
            self.encode32f(x, out);
        }
    }

    /// Decodes `src.len() / encoded_size` contiguous descriptors into `dst`.
    pub fn decode32f_batch(&self, src: &[u8], dst: &mut [f32]) {
        debug_assert_eq!(src.len() % self.encoded_size(), 0);
        for (encoded, out) in src
            .chunks_exact(self.encoded_size())
            .zip(dst.chunks_exact_mut(self.decoded_size()))
        {
            self.decode32f(encoded, out);
        }
    }

    // ── Distances ─────────────────────────────────────────────────────────────

    /// Stored norm of an encoded descriptor.
    pub fn vector_norm(&self, encoded: &[u8]) -> f32 {
        DescrHeader::read(encoded).norm
    }

    /// Cosine distance in `[0, 2]`, bitwise symmetric in its arguments.
    pub fn cosine_distance(&self, a: &[u8], b: &[u8]) -> f32 {
        pairwise::cosine_distance(&self.codec, a, b)
    }

    /// Engine a `m x n` batch is routed to. Results never depend on it.
    pub fn batch_strategy(&self, m: usize, n: usize) -> BatchStrategy {
        self.batch
            .choose(self.depth(), self.dimension(), m, n)
    }

    /// Row-major `a.len() x b.len()` distance matrix over separately stored
    /// descriptors. Cell `(i, j)` equals `cosine_distance(a[i], b[j])`.
    pub fn cosine_distances_mxn_a<A, B>(&self, a: &[A], b: &[B], distances: &mut [f32])
    where
        A: AsRef<[u8]>,
        B: AsRef<[u8]>,
    {
        let a: Vec<&[u8]> = a.iter().map(AsRef::as_ref).collect();
        let b: Vec<&[u8]> = b.iter().map(AsRef::as_ref).collect();
        self.cosine_distances(&a, &b, distances);
    }

    /// Same as [`Engine::cosine_distances_mxn_a`] over contiguously packed
    /// descriptors; counts are inferred from the buffer lengths.
    pub fn cosine_distances_mxn_p(&self, a: &[u8], b: &[u8], distances: &mut [f32]) {
        let size = self.encoded_size();
        debug_assert_eq!(a.len() % size, 0);
        debug_assert_eq!(b.len() % size, 0);
        let a: Vec<&[u8]> = a.chunks_exact(size).collect();
        let b: Vec<&[u8]> = b.chunks_exact(size).collect();
        self.cosine_distances(&a, &b, distances);
    }

    pub fn cosine_distances_mxn_vec<A, B>(&self, a: &[A], b: &[B]) -> Vec<f32>
    where
        A: AsRef<[u8]>,
        B: AsRef<[u8]>,
    {
        let mut distances = vec![0f32; a.len() * b.len()];
        self.cosine_distances_mxn_a(a, b, &mut distances);
        distances
    }

    fn cosine_distances(&self, a: &[&[u8]], b: &[&[u8]], distances: &mut [f32]) {
        debug_assert!(distances.len() >= a.len() * b.len());
        let strategy = self.batch_strategy(a.len(), b.len());
        tracing::trace!(m = a.len(), n = b.len(), %strategy, "Computing cosine distances");
        match strategy {
            BatchStrategy::Direct => direct::cosine_distances(&self.codec, a, b, distances),
            BatchStrategy::Unpack => unpack::cosine_distances(
                &self.codec,
                self.batch.macro_block_bytes(),
                a,
                b,
                distances,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendChoice, StrategyChoice};
    use descrint_error::{DescrIntError, ErrorCodes};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_batch(rng: &mut StdRng, engine: &Engine, count: usize) -> Vec<u8> {
        let src: Vec<f32> = (0..count * engine.decoded_size())
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        let mut dst = vec![0u8; count * engine.encoded_size()];
        engine.encode32f_batch(&src, &mut dst);
        dst
    }

    #[test]
    fn test_construction_validates_shape() {
        assert_eq!(
            Engine::new(12, 8).unwrap_err(),
            ConfigurationError::InvalidDimension(12)
        );
        assert_eq!(
            Engine::new(0, 8).unwrap_err(),
            ConfigurationError::InvalidDimension(0)
        );
        assert_eq!(
            Engine::new(64, 3).unwrap_err(),
            ConfigurationError::InvalidDepth(3)
        );
        assert_eq!(
            Engine::new(64, 9).unwrap_err().code(),
            ErrorCodes::InvalidArgument
        );

        let engine = Engine::new(64, 6).unwrap();
        assert_eq!(engine.encoded_size(), 16 + 48);
        assert_eq!(engine.decoded_size(), 64);
        assert_eq!(engine.backend(), backend::detect());
        assert!(Engine::valid(64, 6));
        assert!(!Engine::valid(64, 10));
    }

    #[test]
    fn test_unsupported_backend() {
        let config = EngineConfig {
            backend: BackendChoice::Avx2,
            ..EngineConfig::new(32, 4)
        };
        match Engine::from_config(&config) {
            Ok(engine) => assert_eq!(engine.backend(), BackendKind::Avx2),
            Err(err) => {
                assert!(!backend::is_supported(BackendKind::Avx2));
                assert_eq!(err, ConfigurationError::UnsupportedBackend(BackendKind::Avx2));
                assert_eq!(err.code(), ErrorCodes::FailedPrecondition);
            }
        }
    }

    #[test]
    fn test_vector_norm_reads_header() {
        let engine = Engine::new(8, 8).unwrap();
        let encoded = engine.encode32f_vec(&[3.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let decoded = engine.decode32f_vec(&encoded);
        let norm = decoded.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((engine.vector_norm(&encoded) - norm).abs() < 1e-4);
        assert!((engine.vector_norm(&encoded) - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_batch_forms_agree() {
        let mut rng = StdRng::seed_from_u64(0xdeadbeef);
        let engine = Engine::new(48, 5).unwrap();
        let size = engine.encoded_size();
        let a = random_batch(&mut rng, &engine, 6);
        let b = random_batch(&mut rng, &engine, 11);

        let mut packed = vec![0f32; 6 * 11];
        engine.cosine_distances_mxn_p(&a, &b, &mut packed);

        let a_vecs: Vec<Vec<u8>> = a.chunks_exact(size).map(|c| c.to_vec()).collect();
        let b_refs: Vec<&[u8]> = b.chunks_exact(size).collect();
        assert_eq!(engine.cosine_distances_mxn_vec(&a_vecs, &b_refs), packed);

        for (i, x) in a_vecs.iter().enumerate() {
            for (j, y) in b_refs.iter().enumerate() {
                assert_eq!(packed[i * 11 + j], engine.cosine_distance(x, y));
            }
        }
    }

    #[test]
    fn test_forced_strategies_agree() {
        let mut rng = StdRng::seed_from_u64(9);
        for depth in 4..=8 {
            let mut config = EngineConfig::new(64, depth);
            config.batch.strategy = StrategyChoice::Direct;
            let direct = Engine::from_config(&config).unwrap();
            config.batch.strategy = StrategyChoice::Unpack;
            let unpack = Engine::from_config(&config).unwrap();
            if depth < 8 {
                assert_eq!(unpack.batch_strategy(3, 3), BatchStrategy::Unpack);
            }

            let a = random_batch(&mut rng, &direct, 9);
            let b = random_batch(&mut rng, &direct, 13);
            let mut d0 = vec![0f32; 9 * 13];
            let mut d1 = vec![0f32; 9 * 13];
            direct.cosine_distances_mxn_p(&a, &b, &mut d0);
            unpack.cosine_distances_mxn_p(&a, &b, &mut d1);
            assert_eq!(d0, d1, "depth {depth}");
        }
    }

    #[test]
    fn test_empty_batches() {
        let engine = Engine::new(16, 4).unwrap();
        let none: Vec<Vec<u8>> = Vec::new();
        let one = vec![engine.encode32f_vec(&[1.0; 16])];
        assert!(engine.cosine_distances_mxn_vec(&none, &one).is_empty());
        assert!(engine.cosine_distances_mxn_vec(&one, &none).is_empty());
    }

    #[test]
    fn test_batch_encode_decode() {
        let mut rng = StdRng::seed_from_u64(21);
        let engine = Engine::new(24, 7).unwrap();
        let src: Vec<f32> = (0..3 * 24).map(|_| rng.gen_range(-4.0..4.0)).collect();
        let mut encoded = vec![0u8; 3 * engine.encoded_size()];
        engine.encode32f_batch(&src, &mut encoded);
        let mut decoded = vec![0f32; 3 * 24];
        engine.decode32f_batch(&encoded, &mut decoded);

        for (k, (x, enc)) in src
            .chunks_exact(24)
            .zip(encoded.chunks_exact(engine.encoded_size()))
            .enumerate()
        {
            assert_eq!(engine.encode32f_vec(x), enc);
            assert_eq!(engine.decode32f_vec(enc), decoded[k * 24..(k + 1) * 24]);
        }
    }
}
