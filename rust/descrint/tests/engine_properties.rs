use descrint::{
    BackendChoice, BackendKind, BatchStrategy, Engine, EngineConfig, StrategyChoice,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIMS: &[usize] = &[8, 16, 24, 64, 72, 128];

fn shape() -> impl Strategy<Value = (usize, usize)> {
    (prop::sample::select(DIMS), 4usize..=8)
}

/// A shape together with one vector of that dimension.
fn shaped_vector() -> impl Strategy<Value = (usize, usize, Vec<f32>)> {
    shape().prop_flat_map(|(dim, depth)| {
        (
            Just(dim),
            Just(depth),
            prop::collection::vec(-100.0f32..100.0, dim),
        )
    })
}

fn random_vectors(seed: u64, dim: usize, count: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = rng.gen_range(0.01f32..50.0);
    let offset = rng.gen_range(-10.0f32..10.0);
    (0..dim * count)
        .map(|_| rng.gen_range(-1.0f32..1.0) * scale + offset)
        .collect()
}

fn encode_all(engine: &Engine, src: &[f32]) -> Vec<u8> {
    let count = src.len() / engine.decoded_size();
    let mut dst = vec![0u8; count * engine.encoded_size()];
    engine.encode32f_batch(src, &mut dst);
    dst
}

fn engine_with(dim: usize, depth: usize, strategy: StrategyChoice) -> Engine {
    let mut config = EngineConfig::new(dim, depth);
    config.batch.strategy = strategy;
    Engine::from_config(&config).unwrap()
}

proptest! {
    #[test]
    fn roundtrip_error_is_bounded((dim, depth, x) in shaped_vector()) {
        let engine = Engine::new(dim, depth).unwrap();
        let decoded = engine.decode32f_vec(&engine.encode32f_vec(&x));
        let lo = x.iter().copied().fold(f32::MAX, f32::min);
        let hi = x.iter().copied().fold(f32::MIN, f32::max);
        let bound = (hi - lo) / ((1 << depth) - 1) as f32 + 1e-4;
        for (d, e) in decoded.iter().zip(&x) {
            prop_assert!((d - e).abs() <= bound, "{} vs {} (bound {})", d, e, bound);
        }
    }

    #[test]
    fn self_distance_is_small((dim, depth, x) in shaped_vector()) {
        // An all-zero vector has no direction.
        prop_assume!(x.iter().any(|v| v.abs() > 1e-3));
        let engine = Engine::new(dim, depth).unwrap();
        let a = engine.encode32f_vec(&x);
        let b = engine.encode32f_vec(&x);
        prop_assert!(engine.cosine_distance(&a, &b) < 1e-3);
    }

    #[test]
    fn distance_is_symmetric_and_bounded((dim, depth) in shape(), seed in any::<u64>()) {
        let engine = Engine::new(dim, depth).unwrap();
        let encoded = encode_all(&engine, &random_vectors(seed, dim, 2));
        let (a, b) = encoded.split_at(engine.encoded_size());
        let ab = engine.cosine_distance(a, b);
        let ba = engine.cosine_distance(b, a);
        prop_assert_eq!(ab.to_bits(), ba.to_bits());
        prop_assert!((0.0..=2.0).contains(&ab));
    }

    #[test]
    fn batch_matches_pairwise(
        (dim, depth) in shape(),
        m in 1usize..12,
        n in 1usize..20,
        seed in any::<u64>(),
    ) {
        let a = random_vectors(seed, dim, m);
        let b = random_vectors(seed.wrapping_add(1), dim, n);
        for strategy in [StrategyChoice::Auto, StrategyChoice::Direct, StrategyChoice::Unpack] {
            let engine = engine_with(dim, depth, strategy);
            let size = engine.encoded_size();
            let (ea, eb) = (encode_all(&engine, &a), encode_all(&engine, &b));
            let mut distances = vec![0f32; m * n];
            engine.cosine_distances_mxn_p(&ea, &eb, &mut distances);
            for (i, x) in ea.chunks_exact(size).enumerate() {
                for (j, y) in eb.chunks_exact(size).enumerate() {
                    prop_assert_eq!(
                        distances[i * n + j].to_bits(),
                        engine.cosine_distance(x, y).to_bits(),
                        "{:?} at ({}, {})", strategy, i, j
                    );
                }
            }
        }
    }

    #[test]
    fn backends_agree((dim, depth) in shape(), seed in any::<u64>()) {
        let config = EngineConfig { backend: BackendChoice::Scalar, ..EngineConfig::new(dim, depth) };
        let scalar = Engine::from_config(&config).unwrap();
        let auto = Engine::new(dim, depth).unwrap();
        prop_assert_eq!(scalar.backend(), BackendKind::Scalar);

        let src = random_vectors(seed, dim, 9);
        let encoded = encode_all(&scalar, &src);
        prop_assert_eq!(&encoded, &encode_all(&auto, &src));

        let mut d0 = vec![0f32; 81];
        let mut d1 = vec![0f32; 81];
        scalar.cosine_distances_mxn_p(&encoded, &encoded, &mut d0);
        auto.cosine_distances_mxn_p(&encoded, &encoded, &mut d1);
        prop_assert_eq!(d0, d1);
    }
}

#[test]
fn remainder_tiles_match_pairwise() {
    // 5x5 leaves one trailing row and column past the 4-wide tiles.
    let mut rng = StdRng::seed_from_u64(0xdeadbeef);
    for depth in 4..=8 {
        let engine = Engine::new(64, depth).unwrap();
        assert_eq!(engine.batch_strategy(5, 5), BatchStrategy::Direct);
        let src: Vec<f32> = (0..5 * 64).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let encoded = encode_all(&engine, &src);
        let rows: Vec<&[u8]> = encoded.chunks_exact(engine.encoded_size()).collect();
        let distances = engine.cosine_distances_mxn_vec(&rows, &rows);
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(distances[i * 5 + j], engine.cosine_distance(rows[i], rows[j]));
            }
        }
    }
}

#[test]
fn repeated_calls_are_deterministic() {
    let engine = Engine::new(128, 6).unwrap();
    let src = random_vectors(5, 128, 40);
    let encoded = encode_all(&engine, &src);
    assert_eq!(engine.batch_strategy(40, 40), BatchStrategy::Unpack);
    let mut first = vec![0f32; 1600];
    let mut second = vec![0f32; 1600];
    engine.cosine_distances_mxn_p(&encoded, &encoded, &mut first);
    engine.cosine_distances_mxn_p(&encoded, &encoded, &mut second);
    assert_eq!(first, second);
    assert_eq!(encoded, encode_all(&engine, &src));
}

#[test]
fn ramp_scenarios() {
    let engine = Engine::new(8, 8).unwrap();
    let x: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let ex = engine.encode32f_vec(&x);
    assert_eq!(&ex[16..], &[0, 36, 73, 109, 146, 182, 219, 255]);
    for (d, e) in engine.decode32f_vec(&ex).iter().zip(&x) {
        assert!((d - e).abs() <= 7.0 / 255.0);
    }

    let same = engine.encode32f_vec(&x);
    assert!(engine.cosine_distance(&ex, &same) < 0.01);

    // Negated, then shifted back into [1, 8].
    let y: Vec<f32> = x.iter().map(|v| 8.0 - v).collect();
    let dot: f32 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
    let nx = x.iter().map(|v| v * v).sum::<f32>().sqrt();
    let ny = y.iter().map(|v| v * v).sum::<f32>().sqrt();
    let expected = 1.0 - dot / (nx * ny);
    let actual = engine.cosine_distance(&ex, &engine.encode32f_vec(&y));
    assert!((actual - expected).abs() < 0.01, "{actual} vs {expected}");
}

#[test]
fn half_precision_path() {
    let engine = Engine::new(16, 5).unwrap();
    let x: Vec<descrint::f16> = (0..16)
        .map(|i| descrint::f16::from_f32(i as f32 * 0.25 - 2.0))
        .collect();
    let mut encoded = vec![0u8; engine.encoded_size()];
    engine.encode16f(&x, &mut encoded);
    let mut decoded = vec![descrint::f16::ZERO; 16];
    engine.decode16f(&encoded, &mut decoded);
    let step = 3.75 / 31.0;
    for (d, e) in decoded.iter().zip(&x) {
        assert!((d.to_f32() - e.to_f32()).abs() <= step + 0.01);
    }
}

fn scalar_and_auto(dim: usize, depth: usize) -> (Engine, Engine) {
    let config = EngineConfig {
        backend: BackendChoice::Scalar,
        ..EngineConfig::new(dim, depth)
    };
    (
        Engine::from_config(&config).unwrap(),
        Engine::new(dim, depth).unwrap(),
    )
}

#[test]
fn tiny_range_encodes_identically_on_every_backend() {
    let (scalar, auto) = scalar_and_auto(8, 8);
    let x = [0.0, 1e-38, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    let encoded = scalar.encode32f_vec(&x);
    assert_eq!(&encoded[16..], &[0, 255, 0, 0, 0, 0, 0, 0]);
    assert_eq!(auto.encode32f_vec(&x), encoded);
}

#[test]
fn infinite_components_are_deterministic() {
    let mut inputs: Vec<Vec<f32>> = Vec::new();
    let mut pos = vec![0.0f32; 16];
    pos[0] = f32::INFINITY;
    inputs.push(pos);
    let mut neg = vec![1.0f32; 16];
    neg[0] = f32::NEG_INFINITY;
    inputs.push(neg);
    let mut both = vec![0.5f32; 16];
    both[3] = f32::INFINITY;
    both[9] = f32::NEG_INFINITY;
    both[11] = -0.0;
    inputs.push(both);
    let finite: Vec<f32> = (0..16).map(|i| i as f32 - 4.0).collect();

    for depth in 4..=8 {
        let (scalar, auto) = scalar_and_auto(16, depth);
        let reference = scalar.encode32f_vec(&finite);
        for x in &inputs {
            let encoded = scalar.encode32f_vec(x);
            assert_eq!(auto.encode32f_vec(x), encoded, "depth {depth} {x:?}");
            assert_eq!(scalar.encode32f_vec(x), encoded);
            assert!(scalar.vector_norm(&encoded) >= descrint::descriptor::NORM_EPS);

            for engine in [&scalar, &auto] {
                let self_distance = engine.cosine_distance(&encoded, &encoded);
                let cross = engine.cosine_distance(&encoded, &reference);
                assert!((0.0..=2.0).contains(&self_distance), "{self_distance}");
                assert!((0.0..=2.0).contains(&cross), "{cross}");
                assert_eq!(cross.to_bits(), engine.cosine_distance(&reference, &encoded).to_bits());
            }
        }
    }
}

#[test]
fn strategies_agree_on_long_descriptors() {
    // 127 * 127 * dim exceeds u32::MAX at depth 7.
    let dim = 270_000;
    let x: Vec<f32> = (0..dim).map(|k| if k == 0 { 0.0 } else { 1.0 }).collect();
    let direct = engine_with(dim, 7, StrategyChoice::Direct);
    let unpack = engine_with(dim, 7, StrategyChoice::Unpack);
    let encoded = direct.encode32f_vec(&x);
    let a: Vec<&[u8]> = vec![encoded.as_slice(); 4];
    let b: Vec<&[u8]> = vec![encoded.as_slice(); 8];

    let d0 = direct.cosine_distances_mxn_vec(&a, &b);
    let d1 = unpack.cosine_distances_mxn_vec(&a, &b);
    assert_eq!(d0, d1);
    let pairwise = direct.cosine_distance(&encoded, &encoded);
    assert!(pairwise < 1e-3);
    assert!(d0.iter().all(|d| d.to_bits() == pairwise.to_bits()));
}
