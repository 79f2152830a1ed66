//! Deterministic generators for beliefs and weights
//!
//! Covariances are generated as `L·Lᵀ` from a random lower-triangular
//! factor so every sample is a valid symmetric PSD matrix.

use crossmodal_core::{matrix, GaussianBatch, ScaleTril, WeightTensor};

/// Xorshift generator, reproducible across platforms
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u32() >> 8) as f64 / 16777216.0
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

/// `n` beliefs with means in `[-1, 1]` and random PSD covariances
pub fn random_batch(rng: &mut TestRng, n: usize) -> GaussianBatch<2> {
    let means = (0..n).map(|_| [rng.gen_range(-1.0, 1.0), rng.gen_range(-1.0, 1.0)]).collect();
    let factors: Vec<ScaleTril<2>> = (0..n)
        .map(|_| {
            ScaleTril::lower([
                [rng.gen_range(0.01, 0.5), 0.0],
                [rng.gen_range(-0.2, 0.2), rng.gen_range(0.01, 0.5)],
            ])
        })
        .collect();
    GaussianBatch::from_factors(means, &factors).expect("matching lengths")
}

/// Weights on the simplex for `slots` slots and `n` elements
pub fn simplex_weights(rng: &mut TestRng, slots: usize, n: usize) -> WeightTensor<2> {
    let mut raw: Vec<Vec<[f64; 2]>> = (0..slots)
        .map(|_| (0..n).map(|_| [rng.gen_range(0.0, 1.0), rng.gen_range(0.0, 1.0)]).collect())
        .collect();

    for i in 0..n {
        for d in 0..2 {
            let sum: f64 = raw.iter().map(|slot| slot[i][d]).sum::<f64>().max(1e-12);
            for slot in raw.iter_mut() {
                slot[i][d] /= sum;
            }
        }
    }
    WeightTensor::from_slots(raw).expect("consistent slots")
}

/// `I·variance` replicated across a batch
pub fn isotropic(mean: [f64; 2], variance: f64, n: usize) -> GaussianBatch<2> {
    GaussianBatch::from_prior(mean, matrix::diagonal(&[variance; 2]), n)
}
