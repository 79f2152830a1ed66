//! Crossmodal Weight Model
//!
//! ## Overview
//!
//! The weight model decides, per batch element and per state dimension,
//! how much each filter slot is trusted. It always sees the full
//! observation bundle, including modalities a given filter ignores,
//! because relative trust depends on global context (a blank camera
//! frame matters most to the image filter, but only makes sense next to
//! a healthy force reading).
//!
//! ## Pipeline
//!
//! ```text
//! image ─enc─┐
//! pos   ─enc─┼─concat─→ network ─→ (N, M·D) ─reshape─→ (M, N, D) ─normalize─→ weights
//! sensors─enc┘
//! ```
//!
//! ## Normalization
//!
//! Across the slot axis `m`, for every element `i` and dimension `d`:
//!
//! ```text
//! softmax:   w = exp(s) / Σ exp(s)
//! absolute:  w = |s| / (Σ |s| + ε)
//! then:      w = w / (Σ w + ε)                      ε = 1e-9
//! ```
//!
//! The second pass runs for both policies so the partition-of-unity
//! invariant holds even where the first one is approximate. A column
//! whose mass is at most ε (all absolute scores zero) has nothing to
//! prefer and is split evenly, `w = 1/M`.

use alloc::{boxed::Box, vec::Vec};
use core::str::FromStr;

use crate::{
    constants::WEIGHT_EPSILON,
    errors::{FilterError, FilterResult},
    matrix::Vector,
    models::{EncoderBank, ModalityEncoder, WeightNetwork},
    modality::ModalitySet,
    observation::ObservationBundle,
};

/// How raw scores become weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WeightingPolicy {
    /// Exponential normalization, strictly positive weights
    #[default]
    Softmax,
    /// Absolute value divided by the sum
    Absolute,
}

impl FromStr for WeightingPolicy {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "softmax" => Ok(Self::Softmax),
            "absolute" => Ok(Self::Absolute),
            _ => Err(FilterError::UnsupportedWeighting),
        }
    }
}

/// Weights of shape `(modality_count, N, D)`
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTensor<const D: usize> {
    modality_count: usize,
    batch: usize,
    /// Slot-major: entry `m·N + i`
    data: Vec<Vector<D>>,
}

impl<const D: usize> WeightTensor<D> {
    /// Wrap slot-major data
    pub fn new(modality_count: usize, batch: usize, data: Vec<Vector<D>>) -> FilterResult<Self> {
        if data.len() != modality_count * batch {
            return Err(FilterError::shape("weight tensor", modality_count * batch, data.len()));
        }
        Ok(Self { modality_count, batch, data })
    }

    /// One `(N, D)` block per slot
    pub fn from_slots(slots: Vec<Vec<Vector<D>>>) -> FilterResult<Self> {
        let modality_count = slots.len();
        let batch = slots.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(modality_count * batch);
        for slot in slots {
            if slot.len() != batch {
                return Err(FilterError::BatchMismatch { expected: batch, actual: slot.len() });
            }
            data.extend(slot);
        }
        Self::new(modality_count, batch, data)
    }

    /// Equal weights `1 / M` everywhere
    pub fn uniform(modality_count: usize, batch: usize) -> Self {
        let w = 1.0 / modality_count.max(1) as f64;
        Self {
            modality_count,
            batch,
            data: alloc::vec![[w; D]; modality_count * batch],
        }
    }

    /// `(modality_count, N, D)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.modality_count, self.batch, D)
    }

    /// Number of slots
    pub fn modality_count(&self) -> usize {
        self.modality_count
    }

    /// Batch size `N`
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Weights of slot `m` for element `i`
    pub fn get(&self, m: usize, i: usize) -> &Vector<D> {
        &self.data[m * self.batch + i]
    }

    /// Mutable weights of slot `m` for element `i`
    pub fn get_mut(&mut self, m: usize, i: usize) -> &mut Vector<D> {
        &mut self.data[m * self.batch + i]
    }

    /// All elements of slot `m`
    pub fn slot(&self, m: usize) -> &[Vector<D>] {
        &self.data[m * self.batch..(m + 1) * self.batch]
    }

    /// Per-dimension sum over slots for element `i`
    pub fn column_sum(&self, i: usize) -> Vector<D> {
        let mut sum = [0.0; D];
        for m in 0..self.modality_count {
            for (s, w) in sum.iter_mut().zip(self.get(m, i)) {
                *s += w;
            }
        }
        sum
    }

    /// Every weight non-negative and every column summing to one
    pub fn is_partition_of_unity(&self, tolerance: f64) -> bool {
        self.data.iter().all(|w| w.iter().all(|v| *v >= 0.0))
            && (0..self.batch).all(|i| self.column_sum(i).iter().all(|s| libm::fabs(s - 1.0) <= tolerance))
    }

    /// Fail unless the shape is `(modality_count, batch, D)`
    pub fn expect_shape(&self, modality_count: usize, batch: usize) -> FilterResult<()> {
        if self.modality_count != modality_count {
            return Err(FilterError::shape("weight slots", modality_count, self.modality_count));
        }
        if self.batch != batch {
            return Err(FilterError::BatchMismatch { expected: batch, actual: self.batch });
        }
        Ok(())
    }

    /// Keep only `slots`, renormalized to sum to one
    pub fn restrict(&self, slots: &[usize]) -> FilterResult<Self> {
        let mut data = Vec::with_capacity(slots.len() * self.batch);
        for &m in slots {
            if m >= self.modality_count {
                return Err(FilterError::shape("weight slot index", self.modality_count, m));
            }
            data.extend_from_slice(self.slot(m));
        }
        let mut restricted = Self::new(slots.len(), self.batch, data)?;
        restricted.renormalize();
        Ok(restricted)
    }

    /// Divide each column by its sum plus ε
    ///
    /// Columns with no mass become an even split across the slots.
    pub fn renormalize(&mut self) {
        let even = 1.0 / self.modality_count as f64;
        for i in 0..self.batch {
            let sum = self.column_sum(i);
            for m in 0..self.modality_count {
                let w = self.get_mut(m, i);
                for d in 0..D {
                    if sum[d] <= WEIGHT_EPSILON {
                        w[d] = even;
                    } else {
                        w[d] /= sum[d] + WEIGHT_EPSILON;
                    }
                }
            }
        }
    }
}

/// Turn raw scores into weights in place
pub fn normalize_scores<const D: usize>(scores: &mut WeightTensor<D>, policy: WeightingPolicy) {
    let (modality_count, batch, _) = scores.shape();

    for i in 0..batch {
        for d in 0..D {
            match policy {
                WeightingPolicy::Softmax => {
                    // Shift by the max so exp never overflows
                    let max = (0..modality_count)
                        .map(|m| scores.get(m, i)[d])
                        .fold(f64::NEG_INFINITY, f64::max);
                    let mut sum = 0.0;
                    for m in 0..modality_count {
                        let e = libm::exp(scores.get(m, i)[d] - max);
                        scores.get_mut(m, i)[d] = e;
                        sum += e;
                    }
                    for m in 0..modality_count {
                        scores.get_mut(m, i)[d] /= sum;
                    }
                }
                WeightingPolicy::Absolute => {
                    let mut sum = 0.0;
                    for m in 0..modality_count {
                        let a = libm::fabs(scores.get(m, i)[d]);
                        scores.get_mut(m, i)[d] = a;
                        sum += a;
                    }
                    for m in 0..modality_count {
                        scores.get_mut(m, i)[d] /= sum + WEIGHT_EPSILON;
                    }
                }
            }
        }
    }

    scores.renormalize();
}

/// Learned per-slot, per-dimension trust
pub struct CrossmodalWeightModel<const D: usize> {
    encoders: EncoderBank,
    network: Box<dyn WeightNetwork>,
    modality_count: usize,
    policy: WeightingPolicy,
}

impl<const D: usize> CrossmodalWeightModel<D> {
    /// Build a weight model over `modality_count` filter slots
    ///
    /// Needs one encoder for each of image, pos and sensors.
    pub fn new<W>(encoders: Vec<ModalityEncoder>, network: W, modality_count: usize) -> FilterResult<Self>
    where
        W: WeightNetwork + 'static,
    {
        let encoders = EncoderBank::new(encoders)?;
        if encoders.modalities() != ModalitySet::all() {
            return Err(FilterError::InvalidConfig {
                reason: "weight model needs image, pos and sensors encoders",
            });
        }
        if modality_count == 0 {
            return Err(FilterError::InvalidConfig { reason: "weight model needs at least one slot" });
        }

        Ok(Self {
            encoders,
            network: Box::new(network),
            modality_count,
            policy: WeightingPolicy::default(),
        })
    }

    /// Select the normalization policy
    pub fn with_policy(mut self, policy: WeightingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active normalization policy
    pub fn policy(&self) -> WeightingPolicy {
        self.policy
    }

    /// Modalities read, always all three
    pub fn modalities(&self) -> ModalitySet {
        self.encoders.modalities()
    }

    /// Number of filter slots weighted
    pub fn modality_count(&self) -> usize {
        self.modality_count
    }

    /// Compute normalized weights for the whole batch
    pub fn weights(&self, observations: &ObservationBundle) -> FilterResult<WeightTensor<D>> {
        observations.require(&ModalitySet::all())?;
        let n = observations.require_batch_size()?;
        let expected = self.modality_count * D;

        let mut raw = WeightTensor::new(self.modality_count, n, alloc::vec![[0.0; D]; self.modality_count * n])?;
        let mut features = Vec::with_capacity(self.encoders.width());

        for i in 0..n {
            self.encoders.encode(observations, i, &mut features)?;
            let scores = self.network.forward(&features);
            if scores.len() != expected {
                return Err(FilterError::shape("weight network output", expected, scores.len()));
            }

            // Score m·D + d of element i is slot m, dimension d
            for (m, chunk) in scores.chunks_exact(D).enumerate() {
                raw.get_mut(m, i).copy_from_slice(chunk);
            }
        }

        normalize_scores(&mut raw, self.policy);
        Ok(raw)
    }
}

impl<const D: usize> core::fmt::Debug for CrossmodalWeightModel<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CrossmodalWeightModel")
            .field("modality_count", &self.modality_count)
            .field("policy", &self.policy)
            .finish()
    }
}
