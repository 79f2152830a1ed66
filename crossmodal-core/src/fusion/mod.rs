//! Crossmodal State Fusion
//!
//! ## Overview
//!
//! This module merges the Gaussian estimates of several modality-bound
//! Kalman filters into one posterior. Each filter sees only its own
//! modality subset; a learned weight model, which sees every modality,
//! decides per state dimension how much each filter is trusted.
//!
//! ```text
//! obs ─restrict─→ KF{image}         ─→ (μ₀, P₀) ──┐
//! obs ─restrict─→ KF{pos, sensors}  ─→ (μ₁, P₁) ──┼─→ strategy ─→ (μ, P)
//! obs ──────────→ weight model      ─→  W (M,N,D) ┘
//! ```
//!
//! ## Combination Rule
//!
//! For element `i`, with `wₘ` the weight vector of slot `m`:
//!
//! ```text
//! μ = Σₘ wₘ ⊙ μₘ
//! P = Σₘ diag(√wₘ) · Pₘ · diag(√wₘ)
//! ```
//!
//! The diagonal of `P` is the weighted sum of per-slot variances, which
//! treats the weights as mixture coefficients rather than precisions.
//! Scaling by `diag(√w)` on both sides keeps every term a congruence of
//! a PSD matrix, so the fused covariance is symmetric PSD by construction.
//!
//! ## Strategies
//!
//! - [`WeightedFusion`]: learned weights as-is. Disabled filters are
//!   dropped and the remaining weights renormalized.
//! - [`BlackoutAwareFusion`]: when all filters are enabled and some
//!   element has a blank watched modality, that element's weights are
//!   forced so the blank slot gets `1e-9` and the others share the rest.
//!   Otherwise it behaves exactly like [`WeightedFusion`].
//!
//! ## Modules
//!
//! - [`kalman`]: the per-modality filter recursion
//! - [`weights`]: weight tensor and the learned weight model
//! - [`strategy`]: the two fusion strategies
//! - [`crossmodal`]: the filter bank with state-level fusion
//! - [`measurement`]: measurement-level fusion feeding one filter

pub mod crossmodal;
pub mod kalman;
pub mod measurement;
pub mod strategy;
pub mod weights;

pub use crossmodal::{CrossmodalKalmanFilter, CrossmodalStep, EnabledModels};
pub use kalman::KalmanFilter;
pub use measurement::CrossmodalMeasurementModel;
pub use strategy::{BlackoutAwareFusion, FusionStrategyKind, WeightedFusion};
pub use weights::{normalize_scores, CrossmodalWeightModel, WeightTensor, WeightingPolicy};

use alloc::vec::Vec;

use crate::{
    errors::{FilterError, FilterResult},
    matrix::{SquareMatrix, Vector},
    modality::ModalitySet,
    observation::ObservationBundle,
    state::GaussianBatch,
};

/// Fused posterior together with the weights that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEstimate<const D: usize> {
    /// Fused means and covariances, `(N, D)` and `(N, D, D)`
    pub state: GaussianBatch<D>,
    /// Weights actually applied, one slot per fused estimate
    pub weights: WeightTensor<D>,
}

/// Everything a strategy needs for one step
#[derive(Debug)]
pub struct FusionRequest<'a, const D: usize> {
    /// Estimates of the active slots, in slot order
    pub estimates: &'a [GaussianBatch<D>],
    /// Slot index of each estimate
    pub active: &'a [usize],
    /// Modality subset of every slot, active or not
    pub slots: &'a [ModalitySet],
    /// Learned weights over all slots
    pub weights: WeightTensor<D>,
    /// Full observation bundle of this step
    pub observations: &'a ObservationBundle,
}

impl<const D: usize> FusionRequest<'_, D> {
    /// True when every slot contributed an estimate
    pub fn all_enabled(&self) -> bool {
        self.active.len() == self.slots.len()
    }

    /// Check the request is internally consistent
    fn validate(&self) -> FilterResult<usize> {
        if self.estimates.len() != self.active.len() {
            return Err(FilterError::shape("active estimates", self.active.len(), self.estimates.len()));
        }
        if self.active.is_empty() {
            return Err(FilterError::InvalidConfig { reason: "no enabled filter to fuse" });
        }
        let n = self.observations.require_batch_size()?;
        self.weights.expect_shape(self.slots.len(), n)?;
        Ok(n)
    }
}

/// One way of turning learned weights and estimates into a posterior
pub trait FusionStrategy<const D: usize>: Send + Sync + core::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fuse the active estimates
    fn fuse(&self, request: FusionRequest<'_, D>) -> FilterResult<FusedEstimate<D>>;
}

/// Weighted mean and covariance of `estimates`
///
/// `weights` must hold one slot per estimate and share their batch size.
pub fn combine<const D: usize>(
    weights: &WeightTensor<D>,
    estimates: &[GaussianBatch<D>],
) -> FilterResult<GaussianBatch<D>> {
    if estimates.is_empty() {
        return Err(FilterError::InvalidConfig { reason: "no estimates to fuse" });
    }
    let n = weights.batch();
    weights.expect_shape(estimates.len(), n)?;
    for estimate in estimates {
        estimate.expect_len(n)?;
    }

    let mut means = Vec::with_capacity(n);
    let mut covariances = Vec::with_capacity(n);

    for i in 0..n {
        let mut mean: Vector<D> = [0.0; D];
        let mut covariance: SquareMatrix<D> = [[0.0; D]; D];

        for (m, estimate) in estimates.iter().enumerate() {
            let w = weights.get(m, i);
            let mu = &estimate.means()[i];
            let p = &estimate.covariances()[i];

            let mut root = [0.0; D];
            for d in 0..D {
                mean[d] += w[d] * mu[d];
                root[d] = libm::sqrt(w[d].max(0.0));
            }
            for a in 0..D {
                for b in 0..D {
                    covariance[a][b] += root[a] * p[a][b] * root[b];
                }
            }
        }

        means.push(mean);
        covariances.push(covariance);
    }

    GaussianBatch::new(means, covariances)
}
