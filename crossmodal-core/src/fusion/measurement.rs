//! Measurement-Level Fusion
//!
//! Instead of fusing the posteriors of independent filters, this model
//! fuses the measurement predictions of several modality models and
//! feeds the result to a single [`KalmanFilter`](super::KalmanFilter):
//!
//! ```text
//! obs ─→ model{image}        ─→ (z₀, R₀) ┐
//! obs ─→ model{pos, sensors} ─→ (z₁, R₁) ┼─→ strategy.fuse ─→ (z, R) ─→ KF.update
//! obs ─→ weight model        ─→  W       ┘
//! ```
//!
//! The combination rule and the strategies are the same as for
//! state-level fusion, so a blank camera frame is forced out of the
//! measurement just as it is forced out of the bank's posterior. Only one
//! posterior covariance exists, and it flows into the next prediction.

use alloc::{boxed::Box, vec::Vec};

use super::{CrossmodalWeightModel, FusedEstimate, FusionRequest, FusionStrategy, WeightedFusion};
use crate::{
    errors::{FilterError, FilterResult},
    models::{MeasurementBatch, MeasurementModel},
    modality::ModalitySet,
    observation::ObservationBundle,
};

/// Weighted combination of per-subset measurement models
pub struct CrossmodalMeasurementModel<const D: usize> {
    models: Vec<Box<dyn MeasurementModel<D>>>,
    slots: Vec<ModalitySet>,
    active: Vec<usize>,
    weight_model: CrossmodalWeightModel<D>,
    strategy: Box<dyn FusionStrategy<D>>,
}

impl<const D: usize> CrossmodalMeasurementModel<D> {
    /// Combine `models` with one weight slot each
    pub fn new(
        models: Vec<Box<dyn MeasurementModel<D>>>,
        weight_model: CrossmodalWeightModel<D>,
    ) -> FilterResult<Self> {
        if models.is_empty() {
            return Err(FilterError::InvalidConfig { reason: "no measurement models to combine" });
        }
        if weight_model.modality_count() != models.len() {
            return Err(FilterError::shape("weight model slots", models.len(), weight_model.modality_count()));
        }

        let slots = models.iter().map(|m| m.modalities()).collect();
        let active = (0..models.len()).collect();

        Ok(Self {
            models,
            slots,
            active,
            weight_model,
            strategy: Box::new(WeightedFusion),
        })
    }

    /// Replace the fusion strategy
    pub fn with_strategy(mut self, strategy: Box<dyn FusionStrategy<D>>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Modality subset of each model
    pub fn slots(&self) -> &[ModalitySet] {
        &self.slots
    }

    /// Fused measurement together with the weights applied
    pub fn predict_weighted(&self, observations: &ObservationBundle) -> FilterResult<FusedEstimate<D>> {
        let estimates = self
            .models
            .iter()
            .zip(&self.slots)
            .map(|(model, slot)| model.predict(&observations.restrict(slot)?))
            .collect::<FilterResult<Vec<_>>>()?;

        let weights = self.weight_model.weights(observations)?;
        self.strategy.fuse(FusionRequest {
            estimates: &estimates,
            active: &self.active,
            slots: &self.slots,
            weights,
            observations,
        })
    }
}

impl<const D: usize> MeasurementModel<D> for CrossmodalMeasurementModel<D> {
    /// Union of the models' subsets and the weight model's inputs
    fn modalities(&self) -> ModalitySet {
        self.slots
            .iter()
            .fold(self.weight_model.modalities(), |acc, slot| acc.union(slot))
    }

    fn predict(&self, observations: &ObservationBundle) -> FilterResult<MeasurementBatch<D>> {
        Ok(self.predict_weighted(observations)?.state)
    }
}

impl<const D: usize> core::fmt::Debug for CrossmodalMeasurementModel<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CrossmodalMeasurementModel")
            .field("slots", &self.slots)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
