//! Crossmodal Filter Bank
//!
//! Runs one [`KalmanFilter`] per modality subset from a shared prior,
//! scores the observations with the weight model, and hands everything to
//! the configured [`FusionStrategy`]. The fused posterior becomes the
//! prior of every filter on the next step.
//!
//! ```text
//!            ┌→ KF₀.step ─→ (μ₀, P₀) ┐
//! prior ─────┼→ KF₁.step ─→ (μ₁, P₁) ┼─→ strategy.fuse ─→ next prior
//!            └   ...                 ┘        ↑
//! obs ──────────────────→ weight model ─→ W ──┘
//! ```
//!
//! Filters can be disabled at construction through [`EnabledModels`].
//! A disabled filter is not stepped, and its weight slot is dropped
//! before fusion.

use alloc::{boxed::Box, vec::Vec};

use super::{
    CrossmodalWeightModel, FusedEstimate, FusionRequest, FusionStrategy, KalmanFilter, WeightedFusion,
};
use crate::{
    errors::{FilterError, FilterResult},
    modality::ModalitySet,
    observation::{ObservationBundle, Tensor},
    state::GaussianBatch,
};

/// Maximum number of filters a bank can mask
pub const MAX_FILTERS: usize = 32;

/// Immutable per-filter participation mask
///
/// Bit `m` set means filter `m` is stepped and fused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledModels {
    mask: u32,
    count: usize,
}

impl EnabledModels {
    /// Every one of `count` filters enabled
    pub fn all(count: usize) -> Self {
        let count = count.min(MAX_FILTERS);
        let mask = if count == MAX_FILTERS { u32::MAX } else { (1u32 << count) - 1 };
        Self { mask, count }
    }

    /// Build from per-filter flags
    ///
    /// At least one filter must stay enabled.
    pub fn from_flags(flags: &[bool]) -> FilterResult<Self> {
        if flags.len() > MAX_FILTERS {
            return Err(FilterError::shape("enabled flags", MAX_FILTERS, flags.len()));
        }
        let mask = flags
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0u32, |mask, (m, _)| mask | (1 << m));
        if mask == 0 {
            return Err(FilterError::InvalidConfig { reason: "at least one filter must be enabled" });
        }
        Ok(Self { mask, count: flags.len() })
    }

    /// Number of filters described
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when no filter is described
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether filter `m` participates
    pub fn is_enabled(&self, m: usize) -> bool {
        m < self.count && self.mask & (1 << m) != 0
    }

    /// True when no filter is disabled
    pub fn all_enabled(&self) -> bool {
        self.active().len() == self.count
    }

    /// Indices of enabled filters, ascending
    pub fn active(&self) -> Vec<usize> {
        (0..self.count).filter(|m| self.is_enabled(*m)).collect()
    }
}

/// Result of one bank step
#[derive(Debug, Clone, PartialEq)]
pub struct CrossmodalStep<const D: usize> {
    /// Fused posterior and the weights applied
    pub fused: FusedEstimate<D>,
    /// Posterior of each enabled filter, in slot order
    pub unimodal: Vec<GaussianBatch<D>>,
    /// Slot index of each entry of `unimodal`
    pub active: Vec<usize>,
}

/// Bank of modality filters with learned state-level fusion
pub struct CrossmodalKalmanFilter<const D: usize> {
    filters: Vec<KalmanFilter<D>>,
    slots: Vec<ModalitySet>,
    weight_model: CrossmodalWeightModel<D>,
    strategy: Box<dyn FusionStrategy<D>>,
    enabled: EnabledModels,
}

impl<const D: usize> CrossmodalKalmanFilter<D> {
    /// Bind filters to a weight model with one slot per filter
    pub fn new(filters: Vec<KalmanFilter<D>>, weight_model: CrossmodalWeightModel<D>) -> FilterResult<Self> {
        if filters.is_empty() {
            return Err(FilterError::InvalidConfig { reason: "filter bank is empty" });
        }
        if filters.len() > MAX_FILTERS {
            return Err(FilterError::shape("filter bank", MAX_FILTERS, filters.len()));
        }
        if weight_model.modality_count() != filters.len() {
            return Err(FilterError::shape("weight model slots", filters.len(), weight_model.modality_count()));
        }

        let slots = filters.iter().map(KalmanFilter::modalities).collect();
        let enabled = EnabledModels::all(filters.len());

        Ok(Self {
            filters,
            slots,
            weight_model,
            strategy: Box::new(WeightedFusion),
            enabled,
        })
    }

    /// Replace the fusion strategy
    pub fn with_strategy(mut self, strategy: Box<dyn FusionStrategy<D>>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Restrict which filters take part
    pub fn with_enabled(mut self, enabled: EnabledModels) -> FilterResult<Self> {
        if enabled.len() != self.filters.len() {
            return Err(FilterError::shape("enabled flags", self.filters.len(), enabled.len()));
        }
        self.enabled = enabled;
        Ok(self)
    }

    /// The filters, in slot order
    pub fn filters(&self) -> &[KalmanFilter<D>] {
        &self.filters
    }

    /// Modality subset of each slot
    pub fn slots(&self) -> &[ModalitySet] {
        &self.slots
    }

    /// Participation mask
    pub fn enabled(&self) -> EnabledModels {
        self.enabled
    }

    /// The learned weight model
    pub fn weight_model(&self) -> &CrossmodalWeightModel<D> {
        &self.weight_model
    }

    /// Name of the active strategy
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// True when the slots split {image, pos, sensors} without overlap
    pub fn is_partition(&self) -> bool {
        ModalitySet::is_partition(&self.slots)
    }

    /// One predict/update/fuse cycle from `prior`
    pub fn step(
        &self,
        prior: &GaussianBatch<D>,
        controls: &Tensor,
        observations: &ObservationBundle,
    ) -> FilterResult<CrossmodalStep<D>> {
        let n = observations.require_batch_size()?;
        prior.expect_len(n)?;

        let active = self.enabled.active();
        let unimodal = active
            .iter()
            .map(|&m| self.filters[m].step(prior, controls, observations))
            .collect::<FilterResult<Vec<_>>>()?;

        let fused = self.fuse(&unimodal, &active, observations)?;
        Ok(CrossmodalStep { fused, unimodal, active })
    }

    /// Fused belief built from each filter's measurement alone
    pub fn initialize_from_measurement(&self, observations: &ObservationBundle) -> FilterResult<FusedEstimate<D>> {
        let active = self.enabled.active();
        let beliefs = active
            .iter()
            .map(|&m| self.filters[m].initialize_from_measurement(observations))
            .collect::<FilterResult<Vec<_>>>()?;

        self.fuse(&beliefs, &active, observations)
    }

    /// Run `controls.len()` steps, returning the fused belief after each
    pub fn forward_loop(
        &self,
        initial: &GaussianBatch<D>,
        controls: &[Tensor],
        observations: &[ObservationBundle],
    ) -> FilterResult<Vec<GaussianBatch<D>>> {
        if controls.len() != observations.len() {
            return Err(FilterError::shape("trajectory observations", controls.len(), observations.len()));
        }

        let mut trajectory: Vec<GaussianBatch<D>> = Vec::with_capacity(controls.len());
        for (u, obs) in controls.iter().zip(observations) {
            let prior = trajectory.last().unwrap_or(initial);
            let step = self.step(prior, u, obs)?;
            trajectory.push(step.fused.state);
        }
        Ok(trajectory)
    }

    fn fuse(
        &self,
        estimates: &[GaussianBatch<D>],
        active: &[usize],
        observations: &ObservationBundle,
    ) -> FilterResult<FusedEstimate<D>> {
        let weights = self.weight_model.weights(observations)?;
        self.strategy.fuse(FusionRequest {
            estimates,
            active,
            slots: &self.slots,
            weights,
            observations,
        })
    }
}

impl<const D: usize> core::fmt::Debug for CrossmodalKalmanFilter<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CrossmodalKalmanFilter")
            .field("slots", &self.slots)
            .field("strategy", &self.strategy.name())
            .field("enabled", &self.enabled)
            .finish()
    }
}
