//! Fusion Strategies
//!
//! Two strategies sit behind [`FusionStrategy`]:
//!
//! - [`WeightedFusion`] applies the learned weights unchanged.
//! - [`BlackoutAwareFusion`] overrides the learned weights of elements
//!   whose watched modality carries no signal.
//!
//! ## Blackout Override
//!
//! A slot is blacked out for element `i` when every modality it reads is
//! watched and has `‖obs‖₁ < 1e-8`. With `k` of `M` slots blacked out:
//!
//! ```text
//! blacked:  w = 1e-9
//! live:     w = (1 − k·1e-9) · w_learned / Σ_live w_learned
//!           w = (1 − k·1e-9) / (M − k)           if Σ_live w_learned = 0
//! ```
//!
//! For the usual two-slot bank this gives exactly `1e-9` and `1 − 1e-9`.
//! If every slot is blacked out there is nothing to prefer and the
//! learned weights are kept. Elements without a blackout keep their
//! learned weights; the two regimes never mix within an element.
//!
//! The override is only active when every filter is enabled. Any other
//! case falls through to [`WeightedFusion`] so the results are identical.

use alloc::{boxed::Box, vec::Vec};

use super::{combine, FusedEstimate, FusionRequest, FusionStrategy, WeightTensor};
use crate::{
    constants::BLACKOUT_WEIGHT_FLOOR,
    errors::FilterResult,
    modality::{Modality, ModalitySet},
    observation::ObservationBundle,
};

/// Selects a strategy from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FusionStrategyKind {
    /// [`WeightedFusion`]
    #[default]
    Weighted,
    /// [`BlackoutAwareFusion`]
    BlackoutAware,
}

impl FusionStrategyKind {
    /// Instantiate; `watched` is only used by the blackout-aware strategy
    pub fn build<const D: usize>(self, watched: ModalitySet) -> Box<dyn FusionStrategy<D>> {
        match self {
            Self::Weighted => Box::new(WeightedFusion),
            Self::BlackoutAware => Box::new(BlackoutAwareFusion::new(watched)),
        }
    }
}

/// Learned weights, restricted to the enabled filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightedFusion;

impl<const D: usize> FusionStrategy<D> for WeightedFusion {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn fuse(&self, request: FusionRequest<'_, D>) -> FilterResult<FusedEstimate<D>> {
        request.validate()?;

        let weights = if request.all_enabled() {
            request.weights
        } else {
            log_debug!(
                "fusing {} of {} filters, weights renormalized",
                request.active.len(),
                request.slots.len()
            );
            request.weights.restrict(request.active)?
        };

        let state = combine(&weights, request.estimates)?;
        Ok(FusedEstimate { state, weights })
    }
}

/// Forces blank modalities out of the fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlackoutAwareFusion {
    watched: ModalitySet,
}

impl Default for BlackoutAwareFusion {
    fn default() -> Self {
        Self::new(ModalitySet::single(Modality::Image))
    }
}

impl BlackoutAwareFusion {
    /// Watch `watched` for blackouts
    pub fn new(watched: ModalitySet) -> Self {
        Self { watched }
    }

    /// Modalities checked for blackout
    pub fn watched(&self) -> ModalitySet {
        self.watched
    }

    /// Per-element, per-slot blackout flags, `[i][m]`
    pub fn blacked_out_slots(
        &self,
        slots: &[ModalitySet],
        observations: &ObservationBundle,
    ) -> FilterResult<Vec<Vec<bool>>> {
        let n = observations.require_batch_size()?;

        let masks = self
            .watched
            .iter()
            .map(|modality| Ok((modality, observations.blackout_mask(modality)?)))
            .collect::<FilterResult<Vec<(Modality, Vec<bool>)>>>()?;
        let is_blank = |modality: Modality, i: usize| {
            masks.iter().any(|(m, mask)| *m == modality && mask[i])
        };

        Ok((0..n)
            .map(|i| {
                slots
                    .iter()
                    .map(|slot| slot.iter().all(|modality| is_blank(modality, i)))
                    .collect()
            })
            .collect())
    }

    fn override_element<const D: usize>(weights: &mut WeightTensor<D>, i: usize, blacked: &[bool]) {
        let total = blacked.len();
        let k = blacked.iter().filter(|b| **b).count();
        let live_mass = 1.0 - k as f64 * BLACKOUT_WEIGHT_FLOOR;

        for d in 0..D {
            let live_sum: f64 = (0..total)
                .filter(|m| !blacked[*m])
                .map(|m| weights.get(m, i)[d])
                .sum();

            for (m, is_blacked) in blacked.iter().enumerate() {
                let w = &mut weights.get_mut(m, i)[d];
                *w = if *is_blacked {
                    BLACKOUT_WEIGHT_FLOOR
                } else if live_sum > 0.0 {
                    live_mass * *w / live_sum
                } else {
                    live_mass / (total - k) as f64
                };
            }
        }
    }
}

impl<const D: usize> FusionStrategy<D> for BlackoutAwareFusion {
    fn name(&self) -> &'static str {
        "blackout_aware"
    }

    fn fuse(&self, request: FusionRequest<'_, D>) -> FilterResult<FusedEstimate<D>> {
        let n = request.validate()?;

        if !request.all_enabled() {
            log_trace!("blackout override skipped: not all filters enabled");
            return WeightedFusion.fuse(request);
        }

        let blacked = self.blacked_out_slots(request.slots, request.observations)?;
        if !blacked.iter().any(|row| row.iter().any(|b| *b)) {
            log_trace!("blackout override skipped: no blank element");
            return WeightedFusion.fuse(request);
        }

        let mut weights = request.weights;
        let mut overridden = 0usize;
        for (i, row) in blacked.iter().enumerate() {
            if row.iter().all(|b| *b) {
                log_warn!("element {}: every filter blacked out, keeping learned weights", i);
                continue;
            }
            if row.iter().any(|b| *b) {
                Self::override_element(&mut weights, i, row);
                overridden += 1;
            }
        }
        log_debug!("blackout override applied to {} of {} elements", overridden, n);

        weights.expect_shape(request.slots.len(), n)?;
        let state = combine(&weights, request.estimates)?;
        Ok(FusedEstimate { state, weights })
    }
}
