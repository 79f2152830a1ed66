//! Crossmodal Filter Configuration
//!
//! [`CrossmodalConfig`] is the plain, serializable form: names are
//! strings so a configuration file can be written by hand. Nothing in it
//! is trusted until [`CrossmodalConfig::validate`] turns it into a
//! [`ValidatedConfig`], which holds parsed modality sets, the weighting
//! policy, the enabled mask and fixed-width noise vectors.
//!
//! ## Defaults (planar push task)
//!
//! | Field                      | Default                          |
//! |----------------------------|----------------------------------|
//! | `weighting`                | `"softmax"`                      |
//! | `filter_modalities`        | `[["image"], ["pos", "sensors"]]`|
//! | `blackout_aware`           | `false`                          |
//! | `blackout_modalities`      | `["image"]`                      |
//! | `enabled`                  | all filters                      |
//! | `measurement_noise_floor`  | `[1e-6, 1e-6]`                   |
//! | `process_noise`            | `[0.02, 0.02]`                   |

use alloc::{
    string::{String, ToString},
    vec,
    vec::Vec,
};

use crate::{
    constants::{DEFAULT_MEASUREMENT_NOISE_FLOOR, DEFAULT_PROCESS_NOISE, POSE_DIM},
    errors::{FilterError, FilterResult},
    fusion::{
        CrossmodalKalmanFilter, CrossmodalWeightModel, EnabledModels, FusionStrategy, FusionStrategyKind,
        KalmanFilter, WeightingPolicy,
    },
    matrix::Vector,
    models::{
        DynamicsNetwork, GatedResidualDynamics, MeasurementHead, MeasurementModel, ModalityEncoder,
        ModalityMeasurementModel, WeightNetwork,
    },
    modality::{Modality, ModalitySet},
    state::vector_from_slice,
};

/// Serializable filter-bank configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CrossmodalConfig {
    /// Weight normalization policy, `softmax` or `absolute`
    pub weighting: String,
    /// Modality names bound to each filter
    pub filter_modalities: Vec<Vec<String>>,
    /// Use the blackout-aware fusion strategy
    pub blackout_aware: bool,
    /// Modalities whose blank frames trigger the override
    pub blackout_modalities: Vec<String>,
    /// Per-filter participation, all enabled when absent
    pub enabled: Option<Vec<bool>>,
    /// Additive measurement-noise variance per dimension
    pub measurement_noise_floor: Vec<f64>,
    /// Fixed process-noise variance per dimension
    pub process_noise: Vec<f64>,
}

impl Default for CrossmodalConfig {
    fn default() -> Self {
        Self {
            weighting: "softmax".to_string(),
            filter_modalities: vec![
                vec!["image".to_string()],
                vec!["pos".to_string(), "sensors".to_string()],
            ],
            blackout_aware: false,
            blackout_modalities: vec!["image".to_string()],
            enabled: None,
            measurement_noise_floor: vec![DEFAULT_MEASUREMENT_NOISE_FLOOR; POSE_DIM],
            process_noise: vec![DEFAULT_PROCESS_NOISE; POSE_DIM],
        }
    }
}

impl CrossmodalConfig {
    /// Set the weighting policy name
    pub fn with_weighting(mut self, policy: &str) -> Self {
        self.weighting = policy.to_string();
        self
    }

    /// Set the modality names of every filter
    pub fn with_filter_modalities(mut self, filters: &[&[&str]]) -> Self {
        self.filter_modalities = filters
            .iter()
            .map(|names| names.iter().map(|n| n.to_string()).collect())
            .collect();
        self
    }

    /// Toggle the blackout-aware strategy
    pub fn with_blackout_awareness(mut self, enabled: bool) -> Self {
        self.blackout_aware = enabled;
        self
    }

    /// Set the watched modalities
    pub fn with_blackout_modalities(mut self, names: &[&str]) -> Self {
        self.blackout_modalities = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set per-filter participation
    pub fn with_enabled(mut self, flags: Vec<bool>) -> Self {
        self.enabled = Some(flags);
        self
    }

    /// Set the measurement-noise floor
    pub fn with_measurement_noise_floor(mut self, floor: Vec<f64>) -> Self {
        self.measurement_noise_floor = floor;
        self
    }

    /// Set the process-noise variances
    pub fn with_process_noise(mut self, variances: Vec<f64>) -> Self {
        self.process_noise = variances;
        self
    }

    /// Parse and check every field for a `D`-dimensional state
    pub fn validate<const D: usize>(&self) -> FilterResult<ValidatedConfig<D>> {
        let weighting: WeightingPolicy = self.weighting.parse()?;

        if self.filter_modalities.is_empty() {
            return Err(FilterError::InvalidConfig { reason: "no filters configured" });
        }
        let slots = self
            .filter_modalities
            .iter()
            .map(|names| ModalitySet::from_names(names.as_slice()))
            .collect::<FilterResult<Vec<_>>>()?;

        let watched = if self.blackout_modalities.is_empty() && !self.blackout_aware {
            ModalitySet::single(Modality::Image)
        } else {
            ModalitySet::from_names(self.blackout_modalities.as_slice())?
        };
        let strategy = if self.blackout_aware {
            FusionStrategyKind::BlackoutAware
        } else {
            FusionStrategyKind::Weighted
        };

        let enabled = match &self.enabled {
            Some(flags) if flags.len() != slots.len() => {
                return Err(FilterError::shape("enabled flags", slots.len(), flags.len()));
            }
            Some(flags) => EnabledModels::from_flags(flags)?,
            None => EnabledModels::all(slots.len()),
        };

        let measurement_noise_floor = non_negative::<D>(&self.measurement_noise_floor)?;
        let process_noise = non_negative::<D>(&self.process_noise)?;

        Ok(ValidatedConfig {
            weighting,
            slots,
            strategy,
            watched,
            enabled,
            measurement_noise_floor,
            process_noise,
        })
    }
}

fn non_negative<const D: usize>(values: &[f64]) -> FilterResult<Vector<D>> {
    let v = vector_from_slice::<D>(values)?;
    if v.iter().any(|x| *x < 0.0 || !x.is_finite()) {
        return Err(FilterError::InvalidConfig { reason: "noise variances must be finite and non-negative" });
    }
    Ok(v)
}

/// Checked configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig<const D: usize> {
    /// Weight normalization policy
    pub weighting: WeightingPolicy,
    /// Modality subset of each filter
    pub slots: Vec<ModalitySet>,
    /// Fusion strategy to build
    pub strategy: FusionStrategyKind,
    /// Modalities watched for blackout
    pub watched: ModalitySet,
    /// Per-filter participation
    pub enabled: EnabledModels,
    /// Additive measurement-noise variance
    pub measurement_noise_floor: Vector<D>,
    /// Fixed process-noise variance
    pub process_noise: Vector<D>,
}

impl<const D: usize> ValidatedConfig<D> {
    /// True when the filters split {image, pos, sensors} without overlap
    pub fn is_partition(&self) -> bool {
        ModalitySet::is_partition(&self.slots)
    }

    /// Instantiate the configured fusion strategy
    pub fn fusion_strategy(&self) -> alloc::boxed::Box<dyn FusionStrategy<D>> {
        self.strategy.build(self.watched)
    }

    /// Gated residual dynamics with the configured process noise
    pub fn dynamics<N: DynamicsNetwork<D>>(&self, network: N) -> FilterResult<GatedResidualDynamics<D, N>> {
        GatedResidualDynamics::new(network).with_process_noise(self.process_noise)
    }

    /// Measurement model for slot `slot`, with the configured floor
    ///
    /// The encoders must cover exactly that slot's modalities.
    pub fn measurement<H: MeasurementHead<D>>(
        &self,
        slot: usize,
        encoders: Vec<ModalityEncoder>,
        head: H,
    ) -> FilterResult<ModalityMeasurementModel<D, H>> {
        let expected = *self
            .slots
            .get(slot)
            .ok_or(FilterError::shape("filter slot", self.slots.len(), slot))?;

        let model = ModalityMeasurementModel::new(encoders, head)?.with_noise_floor(self.measurement_noise_floor);
        if model.modalities() != expected {
            return Err(FilterError::InvalidConfig { reason: "encoders do not match the filter's modalities" });
        }
        Ok(model)
    }

    /// Weight model over the configured slots with the configured policy
    pub fn weight_model<W: WeightNetwork + 'static>(
        &self,
        encoders: Vec<ModalityEncoder>,
        network: W,
    ) -> FilterResult<CrossmodalWeightModel<D>> {
        Ok(CrossmodalWeightModel::new(encoders, network, self.slots.len())?.with_policy(self.weighting))
    }

    /// Assemble a bank; filters must follow the configured slots
    pub fn bank(
        &self,
        filters: Vec<KalmanFilter<D>>,
        weight_model: CrossmodalWeightModel<D>,
    ) -> FilterResult<CrossmodalKalmanFilter<D>> {
        let bound: Vec<ModalitySet> = filters.iter().map(KalmanFilter::modalities).collect();
        if bound != self.slots {
            return Err(FilterError::InvalidConfig { reason: "filters do not match the configured modalities" });
        }

        CrossmodalKalmanFilter::new(filters, weight_model)?
            .with_strategy(self.fusion_strategy())
            .with_enabled(self.enabled)
    }
}
