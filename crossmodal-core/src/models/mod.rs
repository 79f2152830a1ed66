//! Model Contracts for Crossmodal Filtering
//!
//! ## Overview
//!
//! The filters in this crate do not own any learned parameters. Feature
//! extraction, the dynamics network and the measurement heads are
//! external collaborators that plug in through the traits below. The
//! crate fixes only the numeric contract:
//!
//! ```text
//! DynamicsModel:     (states (N, D), controls (N, C)) → (next (N, D), Q factor (N, D, D))
//! MeasurementModel:  observations                      → (z (N, D), R (N, D, D))
//! FeatureEncoder:    modality tensor row               → feature vector (width)
//! ```
//!
//! ## Provided Implementations
//!
//! - [`GatedResidualDynamics`]: residual update gated by a sigmoid, fixed `Q`
//! - [`ModalityMeasurementModel`]: per-modality encoders, shared head,
//!   learned diagonal `R` plus a noise floor
//! - [`LinearEncoder`] / [`PooledImageEncoder`]: reference encoders
//!
//! ## Modality Dispatch
//!
//! Encoders are attached through [`ModalityEncoder`], a closed enum with
//! one variant per modality. An [`EncoderBank`] validates the variants
//! once at construction (non-empty, no duplicates) and afterwards knows
//! exactly which observation keys it will read.

pub mod dynamics;
pub mod encoders;
pub mod measurement;

pub use dynamics::GatedResidualDynamics;
pub use encoders::{EncoderBank, LinearEncoder, ModalityEncoder, PooledImageEncoder};
pub use measurement::ModalityMeasurementModel;

use alloc::vec::Vec;

use crate::{
    errors::FilterResult,
    matrix::Vector,
    modality::ModalitySet,
    observation::{ObservationBundle, Tensor},
    state::{GaussianBatch, ScaleTril},
};

/// Measurement predictions and their noise covariances
pub type MeasurementBatch<const D: usize> = GaussianBatch<D>;

/// Predicted next states with their process-noise factors
pub type DynamicsPrediction<const D: usize> = (Vec<Vector<D>>, Vec<ScaleTril<D>>);

/// State transition model
///
/// Maps each batch element's state and control to a predicted next
/// state plus the lower-triangular factor of the process noise.
pub trait DynamicsModel<const D: usize>: Send + Sync {
    /// Predict next states
    ///
    /// `controls` must hold one row per state.
    fn predict(&self, states: &[Vector<D>], controls: &Tensor) -> FilterResult<DynamicsPrediction<D>>;
}

/// Measurement model bound to a modality subset
pub trait MeasurementModel<const D: usize>: Send + Sync {
    /// Modalities read from the observation bundle
    fn modalities(&self) -> ModalitySet;

    /// Predict state-space measurements and their covariances
    ///
    /// Fails with `MissingObservation` when a bound modality is absent.
    fn predict(&self, observations: &ObservationBundle) -> FilterResult<MeasurementBatch<D>>;
}

/// Encoder turning one modality row into a fixed-width feature vector
pub trait FeatureEncoder: Send + Sync {
    /// Width of the produced feature vector
    fn width(&self) -> usize;

    /// Encode element `i` of `tensor`, appending to `out`
    fn encode(&self, tensor: &Tensor, i: usize, out: &mut Vec<f64>) -> FilterResult<()>;
}

/// Learned part of the gated residual dynamics
pub trait DynamicsNetwork<const D: usize>: Send + Sync {
    /// Update direction and the gate logit for one element
    fn forward(&self, state: &Vector<D>, control: &[f64]) -> (Vector<D>, f64);
}

/// Shared head of a modality measurement model
pub trait MeasurementHead<const D: usize>: Send + Sync {
    /// Measurement prediction `z` and per-dimension noise scale
    fn forward(&self, features: &[f64]) -> (Vector<D>, Vector<D>);
}

/// Fusion network of the weight model
pub trait WeightNetwork: Send + Sync {
    /// Raw scores for one element, `modality_count × D` values laid out
    /// as `[slot 0 dims.., slot 1 dims.., ..]`
    fn forward(&self, features: &[f64]) -> Vec<f64>;
}

/// Logistic squashing into `(0, 1)`
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + libm::exp(-x))
}
