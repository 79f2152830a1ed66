//! Crossmodal Kalman filtering for multi-sensor pose estimation
//!
//! Estimates the planar pose of a pushed object from three sensing
//! channels (camera image, gripper position, gripper force sensors). A
//! bank of Kalman filters, each bound to a subset of the channels, runs
//! from a shared prior; a learned weight model decides per state
//! dimension how far each filter is trusted, and the posteriors are
//! merged into one Gaussian estimate.
//!
//! Key properties:
//! - Weights form a partition of unity for every element and dimension
//! - Covariances are built as `L·Lᵀ` or congruences, never arbitrary
//! - A blank camera frame is forced out of the fusion, not learned away
//! - Every precondition violation is returned as a [`FilterError`]
//!
//! ```no_run
//! use crossmodal_core::{CrossmodalConfig, GaussianBatch, matrix};
//!
//! let config = CrossmodalConfig::default()
//!     .with_blackout_awareness(true)
//!     .validate::<2>()
//!     .unwrap();
//! assert!(config.is_partition());
//!
//! // Build filters and a weight model from `config`, then:
//! let prior = GaussianBatch::<2>::from_prior([0.0; 2], matrix::identity(), 4);
//! # let _ = prior;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

// Optional logging; expands to nothing without the `log` feature
#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

pub mod config;
pub mod constants;
pub mod errors;
pub mod fusion;
pub mod matrix;
pub mod modality;
pub mod models;
pub mod observation;
pub mod state;

// Public API
pub use config::{CrossmodalConfig, ValidatedConfig};
pub use errors::{FilterError, FilterResult};
pub use fusion::{
    combine, BlackoutAwareFusion, CrossmodalKalmanFilter, CrossmodalMeasurementModel, CrossmodalStep,
    CrossmodalWeightModel, EnabledModels, FusedEstimate, FusionRequest, FusionStrategy, FusionStrategyKind,
    KalmanFilter, WeightTensor, WeightedFusion, WeightingPolicy,
};
pub use modality::{Modality, ModalitySet};
pub use models::{
    DynamicsModel, DynamicsNetwork, FeatureEncoder, GatedResidualDynamics, LinearEncoder, MeasurementHead,
    MeasurementModel, ModalityEncoder, ModalityMeasurementModel, PooledImageEncoder, WeightNetwork,
};
pub use observation::{ObservationBundle, Tensor};
pub use state::{GaussianBatch, ScaleTril};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
