//! Constants for Crossmodal Core
//!
//! Numeric thresholds are defined here rather than inline so the weight
//! model, the fusion engine and the tests agree on the same values.

/// Fusion, weighting and noise parameters.
pub mod fusion;

pub use fusion::{
    BLACKOUT_THRESHOLD, BLACKOUT_WEIGHT_FLOOR, DEFAULT_MEASUREMENT_NOISE_FLOOR, DEFAULT_PROCESS_NOISE,
    JACOBIAN_EPSILON, MODALITY_KINDS, POSE_DIM, SINGULAR_PIVOT, WEIGHT_EPSILON, WEIGHT_SUM_TOLERANCE,
};
