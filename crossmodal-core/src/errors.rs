//! Error Types for Crossmodal Filtering
//!
//! ## Design Philosophy
//!
//! Every failure in this crate is a precondition violation: a bad
//! configuration or a batch whose shape does not match what a model
//! expects. None of them are transient, so nothing here is retried.
//! The current filtering step is aborted and the error is handed back to
//! the caller.
//!
//! Errors are `Copy` and carry only small inline payloads (`usize`,
//! [`Modality`], `&'static str`), so they can be returned from the
//! per-element loops without allocating.
//!
//! ## Error Categories
//!
//! ### Configuration
//! - `InvalidModality`: a modality name outside {image, pos, sensors}
//! - `EmptyModalitySet`: a filter bound to no modality
//! - `DuplicateModality`: the same modality bound twice
//! - `UnsupportedWeighting`: unknown weighting policy name
//! - `InvalidConfig`: any other inconsistent configuration value
//!
//! ### Shape / contract
//! - `MissingObservation`: observation bundle lacks a required modality
//! - `BatchMismatch`: tensors in one step disagree on batch size `N`
//! - `ShapeMismatch`: a width or length differs from what was configured
//! - `DimensionMismatch`: state vector width differs from `D`
//!
//! ### Numerical
//! - `NotPositiveDefinite`: Cholesky factorization failed
//! - `SingularMatrix`: innovation covariance could not be inverted
//!
//! Numerical edge cases that have a defined local answer (near-zero
//! weight sums, blacked-out modalities) are handled with epsilon floors
//! and are never reported as errors.

use thiserror_no_std::Error;

use crate::modality::Modality;

/// Result type for filtering operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Filtering errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    /// Modality name is not one of `image`, `pos`, `sensors`
    #[error("Invalid modality name (expected image, pos or sensors)")]
    InvalidModality,

    /// A filter or encoder list was configured with no modality
    #[error("Empty modality set")]
    EmptyModalitySet,

    /// The same modality appeared twice where a set was expected
    #[error("Modality {modality} given more than once")]
    DuplicateModality {
        /// Repeated modality
        modality: Modality,
    },

    /// Weighting policy name is not `softmax` or `absolute`
    #[error("Unsupported weighting policy")]
    UnsupportedWeighting,

    /// Configuration value is inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong
        reason: &'static str,
    },

    /// Observation bundle lacks a modality the model requires
    #[error("Observation bundle missing modality {modality}")]
    MissingObservation {
        /// Missing modality
        modality: Modality,
    },

    /// Batch size disagreement between tensors of the same step
    #[error("Batch size mismatch: expected {expected}, got {actual}")]
    BatchMismatch {
        /// Batch size already established for the step
        expected: usize,
        /// Batch size of the offending tensor
        actual: usize,
    },

    /// Tensor width or collection length differs from configuration
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which quantity was checked
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// State vector dimension differs from the filter's `D`
    #[error("State dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured state dimension
        expected: usize,
        /// Dimension that was supplied
        actual: usize,
    },

    /// Matrix is not positive definite
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    /// Matrix could not be inverted
    #[error("Matrix is singular")]
    SingularMatrix,
}

impl FilterError {
    /// True for errors raised while validating configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidModality
                | Self::EmptyModalitySet
                | Self::DuplicateModality { .. }
                | Self::UnsupportedWeighting
                | Self::InvalidConfig { .. }
        )
    }

    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { what, expected, actual }
    }
}
