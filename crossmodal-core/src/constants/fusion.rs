//! Fusion Algorithm Constants
//!
//! Thresholds and floors used by the weight model, the fusion engine and
//! the per-modality filters.

// ===== STATE =====

/// State dimension of the planar push task (object x, y).
pub const POSE_DIM: usize = 2;

/// Number of distinct sensing modalities (image, pos, sensors).
pub const MODALITY_KINDS: usize = 3;

// ===== WEIGHTING =====

/// Epsilon added to every per-(element, dimension) weight sum before
/// dividing.
///
/// Keeps the absolute policy finite when all raw scores are zero.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Tolerance used when checking that weights form a partition of unity.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ===== BLACKOUT =====

/// L1 norm below which a modality tensor row is considered blacked out.
///
/// A reading this small is a dropped frame, not a valid zero signal.
pub const BLACKOUT_THRESHOLD: f64 = 1e-8;

/// Weight forced onto a blacked-out modality.
///
/// Kept strictly positive so the fused covariance never loses a slot
/// entirely.
pub const BLACKOUT_WEIGHT_FLOOR: f64 = 1e-9;

// ===== NOISE =====

/// Fixed process-noise variance per state dimension.
///
/// Source: push dynamics model, `Q = diag(0.02, 0.02)`
pub const DEFAULT_PROCESS_NOISE: f64 = 0.02;

/// Additive measurement-noise floor per state dimension.
///
/// Keeps a learned `R` invertible when the predicted scale collapses.
pub const DEFAULT_MEASUREMENT_NOISE_FLOOR: f64 = 1e-6;

/// Step used for central finite-difference Jacobians of the dynamics.
pub const JACOBIAN_EPSILON: f64 = 1e-6;

/// Smallest pivot accepted by the Gauss-Jordan inversion.
pub const SINGULAR_PIVOT: f64 = 1e-12;
