//! Common fixtures for integration tests
//!
//! This module provides:
//! - Stub networks standing in for the learned collaborators
//! - Push-task filter banks assembled from a validated configuration
//! - Deterministic generators for random beliefs and weights
//! - Tolerance assertions

#![allow(dead_code)]

use crossmodal_core::{
    matrix::Vector, CrossmodalKalmanFilter, DynamicsNetwork, FilterResult, KalmanFilter, LinearEncoder,
    MeasurementHead, ModalityEncoder, PooledImageEncoder, ValidatedConfig, WeightNetwork,
};

pub mod generators;
pub mod scenarios;

#[macro_export]
macro_rules! assert_within_tolerance {
    ($actual:expr, $expected:expr, $tolerance:expr) => {
        let diff = (($actual) - ($expected)).abs();
        assert!(
            diff <= $tolerance,
            "Value {} not within {} of expected {}",
            $actual,
            $tolerance,
            $expected
        );
    };
}

/// Weight network returning the same raw scores for every element
pub struct FixedScores(pub Vec<f64>);

impl WeightNetwork for FixedScores {
    fn forward(&self, _features: &[f64]) -> Vec<f64> {
        self.0.clone()
    }
}

/// Moves along the first two control entries, gated by a fixed logit
pub struct ControlPush {
    pub gate_logit: f64,
}

impl DynamicsNetwork<2> for ControlPush {
    fn forward(&self, _state: &Vector<2>, control: &[f64]) -> (Vector<2>, f64) {
        ([control[0], control[1]], self.gate_logit)
    }
}

/// Reads the first two features as the measurement
pub struct ReadoutHead {
    pub offset: f64,
    pub scale: f64,
}

impl MeasurementHead<2> for ReadoutHead {
    fn forward(&self, features: &[f64]) -> (Vector<2>, Vector<2>) {
        ([features[0] + self.offset, features[1] + self.offset], [self.scale; 2])
    }
}

/// Image pooled onto a 1×2 grid: left and right half means
pub fn image_encoder() -> ModalityEncoder {
    let pooled = PooledImageEncoder::new(1, 2, LinearEncoder::identity(2)).expect("valid pooling grid");
    ModalityEncoder::Image(Box::new(pooled))
}

pub fn pos_encoder() -> ModalityEncoder {
    ModalityEncoder::Pos(Box::new(LinearEncoder::identity(2)))
}

pub fn sensors_encoder() -> ModalityEncoder {
    ModalityEncoder::Sensors(Box::new(LinearEncoder::identity(1)))
}

/// All three encoders, as the weight model needs them
pub fn weight_encoders() -> Vec<ModalityEncoder> {
    vec![image_encoder(), pos_encoder(), sensors_encoder()]
}

/// `{image}` and `{pos, sensors}` filters sharing the same dynamics
///
/// The image filter measures the pooled frame shifted by `image_offset`,
/// the proprioceptive filter measures the gripper position.
pub fn push_bank(
    config: &ValidatedConfig<2>,
    scores: Vec<f64>,
    image_offset: f64,
) -> FilterResult<CrossmodalKalmanFilter<2>> {
    let image = KalmanFilter::from_models(
        config.dynamics(ControlPush { gate_logit: 0.0 })?,
        config.measurement(0, vec![image_encoder()], ReadoutHead { offset: image_offset, scale: 0.1 })?,
    );
    let proprio = KalmanFilter::from_models(
        config.dynamics(ControlPush { gate_logit: 0.0 })?,
        config.measurement(1, vec![pos_encoder(), sensors_encoder()], ReadoutHead { offset: 0.0, scale: 0.1 })?,
    );
    let weights = config.weight_model(weight_encoders(), FixedScores(scores))?;

    config.bank(vec![image, proprio], weights)
}
