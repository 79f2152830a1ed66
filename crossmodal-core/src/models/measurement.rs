//! Modality Measurement Model
//!
//! Maps the observations of a modality subset to a state-space
//! measurement and its noise:
//!
//! ```text
//! f      = concat(enc_m(obs_m) for m in modalities)
//! (z, s) = head(f)
//! R      = diag(s)² + diag(floor)        (learned noise)
//! R      = L·Lᵀ + diag(floor)            (fixed factor L, if configured)
//! ```
//!
//! Squaring the learned scale keeps `R` positive semi-definite whatever
//! the head outputs; the floor keeps it invertible. The floor is only
//! added when its first entry is positive, so a zero floor disables it.

use alloc::vec::Vec;

use super::{EncoderBank, MeasurementBatch, MeasurementHead, MeasurementModel, ModalityEncoder};
use crate::{
    constants::DEFAULT_MEASUREMENT_NOISE_FLOOR,
    errors::FilterResult,
    matrix::{SquareMatrix, Vector},
    modality::ModalitySet,
    observation::ObservationBundle,
    state::ScaleTril,
};

/// Measurement model over one modality subset
#[derive(Debug)]
pub struct ModalityMeasurementModel<const D: usize, H> {
    encoders: EncoderBank,
    head: H,
    noise_floor: Vector<D>,
    fixed_noise: Option<ScaleTril<D>>,
}

impl<const D: usize, H: MeasurementHead<D>> ModalityMeasurementModel<D, H> {
    /// Bind encoders and a head
    ///
    /// Fails when `encoders` is empty or repeats a modality.
    pub fn new(encoders: Vec<ModalityEncoder>, head: H) -> FilterResult<Self> {
        Ok(Self {
            encoders: EncoderBank::new(encoders)?,
            head,
            noise_floor: [DEFAULT_MEASUREMENT_NOISE_FLOOR; D],
            fixed_noise: None,
        })
    }

    /// Additive diagonal noise floor
    pub fn with_noise_floor(mut self, floor: Vector<D>) -> Self {
        self.noise_floor = floor;
        self
    }

    /// Use a fixed noise factor instead of the learned scale
    pub fn with_fixed_noise(mut self, factor: ScaleTril<D>) -> Self {
        self.fixed_noise = Some(factor);
        self
    }

    /// Width of the merged feature vector fed to the head
    pub fn feature_width(&self) -> usize {
        self.encoders.width()
    }

    fn noise(&self, scale: &Vector<D>) -> SquareMatrix<D> {
        let mut r = match &self.fixed_noise {
            Some(factor) => factor.covariance(),
            None => ScaleTril::from_diagonal_scales(scale).covariance(),
        };

        if self.noise_floor[0] > 0.0 {
            for (i, row) in r.iter_mut().enumerate() {
                row[i] += self.noise_floor[i];
            }
        }
        r
    }
}

impl<const D: usize, H: MeasurementHead<D>> MeasurementModel<D> for ModalityMeasurementModel<D, H> {
    fn modalities(&self) -> ModalitySet {
        self.encoders.modalities()
    }

    fn predict(&self, observations: &ObservationBundle) -> FilterResult<MeasurementBatch<D>> {
        observations.require(&self.modalities())?;
        let n = observations.require_batch_size()?;

        let mut measurements = Vec::with_capacity(n);
        let mut covariances = Vec::with_capacity(n);
        let mut features = Vec::with_capacity(self.encoders.width());

        for i in 0..n {
            self.encoders.encode(observations, i, &mut features)?;
            let (z, scale) = self.head.forward(&features);
            measurements.push(z);
            covariances.push(self.noise(&scale));
        }

        MeasurementBatch::new(measurements, covariances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::FilterError,
        models::LinearEncoder,
        modality::Modality,
        observation::Tensor,
    };
    use alloc::{boxed::Box, vec};

    /// First two features are the measurement, scale is constant
    #[derive(Debug)]
    struct PassThroughHead {
        scale: f64,
    }

    impl MeasurementHead<2> for PassThroughHead {
        fn forward(&self, features: &[f64]) -> (Vector<2>, Vector<2>) {
            ([features[0], features[1]], [self.scale; 2])
        }
    }

    fn proprio_model(scale: f64) -> ModalityMeasurementModel<2, PassThroughHead> {
        ModalityMeasurementModel::new(
            vec![
                ModalityEncoder::Pos(Box::new(LinearEncoder::identity(2))),
                ModalityEncoder::Sensors(Box::new(LinearEncoder::identity(1))),
            ],
            PassThroughHead { scale },
        )
        .unwrap()
    }

    fn observations() -> ObservationBundle {
        ObservationBundle::new()
            .with(Modality::Pos, Tensor::from_rows(&[[0.4, -0.2], [1.0, 2.0]]).unwrap()).unwrap()
            .with(Modality::Sensors, Tensor::from_rows(&[[3.0], [4.0]]).unwrap()).unwrap()
    }

    #[test]
    fn learned_noise_is_squared_scale_plus_floor() {
        let model = proprio_model(-0.1);
        assert_eq!(model.feature_width(), 3);
        let batch = model.predict(&observations()).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.means()[0], [0.4, -0.2]);
        let r = batch.covariances()[1];
        assert!((r[0][0] - (0.01 + 1e-6)).abs() < 1e-15);
        assert_eq!(r[0][1], 0.0);
    }

    #[test]
    fn zero_floor_disables_noise_floor() {
        let model = proprio_model(0.0).with_noise_floor([0.0, 0.0]);
        let batch = model.predict(&observations()).unwrap();
        assert_eq!(batch.covariances()[0], [[0.0; 2]; 2]);
    }

    #[test]
    fn fixed_noise_overrides_learned_scale() {
        let model = proprio_model(5.0)
            .with_noise_floor([0.0, 0.0])
            .with_fixed_noise(ScaleTril::from_diagonal_scales(&[0.5, 0.5]));
        let batch = model.predict(&observations()).unwrap();
        assert_eq!(batch.covariances()[0], [[0.25, 0.0], [0.0, 0.25]]);
    }

    #[test]
    fn missing_modality_is_fatal() {
        let model = proprio_model(0.1);
        let obs = ObservationBundle::new()
            .with(Modality::Pos, Tensor::from_rows(&[[0.0, 0.0]]).unwrap())
            .unwrap();
        assert_eq!(
            model.predict(&obs).unwrap_err(),
            FilterError::MissingObservation { modality: Modality::Sensors }
        );
    }

    #[test]
    fn empty_encoder_list_is_rejected() {
        let result = ModalityMeasurementModel::<2, _>::new(Vec::new(), PassThroughHead { scale: 0.1 });
        assert_eq!(result.unwrap_err(), FilterError::EmptyModalitySet);
    }
}
