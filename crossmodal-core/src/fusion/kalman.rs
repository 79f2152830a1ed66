//! Per-Modality Kalman Filter
//!
//! ## Overview
//!
//! One `KalmanFilter` is bound to a modality subset through its
//! measurement model. It owns no belief: every call takes the previous
//! batch of means and covariances and returns a new one, so a bank of
//! filters can run over the same prior in any order.
//!
//! ## Recursion
//!
//! ### 1. Prediction (locally linearized)
//! ```text
//! x̂ₖ|ₖ₋₁ = f(xₖ₋₁, uₖ)
//! Fₖ      = ∂f/∂x  (central finite differences)
//! Pₖ|ₖ₋₁ = Fₖ·Pₖ₋₁·Fₖᵀ + Q·Qᵀ
//! ```
//!
//! ### 2. Update (measurement lives in state space, H = I)
//! ```text
//! yₖ = zₖ - x̂ₖ|ₖ₋₁
//! Sₖ = Pₖ|ₖ₋₁ + Rₖ
//! Kₖ = Pₖ|ₖ₋₁·Sₖ⁻¹
//! xₖ = x̂ₖ|ₖ₋₁ + Kₖ·yₖ
//! Pₖ = (I - Kₖ)·Pₖ|ₖ₋₁·(I - Kₖ)ᵀ + Kₖ·Rₖ·Kₖᵀ      (Joseph form)
//! ```
//!
//! Both covariances are symmetrized after each phase.

use alloc::{boxed::Box, vec::Vec};

use crate::{
    constants::JACOBIAN_EPSILON,
    errors::{FilterError, FilterResult},
    matrix::{self, SquareMatrix, Vector},
    models::{DynamicsModel, MeasurementModel},
    modality::ModalitySet,
    observation::{ObservationBundle, Tensor},
    state::GaussianBatch,
};

/// Kalman filter over a `D`-dimensional state
pub struct KalmanFilter<const D: usize> {
    dynamics: Box<dyn DynamicsModel<D>>,
    measurement: Box<dyn MeasurementModel<D>>,
    jacobian_epsilon: f64,
}

impl<const D: usize> KalmanFilter<D> {
    /// Create a filter from boxed models
    pub fn new(dynamics: Box<dyn DynamicsModel<D>>, measurement: Box<dyn MeasurementModel<D>>) -> Self {
        Self {
            dynamics,
            measurement,
            jacobian_epsilon: JACOBIAN_EPSILON,
        }
    }

    /// Create a filter from concrete models
    pub fn from_models<F, M>(dynamics: F, measurement: M) -> Self
    where
        F: DynamicsModel<D> + 'static,
        M: MeasurementModel<D> + 'static,
    {
        Self::new(Box::new(dynamics), Box::new(measurement))
    }

    /// Finite-difference step for the dynamics Jacobian
    pub fn with_jacobian_epsilon(mut self, epsilon: f64) -> Self {
        self.jacobian_epsilon = epsilon;
        self
    }

    /// Modalities consumed by the update step
    pub fn modalities(&self) -> ModalitySet {
        self.measurement.modalities()
    }

    /// Prediction step
    pub fn predict(&self, prior: &GaussianBatch<D>, controls: &Tensor) -> FilterResult<GaussianBatch<D>> {
        let (means, factors) = self.dynamics.predict(prior.means(), controls)?;
        if means.len() != prior.len() || factors.len() != prior.len() {
            return Err(FilterError::shape("dynamics output", prior.len(), means.len().min(factors.len())));
        }

        let jacobians = self.dynamics_jacobians(prior.means(), controls)?;

        let covariances = prior
            .covariances()
            .iter()
            .zip(&jacobians)
            .zip(&factors)
            .map(|((p, f), q)| {
                let mut cov = matrix::add(&matrix::congruence(f, p), &q.covariance());
                matrix::make_symmetric(&mut cov);
                cov
            })
            .collect();

        GaussianBatch::new(means, covariances)
    }

    /// Update step
    ///
    /// Only the modalities this filter is bound to are forwarded to its
    /// measurement model.
    pub fn update(
        &self,
        predicted: &GaussianBatch<D>,
        observations: &ObservationBundle,
    ) -> FilterResult<GaussianBatch<D>> {
        let restricted = observations.restrict(&self.modalities())?;
        let measurement = self.measurement.predict(&restricted)?;
        measurement.expect_len(predicted.len())?;

        let mut means = Vec::with_capacity(predicted.len());
        let mut covariances = Vec::with_capacity(predicted.len());

        for i in 0..predicted.len() {
            let x = &predicted.means()[i];
            let p = &predicted.covariances()[i];
            let z = &measurement.means()[i];
            let r = &measurement.covariances()[i];

            let (mean, cov) = Self::update_one(x, p, z, r)?;
            means.push(mean);
            covariances.push(cov);
        }

        GaussianBatch::new(means, covariances)
    }

    /// Predict then update
    pub fn step(
        &self,
        prior: &GaussianBatch<D>,
        controls: &Tensor,
        observations: &ObservationBundle,
    ) -> FilterResult<GaussianBatch<D>> {
        let predicted = self.predict(prior, controls)?;
        self.update(&predicted, observations)
    }

    /// Belief taken directly from the measurement model
    ///
    /// Used to start a trajectory from the first observation instead of
    /// a hand-picked prior.
    pub fn initialize_from_measurement(&self, observations: &ObservationBundle) -> FilterResult<GaussianBatch<D>> {
        let restricted = observations.restrict(&self.modalities())?;
        self.measurement.predict(&restricted)
    }

    fn update_one(
        x: &Vector<D>,
        p: &SquareMatrix<D>,
        z: &Vector<D>,
        r: &SquareMatrix<D>,
    ) -> FilterResult<(Vector<D>, SquareMatrix<D>)> {
        // Innovation: y = z - x̂
        let mut innovation = [0.0; D];
        for j in 0..D {
            innovation[j] = z[j] - x[j];
        }

        // Kalman gain: K = P·S⁻¹
        let s = matrix::add(p, r);
        let s_inv = matrix::invert(&s).ok_or(FilterError::SingularMatrix)?;
        let gain = matrix::multiply(p, &s_inv);

        // State update: x̂ = x̂ + K·y
        let correction = matrix::matvec(&gain, &innovation);
        let mut mean = *x;
        for j in 0..D {
            mean[j] += correction[j];
        }

        // Joseph form: P = (I - K)·P·(I - K)ᵀ + K·R·Kᵀ
        let i_k = matrix::sub(&matrix::identity::<D>(), &gain);
        let mut cov = matrix::add(&matrix::congruence(&i_k, p), &matrix::congruence(&gain, r));
        matrix::make_symmetric(&mut cov);

        Ok((mean, cov))
    }

    /// Jacobian of the dynamics at each state, by central differences
    fn dynamics_jacobians(&self, states: &[Vector<D>], controls: &Tensor) -> FilterResult<Vec<SquareMatrix<D>>> {
        let mut jacobians = alloc::vec![[[0.0; D]; D]; states.len()];
        let eps = self.jacobian_epsilon;

        for j in 0..D {
            let plus: Vec<Vector<D>> = states.iter().map(|s| { let mut s = *s; s[j] += eps; s }).collect();
            let minus: Vec<Vector<D>> = states.iter().map(|s| { let mut s = *s; s[j] -= eps; s }).collect();

            let (f_plus, _) = self.dynamics.predict(&plus, controls)?;
            let (f_minus, _) = self.dynamics.predict(&minus, controls)?;

            for (jac, (fp, fm)) in jacobians.iter_mut().zip(f_plus.iter().zip(&f_minus)) {
                for i in 0..D {
                    jac[i][j] = (fp[i] - fm[i]) / (2.0 * eps);
                }
            }
        }

        Ok(jacobians)
    }
}

impl<const D: usize> core::fmt::Debug for KalmanFilter<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KalmanFilter")
            .field("state_dim", &D)
            .field("modalities", &self.modalities())
            .finish()
    }
}
