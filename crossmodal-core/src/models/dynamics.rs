//! Gated Residual Dynamics
//!
//! The push dynamics predict a residual update of the pose. The network
//! emits a direction and a scalar gate; the gate is squashed into `(0, 1)`
//! so the model can suppress motion when it is unsure:
//!
//! ```text
//! (d, g) = net(xₖ, uₖ)
//! xₖ₊₁   = xₖ + d · σ(g)
//! ```
//!
//! Process noise is fixed at construction (`Q = diag(0.02, 0.02)` for the
//! push task) and is not data dependent. It is stored factored, and the
//! same factor is handed back for every batch element.

use alloc::vec::Vec;

use super::{sigmoid, DynamicsModel, DynamicsNetwork, DynamicsPrediction};
use crate::{
    constants::DEFAULT_PROCESS_NOISE,
    errors::{FilterError, FilterResult},
    matrix::Vector,
    observation::Tensor,
    state::ScaleTril,
};

/// Residual dynamics with a fixed process-noise factor
#[derive(Debug, Clone)]
pub struct GatedResidualDynamics<const D: usize, N> {
    network: N,
    process_noise: ScaleTril<D>,
}

impl<const D: usize, N: DynamicsNetwork<D>> GatedResidualDynamics<D, N> {
    /// Wrap `network` with the default process noise
    pub fn new(network: N) -> Self {
        let scale = libm::sqrt(DEFAULT_PROCESS_NOISE);
        Self {
            network,
            process_noise: ScaleTril::from_diagonal_scales(&[scale; D]),
        }
    }

    /// Replace the process noise by `diag(variances)`
    pub fn with_process_noise(mut self, variances: Vector<D>) -> FilterResult<Self> {
        self.process_noise = ScaleTril::from_diagonal_variances(&variances)?;
        Ok(self)
    }

    /// Replace the process noise by an explicit factor
    pub fn with_process_noise_factor(mut self, factor: ScaleTril<D>) -> Self {
        self.process_noise = factor;
        self
    }

    /// Fixed process-noise factor
    pub fn process_noise(&self) -> &ScaleTril<D> {
        &self.process_noise
    }
}

impl<const D: usize, N: DynamicsNetwork<D>> DynamicsModel<D> for GatedResidualDynamics<D, N> {
    fn predict(&self, states: &[Vector<D>], controls: &Tensor) -> FilterResult<DynamicsPrediction<D>> {
        if controls.batch() != states.len() {
            return Err(FilterError::BatchMismatch {
                expected: states.len(),
                actual: controls.batch(),
            });
        }

        let next: Vec<Vector<D>> = states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                let (direction, gate_logit) = self.network.forward(state, controls.row(i));
                let gate = sigmoid(gate_logit);

                let mut out = *state;
                for (x, d) in out.iter_mut().zip(direction.iter()) {
                    *x += d * gate;
                }
                out
            })
            .collect();

        let factors = alloc::vec![self.process_noise; states.len()];
        Ok((next, factors))
    }
}
