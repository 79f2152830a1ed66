//! Observation bundles for the planar push task
//!
//! Every scenario is described per element: the camera brightness (zero
//! means a dropped frame), the gripper position and one force reading.

use crossmodal_core::{Modality, ObservationBundle, Tensor};

/// Frame height and width used by all scenarios
pub const FRAME: (usize, usize) = (2, 4);

/// One time step of the push task
#[derive(Debug, Clone)]
pub struct PushStep {
    pub brightness: Vec<f64>,
    pub pos: Vec<[f64; 2]>,
    pub force: Vec<f64>,
}

impl PushStep {
    /// `n` elements with a lit frame, gripper at the origin, no force
    pub fn steady(n: usize) -> Self {
        Self {
            brightness: vec![1.0; n],
            pos: vec![[0.0, 0.0]; n],
            force: vec![0.0; n],
        }
    }

    /// Drop the camera frame of element `i`
    pub fn with_blackout(mut self, i: usize) -> Self {
        self.brightness[i] = 0.0;
        self
    }

    /// Move the gripper of every element to `pos`
    pub fn with_pos(mut self, pos: [f64; 2]) -> Self {
        self.pos.iter_mut().for_each(|p| *p = pos);
        self
    }

    pub fn len(&self) -> usize {
        self.brightness.len()
    }

    /// Batched observation bundle
    pub fn bundle(&self) -> ObservationBundle {
        let (h, w) = FRAME;
        let frames: Vec<f64> = self
            .brightness
            .iter()
            .flat_map(|b| std::iter::repeat(*b).take(h * w))
            .collect();

        ObservationBundle::new()
            .with(Modality::Image, Tensor::image(self.len(), h, w, frames).expect("frame size"))
            .and_then(|b| b.with(Modality::Pos, Tensor::from_rows(self.pos.as_slice()).expect("pos rows")))
            .and_then(|b| {
                let force: Vec<[f64; 1]> = self.force.iter().map(|f| [*f]).collect();
                b.with(Modality::Sensors, Tensor::from_rows(force.as_slice()).expect("force rows"))
            })
            .expect("batch-aligned scenario")
    }
}
