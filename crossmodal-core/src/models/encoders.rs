//! Modality Feature Encoders
//!
//! Each modality gets a dedicated encoder producing a fixed-width feature
//! vector. Encoders of a model are concatenated in canonical modality
//! order (image, pos, sensors), so the layout of the merged feature
//! vector never depends on the order the caller listed them in.
//!
//! ```text
//! image   (N, H·W) ──PooledImageEncoder──┐
//! pos     (N, 3)   ──LinearEncoder───────┼──concat──→ (N, Σ widths)
//! sensors (N, 7)   ──LinearEncoder───────┘
//! ```

use alloc::{boxed::Box, vec::Vec};

use super::FeatureEncoder;
use crate::{
    errors::{FilterError, FilterResult},
    modality::{Modality, ModalitySet},
    observation::{ObservationBundle, Tensor},
};

/// Encoder attached to exactly one modality
pub enum ModalityEncoder {
    /// Camera frame encoder (spatially pooled)
    Image(Box<dyn FeatureEncoder>),
    /// Gripper position encoder
    Pos(Box<dyn FeatureEncoder>),
    /// Force / tactile encoder
    Sensors(Box<dyn FeatureEncoder>),
}

impl ModalityEncoder {
    /// Modality this encoder reads
    pub fn modality(&self) -> Modality {
        match self {
            Self::Image(_) => Modality::Image,
            Self::Pos(_) => Modality::Pos,
            Self::Sensors(_) => Modality::Sensors,
        }
    }

    /// The wrapped encoder
    pub fn encoder(&self) -> &dyn FeatureEncoder {
        match self {
            Self::Image(e) | Self::Pos(e) | Self::Sensors(e) => e.as_ref(),
        }
    }

    /// Feature width
    pub fn width(&self) -> usize {
        self.encoder().width()
    }
}

impl core::fmt::Debug for ModalityEncoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModalityEncoder")
            .field("modality", &self.modality())
            .field("width", &self.width())
            .finish()
    }
}

/// Validated set of modality encoders in canonical order
#[derive(Debug)]
pub struct EncoderBank {
    encoders: Vec<ModalityEncoder>,
    modalities: ModalitySet,
    width: usize,
}

impl EncoderBank {
    /// Validate and order encoders
    ///
    /// Fails on an empty list, on two encoders for the same modality or
    /// on an encoder that produces no features.
    pub fn new(mut encoders: Vec<ModalityEncoder>) -> FilterResult<Self> {
        let listed: Vec<Modality> = encoders.iter().map(ModalityEncoder::modality).collect();
        let modalities = ModalitySet::new(&listed)?;
        if encoders.iter().any(|e| e.width() == 0) {
            return Err(FilterError::InvalidConfig { reason: "encoder produces no features" });
        }

        encoders.sort_by_key(|e| e.modality().index());
        let width = encoders.iter().map(ModalityEncoder::width).sum();

        Ok(Self { encoders, modalities, width })
    }

    /// Modalities covered
    pub fn modalities(&self) -> ModalitySet {
        self.modalities
    }

    /// Width of the concatenated feature vector
    pub fn width(&self) -> usize {
        self.width
    }

    /// Concatenated features of element `i`, written into `out`
    pub fn encode(&self, observations: &ObservationBundle, i: usize, out: &mut Vec<f64>) -> FilterResult<()> {
        out.clear();
        for encoder in &self.encoders {
            let tensor = observations.get(encoder.modality())?;
            let before = out.len();
            encoder.encoder().encode(tensor, i, out)?;

            let written = out.len() - before;
            if written != encoder.width() {
                return Err(FilterError::shape("encoder output", encoder.width(), written));
            }
        }
        Ok(())
    }
}

/// Dense layer `y = W·x + b`, optionally followed by ReLU
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEncoder {
    input: usize,
    output: usize,
    /// Row-major `(output, input)`
    weights: Vec<f64>,
    bias: Vec<f64>,
    relu: bool,
}

impl LinearEncoder {
    /// Build from row-major weights and a bias
    pub fn new(input: usize, output: usize, weights: Vec<f64>, bias: Vec<f64>) -> FilterResult<Self> {
        if input == 0 || output == 0 {
            return Err(FilterError::InvalidConfig { reason: "encoder widths must be non-zero" });
        }
        if weights.len() != input * output {
            return Err(FilterError::shape("encoder weights", input * output, weights.len()));
        }
        if bias.len() != output {
            return Err(FilterError::shape("encoder bias", output, bias.len()));
        }
        Ok(Self { input, output, weights, bias, relu: false })
    }

    /// Pass-through encoder of the given width
    ///
    /// A zero width yields an encoder that [`EncoderBank`] rejects.
    pub fn identity(width: usize) -> Self {
        let mut weights = alloc::vec![0.0; width * width];
        for i in 0..width {
            weights[i * width + i] = 1.0;
        }
        Self { input: width, output: width, weights, bias: alloc::vec![0.0; width], relu: false }
    }

    /// Clamp negative activations to zero
    pub fn with_relu(mut self) -> Self {
        self.relu = true;
        self
    }

    /// Expected input width
    pub fn input_width(&self) -> usize {
        self.input
    }

    fn apply(&self, x: &[f64], out: &mut Vec<f64>) {
        for (r, b) in self.bias.iter().enumerate() {
            let row = &self.weights[r * self.input..(r + 1) * self.input];
            let y = row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b;
            out.push(if self.relu { y.max(0.0) } else { y });
        }
    }
}

impl FeatureEncoder for LinearEncoder {
    fn width(&self) -> usize {
        self.output
    }

    fn encode(&self, tensor: &Tensor, i: usize, out: &mut Vec<f64>) -> FilterResult<()> {
        if tensor.width() != self.input {
            return Err(FilterError::shape("encoder input", self.input, tensor.width()));
        }
        self.apply(tensor.row(i), out);
        Ok(())
    }
}

/// Average-pools a frame onto a `rows × cols` grid, then applies a dense
/// head
#[derive(Debug, Clone, PartialEq)]
pub struct PooledImageEncoder {
    rows: usize,
    cols: usize,
    head: LinearEncoder,
}

impl PooledImageEncoder {
    /// Pool onto `rows × cols` cells; `head` must take `rows · cols` inputs
    pub fn new(rows: usize, cols: usize, head: LinearEncoder) -> FilterResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(FilterError::InvalidConfig { reason: "pooling grid must be non-empty" });
        }
        if head.input_width() != rows * cols {
            return Err(FilterError::shape("pooling head input", rows * cols, head.input_width()));
        }
        Ok(Self { rows, cols, head })
    }

    /// Pooled cell averages of one frame
    fn pool(&self, frame: &[f64], height: usize, width: usize) -> Vec<f64> {
        let mut cells = Vec::with_capacity(self.rows * self.cols);
        for r in 0..self.rows {
            let (r0, r1) = (r * height / self.rows, (r + 1) * height / self.rows);
            for c in 0..self.cols {
                let (c0, c1) = (c * width / self.cols, (c + 1) * width / self.cols);
                let mut sum = 0.0;
                for y in r0..r1 {
                    sum += frame[y * width + c0..y * width + c1].iter().sum::<f64>();
                }
                let count = ((r1 - r0) * (c1 - c0)) as f64;
                cells.push(sum / count);
            }
        }
        cells
    }
}

impl FeatureEncoder for PooledImageEncoder {
    fn width(&self) -> usize {
        self.head.width()
    }

    fn encode(&self, tensor: &Tensor, i: usize, out: &mut Vec<f64>) -> FilterResult<()> {
        let (height, width) = tensor
            .frame_shape()
            .ok_or(FilterError::InvalidConfig { reason: "image tensor without frame shape" })?;
        if height < self.rows || width < self.cols {
            return Err(FilterError::shape("image frame rows", self.rows, height));
        }

        let pooled = self.pool(tensor.row(i), height, width);
        self.head.apply(&pooled, out);
        Ok(())
    }
}
