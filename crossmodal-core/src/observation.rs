//! Batched Observations
//!
//! A time step delivers one [`Tensor`] per available modality. All tensors
//! of a step share the batch size `N`; the [`ObservationBundle`] enforces
//! that on insertion so the models downstream can index element `i` of
//! every modality without re-checking.
//!
//! ## Blackout
//!
//! A dropped camera frame arrives as an all-zero image rather than as a
//! missing key. Row `i` of a tensor is *blacked out* when
//!
//! ```text
//! Σ |xᵢⱼ| < BLACKOUT_THRESHOLD (1e-8)
//! ```
//!
//! which distinguishes sensor dropout from a legitimately small reading.

use alloc::vec::Vec;

use heapless::FnvIndexMap;

use crate::{
    constants::BLACKOUT_THRESHOLD,
    errors::{FilterError, FilterResult},
    modality::{Modality, ModalitySet},
};

/// Row-major `(N, width)` tensor of raw readings
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    batch: usize,
    width: usize,
    /// `(height, width)` for image frames, used by spatial pooling
    frame: Option<(usize, usize)>,
    data: Vec<f64>,
}

impl Tensor {
    /// Wrap `batch × width` values
    pub fn new(batch: usize, width: usize, data: Vec<f64>) -> FilterResult<Self> {
        if data.len() != batch * width {
            return Err(FilterError::shape("tensor data", batch * width, data.len()));
        }
        Ok(Self { batch, width, frame: None, data })
    }

    /// Wrap a batch of `height × width` frames
    pub fn image(batch: usize, height: usize, width: usize, data: Vec<f64>) -> FilterResult<Self> {
        let mut tensor = Self::new(batch, height * width, data)?;
        tensor.frame = Some((height, width));
        Ok(tensor)
    }

    /// Build from per-element rows of equal width
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> FilterResult<Self> {
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * width);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(FilterError::shape("tensor row", width, row.len()));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), width, data)
    }

    /// All-zero tensor
    pub fn zeros(batch: usize, width: usize) -> Self {
        Self { batch, width, frame: None, data: alloc::vec![0.0; batch * width] }
    }

    /// Batch size `N`
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Values per element
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame dimensions for image tensors
    pub fn frame_shape(&self) -> Option<(usize, usize)> {
        self.frame
    }

    /// Element `i`
    ///
    /// Panics if `i >= batch`, like slice indexing.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    /// Mutable element `i`
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.width..(i + 1) * self.width]
    }

    /// Iterate over elements
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.batch).map(move |i| self.row(i))
    }

    /// Summed absolute value of element `i`
    pub fn l1_norm(&self, i: usize) -> f64 {
        self.row(i).iter().map(|v| libm::fabs(*v)).sum()
    }

    /// True when element `i` carries no signal
    pub fn is_blackout(&self, i: usize) -> bool {
        self.l1_norm(i) < BLACKOUT_THRESHOLD
    }
}

/// Capacity must be a power of two for `FnvIndexMap`
const BUNDLE_CAPACITY: usize = 4;

/// Modality → tensor map for one time step
#[derive(Debug, Clone, Default)]
pub struct ObservationBundle {
    tensors: FnvIndexMap<Modality, Tensor, BUNDLE_CAPACITY>,
}

impl ObservationBundle {
    /// Empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a modality
    ///
    /// The first tensor fixes the batch size; later ones must match it.
    pub fn insert(&mut self, modality: Modality, tensor: Tensor) -> FilterResult<()> {
        if let Some(expected) = self.batch_size() {
            let replacing_only_entry = self.tensors.len() == 1 && self.tensors.contains_key(&modality);
            if tensor.batch() != expected && !replacing_only_entry {
                return Err(FilterError::BatchMismatch { expected, actual: tensor.batch() });
            }
        }

        self.tensors
            .insert(modality, tensor)
            .map_err(|_| FilterError::InvalidConfig { reason: "observation bundle full" })?;
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, modality: Modality, tensor: Tensor) -> FilterResult<Self> {
        self.insert(modality, tensor)?;
        Ok(self)
    }

    /// Tensor for `modality`
    pub fn get(&self, modality: Modality) -> FilterResult<&Tensor> {
        self.tensors
            .get(&modality)
            .ok_or(FilterError::MissingObservation { modality })
    }

    /// Membership test
    pub fn contains(&self, modality: Modality) -> bool {
        self.tensors.contains_key(&modality)
    }

    /// Shared batch size, `None` for an empty bundle
    pub fn batch_size(&self) -> Option<usize> {
        self.tensors.values().next().map(Tensor::batch)
    }

    /// Batch size, failing on an empty bundle
    pub fn require_batch_size(&self) -> FilterResult<usize> {
        self.batch_size().ok_or(FilterError::EmptyModalitySet)
    }

    /// Modalities present this step
    pub fn available(&self) -> Option<ModalitySet> {
        let present: heapless::Vec<Modality, BUNDLE_CAPACITY> = self.tensors.keys().copied().collect();
        ModalitySet::new(&present).ok()
    }

    /// Fail unless every modality of `required` is present
    pub fn require(&self, required: &ModalitySet) -> FilterResult<()> {
        for modality in required.iter() {
            self.get(modality)?;
        }
        Ok(())
    }

    /// Sub-bundle holding exactly the modalities of `subset`
    pub fn restrict(&self, subset: &ModalitySet) -> FilterResult<ObservationBundle> {
        let mut restricted = ObservationBundle::new();
        for modality in subset.iter() {
            restricted.insert(modality, self.get(modality)?.clone())?;
        }
        Ok(restricted)
    }

    /// Per-element blackout indicator for `modality`
    pub fn blackout_mask(&self, modality: Modality) -> FilterResult<Vec<bool>> {
        let tensor = self.get(modality)?;
        Ok((0..tensor.batch()).map(|i| tensor.is_blackout(i)).collect())
    }
}
