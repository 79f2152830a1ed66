//! Gaussian State Estimates
//!
//! Covariances are never accepted as arbitrary matrices from a model.
//! Models hand back a lower-triangular factor `L` ([`ScaleTril`]) and the
//! covariance is recovered as `L·Lᵀ`, which is symmetric positive
//! semi-definite by construction.
//!
//! A [`GaussianBatch`] holds one mean and one covariance per batch
//! element. Each filtering step produces a fresh batch; nothing here is
//! updated in place across steps.

use alloc::vec::Vec;

use crate::{
    errors::{FilterError, FilterResult},
    matrix::{self, SquareMatrix, Vector},
};

/// Copy a runtime slice into a `D`-vector
///
/// Fails with `DimensionMismatch` when the slice width is not `D`.
pub fn vector_from_slice<const D: usize>(values: &[f64]) -> FilterResult<Vector<D>> {
    if values.len() != D {
        return Err(FilterError::DimensionMismatch { expected: D, actual: values.len() });
    }
    let mut v = [0.0; D];
    v.copy_from_slice(values);
    Ok(v)
}

/// Lower-triangular covariance factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTril<const D: usize>(SquareMatrix<D>);

impl<const D: usize> ScaleTril<D> {
    /// Take the lower triangle of `m`; entries above the diagonal are
    /// dropped.
    pub fn lower(m: SquareMatrix<D>) -> Self {
        let mut l = m;
        for (i, row) in l.iter_mut().enumerate() {
            for value in row.iter_mut().skip(i + 1) {
                *value = 0.0;
            }
        }
        Self(l)
    }

    /// Diagonal factor with the given per-dimension scales (standard
    /// deviations)
    pub fn from_diagonal_scales(scales: &Vector<D>) -> Self {
        Self(matrix::diagonal(scales))
    }

    /// Factor of `diag(variances)`
    pub fn from_diagonal_variances(variances: &Vector<D>) -> FilterResult<Self> {
        let mut scales = [0.0; D];
        for (scale, variance) in scales.iter_mut().zip(variances) {
            if *variance < 0.0 {
                return Err(FilterError::NotPositiveDefinite);
            }
            *scale = libm::sqrt(*variance);
        }
        Ok(Self::from_diagonal_scales(&scales))
    }

    /// Cholesky factor of a covariance
    pub fn from_covariance(covariance: &SquareMatrix<D>) -> FilterResult<Self> {
        matrix::cholesky(covariance)
            .map(Self)
            .ok_or(FilterError::NotPositiveDefinite)
    }

    /// The factor `L`
    pub fn factor(&self) -> &SquareMatrix<D> {
        &self.0
    }

    /// `L·Lᵀ`
    pub fn covariance(&self) -> SquareMatrix<D> {
        matrix::outer_square(&self.0)
    }
}

/// Batched means and covariances, `(N, D)` and `(N, D, D)`
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBatch<const D: usize> {
    means: Vec<Vector<D>>,
    covariances: Vec<SquareMatrix<D>>,
}

impl<const D: usize> GaussianBatch<D> {
    /// Pair means with covariances
    pub fn new(means: Vec<Vector<D>>, covariances: Vec<SquareMatrix<D>>) -> FilterResult<Self> {
        if means.len() != covariances.len() {
            return Err(FilterError::shape("covariance batch", means.len(), covariances.len()));
        }
        Ok(Self { means, covariances })
    }

    /// Means paired with factored covariances
    pub fn from_factors(means: Vec<Vector<D>>, factors: &[ScaleTril<D>]) -> FilterResult<Self> {
        Self::new(means, factors.iter().map(ScaleTril::covariance).collect())
    }

    /// Replicate one belief across a batch of `n`
    pub fn from_prior(mean: Vector<D>, covariance: SquareMatrix<D>, n: usize) -> Self {
        Self {
            means: alloc::vec![mean; n],
            covariances: alloc::vec![covariance; n],
        }
    }

    /// Batch size `N`
    pub fn len(&self) -> usize {
        self.means.len()
    }

    /// True for an empty batch
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Means, `(N, D)`
    pub fn means(&self) -> &[Vector<D>] {
        &self.means
    }

    /// Covariances, `(N, D, D)`
    pub fn covariances(&self) -> &[SquareMatrix<D>] {
        &self.covariances
    }

    /// Mean and covariance of element `i`
    pub fn get(&self, i: usize) -> Option<(&Vector<D>, &SquareMatrix<D>)> {
        Some((self.means.get(i)?, self.covariances.get(i)?))
    }

    /// Fail unless the batch holds `expected` elements
    pub fn expect_len(&self, expected: usize) -> FilterResult<()> {
        if self.len() != expected {
            return Err(FilterError::BatchMismatch { expected, actual: self.len() });
        }
        Ok(())
    }

    /// Every covariance symmetric with a non-negative diagonal
    pub fn is_valid(&self, tolerance: f64) -> bool {
        self.covariances.iter().all(|c| {
            matrix::is_symmetric(c, tolerance) && matrix::diag(c).iter().all(|v| *v >= -tolerance)
        })
    }

    /// Split into means and covariances
    pub fn into_parts(self) -> (Vec<Vector<D>>, Vec<SquareMatrix<D>>) {
        (self.means, self.covariances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn slice_width_must_match_state_dim() {
        assert_eq!(vector_from_slice::<2>(&[1.0, 2.0]), Ok([1.0, 2.0]));
        assert_eq!(
            vector_from_slice::<2>(&[1.0, 2.0, 3.0]),
            Err(FilterError::DimensionMismatch { expected: 2, actual: 3 })
        );
    }

    #[test]
    fn lower_drops_upper_triangle() {
        let l = ScaleTril::lower([[1.0, 5.0], [2.0, 3.0]]);
        assert_eq!(l.factor(), &[[1.0, 0.0], [2.0, 3.0]]);
        // L·Lᵀ = [[1, 2], [2, 13]]
        assert_eq!(l.covariance(), [[1.0, 2.0], [2.0, 13.0]]);
    }

    #[test]
    fn diagonal_variances_round_trip_through_factor() {
        let l = ScaleTril::from_diagonal_variances(&[0.02, 0.02]).unwrap();
        let cov = l.covariance();
        assert!((cov[0][0] - 0.02).abs() < 1e-15);
        assert_eq!(cov[0][1], 0.0);

        assert_eq!(
            ScaleTril::from_diagonal_variances(&[0.1, -0.1]),
            Err(FilterError::NotPositiveDefinite)
        );
    }

    #[test]
    fn batch_lengths_must_agree() {
        let err = GaussianBatch::<2>::new(vec![[0.0; 2]; 3], vec![[[0.0; 2]; 2]; 2]).unwrap_err();
        assert_eq!(err, FilterError::ShapeMismatch { what: "covariance batch", expected: 3, actual: 2 });
    }

    #[test]
    fn prior_is_replicated() {
        let batch = GaussianBatch::from_prior([1.0, 2.0], [[0.1, 0.0], [0.0, 0.1]], 4);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.get(3).unwrap().0, &[1.0, 2.0]);
        assert!(batch.is_valid(1e-12));
        assert_eq!(
            batch.expect_len(5),
            Err(FilterError::BatchMismatch { expected: 5, actual: 4 })
        );
    }

    #[test]
    fn covariance_factor_round_trips() {
        let cov = [[4.0, 2.0], [2.0, 3.0]];
        let l = ScaleTril::from_covariance(&cov).unwrap();

        let factor = l.factor();
        assert_eq!(factor[0], [2.0, 0.0]);
        assert_eq!(factor[1][0], 1.0);
        assert!((factor[1][1] - libm::sqrt(2.0)).abs() < 1e-12);

        let back = l.covariance();
        for (row, expected) in back.iter().zip(&cov) {
            for (v, e) in row.iter().zip(expected) {
                assert!((v - e).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn indefinite_covariance_has_no_factor() {
        assert_eq!(
            ScaleTril::from_covariance(&[[1.0, 2.0], [2.0, 1.0]]),
            Err(FilterError::NotPositiveDefinite)
        );
        assert_eq!(
            ScaleTril::<2>::from_covariance(&[[0.0; 2]; 2]),
            Err(FilterError::NotPositiveDefinite)
        );
    }

    #[test]
    fn into_parts_keeps_order() {
        let covariances = vec![matrix::identity(), [[2.0, 0.0], [0.0, 2.0]]];
        let batch = GaussianBatch::new(vec![[1.0, 0.0], [2.0, 0.0]], covariances).unwrap();
        let (means, covariances) = batch.into_parts();
        assert_eq!(means, vec![[1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(covariances[1][1][1], 2.0);
    }
}
