//! Fixed-size linear algebra for the filtering recursion
//!
//! Provides the small dense operations needed by the Kalman update and
//! the fusion rule without heap allocation. All operations work on
//! const-generic arrays, so a `D = 2` pose filter compiles down to
//! straight-line code.

use crate::constants::SINGULAR_PIVOT;

/// Matrix type using const generics
pub type Matrix<const R: usize, const C: usize> = [[f64; C]; R];

/// Square matrix type
pub type SquareMatrix<const N: usize> = Matrix<N, N>;

/// Vector type
pub type Vector<const N: usize> = [f64; N];

/// Identity matrix
pub fn identity<const N: usize>() -> SquareMatrix<N> {
    let mut m = [[0.0; N]; N];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// Diagonal matrix from a vector
pub fn diagonal<const N: usize>(values: &Vector<N>) -> SquareMatrix<N> {
    let mut m = [[0.0; N]; N];
    for i in 0..N {
        m[i][i] = values[i];
    }
    m
}

/// Diagonal of a square matrix
pub fn diag<const N: usize>(m: &SquareMatrix<N>) -> Vector<N> {
    let mut d = [0.0; N];
    for i in 0..N {
        d[i] = m[i][i];
    }
    d
}

/// Matrix multiplication: A[R×K] × B[K×C]
pub fn multiply<const R: usize, const K: usize, const C: usize>(
    a: &Matrix<R, K>,
    b: &Matrix<K, C>,
) -> Matrix<R, C> {
    let mut result = [[0.0; C]; R];
    for i in 0..R {
        for j in 0..C {
            for k in 0..K {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    result
}

/// Matrix transpose
pub fn transpose<const R: usize, const C: usize>(a: &Matrix<R, C>) -> Matrix<C, R> {
    let mut result = [[0.0; R]; C];
    for i in 0..R {
        for j in 0..C {
            result[j][i] = a[i][j];
        }
    }
    result
}

/// Matrix addition
pub fn add<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>) -> Matrix<R, C> {
    let mut result = *a;
    for i in 0..R {
        for j in 0..C {
            result[i][j] += b[i][j];
        }
    }
    result
}

/// Matrix subtraction
pub fn sub<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>) -> Matrix<R, C> {
    let mut result = *a;
    for i in 0..R {
        for j in 0..C {
            result[i][j] -= b[i][j];
        }
    }
    result
}

/// Matrix-vector multiplication: y = A × x
pub fn matvec<const R: usize, const C: usize>(matrix: &Matrix<R, C>, vector: &Vector<C>) -> Vector<R> {
    let mut result = [0.0; R];
    for i in 0..R {
        for j in 0..C {
            result[i] += matrix[i][j] * vector[j];
        }
    }
    result
}

/// `A · B · Aᵀ`
pub fn congruence<const N: usize>(a: &SquareMatrix<N>, b: &SquareMatrix<N>) -> SquareMatrix<N> {
    multiply(&multiply(a, b), &transpose(a))
}

/// `L · Lᵀ`
pub fn outer_square<const N: usize>(l: &SquareMatrix<N>) -> SquareMatrix<N> {
    multiply(l, &transpose(l))
}

/// Make matrix symmetric: A = (A + Aᵀ) / 2
///
/// Rounding in the Joseph-form update leaves small asymmetries that
/// would otherwise accumulate over a trajectory.
pub fn make_symmetric<const N: usize>(matrix: &mut SquareMatrix<N>) {
    for i in 0..N {
        for j in i + 1..N {
            let avg = (matrix[i][j] + matrix[j][i]) * 0.5;
            matrix[i][j] = avg;
            matrix[j][i] = avg;
        }
    }
}

/// Exact symmetry check within `tolerance`
pub fn is_symmetric<const N: usize>(matrix: &SquareMatrix<N>, tolerance: f64) -> bool {
    for i in 0..N {
        for j in i + 1..N {
            if libm::fabs(matrix[i][j] - matrix[j][i]) > tolerance {
                return false;
            }
        }
    }
    true
}

/// Cholesky decomposition: A = L × Lᵀ
///
/// ## Algorithm
///
/// For each element:
/// - Diagonal: L[j,j] = sqrt(A[j,j] - Σ(L[j,k]²))
/// - Below diagonal: L[i,j] = (A[i,j] - Σ(L[i,k]×L[j,k])) / L[j,j]
///
/// Returns `None` if the matrix is not positive definite.
pub fn cholesky<const N: usize>(a: &SquareMatrix<N>) -> Option<SquareMatrix<N>> {
    let mut l = [[0.0; N]; N];

    for j in 0..N {
        let mut sum = 0.0;
        for k in 0..j {
            sum += l[j][k] * l[j][k];
        }

        let diag_val = a[j][j] - sum;
        if diag_val <= 0.0 {
            return None;
        }
        l[j][j] = libm::sqrt(diag_val);

        for i in (j + 1)..N {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i][k] * l[j][k];
            }
            l[i][j] = (a[i][j] - sum) / l[j][j];
        }
    }

    Some(l)
}

/// Matrix inversion using Gauss-Jordan elimination with partial pivoting
///
/// Returns `None` if the matrix is singular.
pub fn invert<const N: usize>(a: &SquareMatrix<N>) -> Option<SquareMatrix<N>> {
    let mut work = *a;
    let mut inv = identity::<N>();

    for k in 0..N {
        // Find pivot
        let mut max_row = k;
        let mut max_val = libm::fabs(work[k][k]);
        for i in (k + 1)..N {
            if libm::fabs(work[i][k]) > max_val {
                max_val = libm::fabs(work[i][k]);
                max_row = i;
            }
        }

        if max_val < SINGULAR_PIVOT {
            return None;
        }

        if max_row != k {
            work.swap(k, max_row);
            inv.swap(k, max_row);
        }

        // Scale pivot row
        let pivot = work[k][k];
        for j in 0..N {
            work[k][j] /= pivot;
            inv[k][j] /= pivot;
        }

        // Eliminate column
        for i in 0..N {
            if i != k {
                let factor = work[i][k];
                for j in 0..N {
                    work[i][j] -= factor * work[k][j];
                    inv[i][j] -= factor * inv[k][j];
                }
            }
        }
    }

    Some(inv)
}
