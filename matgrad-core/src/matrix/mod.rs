//! # Dense Matrix
//!
//! [`Matrix`] is the value type flowing through the autodiff graph: a contiguous,
//! row-major buffer paired with its shape. It has no notion of gradients; the
//! operation library and the graph build on top of the kernels defined here.

use crate::error::MatGradError;
use crate::numeric::MatNumeric;

pub mod create;

/// A fixed-shape, contiguous, row-major buffer of numbers.
///
/// The invariant `data.len() == shape.iter().product()` holds for every matrix
/// (the empty shape denotes a scalar holding exactly one element). The element at
/// multi-index `(i0, .., ik)` lives at offset `sum(ij * prod(shape[l] for l > j))`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    pub(crate) data: Vec<T>,
    pub(crate) shape: Vec<usize>,
}

impl<T: MatNumeric> Matrix<T> {
    /// Creates a matrix from a flat buffer and its shape.
    ///
    /// # Errors
    /// Returns `TensorCreationError` if the buffer length does not match the shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> Result<Self, MatGradError> {
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(MatGradError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        Ok(Matrix { data, shape })
    }

    /// Returns the shape of the matrix.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns the number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Read-only view of the row-major buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable view of the buffer. The shape cannot be changed through it.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns the single element of a scalar (or one-element) matrix.
    pub fn item(&self) -> Result<T, MatGradError> {
        match self.data.as_slice() {
            [x] => Ok(*x),
            _ => Err(MatGradError::NotAScalar {
                shape: self.shape.clone(),
            }),
        }
    }

    /// Returns `(rows, cols)` of a rank-2 matrix.
    pub(crate) fn dims2(&self, operation: &str) -> Result<(usize, usize), MatGradError> {
        dims2(&self.shape, operation)
    }

    /// Element `(row, col)` of a rank-2 matrix, `None` when out of range or not rank 2.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        match self.shape.as_slice() {
            &[rows, cols] if row < rows && col < cols => Some(self.data[row * cols + col]),
            _ => None,
        }
    }

    /// Overwrites every element with `value`.
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Applies `f` element-wise, producing a matrix of the same shape.
    pub fn map<F: Fn(T) -> T>(&self, f: F) -> Matrix<T> {
        Matrix {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Multiplies every element by `factor`.
    pub fn scale(&self, factor: T) -> Matrix<T> {
        self.map(|x| x * factor)
    }

    fn check_same_shape(&self, other: &Matrix<T>, operation: &str) -> Result<(), MatGradError> {
        expect_shape(&other.shape, &self.shape, operation)
    }

    /// Element-wise sum of two matrices of identical shape.
    pub fn add(&self, other: &Matrix<T>) -> Result<Matrix<T>, MatGradError> {
        self.check_same_shape(other, "add")?;
        Ok(Matrix {
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| a + b)
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Adds `other` into `self` in place. This is the gradient accumulation primitive.
    pub fn add_assign(&mut self, other: &Matrix<T>) -> Result<(), MatGradError> {
        self.check_same_shape(other, "add_assign")?;
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
        Ok(())
    }

    /// Element-wise product of two matrices of identical shape.
    pub fn mul(&self, other: &Matrix<T>) -> Result<Matrix<T>, MatGradError> {
        self.check_same_shape(other, "mul")?;
        Ok(Matrix {
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| a * b)
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Swaps the two axes of a rank-2 matrix: `[m, n]` becomes `[n, m]`.
    pub fn transpose(&self) -> Result<Matrix<T>, MatGradError> {
        let (m, n) = self.dims2("transpose")?;
        let mut out = vec![T::zero(); m * n];
        for i in 0..m {
            for j in 0..n {
                out[j * m + i] = self.data[i * n + j];
            }
        }
        Ok(Matrix {
            data: out,
            shape: vec![n, m],
        })
    }

    /// Standard matrix product `[m, k] x [k, n] -> [m, n]`.
    pub fn matmul(&self, other: &Matrix<T>) -> Result<Matrix<T>, MatGradError> {
        let (m, k) = self.dims2("matmul (rank check)")?;
        let (k2, n) = other.dims2("matmul (rank check)")?;
        if k != k2 {
            return Err(MatGradError::ShapeMismatch {
                expected: vec![k, n],
                actual: other.shape.clone(),
                operation: "matmul (inner dim)".to_string(),
            });
        }
        let mut out = vec![T::zero(); m * n];
        for i in 0..m {
            for l in 0..k {
                let a = self.data[i * k + l];
                let row = &other.data[l * n..(l + 1) * n];
                let dst = &mut out[i * n..(i + 1) * n];
                for (d, &b) in dst.iter_mut().zip(row.iter()) {
                    *d += a * b;
                }
            }
        }
        Ok(Matrix {
            data: out,
            shape: vec![m, n],
        })
    }

    /// Sums a rank-2 matrix over its rows, returning the column sums with shape `[n]`.
    ///
    /// This is the reduction paired with broadcasting a `[n]` vector across rows.
    pub fn sum_rows(&self) -> Result<Matrix<T>, MatGradError> {
        let (m, n) = self.dims2("sum_rows")?;
        let mut out = vec![T::zero(); n];
        for i in 0..m {
            for (o, &x) in out.iter_mut().zip(self.data[i * n..(i + 1) * n].iter()) {
                *o += x;
            }
        }
        Ok(Matrix {
            data: out,
            shape: vec![n],
        })
    }

    /// Row-wise softmax of a rank-2 matrix.
    ///
    /// The row maximum is subtracted before exponentiation, so rows such as
    /// `[1000, 1001]` do not overflow.
    pub fn softmax_by_row(&self) -> Result<Matrix<T>, MatGradError> {
        let (m, n) = self.dims2("softmax_by_row")?;
        let mut out = vec![T::zero(); m * n];
        for i in 0..m {
            let row = &self.data[i * n..(i + 1) * n];
            let dst = &mut out[i * n..(i + 1) * n];
            let max = row.iter().fold(T::neg_infinity(), |acc, &x| acc.max(x));
            let mut sum = T::zero();
            for (d, &x) in dst.iter_mut().zip(row.iter()) {
                *d = (x - max).exp();
                sum += *d;
            }
            for d in dst.iter_mut() {
                *d /= sum;
            }
        }
        Ok(Matrix {
            data: out,
            shape: vec![m, n],
        })
    }
}

/// Returns `(rows, cols)` of a rank-2 shape, or a `RankMismatch` naming `operation`.
pub(crate) fn dims2(shape: &[usize], operation: &str) -> Result<(usize, usize), MatGradError> {
    match shape {
        [m, n] => Ok((*m, *n)),
        _ => Err(MatGradError::RankMismatch {
            expected: 2,
            actual: shape.to_vec(),
            operation: operation.to_string(),
        }),
    }
}

/// Fails with `ShapeMismatch` unless `actual == expected`.
pub(crate) fn expect_shape(
    actual: &[usize],
    expected: &[usize],
    operation: &str,
) -> Result<(), MatGradError> {
    if actual != expected {
        return Err(MatGradError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
            operation: operation.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "matrix_test.rs"]
mod tests;
