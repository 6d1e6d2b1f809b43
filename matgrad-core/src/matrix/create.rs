// matgrad-core/src/matrix/create.rs

use crate::error::MatGradError;
use crate::matrix::Matrix;
use crate::numeric::MatNumeric;
use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};

impl<T: MatNumeric> Matrix<T> {
    /// Creates a zero-filled matrix with the given shape.
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, T::zero())
    }

    /// Creates a matrix filled with ones.
    pub fn ones(shape: Vec<usize>) -> Self {
        Self::full(shape, T::one())
    }

    /// Creates a matrix where every element is `value`.
    pub fn full(shape: Vec<usize>, value: T) -> Self {
        let numel = shape.iter().product();
        Matrix {
            data: vec![value; numel],
            shape,
        }
    }

    /// Creates a zero-filled matrix with the same shape as `other`.
    pub fn zeros_like(other: &Matrix<T>) -> Self {
        Self::zeros(other.shape.clone())
    }

    /// Creates a scalar (shape `[]`).
    pub fn scalar(value: T) -> Self {
        Matrix {
            data: vec![value],
            shape: vec![],
        }
    }

    /// Builds a rank-2 matrix from equally sized rows.
    ///
    /// # Errors
    /// `ShapeMismatch` if the rows differ in length, `EmptyInput` if there are no rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, MatGradError> {
        let first = rows.first().ok_or_else(|| MatGradError::EmptyInput {
            operation: "from_rows".to_string(),
        })?;
        let cols = first.len();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(MatGradError::ShapeMismatch {
                    expected: vec![cols],
                    actual: vec![row.len()],
                    operation: "from_rows".to_string(),
                });
            }
            data.extend_from_slice(row);
        }
        Matrix::new(data, vec![rows.len(), cols])
    }

    /// Creates a matrix with elements drawn from the standard normal distribution.
    pub fn randn<R: Rng + ?Sized>(shape: Vec<usize>, rng: &mut R) -> Self
    where
        StandardNormal: Distribution<T>,
    {
        let numel = shape.iter().product();
        let data = (0..numel).map(|_| StandardNormal.sample(rng)).collect();
        Matrix { data, shape }
    }

    /// Creates a matrix with elements drawn uniformly from `[low, high)`.
    ///
    /// # Errors
    /// Returns `InternalError` if `low >= high`.
    pub fn rand_uniform<R: Rng + ?Sized>(
        shape: Vec<usize>,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Result<Self, MatGradError>
    where
        T: SampleUniform,
    {
        let bounds = T::from_f64(low).zip(T::from_f64(high));
        let (low_t, high_t) = match bounds {
            Some((l, h)) if l < h => (l, h),
            _ => {
                return Err(MatGradError::InternalError(format!(
                    "rand_uniform requires low < high, got [{}, {})",
                    low, high
                )))
            }
        };
        let dist = Uniform::new(low_t, high_t);
        let numel = shape.iter().product();
        let data = (0..numel).map(|_| dist.sample(rng)).collect();
        Ok(Matrix { data, shape })
    }
}

#[cfg(test)]
#[path = "create_test.rs"]
mod tests;
