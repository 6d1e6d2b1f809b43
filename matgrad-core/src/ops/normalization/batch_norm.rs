// matgrad-core/src/ops/normalization/batch_norm.rs

use crate::error::MatGradError;
use crate::matrix::{dims2, expect_shape, Matrix};
use crate::numeric::MatNumeric;

const OP: &str = "batch_norm";

/// Default value added to the variance before taking the square root.
pub const DEFAULT_EPSILON: f64 = 1e-5;

/// State captured by the forward pass and consumed by the backward rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchNormSaved<T> {
    /// `(x - mean) / sqrt(var + eps)`, shape `[m, n]`.
    pub normalized: Matrix<T>,
    /// `1 / sqrt(var + eps)` per column, shape `[n]`.
    pub inv_std: Matrix<T>,
}

/// Validates shapes: `x` is `[m, n]`, `gain` and `bias` are `[n]`. Output is `[m, n]`.
pub fn batch_norm_shape(
    x: &[usize],
    gain: &[usize],
    bias: &[usize],
) -> Result<Vec<usize>, MatGradError> {
    let (_, n) = dims2(x, OP)?;
    expect_shape(gain, &[n], "batch_norm (gain)")?;
    expect_shape(bias, &[n], "batch_norm (bias)")?;
    Ok(x.to_vec())
}

/// Column means and biased variances (divided by `m`) of `x` (`[m, n]`), both `[n]`.
///
/// # Errors
/// `RankMismatch` unless `x` is rank 2, `EmptyInput` for a matrix without rows.
pub fn batch_moments<T: MatNumeric>(x: &Matrix<T>) -> Result<(Matrix<T>, Matrix<T>), MatGradError> {
    let (m, n) = x.dims2(OP)?;
    if m == 0 {
        return Err(MatGradError::EmptyInput {
            operation: OP.to_string(),
        });
    }
    let rows = T::from_usize(m).ok_or_else(|| {
        MatGradError::InternalError(
            "Failed to convert the batch size to the element type".to_string(),
        )
    })?;

    let mean = x.sum_rows()?.scale(T::one() / rows);
    let mut var = vec![T::zero(); n];
    if n > 0 {
        for row in x.data().chunks(n) {
            for ((v, &xi), &mu) in var.iter_mut().zip(row.iter()).zip(mean.data().iter()) {
                let d = xi - mu;
                *v += d * d;
            }
        }
    }
    let var = var.into_iter().map(|v| v / rows).collect();
    Ok((mean, Matrix::new(var, vec![n])?))
}

/// Normalizes every column of `x` over the batch (row) axis, then scales by `gain`
/// and shifts by `bias`.
///
/// The variance divides by the batch size `m` (no `m - 1` correction), including
/// for a single-row batch where it is zero and `epsilon` alone keeps the division
/// finite.
///
/// # Errors
/// Shape errors from [`batch_norm_shape`], `EmptyInput` for a batch without rows.
pub fn batch_norm_forward<T: MatNumeric>(
    x: &Matrix<T>,
    gain: &Matrix<T>,
    bias: &Matrix<T>,
    epsilon: T,
) -> Result<(Matrix<T>, BatchNormSaved<T>), MatGradError> {
    batch_norm_shape(x.shape(), gain.shape(), bias.shape())?;
    let (m, n) = x.dims2(OP)?;
    if m == 0 {
        return Err(MatGradError::EmptyInput {
            operation: OP.to_string(),
        });
    }
    if n == 0 {
        let saved = BatchNormSaved {
            normalized: x.clone(),
            inv_std: Matrix::zeros(vec![0]),
        };
        return Ok((x.clone(), saved));
    }
    let (mean, var) = batch_moments(x)?;
    let inv_std: Vec<T> = var
        .data()
        .iter()
        .map(|&v| T::one() / (v + epsilon).sqrt())
        .collect();

    let mut normalized = Vec::with_capacity(m * n);
    let mut out = Vec::with_capacity(m * n);
    for row in x.data().chunks(n) {
        for j in 0..n {
            let xhat = (row[j] - mean.data()[j]) * inv_std[j];
            normalized.push(xhat);
            out.push(gain.data()[j] * xhat + bias.data()[j]);
        }
    }

    let saved = BatchNormSaved {
        normalized: Matrix::new(normalized, vec![m, n])?,
        inv_std: Matrix::new(inv_std, vec![n])?,
    };
    Ok((Matrix::new(out, vec![m, n])?, saved))
}

/// Gradients of batch normalization with respect to `x`, `gain` and `bias`.
///
/// Mean and variance depend on every row, so the input gradient is the full
/// Jacobian-vector product. With `g = grad_output ⊙ gain` per column:
/// `dx = inv_std / m * (m * g - sum_i(g) - xhat * sum_i(g ⊙ xhat))`
/// while `dgain = sum_i(grad_output ⊙ xhat)` and `dbias = sum_i(grad_output)`.
///
/// Returns `(grad_x, grad_gain, grad_bias)`.
pub fn batch_norm_backward<T: MatNumeric>(
    grad_output: &Matrix<T>,
    gain: &Matrix<T>,
    saved: &BatchNormSaved<T>,
) -> Result<(Matrix<T>, Matrix<T>, Matrix<T>), MatGradError> {
    expect_shape(
        grad_output.shape(),
        saved.normalized.shape(),
        "batch_norm (grad_output)",
    )?;
    let (m, n) = grad_output.dims2(OP)?;
    expect_shape(gain.shape(), &[n], "batch_norm (gain)")?;
    if n == 0 {
        return Ok((grad_output.clone(), gain.clone(), gain.clone()));
    }
    let rows = T::from_usize(m).ok_or_else(|| {
        MatGradError::InternalError(
            "Failed to convert the batch size to the element type".to_string(),
        )
    })?;

    let grad_bias = grad_output.sum_rows()?;
    let grad_gain = grad_output.mul(&saved.normalized)?.sum_rows()?;

    // Column sums of g and g * xhat, where g = grad_output * gain.
    let mut sum_g = vec![T::zero(); n];
    let mut sum_g_xhat = vec![T::zero(); n];
    for (g_row, x_row) in grad_output
        .data()
        .chunks(n)
        .zip(saved.normalized.data().chunks(n))
    {
        for j in 0..n {
            let g = g_row[j] * gain.data()[j];
            sum_g[j] += g;
            sum_g_xhat[j] += g * x_row[j];
        }
    }

    let mut grad_x = Vec::with_capacity(m * n);
    for (g_row, x_row) in grad_output
        .data()
        .chunks(n)
        .zip(saved.normalized.data().chunks(n))
    {
        for j in 0..n {
            let g = g_row[j] * gain.data()[j];
            let inv_std = saved.inv_std.data()[j];
            grad_x.push(inv_std / rows * (rows * g - sum_g[j] - x_row[j] * sum_g_xhat[j]));
        }
    }

    Ok((Matrix::new(grad_x, vec![m, n])?, grad_gain, grad_bias))
}

#[cfg(test)]
#[path = "batch_norm_test.rs"]
mod tests;
