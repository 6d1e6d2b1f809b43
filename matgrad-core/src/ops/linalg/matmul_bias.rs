// matgrad-core/src/ops/linalg/matmul_bias.rs

use crate::error::MatGradError;
use crate::matrix::{expect_shape, Matrix};
use crate::numeric::MatNumeric;
use crate::ops::linalg::matmul::{matmul_backward, matmul_shape};

/// Output shape of `a @ b + bias`. The bias must have shape `[b.shape[1]]`.
pub fn matmul_bias_shape(
    a: &[usize],
    b: &[usize],
    bias: &[usize],
) -> Result<Vec<usize>, MatGradError> {
    let out = matmul_shape(a, b)?;
    expect_shape(bias, &out[1..], "matmul_bias (bias)")?;
    Ok(out)
}

/// Computes `a @ b` and adds `bias` to every row of the product.
pub fn matmul_bias_forward<T: MatNumeric>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    bias: &Matrix<T>,
) -> Result<Matrix<T>, MatGradError> {
    matmul_bias_shape(a.shape(), b.shape(), bias.shape())?;
    let mut out = a.matmul(b)?;
    let n = bias.numel();
    if n == 0 {
        return Ok(out);
    }
    for row in out.data.chunks_mut(n) {
        for (o, &c) in row.iter_mut().zip(bias.data.iter()) {
            *o += c;
        }
    }
    Ok(out)
}

/// Gradients of `C = A @ B + bias`.
///
/// `A` and `B` get the plain matmul gradients. The bias was broadcast over the rows
/// of `C`, so its gradient is the column sum of `grad_output`.
///
/// Returns `(grad_a, grad_b, grad_bias)`.
pub fn matmul_bias_backward<T: MatNumeric>(
    grad_output: &Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<(Matrix<T>, Matrix<T>, Matrix<T>), MatGradError> {
    let (grad_a, grad_b) = matmul_backward(grad_output, a, b)?;
    let grad_bias = grad_output.sum_rows()?;
    Ok((grad_a, grad_b, grad_bias))
}

#[cfg(test)]
#[path = "matmul_bias_test.rs"]
mod tests;
