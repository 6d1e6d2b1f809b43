// matgrad-core/src/ops/linalg/matmul.rs

use crate::error::MatGradError;
use crate::matrix::{dims2, Matrix};
use crate::numeric::MatNumeric;

/// Infers the output shape of `a @ b`: `[m, k] x [k, n] -> [m, n]`.
///
/// # Errors
/// `RankMismatch` if either operand is not rank 2, `ShapeMismatch` if the inner
/// dimensions differ.
pub fn matmul_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, MatGradError> {
    let (m, k) = dims2(a, "matmul (rank check)")?;
    let (k2, n) = dims2(b, "matmul (rank check)")?;
    if k != k2 {
        return Err(MatGradError::ShapeMismatch {
            expected: vec![k, n],
            actual: b.to_vec(),
            operation: "matmul (inner dim)".to_string(),
        });
    }
    Ok(vec![m, n])
}

/// Computes the matrix product `a @ b`.
pub fn matmul_forward<T: MatNumeric>(
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<Matrix<T>, MatGradError> {
    a.matmul(b)
}

/// Gradients of `C = A @ B` with respect to both operands.
///
/// Given \( \frac{dL}{dC} \) (`grad_output`):
/// \\[ \frac{dL}{dA} = \frac{dL}{dC} \cdot B^T, \qquad \frac{dL}{dB} = A^T \cdot \frac{dL}{dC} \\]
///
/// Returns `(grad_a, grad_b)`.
pub fn matmul_backward<T: MatNumeric>(
    grad_output: &Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<(Matrix<T>, Matrix<T>), MatGradError> {
    let grad_a = grad_output.matmul(&b.transpose()?)?;
    let grad_b = a.transpose()?.matmul(grad_output)?;
    Ok((grad_a, grad_b))
}

#[cfg(test)]
#[path = "matmul_test.rs"]
mod tests;
