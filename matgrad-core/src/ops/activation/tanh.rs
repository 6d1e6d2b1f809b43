// matgrad-core/src/ops/activation/tanh.rs

use crate::error::MatGradError;
use crate::matrix::{expect_shape, Matrix};
use crate::numeric::MatNumeric;

/// Applies the hyperbolic tangent element-wise.
pub fn tanh_forward<T: MatNumeric>(x: &Matrix<T>) -> Matrix<T> {
    x.map(|v| v.tanh())
}

/// Gradient of `y = tanh(x)`, expressed through the forward output:
/// \\[ \frac{dL}{dx} = \frac{dL}{dy} \odot (1 - y^2) \\]
pub fn tanh_backward<T: MatNumeric>(
    grad_output: &Matrix<T>,
    output: &Matrix<T>,
) -> Result<Matrix<T>, MatGradError> {
    expect_shape(grad_output.shape(), output.shape(), "tanh (grad_output)")?;
    let local = output.map(|y| T::one() - y * y);
    grad_output.mul(&local)
}

#[cfg(test)]
#[path = "tanh_test.rs"]
mod tests;
