// matgrad-core/src/ops/loss/softmax_cross_entropy.rs

use crate::error::MatGradError;
use crate::matrix::{dims2, expect_shape, Matrix};
use crate::numeric::MatNumeric;

const OP: &str = "softmax_cross_entropy";

/// Validates `logits` / `labels` shapes. The loss is always a scalar (shape `[]`).
pub fn softmax_cross_entropy_shape(
    logits: &[usize],
    labels: &[usize],
) -> Result<Vec<usize>, MatGradError> {
    dims2(logits, OP)?;
    expect_shape(labels, logits, "softmax_cross_entropy (labels)")?;
    Ok(vec![])
}

/// Mean negative log-likelihood of one-hot `labels` under the row softmax of `logits`.
///
/// The sum of `labels ⊙ log(softmax(logits))` is divided by the number of rows, not
/// by the number of labelled rows: an all-zero label row contributes zero loss but
/// still counts in the denominator.
///
/// Log-probabilities are taken as `x - max - ln(sum(exp(x - max)))`, which stays
/// finite even when a probability underflows to zero.
///
/// # Returns
/// `(loss, probs)` where `loss` has shape `[]` and `probs` is the row softmax,
/// kept for the backward rule.
///
/// # Errors
/// `EmptyInput` when `logits` has no rows.
pub fn softmax_cross_entropy_forward<T: MatNumeric>(
    logits: &Matrix<T>,
    labels: &Matrix<T>,
) -> Result<(Matrix<T>, Matrix<T>), MatGradError> {
    softmax_cross_entropy_shape(logits.shape(), labels.shape())?;
    let (m, n) = logits.dims2(OP)?;
    if m == 0 {
        return Err(MatGradError::EmptyInput {
            operation: OP.to_string(),
        });
    }

    let probs = logits.softmax_by_row()?;
    let mut total = T::zero();
    for i in 0..m {
        let row = &logits.data()[i * n..(i + 1) * n];
        let max = row.iter().fold(T::neg_infinity(), |acc, &x| acc.max(x));
        let log_sum = row
            .iter()
            .fold(T::zero(), |acc, &x| acc + (x - max).exp())
            .ln();
        for (j, &x) in row.iter().enumerate() {
            let label = labels.data()[i * n + j];
            if label != T::zero() {
                total += label * (x - max - log_sum);
            }
        }
    }
    let rows = T::from_usize(m).ok_or_else(|| {
        MatGradError::InternalError(
            "Failed to convert the row count to the element type".to_string(),
        )
    })?;
    let loss = -total / rows;
    Ok((Matrix::scalar(loss), probs))
}

/// Gradient of the fused softmax + cross-entropy with respect to the logits:
/// `dlogits = (probs - labels) / m * dloss`.
///
/// Only valid because softmax and the log-likelihood live in one node.
pub fn softmax_cross_entropy_backward<T: MatNumeric>(
    grad_output: &Matrix<T>,
    probs: &Matrix<T>,
    labels: &Matrix<T>,
) -> Result<Matrix<T>, MatGradError> {
    let upstream = grad_output.item()?;
    let (m, _) = probs.dims2(OP)?;
    expect_shape(labels.shape(), probs.shape(), "softmax_cross_entropy (labels)")?;
    let rows = T::from_usize(m).ok_or_else(|| {
        MatGradError::InternalError(
            "Failed to convert the row count to the element type".to_string(),
        )
    })?;
    let factor = upstream / rows;
    let data = probs
        .data()
        .iter()
        .zip(labels.data().iter())
        .map(|(&p, &y)| (p - y) * factor)
        .collect();
    Matrix::new(data, probs.shape().to_vec())
}

#[cfg(test)]
#[path = "softmax_cross_entropy_test.rs"]
mod tests;
