// matgrad-core/src/ops/indexing/embedding.rs

use crate::error::MatGradError;
use crate::matrix::{dims2, Matrix};
use crate::numeric::MatNumeric;

const OP: &str = "embedding";

/// Output shape of an embedding lookup.
///
/// `table` is `[vocab, dim]`; `indices` is `[m]` (one lookup per row) or
/// `[m, k]` (k lookups per row, concatenated). The output is `[m, k * dim]`.
pub fn embedding_shape(table: &[usize], indices: &[usize]) -> Result<Vec<usize>, MatGradError> {
    let (_, dim) = dims2(table, OP)?;
    match indices {
        [m] => Ok(vec![*m, dim]),
        [m, k] => Ok(vec![*m, k * dim]),
        _ => Err(MatGradError::RankMismatch {
            expected: 2,
            actual: indices.to_vec(),
            operation: "embedding (indices)".to_string(),
        }),
    }
}

/// Converts the stored index values into row numbers of a table with `vocab` rows.
fn decode_indices<T: MatNumeric>(
    indices: &Matrix<T>,
    vocab: usize,
) -> Result<Vec<usize>, MatGradError> {
    indices
        .data()
        .iter()
        .map(|&v| {
            // Only integral, non-negative values convert; NaN and fractions are rejected.
            let row = if v.fract() == T::zero() { v.to_usize() } else { None };
            match row {
                Some(row) if row < vocab => Ok(row),
                _ => Err(MatGradError::IndexOutOfBounds {
                    index: v.to_f64().unwrap_or(f64::NAN),
                    bound: vocab,
                    operation: OP.to_string(),
                }),
            }
        })
        .collect()
}

/// Gathers rows of `table`. Row `i` of the output is the concatenation of
/// `table[indices[i, 0]], .., table[indices[i, k - 1]]`.
///
/// # Errors
/// `IndexOutOfBounds` when an index is negative, fractional or `>= vocab`.
pub fn embedding_forward<T: MatNumeric>(
    table: &Matrix<T>,
    indices: &Matrix<T>,
) -> Result<Matrix<T>, MatGradError> {
    let shape = embedding_shape(table.shape(), indices.shape())?;
    let (vocab, dim) = table.dims2(OP)?;
    let rows = decode_indices(indices, vocab)?;
    let mut out = Vec::with_capacity(rows.len() * dim);
    for r in rows {
        out.extend_from_slice(&table.data()[r * dim..(r + 1) * dim]);
    }
    Matrix::new(out, shape)
}

/// Scatters `grad_output` back onto the table rows that were looked up.
///
/// A row looked up several times receives the sum of all its slices.
pub fn embedding_backward<T: MatNumeric>(
    grad_output: &Matrix<T>,
    table_shape: &[usize],
    indices: &Matrix<T>,
) -> Result<Matrix<T>, MatGradError> {
    let expected = embedding_shape(table_shape, indices.shape())?;
    crate::matrix::expect_shape(grad_output.shape(), &expected, "embedding (grad_output)")?;
    let (vocab, dim) = dims2(table_shape, OP)?;
    let rows = decode_indices(indices, vocab)?;
    let mut grad = Matrix::zeros(table_shape.to_vec());
    if dim == 0 {
        return Ok(grad);
    }
    for (slice, r) in grad_output.data().chunks(dim).zip(rows) {
        for (g, &d) in grad.data[r * dim..(r + 1) * dim].iter_mut().zip(slice.iter()) {
            *g += d;
        }
    }
    Ok(grad)
}

#[cfg(test)]
#[path = "embedding_test.rs"]
mod tests;
