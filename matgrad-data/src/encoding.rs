// matgrad-data/src/encoding.rs

use crate::error::DataError;
use matgrad_core::{MatNumeric, Matrix};

/// One-hot rows: row `i` has a single `1` in column `indices[i]`.
///
/// Returns a `[indices.len(), classes]` matrix.
pub fn one_hot<T: MatNumeric>(indices: &[usize], classes: usize) -> Result<Matrix<T>, DataError> {
    let mut data = vec![T::zero(); indices.len() * classes];
    for (row, &index) in indices.iter().enumerate() {
        if index >= classes {
            return Err(DataError::IndexOutOfBounds {
                index,
                len: classes,
            });
        }
        data[row * classes + index] = T::one();
    }
    Ok(Matrix::new(data, vec![indices.len(), classes])?)
}

/// Stores integer indices as matrix elements, e.g. for an embedding lookup.
pub fn indices_matrix<T: MatNumeric>(
    indices: &[usize],
    shape: Vec<usize>,
) -> Result<Matrix<T>, DataError> {
    let data = indices
        .iter()
        .map(|&i| {
            T::from_usize(i).ok_or_else(|| {
                DataError::InvalidConfig(format!("index {} does not fit the element type", i))
            })
        })
        .collect::<Result<Vec<T>, DataError>>()?;
    Ok(Matrix::new(data, shape)?)
}
