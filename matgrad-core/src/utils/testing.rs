use crate::matrix::Matrix;
use crate::numeric::MatNumeric;

/// Checks that a matrix has the expected shape and that every element lies within
/// `tolerance` of the expected data. Panics with the first offending index otherwise.
pub(crate) fn check_matrix_near<T: MatNumeric>(
    actual: &Matrix<T>,
    expected_shape: &[usize],
    expected_data: &[f64],
    tolerance: f64,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");
    assert_eq!(
        actual.data().len(),
        expected_data.len(),
        "Data length mismatch"
    );

    for (i, (a, e)) in actual.data().iter().zip(expected_data.iter()).enumerate() {
        let a = a.to_f64().unwrap_or(f64::NAN);
        let diff = (a - *e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Helper to create an `f64` matrix for tests.
pub(crate) fn create_test_matrix(data: Vec<f64>, shape: Vec<usize>) -> Matrix<f64> {
    Matrix::new(data, shape).expect("Failed to create test matrix")
}
