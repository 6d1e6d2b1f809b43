// matgrad-core/src/matrix/matrix_test.rs

use crate::error::MatGradError;
use crate::matrix::Matrix;
use crate::utils::testing::check_matrix_near;
use approx::assert_abs_diff_eq;

fn m(data: Vec<f64>, shape: Vec<usize>) -> Matrix<f64> {
    Matrix::new(data, shape).expect("Failed to create test matrix")
}

#[test]
fn test_new_rejects_length_mismatch() {
    let result = Matrix::<f64>::new(vec![1.0, 2.0, 3.0], vec![2, 2]);
    assert_eq!(
        result.err(),
        Some(MatGradError::TensorCreationError {
            data_len: 3,
            shape: vec![2, 2]
        })
    );
}

#[test]
fn test_scalar_shape_holds_one_element() {
    let s = Matrix::new(vec![4.0f64], vec![]).unwrap();
    assert_eq!(s.rank(), 0);
    assert_eq!(s.item().unwrap(), 4.0);
    assert!(Matrix::<f64>::new(vec![], vec![]).is_err());
}

#[test]
fn test_item_on_non_scalar_fails() {
    let a = m(vec![1.0, 2.0], vec![2]);
    assert!(matches!(a.item(), Err(MatGradError::NotAScalar { .. })));
}

#[test]
fn test_add_same_shape() {
    let a = m(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    let b = m(vec![10.0, 20.0, 30.0, 40.0], vec![2, 2]);
    let c = a.add(&b).unwrap();
    check_matrix_near(&c, &[2, 2], &[11.0, 22.0, 33.0, 44.0], 0.0);
}

#[test]
fn test_add_shape_mismatch_names_operation() {
    let a = m(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    let b = m(vec![1.0, 2.0, 3.0, 4.0], vec![4]);
    match a.add(&b) {
        Err(MatGradError::ShapeMismatch {
            expected,
            actual,
            operation,
        }) => {
            assert_eq!(expected, vec![2, 2]);
            assert_eq!(actual, vec![4]);
            assert_eq!(operation, "add");
        }
        other => panic!("Expected ShapeMismatch, got {:?}", other),
    }
}

#[test]
fn test_add_assign_accumulates() {
    let mut acc = m(vec![1.0, 1.0], vec![2]);
    acc.add_assign(&m(vec![0.5, 2.0], vec![2])).unwrap();
    acc.add_assign(&m(vec![0.5, 2.0], vec![2])).unwrap();
    assert_eq!(acc.data(), &[2.0, 5.0]);
    assert!(acc.add_assign(&m(vec![1.0], vec![1])).is_err());
    assert_eq!(acc.data(), &[2.0, 5.0]);
}

#[test]
fn test_transpose_non_square() {
    let a = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    let t = a.transpose().unwrap();
    check_matrix_near(&t, &[3, 2], &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0], 0.0);
    assert_eq!(t.transpose().unwrap(), a);
}

#[test]
fn test_transpose_requires_rank_two() {
    let v = m(vec![1.0, 2.0], vec![2]);
    assert!(matches!(
        v.transpose(),
        Err(MatGradError::RankMismatch { expected: 2, .. })
    ));
}

#[test]
fn test_matmul_forward_non_square() {
    let a = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    let b = m(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], vec![3, 2]);
    let c = a.matmul(&b).unwrap();
    check_matrix_near(&c, &[2, 2], &[58.0, 64.0, 139.0, 154.0], 1e-12);
}

#[test]
fn test_sum_rows() {
    let a = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2]);
    let s = a.sum_rows().unwrap();
    check_matrix_near(&s, &[2], &[9.0, 12.0], 0.0);
}

#[test]
fn test_softmax_rows_sum_to_one() {
    let a = m(vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0], vec![2, 3]);
    let p = a.softmax_by_row().unwrap();
    for row in p.data().chunks(3) {
        assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }
    // Softmax is invariant to a per-row shift.
    assert_abs_diff_eq!(p.get(0, 0).unwrap(), p.get(1, 0).unwrap(), epsilon = 1e-12);
}

#[test]
fn test_softmax_large_inputs_do_not_overflow() {
    let a = m(vec![1000.0, 1001.0], vec![1, 2]);
    let p = a.softmax_by_row().unwrap();
    assert!(p.data().iter().all(|x| x.is_finite()));
    assert_abs_diff_eq!(p.data().iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    let e = std::f64::consts::E;
    assert_abs_diff_eq!(p.get(0, 1).unwrap(), e / (1.0 + e), epsilon = 1e-9);

    let f = Matrix::<f32>::new(vec![1000.0, 1001.0], vec![1, 2]).unwrap();
    let pf = f.softmax_by_row().unwrap();
    assert!((pf.data().iter().sum::<f32>() - 1.0).abs() < 1e-6);
}

#[test]
fn test_fill_and_map() {
    let mut a = Matrix::<f64>::zeros(vec![2, 2]);
    a.fill(3.0);
    let b = a.map(|x| x * x);
    assert_eq!(b.data(), &[9.0; 4]);
    assert_eq!(a.scale(0.5).data(), &[1.5; 4]);
}

#[test]
fn test_get_is_bounds_checked() {
    let a = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    assert_eq!(a.get(1, 2), Some(6.0));
    assert_eq!(a.get(2, 0), None);
    assert_eq!(a.get(0, 3), None);
    assert_eq!(Matrix::scalar(1.0f64).get(0, 0), None);
}
