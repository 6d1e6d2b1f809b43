// matgrad-core/src/autograd/graph_test.rs

use super::Graph;
use crate::autograd::node::{NodeId, NodeState};
use crate::autograd::op::Op;
use crate::error::MatGradError;
use crate::matrix::Matrix;
use crate::utils::testing::{check_matrix_near, create_test_matrix};
use approx::assert_abs_diff_eq;

fn x_y() -> (Matrix<f64>, Matrix<f64>) {
    (
        create_test_matrix(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]),
        create_test_matrix(vec![5.0, 6.0, 7.0, 8.0], vec![2, 2]),
    )
}

#[test]
fn test_shapes_are_inferred_at_construction() {
    let mut g = Graph::<f64>::new();
    let a = g.wrap(Matrix::zeros(vec![4, 3]));
    let b = g.wrap(Matrix::zeros(vec![3, 2]));
    let c = g.mat_mul(a, b).unwrap();
    assert_eq!(g.shape(c).unwrap(), &[4, 2]);
    assert_eq!(g.state(c).unwrap(), NodeState::Unevaluated);
    assert!(g.value(c).is_none());
    assert_eq!(g.op_name(c).unwrap(), "mat_mul");
    assert_eq!(g.predecessors(c).unwrap(), vec![a, b]);
    assert!(!g.is_leaf(c).unwrap());
}

#[test]
fn test_incompatible_operands_fail_before_node_exists() {
    let mut g = Graph::<f64>::new();
    let a = g.wrap(Matrix::zeros(vec![2, 3]));
    let b = g.wrap(Matrix::zeros(vec![2, 3]));
    let before = g.len();
    let result = g.mat_mul(a, b);
    assert_eq!(
        result,
        Err(MatGradError::ShapeMismatch {
            expected: vec![3, 3],
            actual: vec![2, 3],
            operation: "matmul (inner dim)".to_string(),
        })
    );
    assert_eq!(g.len(), before);
}

#[test]
fn test_unknown_node_is_rejected() {
    let mut g = Graph::<f64>::new();
    let a = g.wrap(Matrix::zeros(vec![1, 1]));
    let foreign = NodeId(17);
    assert_eq!(
        g.tanh(foreign),
        Err(MatGradError::UnknownNode { node: 17, len: 1 })
    );
    assert!(g.mat_mul(a, foreign).is_err());
    assert!(g.forward(foreign).is_err());
}

#[test]
fn test_matrices_are_wrapped_automatically() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let c = g.mat_mul(x, y).unwrap();
    assert_eq!(g.len(), 3);
    let preds = g.predecessors(c).unwrap();
    assert!(preds.iter().all(|&p| g.is_leaf(p).unwrap()));
    assert!(g.requires_grad(c).unwrap());
}

#[test]
fn test_mat_mul_bias_example_is_exact() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let plain = g.mat_mul(x.clone(), y.clone()).unwrap();
    let biased = g
        .mat_mul_bias(x, y, create_test_matrix(vec![1.0, 1.0], vec![2]))
        .unwrap();
    g.forward(plain).unwrap();
    g.forward(biased).unwrap();

    let plain = g.value(plain).unwrap();
    assert_eq!(plain.data(), &[19.0, 22.0, 43.0, 50.0]);
    let expected: Vec<f64> = plain.data().iter().map(|v| v + 1.0).collect();
    assert_eq!(g.value(biased).unwrap().data(), expected.as_slice());
}

#[test]
fn test_softmax_cross_entropy_example() {
    let mut g = Graph::new();
    let logits = g.wrap(create_test_matrix(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]));
    let labels = g.constant(create_test_matrix(vec![0.0, 1.0, 1.0, 0.0], vec![2, 2]));
    let loss = g.softmax_cross_entropy(logits, labels).unwrap();
    g.forward(loss).unwrap();
    g.backward(loss).unwrap();

    let value = g.value(loss).unwrap().item().unwrap();
    assert!(value > 0.0);
    let expected = ((1.0 + (-1.0f64).exp()).ln() + (1.0 + 1.0f64.exp()).ln()) / 2.0;
    assert_abs_diff_eq!(value, expected, epsilon = 1e-12);

    let grad = g.grad(logits).unwrap();
    for row in grad.data().chunks(2) {
        assert_abs_diff_eq!(row[0] + row[1], 0.0, epsilon = 1e-12);
    }
    let p = 1.0 / (1.0 + 1.0f64.exp());
    check_matrix_near(
        grad,
        &[2, 2],
        &[p / 2.0, -p / 2.0, (p - 1.0) / 2.0, (1.0 - p) / 2.0],
        1e-12,
    );
    assert!(g.grad(labels).is_none());
}

#[test]
fn test_forward_is_idempotent() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let p = g.mat_mul(x, y).unwrap();
    let t = g.tanh(p).unwrap();
    g.forward(t).unwrap();
    let first = g.value(t).unwrap().clone();
    g.forward(t).unwrap();
    assert_eq!(g.value(t).unwrap(), &first);
    assert_eq!(g.state(t).unwrap(), NodeState::Forwarded);
}

#[test]
fn test_shared_leaf_accumulates_both_branches() {
    let a = create_test_matrix(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    let w = create_test_matrix(vec![0.5, -1.0, 2.0, 0.25], vec![2, 2]);

    let mut g = Graph::new();
    let a_id = g.constant(a.clone());
    let w_id = g.wrap(w.clone());
    let h = g.mat_mul(a_id, w_id).unwrap();
    let root = g.mat_mul(h, w_id).unwrap();
    g.forward(root).unwrap();
    g.backward(root).unwrap();

    // root = (a @ w) @ w with an all-ones upstream gradient.
    let ones = Matrix::<f64>::ones(vec![2, 2]);
    let h_value = a.matmul(&w).unwrap();
    let via_outer = h_value.transpose().unwrap().matmul(&ones).unwrap();
    let grad_h = ones.matmul(&w.transpose().unwrap()).unwrap();
    let via_inner = a.transpose().unwrap().matmul(&grad_h).unwrap();
    let expected = via_outer.add(&via_inner).unwrap();

    let grad = g.grad(w_id).unwrap();
    check_matrix_near(grad, &[2, 2], expected.data(), 1e-12);
    assert_ne!(grad, &via_outer);
    assert_ne!(grad, &via_inner);
    assert_eq!(g.state(w_id).unwrap(), NodeState::Backpropagated);
    assert_eq!(g.state(a_id).unwrap(), NodeState::Forwarded);
    assert_eq!(g.state(root).unwrap(), NodeState::Backpropagated);
}

#[test]
fn test_same_node_as_both_operands() {
    let mut g = Graph::new();
    let w = g.wrap(create_test_matrix(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]));
    let sq = g.mat_mul(w, w).unwrap();
    assert_eq!(g.predecessors(sq).unwrap(), vec![w]);
    g.forward(sq).unwrap();
    g.backward(sq).unwrap();
    // d sum(w @ w) / dw = ones @ w^T + w^T @ ones
    // ones @ w^T = [[3, 7], [3, 7]], w^T @ ones = [[4, 4], [6, 6]]
    check_matrix_near(g.grad(w).unwrap(), &[2, 2], &[7.0, 11.0, 9.0, 13.0], 1e-12);
}

#[test]
fn test_backward_twice_resets_instead_of_accumulating() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let x = g.wrap(x);
    let p = g.mat_mul(x, y).unwrap();
    g.forward(p).unwrap();
    g.backward(p).unwrap();
    let first = g.grad(x).unwrap().clone();
    g.backward(p).unwrap();
    assert_eq!(g.grad(x).unwrap(), &first);
}

#[test]
fn test_constants_receive_no_gradient() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let x = g.constant(x);
    let y = g.constant(y);
    let p = g.mat_mul(x, y).unwrap();
    assert!(!g.requires_grad(p).unwrap());
    g.forward(p).unwrap();
    g.backward(p).unwrap();
    assert!(g.grad(x).is_none());
    assert!(g.grad(y).is_none());
    // The root itself is still seeded.
    assert_eq!(g.grad(p).unwrap().data(), &[1.0; 4]);
}

#[test]
fn test_backward_before_forward_is_uninitialized() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let p = g.mat_mul(x, y).unwrap();
    let t = g.tanh(p).unwrap();
    assert_eq!(
        g.backward(t),
        Err(MatGradError::UninitializedGradient { node: p.index() })
    );
    assert!(g.grad(t).is_none());
}

#[test]
fn test_failed_backward_leaves_no_partial_gradients() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let x = g.wrap(x);
    let p = g.mat_mul(x, y).unwrap();
    let t = g.tanh(p).unwrap();
    g.forward(t).unwrap();
    g.backward(t).unwrap();
    assert!(g.grad(x).is_some());

    // Drop the cached output of tanh behind the graph's back.
    g.nodes[t.index()].value = None;
    assert!(g.backward(t).is_err());
    for id in [x, p, t] {
        assert!(g.grad(id).is_none(), "{} kept a gradient", id);
    }
}

#[test]
fn test_topological_order_puts_predecessors_first() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let unrelated = g.wrap(Matrix::zeros(vec![1, 1]));
    let x = g.wrap(x);
    let y = g.wrap(y);
    let h = g.mat_mul(x, y).unwrap();
    let t = g.tanh(h).unwrap();
    let root = g.mat_mul(t, h).unwrap();

    let order = g.topological_order(root).unwrap().to_vec();
    assert_eq!(order.len(), 5);
    assert!(!order.contains(&unrelated));
    assert_eq!(order.last(), Some(&root));
    let pos = |id: NodeId| order.iter().position(|&o| o == id).unwrap();
    for &id in &order {
        for pred in g.predecessors(id).unwrap() {
            assert!(pos(pred) < pos(id));
        }
    }
}

#[test]
fn test_topological_order_is_memoized() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let p = g.mat_mul(x, y).unwrap();
    let first = g.topological_order(p).unwrap().to_vec();
    assert!(g.topo_cache.contains_key(&p));
    // A corrupted structure would be detected by a fresh sort; the cached order is served.
    g.nodes[p.index()].op = Op::Tanh { input: p };
    assert_eq!(g.topological_order(p).unwrap(), first.as_slice());
}

#[test]
fn test_cycle_is_detected() {
    let mut g = Graph::new();
    let a = g.wrap(create_test_matrix(vec![0.5], vec![1, 1]));
    let b = g.tanh(a).unwrap();
    let c = g.tanh(b).unwrap();
    // b <- c <- b
    g.nodes[b.index()].op = Op::Tanh { input: c };
    match g.topological_order(c) {
        Err(MatGradError::GraphCycle { node }) => assert!(node == b.index() || node == c.index()),
        other => panic!("Expected GraphCycle, got {:?}", other),
    }
    assert!(matches!(g.forward(c), Err(MatGradError::GraphCycle { .. })));
}

#[test]
fn test_self_loop_is_detected() {
    let mut g = Graph::new();
    let a = g.wrap(create_test_matrix(vec![0.5], vec![1, 1]));
    let b = g.tanh(a).unwrap();
    g.nodes[b.index()].op = Op::Tanh { input: b };
    assert_eq!(
        g.backward(b),
        Err(MatGradError::GraphCycle { node: b.index() })
    );
}

#[test]
fn test_set_value_invalidates_derived_values() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let x = g.constant(x);
    let p = g.mat_mul(x, y).unwrap();
    g.forward(p).unwrap();
    assert_eq!(g.value(p).unwrap().data(), &[19.0, 22.0, 43.0, 50.0]);

    g.set_value(x, Matrix::ones(vec![2, 2])).unwrap();
    assert!(g.value(p).is_none());
    assert_eq!(g.state(p).unwrap(), NodeState::Unevaluated);
    g.forward(p).unwrap();
    assert_eq!(g.value(p).unwrap().data(), &[12.0, 14.0, 12.0, 14.0]);
}

#[test]
fn test_set_value_rejects_bad_targets() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let x = g.wrap(x);
    let p = g.mat_mul(x, y).unwrap();
    assert_eq!(
        g.set_value(p, Matrix::zeros(vec![2, 2])),
        Err(MatGradError::NotALeaf { node: p.index() })
    );
    assert_eq!(
        g.set_value(x, Matrix::zeros(vec![3, 2])),
        Err(MatGradError::ShapeMismatch {
            expected: vec![2, 2],
            actual: vec![3, 2],
            operation: "set_value".to_string(),
        })
    );
}

#[test]
fn test_param_mut_exposes_value_and_grad() {
    let (x, y) = x_y();
    let mut g = Graph::new();
    let x = g.wrap(x);
    let p = g.mat_mul(x, y).unwrap();
    g.forward(p).unwrap();
    g.backward(p).unwrap();

    {
        let (data, grad) = g.param_mut(x).unwrap();
        let grad = grad.unwrap().data().to_vec();
        // ones @ y^T
        assert_eq!(grad, vec![11.0, 15.0, 11.0, 15.0]);
        for (d, gr) in data.iter_mut().zip(grad) {
            *d -= 0.1 * gr;
        }
    }
    assert!(g.value(p).is_none());
    assert!(g.grad(x).is_some());
    assert!(g.param_mut(p).is_err());
    assert!(matches!(
        g.backward(p),
        Err(MatGradError::UninitializedGradient { .. })
    ));
}

#[test]
fn test_invalidate_drops_saved_state() {
    let mut g = Graph::new();
    let logits = g.wrap(create_test_matrix(vec![1.0, 2.0], vec![1, 2]));
    let labels = g.constant(create_test_matrix(vec![0.0, 1.0], vec![1, 2]));
    let loss = g.softmax_cross_entropy(logits, labels).unwrap();
    g.forward(loss).unwrap();
    assert!(matches!(
        g.nodes[loss.index()].op,
        Op::SoftmaxCrossEntropy { probs: Some(_), .. }
    ));
    g.invalidate();
    assert!(matches!(
        g.nodes[loss.index()].op,
        Op::SoftmaxCrossEntropy { probs: None, .. }
    ));
    assert!(g.value(logits).is_some());
}

#[test]
fn test_batch_norm_single_row_batch() {
    let mut g = Graph::new();
    let x = g.wrap(create_test_matrix(vec![3.0, -2.0], vec![1, 2]));
    let gain = g.wrap(create_test_matrix(vec![0.1, 0.1], vec![2]));
    let bias = g.wrap(create_test_matrix(vec![0.2, 0.2], vec![2]));
    let out = g.batch_norm(x, gain, bias).unwrap();
    g.forward(out).unwrap();
    g.backward(out).unwrap();

    // Zero variance: the normalized input is exactly zero.
    check_matrix_near(g.value(out).unwrap(), &[1, 2], &[0.2, 0.2], 1e-12);
    check_matrix_near(g.grad(x).unwrap(), &[1, 2], &[0.0, 0.0], 1e-12);
    check_matrix_near(g.grad(gain).unwrap(), &[2], &[0.0, 0.0], 1e-12);
    check_matrix_near(g.grad(bias).unwrap(), &[2], &[1.0, 1.0], 1e-12);
}

#[test]
fn test_embedding_then_cross_entropy_trains_table_only() {
    let mut g = Graph::new();
    let table = g.wrap(create_test_matrix(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], vec![3, 2]));
    let idx = g.constant(create_test_matrix(vec![2.0, 0.0, 2.0], vec![3]));
    let labels = g.constant(create_test_matrix(
        vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0],
        vec![3, 2],
    ));
    let emb = g.embedding(table, idx).unwrap();
    let loss = g.softmax_cross_entropy(emb, labels).unwrap();
    g.forward(loss).unwrap();
    g.backward(loss).unwrap();

    let grad = g.grad(table).unwrap();
    assert_eq!(grad.shape(), &[3, 2]);
    // Row 1 is never looked up.
    assert_eq!(&grad.data()[2..4], &[0.0, 0.0]);
    assert!(g.grad(idx).is_none());
}

#[test]
fn test_graph_is_send() {
    fn assert_send<S: Send>() {}
    assert_send::<Graph<f64>>();
    assert_send::<Graph<f32>>();
}
