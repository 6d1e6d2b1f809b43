use matgrad_core::{Graph, Matrix};
use matgrad_optim::{Optimizer, Sgd};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A two-layer classifier on a fixed, linearly separable batch; the graph is built
/// once and reused for every iteration.
#[test]
fn test_sgd_reduces_cross_entropy() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(1234);
    let mut graph = Graph::<f64>::new();

    let x = graph.constant(
        Matrix::from_rows(&[
            vec![1.0, 0.0],
            vec![0.9, 0.2],
            vec![0.0, 1.0],
            vec![0.1, 0.8],
        ])
        .unwrap(),
    );
    let labels = graph.constant(
        Matrix::from_rows(&[
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        ])
        .unwrap(),
    );
    let w1 = graph.wrap(Matrix::randn(vec![2, 8], &mut rng).scale(0.5));
    let b1 = graph.wrap(Matrix::zeros(vec![8]));
    let w2 = graph.wrap(Matrix::randn(vec![8, 2], &mut rng).scale(0.5));
    let b2 = graph.wrap(Matrix::zeros(vec![2]));

    let h = graph.mat_mul_bias(x, w1, b1).unwrap();
    let h = graph.tanh(h).unwrap();
    let logits = graph.mat_mul_bias(h, w2, b2).unwrap();
    let loss = graph.softmax_cross_entropy(logits, labels).unwrap();
    let params = [w1, b1, w2, b2];
    let nodes_after_build = graph.len();

    let mut optim = Sgd::new(0.5);
    let mut losses = Vec::new();
    for _ in 0..200 {
        graph.forward(loss).unwrap();
        losses.push(graph.value(loss).unwrap().item().unwrap());
        graph.backward(loss).unwrap();
        optim.step(&mut graph, &params).unwrap();
    }

    assert_eq!(graph.len(), nodes_after_build);
    let first = losses[0];
    let last = *losses.last().unwrap();
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);
    assert!(last < 0.2, "final loss too high: {}", last);
}

#[test]
fn test_step_invalidates_forward_values() {
    init_logger();
    let mut graph = Graph::<f64>::new();
    let w = graph.wrap(Matrix::from_rows(&[vec![1.0, -1.0]]).unwrap());
    let x = graph.constant(Matrix::from_rows(&[vec![2.0], vec![3.0]]).unwrap());
    let out = graph.mat_mul(x, w).unwrap();
    graph.forward(out).unwrap();
    graph.backward(out).unwrap();

    let mut optim = Sgd::new(0.1);
    optim.step(&mut graph, &[w]).unwrap();
    assert!(graph.value(out).is_none());
    graph.forward(out).unwrap();
    // w = [1, -1] - 0.1 * [5, 5]
    assert_eq!(graph.value(w).unwrap().data(), &[0.5, -1.5]);
}
