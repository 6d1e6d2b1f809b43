use thiserror::Error;

/// Custom error type for the matgrad engine.
///
/// Every variant aborts the pass that raised it. Shape-related variants always carry
/// the name of the offending operation so a failure can be traced back to the node
/// that was being built or evaluated.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum MatGradError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Rank mismatch: operation {operation} expects rank {expected}, got shape {actual:?}")]
    RankMismatch {
        expected: usize,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Matrix creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Index out of bounds in {operation}: index {index} is not a valid row of {bound}")]
    IndexOutOfBounds {
        index: f64,
        bound: usize,
        operation: String,
    },

    #[error("Operation {operation} received an empty input")]
    EmptyInput { operation: String },

    #[error("Cycle detected in the computation graph at node {node}")]
    GraphCycle { node: usize },

    #[error("Backward requested through node {node}, whose forward pass never ran")]
    UninitializedGradient { node: usize },

    #[error("Unknown node {node}: the graph only holds {len} nodes")]
    UnknownNode { node: usize, len: usize },

    #[error("Node {node} is not a leaf; only leaf values may be replaced")]
    NotALeaf { node: usize },

    #[error("Expected a single-element matrix, got shape {shape:?}")]
    NotAScalar { shape: Vec<usize> },

    #[error("Internal error: {0}")]
    InternalError(String),
}
