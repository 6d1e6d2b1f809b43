// matgrad-core/src/autograd/node.rs

use crate::autograd::op::Op;
use crate::matrix::Matrix;
use std::fmt;

/// Stable handle to a node inside a [`Graph`](crate::autograd::Graph).
///
/// Ids are arena indices. A node only ever refers to nodes created before it, which
/// keeps the graph acyclic when built through the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its graph's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-iteration lifecycle of a node.
///
/// `Unevaluated -> Forwarded -> GradInitialized -> Backpropagated`. Invalidating the
/// graph sends every derived node back to `Unevaluated`; leaves always hold a value
/// and never drop below `Forwarded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    Unevaluated,
    Forwarded,
    GradInitialized,
    Backpropagated,
}

/// A vertex of the computation graph.
#[derive(Debug)]
pub(crate) struct Node<T> {
    pub(crate) op: Op<T>,
    /// Static shape, inferred when the node was created.
    pub(crate) shape: Vec<usize>,
    pub(crate) value: Option<Matrix<T>>,
    pub(crate) grad: Option<Matrix<T>>,
    pub(crate) state: NodeState,
    pub(crate) requires_grad: bool,
}

impl<T> Node<T> {
    pub(crate) fn leaf(value: Matrix<T>, requires_grad: bool) -> Self {
        Node {
            op: Op::Leaf,
            shape: value.shape.clone(),
            value: Some(value),
            grad: None,
            state: NodeState::Forwarded,
            requires_grad,
        }
    }

    pub(crate) fn derived(op: Op<T>, shape: Vec<usize>, requires_grad: bool) -> Self {
        Node {
            op,
            shape,
            value: None,
            grad: None,
            state: NodeState::Unevaluated,
            requires_grad,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.op, Op::Leaf)
    }

    /// Unique predecessors, in operand order.
    pub(crate) fn predecessors(&self) -> Vec<NodeId> {
        let mut preds: Vec<NodeId> = Vec::new();
        for id in self.op.operands() {
            if !preds.contains(&id) {
                preds.push(id);
            }
        }
        preds
    }
}
