// matgrad-core/src/autograd/graph.rs

use crate::autograd::node::{Node, NodeId, NodeState};
use crate::autograd::op::Op;
use crate::error::MatGradError;
use crate::matrix::Matrix;
use crate::numeric::MatNumeric;
use crate::ops::indexing::embedding_shape;
use crate::ops::linalg::{matmul_bias_shape, matmul_shape};
use crate::ops::loss::softmax_cross_entropy_shape;
use crate::ops::normalization::{batch_norm_shape, DEFAULT_EPSILON};
use log::{debug, trace, warn};
use std::collections::HashMap;

/// Anything that can be used as an operand: an existing node, or a raw matrix that
/// gets wrapped into a new trainable leaf.
pub trait IntoNode<T: MatNumeric> {
    fn into_node(self, graph: &mut Graph<T>) -> Result<NodeId, MatGradError>;
}

impl<T: MatNumeric> IntoNode<T> for NodeId {
    fn into_node(self, graph: &mut Graph<T>) -> Result<NodeId, MatGradError> {
        graph.node(self)?;
        Ok(self)
    }
}

impl<T: MatNumeric> IntoNode<T> for Matrix<T> {
    fn into_node(self, graph: &mut Graph<T>) -> Result<NodeId, MatGradError> {
        Ok(graph.wrap(self))
    }
}

/// Visit marks of the depth-first topological sort.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// An append-only arena of nodes forming a computation DAG.
///
/// Nodes are created through [`Graph::wrap`], [`Graph::constant`] and the operation
/// methods, and are never removed: a training loop builds the graph once, then
/// alternates `forward` / `backward` / leaf updates on the same structure.
///
/// Shapes are inferred when a node is created, so incompatible operands are
/// rejected before the node exists. Values are computed lazily by
/// [`Graph::forward`]; gradients are populated by [`Graph::backward`].
#[derive(Debug)]
pub struct Graph<T> {
    nodes: Vec<Node<T>>,
    /// Topological order of each root's ancestor set, computed on first use.
    topo_cache: HashMap<NodeId, Vec<NodeId>>,
}

impl<T: MatNumeric> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MatNumeric> Graph<T> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            topo_cache: HashMap::new(),
        }
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node<T>, MatGradError> {
        self.nodes.get(id.0).ok_or(MatGradError::UnknownNode {
            node: id.0,
            len: self.nodes.len(),
        })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<T>, MatGradError> {
        let len = self.nodes.len();
        self.nodes
            .get_mut(id.0)
            .ok_or(MatGradError::UnknownNode { node: id.0, len })
    }

    fn push(&mut self, node: Node<T>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    // --- Leaves ---

    /// Creates a trainable leaf: gradients flow into it during `backward`.
    pub fn wrap(&mut self, value: Matrix<T>) -> NodeId {
        self.push(Node::leaf(value, true))
    }

    /// Creates a data leaf (inputs, labels, indices). It never receives a gradient.
    pub fn constant(&mut self, value: Matrix<T>) -> NodeId {
        self.push(Node::leaf(value, false))
    }

    fn derive(&mut self, op: Op<T>, shape: Vec<usize>) -> Result<NodeId, MatGradError> {
        let mut requires_grad = false;
        for operand in op.operands() {
            requires_grad |= self.node(operand)?.requires_grad;
        }
        trace!("Creating {} node with shape {:?}", op.name(), shape);
        Ok(self.push(Node::derived(op, shape, requires_grad)))
    }

    // --- Operations ---

    /// Matrix product `a @ b`.
    ///
    /// # Errors
    /// `RankMismatch` / `ShapeMismatch` when `a` is not `[m, k]` or `b` is not `[k, n]`.
    pub fn mat_mul(
        &mut self,
        a: impl IntoNode<T>,
        b: impl IntoNode<T>,
    ) -> Result<NodeId, MatGradError> {
        let lhs = a.into_node(self)?;
        let rhs = b.into_node(self)?;
        let shape = matmul_shape(&self.node(lhs)?.shape, &self.node(rhs)?.shape)?;
        self.derive(Op::MatMul { lhs, rhs }, shape)
    }

    /// Matrix product `a @ b` plus `bias` (shape `[n]`) added to every row.
    pub fn mat_mul_bias(
        &mut self,
        a: impl IntoNode<T>,
        b: impl IntoNode<T>,
        bias: impl IntoNode<T>,
    ) -> Result<NodeId, MatGradError> {
        let lhs = a.into_node(self)?;
        let rhs = b.into_node(self)?;
        let bias = bias.into_node(self)?;
        let shape = matmul_bias_shape(
            &self.node(lhs)?.shape,
            &self.node(rhs)?.shape,
            &self.node(bias)?.shape,
        )?;
        self.derive(Op::MatMulBias { lhs, rhs, bias }, shape)
    }

    /// Mean softmax cross-entropy of `logits` against one-hot `labels`, a scalar.
    ///
    /// The labels operand is treated as data and receives no gradient.
    pub fn softmax_cross_entropy(
        &mut self,
        logits: impl IntoNode<T>,
        labels: impl IntoNode<T>,
    ) -> Result<NodeId, MatGradError> {
        let logits = logits.into_node(self)?;
        let labels = labels.into_node(self)?;
        let shape =
            softmax_cross_entropy_shape(&self.node(logits)?.shape, &self.node(labels)?.shape)?;
        self.derive(
            Op::SoftmaxCrossEntropy {
                logits,
                labels,
                probs: None,
            },
            shape,
        )
    }

    /// Batch normalization with the default epsilon (`1e-5`).
    pub fn batch_norm(
        &mut self,
        x: impl IntoNode<T>,
        gain: impl IntoNode<T>,
        bias: impl IntoNode<T>,
    ) -> Result<NodeId, MatGradError> {
        let epsilon = T::from_f64(DEFAULT_EPSILON).ok_or_else(|| {
            MatGradError::InternalError("Failed to convert epsilon to the element type".to_string())
        })?;
        self.batch_norm_with_epsilon(x, gain, bias, epsilon)
    }

    /// Batch normalization of the columns of `x` (`[m, n]`), scaled by `gain` and
    /// shifted by `bias` (both `[n]`).
    pub fn batch_norm_with_epsilon(
        &mut self,
        x: impl IntoNode<T>,
        gain: impl IntoNode<T>,
        bias: impl IntoNode<T>,
        epsilon: T,
    ) -> Result<NodeId, MatGradError> {
        let input = x.into_node(self)?;
        let gain = gain.into_node(self)?;
        let bias = bias.into_node(self)?;
        let shape = batch_norm_shape(
            &self.node(input)?.shape,
            &self.node(gain)?.shape,
            &self.node(bias)?.shape,
        )?;
        self.derive(
            Op::BatchNorm {
                input,
                gain,
                bias,
                epsilon,
                saved: None,
            },
            shape,
        )
    }

    /// Element-wise hyperbolic tangent.
    pub fn tanh(&mut self, x: impl IntoNode<T>) -> Result<NodeId, MatGradError> {
        let input = x.into_node(self)?;
        let shape = self.node(input)?.shape.clone();
        self.derive(Op::Tanh { input }, shape)
    }

    /// Looks up rows of `table` (`[vocab, dim]`) for every index in `indices`
    /// (`[m]` or `[m, k]`), concatenating the `k` rows of each output row.
    ///
    /// The indices operand is treated as data and receives no gradient.
    pub fn embedding(
        &mut self,
        table: impl IntoNode<T>,
        indices: impl IntoNode<T>,
    ) -> Result<NodeId, MatGradError> {
        let table = table.into_node(self)?;
        let indices = indices.into_node(self)?;
        let shape = embedding_shape(&self.node(table)?.shape, &self.node(indices)?.shape)?;
        self.derive(Op::Embedding { table, indices }, shape)
    }

    // --- Accessors ---

    /// The value computed by the last forward pass (always present for leaves).
    pub fn value(&self, id: NodeId) -> Option<&Matrix<T>> {
        self.nodes.get(id.0).and_then(|node| node.value.as_ref())
    }

    /// The gradient populated by the last backward pass.
    pub fn grad(&self, id: NodeId) -> Option<&Matrix<T>> {
        self.nodes.get(id.0).and_then(|node| node.grad.as_ref())
    }

    /// Static shape of the node.
    pub fn shape(&self, id: NodeId) -> Result<&[usize], MatGradError> {
        Ok(&self.node(id)?.shape)
    }

    /// Current lifecycle state of the node.
    pub fn state(&self, id: NodeId) -> Result<NodeState, MatGradError> {
        Ok(self.node(id)?.state)
    }

    /// Unique predecessors of the node, in operand order.
    pub fn predecessors(&self, id: NodeId) -> Result<Vec<NodeId>, MatGradError> {
        Ok(self.node(id)?.predecessors())
    }

    /// Name of the operation that produced the node (`"leaf"` for leaves).
    pub fn op_name(&self, id: NodeId) -> Result<&'static str, MatGradError> {
        Ok(self.node(id)?.op.name())
    }

    /// Whether gradients are propagated into this node.
    pub fn requires_grad(&self, id: NodeId) -> Result<bool, MatGradError> {
        Ok(self.node(id)?.requires_grad)
    }

    /// Whether the node is a leaf.
    pub fn is_leaf(&self, id: NodeId) -> Result<bool, MatGradError> {
        Ok(self.node(id)?.is_leaf())
    }

    // --- Leaf mutation ---

    /// Replaces the value of a leaf, e.g. to feed the next mini-batch.
    ///
    /// Every derived value is invalidated.
    ///
    /// # Errors
    /// `NotALeaf` for derived nodes, `ShapeMismatch` if the shape differs from the
    /// leaf's shape (the graph structure is static).
    pub fn set_value(&mut self, id: NodeId, value: Matrix<T>) -> Result<(), MatGradError> {
        let node = self.node(id)?;
        if !node.is_leaf() {
            return Err(MatGradError::NotALeaf { node: id.0 });
        }
        crate::matrix::expect_shape(value.shape(), &node.shape, "set_value")?;
        self.invalidate();
        self.node_mut(id)?.value = Some(value);
        Ok(())
    }

    /// Mutable access to a leaf's buffer together with its gradient, for optimizers.
    ///
    /// Every derived value is invalidated before the borrow is handed out.
    pub fn param_mut(
        &mut self,
        id: NodeId,
    ) -> Result<(&mut [T], Option<&Matrix<T>>), MatGradError> {
        if !self.node(id)?.is_leaf() {
            return Err(MatGradError::NotALeaf { node: id.0 });
        }
        self.invalidate();
        let node = self.node_mut(id)?;
        let value = node.value.as_mut().ok_or_else(|| {
            MatGradError::InternalError(format!("leaf {} has no value", id))
        })?;
        Ok((value.data_mut(), node.grad.as_ref()))
    }

    /// Drops the gradient of a node.
    pub fn clear_grad(&mut self, id: NodeId) -> Result<(), MatGradError> {
        self.node_mut(id)?.grad = None;
        Ok(())
    }

    /// Drops every derived value and its saved forward state so the next
    /// [`Graph::forward`] recomputes them. Leaf values and all gradients are kept.
    pub fn invalidate(&mut self) {
        let mut dropped = 0usize;
        for node in self.nodes.iter_mut().filter(|n| !n.is_leaf()) {
            if node.value.take().is_some() {
                dropped += 1;
            }
            node.op.clear_saved();
            node.state = NodeState::Unevaluated;
        }
        if dropped > 0 {
            debug!("Invalidated {} derived values", dropped);
        }
    }

    // --- Execution ---

    /// Returns the topological order of `root` and its ancestors: every node appears
    /// after all of its predecessors, `root` last.
    ///
    /// The order is computed once per root with an iterative depth-first search and
    /// then served from a cache (the structure of the ancestors of a node never
    /// changes).
    ///
    /// # Errors
    /// `GraphCycle` if a node is reached again while its own predecessors are still
    /// being visited.
    pub fn topological_order(&mut self, root: NodeId) -> Result<&[NodeId], MatGradError> {
        if !self.topo_cache.contains_key(&root) {
            let order = self.build_topo(root)?;
            debug!(
                "Cached topological order for root {}: {} nodes",
                root,
                order.len()
            );
            self.topo_cache.insert(root, order);
        }
        self.topo_cache
            .get(&root)
            .map(|order| order.as_slice())
            .ok_or_else(|| MatGradError::InternalError("topological order cache miss".to_string()))
    }

    fn build_topo(&self, root: NodeId) -> Result<Vec<NodeId>, MatGradError> {
        self.node(root)?;
        let mut marks: HashMap<NodeId, Mark> = HashMap::new();
        let mut order = Vec::new();
        // (node, predecessors already pushed)
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                marks.insert(id, Mark::Done);
                order.push(id);
                continue;
            }
            match marks.get(&id) {
                Some(Mark::Done) => continue,
                Some(Mark::InProgress) => return Err(MatGradError::GraphCycle { node: id.0 }),
                None => {}
            }
            marks.insert(id, Mark::InProgress);
            stack.push((id, true));
            for pred in self.node(id)?.predecessors().into_iter().rev() {
                match marks.get(&pred) {
                    Some(Mark::InProgress) => {
                        return Err(MatGradError::GraphCycle { node: pred.0 })
                    }
                    Some(Mark::Done) => {}
                    None => stack.push((pred, false)),
                }
            }
        }
        Ok(order)
    }

    /// Evaluates `root` and every ancestor that has no value yet, predecessors first.
    ///
    /// Nodes already forwarded in the current iteration are skipped, so calling
    /// `forward` twice is a no-op the second time.
    pub fn forward(&mut self, root: NodeId) -> Result<(), MatGradError> {
        let order = self.topological_order(root)?.to_vec();
        for id in order {
            if self.nodes[id.0].state != NodeState::Unevaluated {
                continue;
            }
            let (value, saved) = self.nodes[id.0].op.forward(&self.nodes)?;
            trace!(
                "Forward {} ({}) -> {:?}",
                id,
                self.nodes[id.0].op.name(),
                value.shape()
            );
            let node = &mut self.nodes[id.0];
            if let Some(saved) = saved {
                node.op.save(saved);
            }
            node.value = Some(value);
            node.state = NodeState::Forwarded;
        }
        Ok(())
    }

    /// Propagates gradients from `root` to all of its ancestors.
    ///
    /// Every gradient in the ancestor set is reset, `root` is seeded with ones of its
    /// shape, then nodes are visited in reverse topological order: each node's rule
    /// runs only after all of its consumers have added their contributions, and adds
    /// its own contributions into the predecessors that require grad.
    ///
    /// # Errors
    /// `UninitializedGradient` if any node of the ancestor set has not been forwarded.
    /// On any error all gradients of the ancestor set are cleared; no partial result
    /// is left behind.
    pub fn backward(&mut self, root: NodeId) -> Result<(), MatGradError> {
        let order = self.topological_order(root)?.to_vec();
        if let Some(id) = order
            .iter()
            .find(|id| self.nodes[id.0].state == NodeState::Unevaluated)
        {
            return Err(MatGradError::UninitializedGradient { node: id.0 });
        }

        for id in &order {
            let node = &mut self.nodes[id.0];
            node.grad = None;
            node.state = NodeState::Forwarded;
        }

        let result = self.propagate(root, &order);
        if result.is_err() {
            for id in &order {
                self.nodes[id.0].grad = None;
            }
        }
        result
    }

    fn propagate(&mut self, root: NodeId, order: &[NodeId]) -> Result<(), MatGradError> {
        let root_shape = self.nodes[root.0].shape.clone();
        if root_shape.iter().product::<usize>() != 1 {
            warn!(
                "Backward from non-scalar root {} with shape {:?}; seeding with ones",
                root, root_shape
            );
        }
        let root_node = &mut self.nodes[root.0];
        root_node.grad = Some(Matrix::ones(root_shape));
        root_node.state = NodeState::GradInitialized;

        for &id in order.iter().rev() {
            let node = &self.nodes[id.0];
            let contributions = match (&node.grad, &node.value) {
                (Some(grad), Some(value)) if node.requires_grad && !node.is_leaf() => {
                    node.op.backward(grad, value, &self.nodes)?
                }
                (_, None) => return Err(MatGradError::UninitializedGradient { node: id.0 }),
                _ => Vec::new(),
            };
            trace!(
                "Backward {} ({}): {} contributions",
                id,
                node.op.name(),
                contributions.len()
            );

            for (pred, grad) in contributions {
                let target = &mut self.nodes[pred.0];
                if !target.requires_grad {
                    continue;
                }
                match target.grad.as_mut() {
                    Some(existing) => existing.add_assign(&grad)?,
                    None => {
                        crate::matrix::expect_shape(
                            grad.shape(),
                            &target.shape,
                            "accumulate_grad",
                        )?;
                        target.grad = Some(grad);
                    }
                }
                target.state = NodeState::GradInitialized;
            }
            let node = &mut self.nodes[id.0];
            if node.grad.is_some() {
                node.state = NodeState::Backpropagated;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
