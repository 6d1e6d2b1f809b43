// matgrad-core/src/autograd/op.rs

use crate::autograd::node::{Node, NodeId};
use crate::error::MatGradError;
use crate::matrix::Matrix;
use crate::numeric::MatNumeric;
use crate::ops::activation::{tanh_backward, tanh_forward};
use crate::ops::indexing::{embedding_backward, embedding_forward};
use crate::ops::linalg::{
    matmul_backward, matmul_bias_backward, matmul_bias_forward, matmul_forward,
};
use crate::ops::loss::{softmax_cross_entropy_backward, softmax_cross_entropy_forward};
use crate::ops::normalization::{batch_norm_backward, batch_norm_forward, BatchNormSaved};

/// The operation that produced a node, with the operand ids and whatever state its
/// backward rule needs from the forward pass.
#[derive(Debug)]
pub(crate) enum Op<T> {
    /// Input data or trainable parameter.
    Leaf,
    MatMul {
        lhs: NodeId,
        rhs: NodeId,
    },
    MatMulBias {
        lhs: NodeId,
        rhs: NodeId,
        bias: NodeId,
    },
    SoftmaxCrossEntropy {
        logits: NodeId,
        labels: NodeId,
        probs: Option<Matrix<T>>,
    },
    BatchNorm {
        input: NodeId,
        gain: NodeId,
        bias: NodeId,
        epsilon: T,
        saved: Option<BatchNormSaved<T>>,
    },
    Tanh {
        input: NodeId,
    },
    Embedding {
        table: NodeId,
        indices: NodeId,
    },
}

/// Forward state produced alongside a node's value.
pub(crate) enum Saved<T> {
    Probs(Matrix<T>),
    BatchNorm(BatchNormSaved<T>),
}

fn value_of<T>(nodes: &[Node<T>], id: NodeId) -> Result<&Matrix<T>, MatGradError> {
    nodes
        .get(id.0)
        .and_then(|node| node.value.as_ref())
        .ok_or_else(|| {
            MatGradError::InternalError(format!("value of operand {} read before evaluation", id))
        })
}

fn missing_saved(op: &str) -> MatGradError {
    MatGradError::InternalError(format!("{} backward ran without its forward state", op))
}

impl<T> Op<T> {
    /// Name used in logs and error messages.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Op::Leaf => "leaf",
            Op::MatMul { .. } => "mat_mul",
            Op::MatMulBias { .. } => "mat_mul_bias",
            Op::SoftmaxCrossEntropy { .. } => "softmax_cross_entropy",
            Op::BatchNorm { .. } => "batch_norm",
            Op::Tanh { .. } => "tanh",
            Op::Embedding { .. } => "embedding",
        }
    }

    /// Operands in call order. An operand passed twice appears twice.
    pub(crate) fn operands(&self) -> Vec<NodeId> {
        match self {
            Op::Leaf => vec![],
            Op::MatMul { lhs, rhs } => vec![*lhs, *rhs],
            Op::MatMulBias { lhs, rhs, bias } => vec![*lhs, *rhs, *bias],
            Op::SoftmaxCrossEntropy { logits, labels, .. } => vec![*logits, *labels],
            Op::BatchNorm {
                input, gain, bias, ..
            } => vec![*input, *gain, *bias],
            Op::Tanh { input } => vec![*input],
            Op::Embedding { table, indices } => vec![*table, *indices],
        }
    }

    /// Stores the forward state produced by [`Op::forward`].
    pub(crate) fn save(&mut self, state: Saved<T>) {
        match (self, state) {
            (Op::SoftmaxCrossEntropy { probs, .. }, Saved::Probs(p)) => *probs = Some(p),
            (Op::BatchNorm { saved, .. }, Saved::BatchNorm(s)) => *saved = Some(s),
            _ => {}
        }
    }

    /// Drops the forward state, e.g. when the graph is invalidated.
    pub(crate) fn clear_saved(&mut self) {
        match self {
            Op::SoftmaxCrossEntropy { probs, .. } => *probs = None,
            Op::BatchNorm { saved, .. } => *saved = None,
            _ => {}
        }
    }
}

impl<T: MatNumeric> Op<T> {
    /// Computes the node value from the operand values held in `nodes`.
    pub(crate) fn forward(
        &self,
        nodes: &[Node<T>],
    ) -> Result<(Matrix<T>, Option<Saved<T>>), MatGradError> {
        match self {
            Op::Leaf => Err(MatGradError::InternalError(
                "leaf nodes are never evaluated".to_string(),
            )),
            Op::MatMul { lhs, rhs } => {
                let out = matmul_forward(value_of(nodes, *lhs)?, value_of(nodes, *rhs)?)?;
                Ok((out, None))
            }
            Op::MatMulBias { lhs, rhs, bias } => {
                let out = matmul_bias_forward(
                    value_of(nodes, *lhs)?,
                    value_of(nodes, *rhs)?,
                    value_of(nodes, *bias)?,
                )?;
                Ok((out, None))
            }
            Op::SoftmaxCrossEntropy { logits, labels, .. } => {
                let (loss, probs) = softmax_cross_entropy_forward(
                    value_of(nodes, *logits)?,
                    value_of(nodes, *labels)?,
                )?;
                Ok((loss, Some(Saved::Probs(probs))))
            }
            Op::BatchNorm {
                input,
                gain,
                bias,
                epsilon,
                ..
            } => {
                let (out, saved) = batch_norm_forward(
                    value_of(nodes, *input)?,
                    value_of(nodes, *gain)?,
                    value_of(nodes, *bias)?,
                    *epsilon,
                )?;
                Ok((out, Some(Saved::BatchNorm(saved))))
            }
            Op::Tanh { input } => Ok((tanh_forward(value_of(nodes, *input)?), None)),
            Op::Embedding { table, indices } => {
                let out = embedding_forward(value_of(nodes, *table)?, value_of(nodes, *indices)?)?;
                Ok((out, None))
            }
        }
    }

    /// Maps the gradient of this node's output onto its operands.
    ///
    /// Returns one `(operand, gradient)` pair per differentiable operand. The caller
    /// accumulates them; non-differentiable operands (labels, indices) are absent.
    pub(crate) fn backward(
        &self,
        grad_output: &Matrix<T>,
        output: &Matrix<T>,
        nodes: &[Node<T>],
    ) -> Result<Vec<(NodeId, Matrix<T>)>, MatGradError> {
        match self {
            Op::Leaf => Ok(vec![]),
            Op::MatMul { lhs, rhs } => {
                let (grad_a, grad_b) =
                    matmul_backward(grad_output, value_of(nodes, *lhs)?, value_of(nodes, *rhs)?)?;
                Ok(vec![(*lhs, grad_a), (*rhs, grad_b)])
            }
            Op::MatMulBias { lhs, rhs, bias } => {
                let (grad_a, grad_b, grad_bias) = matmul_bias_backward(
                    grad_output,
                    value_of(nodes, *lhs)?,
                    value_of(nodes, *rhs)?,
                )?;
                Ok(vec![(*lhs, grad_a), (*rhs, grad_b), (*bias, grad_bias)])
            }
            Op::SoftmaxCrossEntropy {
                logits,
                labels,
                probs,
            } => {
                let probs = probs.as_ref().ok_or_else(|| missing_saved(self.name()))?;
                let grad =
                    softmax_cross_entropy_backward(grad_output, probs, value_of(nodes, *labels)?)?;
                Ok(vec![(*logits, grad)])
            }
            Op::BatchNorm {
                input,
                gain,
                bias,
                saved,
                ..
            } => {
                let saved = saved.as_ref().ok_or_else(|| missing_saved(self.name()))?;
                let (grad_x, grad_gain, grad_bias) =
                    batch_norm_backward(grad_output, value_of(nodes, *gain)?, saved)?;
                Ok(vec![(*input, grad_x), (*gain, grad_gain), (*bias, grad_bias)])
            }
            Op::Tanh { input } => Ok(vec![(*input, tanh_backward(grad_output, output)?)]),
            Op::Embedding { table, indices } => {
                let table_shape = value_of(nodes, *table)?.shape();
                let grad =
                    embedding_backward(grad_output, table_shape, value_of(nodes, *indices)?)?;
                Ok(vec![(*table, grad)])
            }
        }
    }
}
