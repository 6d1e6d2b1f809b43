//! # Operation Library (`ops`)
//!
//! Pure matrix-level kernels for every differentiable operation the graph supports.
//! Operations are grouped into submodules by category.
//!
//! ## Structure:
//!
//! - **`*_shape` functions:** infer the output shape from operand shapes. The graph
//!   calls them when a node is created, so incompatible operands fail before the
//!   node exists.
//! - **`*_forward` functions:** compute the output value (plus any state the backward
//!   rule needs, such as softmax probabilities).
//! - **`*_backward` functions:** map the output gradient to one gradient per
//!   differentiable operand. They never accumulate themselves; the graph adds the
//!   returned matrices into the operands' gradient buffers.
//!
//! ## Key Submodules:
//!
//! - [`linalg`]: `matmul`, `matmul_bias`.
//! - [`loss`]: fused softmax cross-entropy.
//! - [`normalization`]: batch normalization.
//! - [`activation`]: `tanh`.
//! - [`indexing`]: embedding row lookup.

pub mod activation;
pub mod indexing;
pub mod linalg;
pub mod loss;
pub mod normalization;
