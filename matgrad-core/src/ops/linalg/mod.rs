//! Linear algebra operations.

pub mod matmul;
pub mod matmul_bias;

pub use matmul::{matmul_backward, matmul_forward, matmul_shape};
pub use matmul_bias::{matmul_bias_backward, matmul_bias_forward, matmul_bias_shape};
