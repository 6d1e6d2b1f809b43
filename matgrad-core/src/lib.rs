//! # matgrad-core
//!
//! A small reverse-mode automatic differentiation engine over dense row-major
//! matrices. Computations are recorded as nodes of a [`Graph`] arena; a forward
//! pass evaluates them in topological order and a backward pass propagates
//! gradients from a root to every ancestor that requires them.
//!
//! ```
//! use matgrad_core::{Graph, Matrix};
//!
//! let mut graph = Graph::<f64>::new();
//! let x = graph.constant(Matrix::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2])?);
//! let w = graph.wrap(Matrix::new(vec![0.5, -0.5, 0.25, 0.75], vec![2, 2])?);
//! let labels = graph.constant(Matrix::new(vec![0.0, 1.0, 1.0, 0.0], vec![2, 2])?);
//!
//! let logits = graph.mat_mul(x, w)?;
//! let loss = graph.softmax_cross_entropy(logits, labels)?;
//! graph.forward(loss)?;
//! graph.backward(loss)?;
//!
//! assert!(graph.value(loss).unwrap().item()? > 0.0);
//! assert_eq!(graph.grad(w).unwrap().shape(), &[2, 2]);
//! # Ok::<(), matgrad_core::MatGradError>(())
//! ```

pub mod autograd;
pub mod error;
pub mod matrix;
pub mod numeric;
pub mod ops;
pub mod utils;

pub use autograd::{Graph, IntoNode, NodeId, NodeState};
pub use error::MatGradError;
pub use matrix::Matrix;
pub use numeric::MatNumeric;

// Re-export traits required by public functions/structs
pub use num_traits;
