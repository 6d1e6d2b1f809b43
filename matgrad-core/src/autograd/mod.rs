//! # Autograd
//!
//! The computation graph: an arena of [`node`]s, the [`op`] tag each non-leaf node
//! carries, the [`graph`] executor driving forward and backward passes, and a
//! finite-difference [`grad_check`] utility.

pub mod grad_check;
pub mod graph;
pub mod node;
pub(crate) mod op;

pub use graph::{Graph, IntoNode};
pub use node::{NodeId, NodeState};
