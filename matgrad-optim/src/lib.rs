use matgrad_core::{Graph, MatGradError, MatNumeric, NodeId};

pub mod sgd;

pub use sgd::Sgd;

/// Trait for optimization algorithms.
/// Optimizers update the trainable leaves of a graph from the gradients left by the
/// last backward pass.
pub trait Optimizer<T: MatNumeric> {
    /// Performs a single optimization step (parameter update).
    ///
    /// # Arguments
    /// * `graph` - The graph owning the parameters. Updating a leaf invalidates every
    ///   derived value, so the next iteration starts with a fresh forward pass.
    /// * `params` - Leaf nodes to update. Parameters without a gradient are skipped.
    fn step(&mut self, graph: &mut Graph<T>, params: &[NodeId]) -> Result<(), MatGradError>;

    /// Clears the gradients of the given parameters.
    fn zero_grad(&self, graph: &mut Graph<T>, params: &[NodeId]) -> Result<(), MatGradError> {
        for &param in params {
            graph.clear_grad(param)?;
        }
        Ok(())
    }
}
