use crate::autograd::graph::Graph;
use crate::autograd::node::NodeId;
use crate::error::MatGradError;
use crate::matrix::Matrix;
use approx::relative_eq;
use log::debug;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error(
        "Gradient check failed for input {input_index}, element {element_index}: \
         analytical grad {analytical_grad:?} != numerical grad {numerical_grad:?} \
         (difference {difference:?})"
    )]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },

    #[error("Input {input_index} has no gradient after the backward pass")]
    MissingAnalyticalGrad { input_index: usize },

    #[error(
        "Numerical gradient is NaN or infinite for input {input_index}, \
         element {element_index} (loss+ {loss_plus:?}, loss- {loss_minus:?})"
    )]
    NumericalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },

    #[error(
        "Analytical gradient is NaN or infinite for input {input_index}, \
         element {element_index}: {value:?}"
    )]
    AnalyticalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        value: f64,
    },

    #[error("Graph error during gradient check: {0}")]
    GraphError(#[from] MatGradError),
}

/// Sum of every element of the root value, the scalar the checker differentiates.
fn root_loss(graph: &mut Graph<f64>, root: NodeId) -> Result<f64, GradCheckError> {
    graph.forward(root)?;
    let value = graph
        .value(root)
        .ok_or(MatGradError::UninitializedGradient { node: root.index() })?;
    Ok(value.data().iter().sum())
}

/// Checks analytical gradients against central finite differences.
///
/// `build` receives a fresh graph and one trainable leaf per entry of `inputs`, and
/// returns the node to differentiate. Backward from that node seeds ones, which is
/// the gradient of the sum of its elements, so the numerical side differentiates
/// `sum(root)` as well. Each input element is perturbed by `±epsilon` in place with
/// [`Graph::set_value`]; the graph is built only once.
///
/// A mismatch is reported when both the absolute and the relative difference exceed
/// `tolerance`.
pub fn check_grad<F>(
    build: F,
    inputs: &[Matrix<f64>],
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    F: Fn(&mut Graph<f64>, &[NodeId]) -> Result<NodeId, MatGradError>,
{
    let mut graph = Graph::new();
    let ids: Vec<NodeId> = inputs.iter().map(|m| graph.wrap(m.clone())).collect();
    let root = build(&mut graph, &ids)?;

    graph.forward(root)?;
    graph.backward(root)?;

    let mut analytical = Vec::with_capacity(ids.len());
    for (i, &id) in ids.iter().enumerate() {
        let grad = graph
            .grad(id)
            .ok_or(GradCheckError::MissingAnalyticalGrad { input_index: i })?;
        analytical.push(grad.data().to_vec());
    }

    for (i, (&id, original)) in ids.iter().zip(inputs.iter()).enumerate() {
        for elem_idx in 0..original.numel() {
            let mut plus = original.clone();
            plus.data_mut()[elem_idx] += epsilon;
            graph.set_value(id, plus)?;
            let loss_plus = root_loss(&mut graph, root)?;

            let mut minus = original.clone();
            minus.data_mut()[elem_idx] -= epsilon;
            graph.set_value(id, minus)?;
            let loss_minus = root_loss(&mut graph, root)?;

            graph.set_value(id, original.clone())?;

            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
            let analytical_grad = analytical[i][elem_idx];

            if !numerical_grad.is_finite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    input_index: i,
                    element_index: elem_idx,
                    loss_plus,
                    loss_minus,
                });
            }
            if !analytical_grad.is_finite() {
                return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
                    input_index: i,
                    element_index: elem_idx,
                    value: analytical_grad,
                });
            }

            if !relative_eq!(
                analytical_grad,
                numerical_grad,
                epsilon = tolerance,
                max_relative = tolerance
            ) {
                return Err(GradCheckError::GradientMismatch {
                    input_index: i,
                    element_index: elem_idx,
                    analytical_grad,
                    numerical_grad,
                    difference: (analytical_grad - numerical_grad).abs(),
                });
            }
        }
        debug!("Gradient check passed for input {} ({} elements)", i, original.numel());
    }

    Ok(())
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
