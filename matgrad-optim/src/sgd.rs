// matgrad-optim/src/sgd.rs

use crate::Optimizer;
use log::trace;
use matgrad_core::{Graph, MatGradError, MatNumeric, NodeId};

/// Implements plain stochastic gradient descent.
///
/// Updates parameters `p` according to the rule:
/// `p = p - lr * grad(p)`
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f64,
}

impl Sgd {
    /// Creates a new SGD optimizer instance.
    ///
    /// # Arguments
    ///
    /// * `lr` - The learning rate.
    pub fn new(lr: f64) -> Self {
        Sgd { lr }
    }

    /// Current learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    /// Changes the learning rate, e.g. for a step decay schedule.
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
}

impl<T: MatNumeric> Optimizer<T> for Sgd {
    fn step(&mut self, graph: &mut Graph<T>, params: &[NodeId]) -> Result<(), MatGradError> {
        let lr = T::from_f64(self.lr).ok_or_else(|| {
            MatGradError::InternalError(format!(
                "Could not convert learning rate {} to the element type",
                self.lr
            ))
        })?;
        for &param in params {
            let (data, grad) = graph.param_mut(param)?;
            let Some(grad) = grad else {
                trace!("SGD: parameter {} has no gradient, skipped", param);
                continue;
            };
            if grad.numel() != data.len() {
                return Err(MatGradError::ShapeMismatch {
                    expected: vec![data.len()],
                    actual: grad.shape().to_vec(),
                    operation: "sgd_step".to_string(),
                });
            }
            for (p, &g) in data.iter_mut().zip(grad.data().iter()) {
                *p -= lr * g;
            }
        }
        Ok(())
    }
}
