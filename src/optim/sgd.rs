//! Stochastic Gradient Descent optimizer

use std::collections::HashMap;

use ndarray::Array1;

use super::{GradParam, Optimizer};
use crate::error::{MpError, Result};

/// SGD optimizer with optional momentum
///
/// Velocity buffers are keyed by parameter identity, so the same pair list
/// can shrink or grow between steps (e.g. when some parameters receive no
/// gradient).
pub struct Sgd {
    lr: f32,
    momentum: f32,
    velocities: HashMap<usize, Array1<f32>>,
}

impl Sgd {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: HashMap::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn apply_gradients(&mut self, pairs: &[GradParam], step: Option<&mut u64>) -> Result<()> {
        for pair in pairs {
            let Some(grad) = &pair.grad else { continue };

            let expected = pair.param.len();
            let values = grad.values();
            if !grad.is_sparse() && values.len() != expected {
                return Err(MpError::ShapeMismatch {
                    name: pair.param.name().unwrap_or("<unnamed>").to_string(),
                    expected,
                    got: values.len(),
                });
            }
            let g = grad.to_dense(expected);

            if self.momentum > 0.0 {
                let velocity = self
                    .velocities
                    .entry(pair.param.id())
                    .or_insert_with(|| Array1::zeros(expected));

                // v = momentum * v - lr * grad
                *velocity = &*velocity * self.momentum - &g * self.lr;
                let mut data = pair.param.data_mut();
                *data = &*data + &*velocity;
            } else {
                // param -= lr * grad
                let mut data = pair.param.data_mut();
                *data = &*data - &(&g * self.lr);
            }
        }

        if let Some(step) = step {
            *step += 1;
        }
        Ok(())
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
