//! Adam optimizer

use std::collections::HashMap;

use ndarray::Array1;

use super::{GradParam, Optimizer};
use crate::error::{MpError, Result};

/// Adam optimizer with bias correction
///
/// Moment buffers are keyed by parameter identity. The internal timestep
/// advances once per `apply_gradients` call.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: HashMap<usize, Array1<f32>>,
    v: HashMap<usize, Array1<f32>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }

    /// Create Adam with the usual defaults (β1=0.9, β2=0.999, ε=1e-8)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn apply_gradients(&mut self, pairs: &[GradParam], step: Option<&mut u64>) -> Result<()> {
        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

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

            let id = pair.param.id();
            let m = self
                .m
                .entry(id)
                .or_insert_with(|| Array1::zeros(expected));
            *m = &*m * self.beta1 + &g * (1.0 - self.beta1);
            let v = self
                .v
                .entry(id)
                .or_insert_with(|| Array1::zeros(expected));
            *v = &*v * self.beta2 + &(&g * &g) * (1.0 - self.beta2);

            let m_hat = &*m / bias1;
            let v_hat = &*v / bias2;

            let mut data = pair.param.data_mut();
            for ((d, m), v) in data.iter_mut().zip(m_hat.iter()).zip(v_hat.iter()) {
                *d -= self.lr * m / (v.sqrt() + self.epsilon);
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
