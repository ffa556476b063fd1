//! Optimizer trait

use super::{Grad, GradParam};
use crate::autograd::backward;
use crate::error::Result;
use crate::Tensor;

/// Trait for optimization algorithms
///
/// Split into gradient computation and gradient application so a wrapper
/// can transform the pair list in between (promote precision, unscale,
/// health-check). Wrappers compose an inner `Optimizer` as a field and
/// delegate.
pub trait Optimizer {
    /// Compute (gradient, parameter) pairs for a loss
    ///
    /// The default runs the tape backward from `loss` and collects each
    /// trainable parameter's accumulated gradient. Parameters without a
    /// gradient after backward yield a pair with `grad: None`.
    fn compute_gradients(&mut self, loss: &mut Tensor, params: &[Tensor]) -> Result<Vec<GradParam>> {
        backward(loss, None);

        Ok(params
            .iter()
            .filter(|p| p.requires_grad())
            .map(|p| GradParam {
                grad: p.grad().map(Grad::Dense),
                param: p.clone(),
            })
            .collect())
    }

    /// Apply a list of (gradient, parameter) updates
    ///
    /// Advances `step` by one when given. Pairs with no gradient are
    /// skipped.
    fn apply_gradients(&mut self, pairs: &[GradParam], step: Option<&mut u64>) -> Result<()>;

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Zero out gradients on all parameters
    fn zero_grad(&mut self, params: &[Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }
}
