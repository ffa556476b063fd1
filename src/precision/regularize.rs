//! Regularization redirection for reduced-precision parameters.
//!
//! Regularization has to act on the numerically stable fp32 master copy,
//! not the rounded working copy, or the penalty gradient compounds the
//! rounding error. The redirector suppresses the penalty on the
//! reduced-precision backward path and records the regularizer so the
//! optimizer wrapper can restore the term against the master copy when it
//! promotes gradients.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ndarray::Array1;

use crate::autograd::BackwardOp;
use crate::Tensor;

/// A weight penalty with a closed-form gradient
pub trait Regularizer {
    /// Penalty value for a weight vector
    fn penalty(&self, w: &Array1<f32>) -> f32;

    /// Gradient of the penalty with respect to the weights
    fn grad(&self, w: &Array1<f32>) -> Array1<f32>;
}

/// L2 penalty: ½·λ·‖w‖²
pub struct L2 {
    pub lambda: f32,
}

impl Regularizer for L2 {
    fn penalty(&self, w: &Array1<f32>) -> f32 {
        0.5 * self.lambda * w.iter().map(|v| v * v).sum::<f32>()
    }

    fn grad(&self, w: &Array1<f32>) -> Array1<f32> {
        w * self.lambda
    }
}

/// L1 penalty: λ·‖w‖₁
pub struct L1 {
    pub lambda: f32,
}

impl Regularizer for L1 {
    fn penalty(&self, w: &Array1<f32>) -> f32 {
        self.lambda * w.iter().map(|v| v.abs()).sum::<f32>()
    }

    fn grad(&self, w: &Array1<f32>) -> Array1<f32> {
        w.mapv(|v| self.lambda * v.signum())
    }
}

/// Registry of suppressed regularizers, keyed by parameter identity
///
/// Populated lazily by the redirector as regularized reduced-precision
/// parameters are first seen; consulted by the optimizer wrapper when it
/// builds promoted gradients. Entries live for the wrapper's lifetime.
#[derive(Default)]
pub struct RegRegistry {
    entries: HashMap<usize, Rc<dyn Regularizer>>,
}

impl RegRegistry {
    /// Record the regularizer for a parameter
    pub fn insert(&mut self, param: &Tensor, reg: Rc<dyn Regularizer>) {
        self.entries.insert(param.id(), reg);
    }

    /// Look up a parameter's regularizer
    pub fn get(&self, param_id: usize) -> Option<&Rc<dyn Regularizer>> {
        self.entries.get(&param_id)
    }

    /// Number of registered parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Redirects regularization calls during loss construction
///
/// Shares the registry with the wrapper that handed it out. One redirector
/// per wrapper instance; this is explicit state, not an ambient global
/// collection.
#[derive(Clone)]
pub struct RegRedirector {
    registry: Rc<RefCell<RegRegistry>>,
}

impl RegRedirector {
    pub(crate) fn new(registry: Rc<RefCell<RegRegistry>>) -> Self {
        Self { registry }
    }

    /// Apply a regularizer to a parameter at a loss-construction call site
    ///
    /// For a reduced-precision parameter the regularizer is recorded and
    /// `None` is returned, so the ordinary backward pass carries no penalty
    /// contribution for it. For an fp32 parameter the penalty is wired into
    /// the tape and returned as a scalar tensor to add into the loss.
    pub fn apply(&self, param: &Tensor, reg: Rc<dyn Regularizer>) -> Option<Tensor> {
        if param.precision().is_reduced() {
            self.registry.borrow_mut().insert(param, reg);
            None
        } else {
            Some(penalty_term(param, reg))
        }
    }
}

/// Build a scalar penalty tensor whose backward deposits the penalty
/// gradient into the parameter
pub fn penalty_term(param: &Tensor, reg: Rc<dyn Regularizer>) -> Tensor {
    let value = reg.penalty(&param.data());
    let requires_grad = param.requires_grad();

    let result = Tensor::new(Array1::from_vec(vec![value]), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(PenaltyBackward {
            param: param.clone(),
            reg,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct PenaltyBackward {
    param: Tensor,
    reg: Rc<dyn Regularizer>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for PenaltyBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let seed = grad[0];
            let grad_w = self.reg.grad(&self.param.data()) * seed;
            self.param.accumulate_grad(grad_w);

            if let Some(op) = self.param.backward_op() {
                op.backward();
            }
        }
    }
}
