//! Differentiable operations: add, mul, scale, sum
//!
//! Enough surface to assemble scalar losses (with regularization terms)
//! whose gradients flow back to the parameters through the tape.

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::Array1;

use super::{BackwardOp, Tensor};

/// Add two tensors element-wise
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data = a.data() + &b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Multiply two tensors element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    let data = a.data() * &b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * b
                let grad_a = grad * &self.b.data();
                self.a.accumulate_grad(grad_a);
            }
            if self.b.requires_grad() {
                // ∂L/∂b = ∂L/∂out * a
                let grad_b = grad * &self.a.data();
                self.b.accumulate_grad(grad_b);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Scale a tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Sum all elements into a length-1 tensor
pub fn sum(a: &Tensor) -> Tensor {
    let total = a.data().sum();
    let requires_grad = a.requires_grad();

    let result = Tensor::new(Array1::from_vec(vec![total]), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // Broadcast the scalar seed over the input
                let seed = grad[0];
                self.a
                    .accumulate_grad(Array1::from_elem(self.a.len(), seed));
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;

    #[test]
    fn test_add_forward_and_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = Tensor::from_vec(vec![3.0, 4.0], true);
        let mut c = add(&a, &b);
        assert_eq!(c.data().to_vec(), vec![4.0, 6.0]);

        backward(&mut c, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(b.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_mul_backward_cross_terms() {
        let a = Tensor::from_vec(vec![2.0, 3.0], true);
        let b = Tensor::from_vec(vec![5.0, 7.0], true);
        let mut c = mul(&a, &b);

        backward(&mut c, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![5.0, 7.0]);
        assert_eq!(b.grad().unwrap().to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_scale_backward_multiplies_seed() {
        let a = Tensor::from_vec(vec![1.0, -2.0], true);
        let mut c = scale(&a, 8.0);
        assert_eq!(c.data().to_vec(), vec![8.0, -16.0]);

        backward(&mut c, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![8.0, 8.0]);
    }

    #[test]
    fn test_sum_reduces_and_broadcasts() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let mut s = sum(&a);
        assert_eq!(s.data().to_vec(), vec![6.0]);

        backward(&mut s, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_chained_ops_compose_gradients() {
        // loss = sum(w * x) * 4  =>  dloss/dw = 4 * x
        let w = Tensor::from_vec(vec![1.0, 2.0], true);
        let x = Tensor::from_vec(vec![0.5, 0.25], false);
        let mut loss = scale(&sum(&mul(&w, &x)), 4.0);

        backward(&mut loss, None);
        assert_eq!(w.grad().unwrap().to_vec(), vec![2.0, 1.0]);
        assert!(x.grad().is_none());
    }

    #[test]
    fn test_no_grad_tracking_without_requires_grad() {
        let a = Tensor::from_vec(vec![1.0], false);
        let b = Tensor::from_vec(vec![2.0], false);
        let c = add(&a, &b);
        assert!(c.backward_op().is_none());
        assert!(!c.requires_grad());
    }
}
