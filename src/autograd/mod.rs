//! Tape-based autograd substrate
//!
//! A deliberately small gradient tape: 1-D fp32 tensor handles with shared
//! interior mutability, a [`BackwardOp`] trait, and the few differentiable
//! ops needed to assemble scalar losses. Gradient computation over a real
//! model is the host framework's job; this substrate exists so the
//! mixed-precision machinery is exercisable end-to-end.

mod backward;
mod ops;
mod tensor;

pub use backward::BackwardOp;
pub use ops::{add, mul, scale, sum};
pub use tensor::Tensor;

/// Perform backward pass on a tensor
///
/// Seeds the tensor's gradient with `grad_output`, or ones for a scalar
/// loss, then walks the tape.
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        let ones = ndarray::Array1::ones(tensor.len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
