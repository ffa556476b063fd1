//! Backward operation trait for the gradient tape.

/// A node in the backward graph
///
/// Each differentiable op installs one of these on its result tensor.
/// `backward` reads the result's gradient cell, deposits gradients into the
/// op's inputs, and recurses into their backward ops.
pub trait BackwardOp {
    /// Propagate gradients from the result to the inputs
    fn backward(&self);
}
