//! Tensor handle with shared interior mutability.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array1;

use super::BackwardOp;
use crate::error::{MpError, Result};
use crate::precision::{quantize_array, Precision};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// A named, precision-tagged 1-D tensor
///
/// Cloning a `Tensor` produces another handle to the same storage; the id is
/// shared across clones and identifies the parameter for optimizer state,
/// master-copy lookup, and regularization registration.
///
/// Reduced-precision tensors store values rounded to the 16-bit grid: every
/// assignment path (`with_precision`, `set_data`, `set_grad`,
/// `accumulate_grad`) quantizes, so a stored value is always exactly
/// representable in the declared format and cast-up is the identity.
#[derive(Clone)]
pub struct Tensor {
    id: usize,
    name: Option<Rc<str>>,
    precision: Precision,
    requires_grad: bool,
    data: Rc<RefCell<Array1<f32>>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    backward_op: Rc<RefCell<Option<Rc<dyn BackwardOp>>>>,
}

impl Tensor {
    /// Create a tensor from an ndarray (fp32, unnamed)
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: None,
            precision: Precision::Fp32,
            requires_grad,
            data: Rc::new(RefCell::new(data)),
            grad: Rc::new(RefCell::new(None)),
            backward_op: Rc::new(RefCell::new(None)),
        }
    }

    /// Create a tensor from a Vec
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from_vec(data), requires_grad)
    }

    /// Set the name (builder style, call before sharing the handle)
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(Rc::from(name));
        self
    }

    /// Set the storage precision, rounding current values to its grid
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        quantize_array(&mut self.data.borrow_mut(), precision);
        self
    }

    /// Unique id, shared by all clones of this handle
    pub fn id(&self) -> usize {
        self.id
    }

    /// Parameter name, if set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared storage precision
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Whether this tensor participates in gradient computation
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Whether the tensor is empty
    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    /// Current values (cloned)
    pub fn data(&self) -> Array1<f32> {
        self.data.borrow().clone()
    }

    /// Mutable borrow of the values
    ///
    /// Bypasses quantization; intended for optimizer inner loops over fp32
    /// tensors. Use [`Tensor::set_data`] for precision-respecting writes.
    pub fn data_mut(&self) -> RefMut<'_, Array1<f32>> {
        self.data.borrow_mut()
    }

    /// Replace the values, rounding to this tensor's precision grid
    pub fn set_data(&self, values: Array1<f32>) -> Result<()> {
        let mut data = self.data.borrow_mut();
        if values.len() != data.len() {
            return Err(MpError::ShapeMismatch {
                name: self.name.as_deref().unwrap_or("<unnamed>").to_string(),
                expected: data.len(),
                got: values.len(),
            });
        }
        let mut values = values;
        quantize_array(&mut values, self.precision);
        *data = values;
        Ok(())
    }

    /// Current gradient (cloned), if any
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Replace the gradient, rounding to this tensor's precision grid
    pub fn set_grad(&self, grad: Array1<f32>) {
        let mut grad = grad;
        quantize_array(&mut grad, self.precision);
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, creating it if absent
    ///
    /// Gradients on reduced-precision tensors live on the same 16-bit grid
    /// as their values, mirroring a backward pass run in that precision.
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        let mut acc = match cell.take() {
            Some(existing) => existing + &grad,
            None => grad,
        };
        quantize_array(&mut acc, self.precision);
        *cell = Some(acc);
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Shared gradient cell, for backward ops
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        Rc::clone(&self.grad)
    }

    /// Backward op installed on this tensor, if any
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.borrow().clone()
    }

    /// Install the backward op
    pub fn set_backward_op(&self, op: Rc<dyn BackwardOp>) {
        *self.backward_op.borrow_mut() = Some(op);
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("precision", &self.precision)
            .field("requires_grad", &self.requires_grad)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precision::quantize;
    use ndarray::arr1;

    #[test]
    fn test_clone_shares_storage() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = a.clone();
        assert_eq!(a.id(), b.id());

        b.set_data(arr1(&[3.0, 4.0])).unwrap();
        assert_eq!(a.data().to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_fresh_tensors_get_distinct_ids() {
        let a = Tensor::from_vec(vec![1.0], false);
        let b = Tensor::from_vec(vec![1.0], false);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_with_precision_rounds_values() {
        let t = Tensor::from_vec(vec![0.1, 2.0], true).with_precision(Precision::Fp16);
        let data = t.data();
        assert_eq!(data[0], quantize(0.1, Precision::Fp16));
        // 2.0 is exactly representable in fp16
        assert_eq!(data[1], 2.0);
    }

    #[test]
    fn test_set_data_quantizes() {
        let t = Tensor::from_vec(vec![0.0], true).with_precision(Precision::Fp16);
        t.set_data(arr1(&[0.004])).unwrap();
        assert_eq!(t.data()[0], quantize(0.004, Precision::Fp16));
    }

    #[test]
    fn test_set_data_length_mismatch_errors() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true).with_name("w");
        let err = t.set_data(arr1(&[1.0])).unwrap_err();
        assert!(matches!(err, MpError::ShapeMismatch { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_accumulate_grad_sums() {
        let t = Tensor::from_vec(vec![1.0, 1.0], true);
        t.accumulate_grad(arr1(&[0.5, 1.0]));
        t.accumulate_grad(arr1(&[0.5, 1.0]));
        assert_eq!(t.grad().unwrap().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_grad_on_fp16_tensor_lives_on_fp16_grid() {
        let t = Tensor::from_vec(vec![1.0], true).with_precision(Precision::Fp16);
        t.set_grad(arr1(&[0.004]));
        assert_eq!(t.grad().unwrap()[0], quantize(0.004, Precision::Fp16));
    }

    #[test]
    fn test_zero_grad_clears() {
        let t = Tensor::from_vec(vec![1.0], true);
        t.set_grad(arr1(&[1.0]));
        assert!(t.grad().is_some());
        t.zero_grad();
        assert!(t.grad().is_none());
    }
}
