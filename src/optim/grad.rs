//! Gradient representations and gradient/parameter pairs.

use ndarray::Array1;

use crate::Tensor;

/// A gradient tensor, dense or sparse
///
/// The sparse form is an indexed-update representation (value rows, the
/// indices they land on, and the dense length), as produced by embedding
/// lookups. Scalar transforms apply to the value list in both forms.
#[derive(Debug, Clone)]
pub enum Grad {
    /// Dense gradient, one value per parameter element
    Dense(Array1<f32>),
    /// Sparse indexed updates
    Sparse {
        values: Array1<f32>,
        indices: Vec<usize>,
        dense_shape: usize,
    },
}

impl Grad {
    /// The underlying value list (dense values, or sparse update values)
    pub fn values(&self) -> &Array1<f32> {
        match self {
            Grad::Dense(values) => values,
            Grad::Sparse { values, .. } => values,
        }
    }

    /// Multiply every value by a scalar, in place
    ///
    /// Indices and dense shape of a sparse gradient are untouched.
    pub fn scale_values(&mut self, factor: f32) {
        let values = match self {
            Grad::Dense(values) => values,
            Grad::Sparse { values, .. } => values,
        };
        values.mapv_inplace(|v| v * factor);
    }

    /// Materialize as a dense gradient of `len` elements
    ///
    /// Sparse duplicate indices accumulate.
    pub fn to_dense(&self, len: usize) -> Array1<f32> {
        match self {
            Grad::Dense(values) => values.clone(),
            Grad::Sparse {
                values, indices, ..
            } => {
                let mut dense = Array1::zeros(len);
                for (&idx, &v) in indices.iter().zip(values.iter()) {
                    dense[idx] += v;
                }
                dense
            }
        }
    }

    /// Whether this is the sparse form
    pub fn is_sparse(&self) -> bool {
        matches!(self, Grad::Sparse { .. })
    }
}

/// A gradient paired with the parameter it updates
///
/// Produced fresh each optimization step. `grad` is `None` when the
/// parameter received no gradient this step.
#[derive(Debug, Clone)]
pub struct GradParam {
    pub grad: Option<Grad>,
    pub param: Tensor,
}

impl GradParam {
    /// Pair a dense gradient with a parameter
    pub fn dense(grad: Array1<f32>, param: Tensor) -> Self {
        Self {
            grad: Some(Grad::Dense(grad)),
            param,
        }
    }

    /// Pair a sparse gradient with a parameter
    pub fn sparse(
        values: Array1<f32>,
        indices: Vec<usize>,
        dense_shape: usize,
        param: Tensor,
    ) -> Self {
        Self {
            grad: Some(Grad::Sparse {
                values,
                indices,
                dense_shape,
            }),
            param,
        }
    }
}
