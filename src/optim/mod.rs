//! Optimizers for training

mod adam;
mod grad;
mod optimizer;
mod sgd;

pub use adam::Adam;
pub use grad::{Grad, GradParam};
pub use optimizer::Optimizer;
pub use sgd::Sgd;
