//! Mixed-precision training support
//!
//! Trains reduced-precision (fp16/bf16) parameters through fp32 master
//! copies, with dynamic loss scaling to keep gradients out of the
//! half-precision underflow range and an overflow-skip mechanism so a bad
//! step costs one update, not the run.
//!
//! ## Overview
//!
//! The crate is built around [`precision::MixedPrecisionOptimizer`], which
//! wraps any [`optim::Optimizer`]:
//!
//! - loss is scaled before differentiation and gradients are unscaled after,
//! - every reduced-precision parameter gets a lazily created fp32 master
//!   copy that receives the actual update,
//! - regularization on reduced-precision parameters is redirected to apply
//!   against the master copy instead of the rounded working copy,
//! - steps with NaN/Inf gradients are skipped while the loss scale backs off.
//!
//! ## Example
//!
//! ```ignore
//! use mezcla::optim::{Optimizer, Sgd};
//! use mezcla::precision::{MixedPrecisionConfig, MixedPrecisionOptimizer};
//!
//! let mut opt = MixedPrecisionOptimizer::from_config(
//!     Sgd::new(0.1, 0.0),
//!     &MixedPrecisionConfig::fp16(),
//! );
//!
//! let pairs = opt.compute_gradients(&mut loss, &params)?;
//! opt.apply_gradients(&pairs, Some(&mut step))?;
//! ```

pub mod autograd;
pub mod error;
pub mod optim;
pub mod precision;

pub use autograd::{backward, Tensor};
pub use error::{MpError, Result};
