//! Mixed-precision training
//!
//! Trains reduced-precision (fp16/bf16) parameters through fp32 master
//! copies while keeping updates numerically stable:
//!
//! - working parameters and their gradients live in 16-bit precision,
//! - each one gets a lazily created fp32 master copy that receives the
//!   actual optimizer update, then is cast back down,
//! - the loss is scaled before differentiation and gradients unscaled
//!   after, lifting magnitudes out of the fp16 underflow range,
//! - steps with NaN/Inf gradients are skipped while the scale backs off,
//! - regularization on reduced-precision parameters is redirected to apply
//!   against the master copy.
//!
//! ## Example
//!
//! ```ignore
//! let mut opt = MixedPrecisionOptimizer::from_config(
//!     Sgd::new(0.1, 0.0),
//!     &MixedPrecisionConfig::fp16(),
//! );
//! let redirector = opt.redirector();
//!
//! // loss construction routes regularization through the redirector
//! let pairs = opt.compute_gradients(&mut loss, &params)?;
//! opt.apply_gradients(&pairs, Some(&mut step))?;
//! ```

mod config;
mod conversions;
mod health;
mod precision_types;
mod regularize;
mod scaler;
mod wrapper;


pub use config::{LossScaleConfig, MixedPrecisionConfig};
pub use conversions::{
    bf16_to_f32, f32_to_bf16, f32_to_fp16, fp16_to_f32, quantize, quantize_array,
};
pub use health::check_grads;
pub use precision_types::Precision;
pub use regularize::{penalty_term, RegRedirector, RegRegistry, Regularizer, L1, L2};
pub use scaler::LossScaler;
pub use wrapper::MixedPrecisionOptimizer;
