//! Configuration for mixed-precision training.

use serde::{Deserialize, Serialize};

use super::Precision;

/// Dynamic loss-scaling policy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossScaleConfig {
    /// Initial loss scale factor
    pub initial_scale: f32,
    /// Factor applied after a run of healthy steps
    pub growth_factor: f32,
    /// Factor applied on overflow
    pub backoff_factor: f32,
    /// Consecutive healthy steps before the scale grows
    pub growth_interval: usize,
    /// Lower clamp for the scale (never below 1.0)
    pub min_scale: f32,
}

impl Default for LossScaleConfig {
    fn default() -> Self {
        Self {
            initial_scale: 65536.0, // 2^16
            growth_factor: 2.0,
            backoff_factor: 0.5,
            growth_interval: 2000,
            min_scale: 1.0,
        }
    }
}

/// Configuration for mixed-precision training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedPrecisionConfig {
    /// Precision for working parameters and gradients
    pub compute_precision: Precision,
    /// Whether dynamic loss scaling is active
    pub loss_scaling: bool,
    /// Loss-scaling policy, consulted when `loss_scaling` is true
    pub loss_scale: LossScaleConfig,
}

impl MixedPrecisionConfig {
    /// Create fp32 config (no mixed precision, no scaling)
    pub fn fp32() -> Self {
        Self {
            compute_precision: Precision::Fp32,
            loss_scaling: false,
            loss_scale: LossScaleConfig {
                initial_scale: 1.0,
                ..LossScaleConfig::default()
            },
        }
    }

    /// Create fp16 mixed-precision config with dynamic scaling
    pub fn fp16() -> Self {
        Self {
            compute_precision: Precision::Fp16,
            loss_scaling: true,
            loss_scale: LossScaleConfig::default(),
        }
    }

    /// Create bf16 mixed-precision config
    ///
    /// bf16 shares fp32's exponent range, so scaling is off by default.
    pub fn bf16() -> Self {
        Self {
            compute_precision: Precision::Bf16,
            loss_scaling: false,
            loss_scale: LossScaleConfig {
                initial_scale: 1.0,
                ..LossScaleConfig::default()
            },
        }
    }

    /// Check if mixed precision is enabled
    pub fn is_mixed(&self) -> bool {
        self.compute_precision.is_reduced()
    }

    /// Set the initial loss scale
    #[must_use]
    pub fn with_initial_scale(mut self, scale: f32) -> Self {
        self.loss_scale.initial_scale = scale;
        self
    }

    /// Set the growth interval
    #[must_use]
    pub fn with_growth_interval(mut self, interval: usize) -> Self {
        self.loss_scale.growth_interval = interval;
        self
    }

    /// Enable/disable dynamic loss scaling
    #[must_use]
    pub fn with_loss_scaling(mut self, enabled: bool) -> Self {
        self.loss_scaling = enabled;
        self
    }
}

impl Default for MixedPrecisionConfig {
    fn default() -> Self {
        Self::fp32()
    }
}
