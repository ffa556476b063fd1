//! Loss scale controller for mixed-precision training.

use super::LossScaleConfig;

/// Loss scale controller
///
/// Owns the scalar loss scale and the grow/backoff policy: on overflow the
/// scale backs off immediately; after a run of healthy steps it grows. The
/// controller only mutates its own state; callers read the returned scale.
#[derive(Debug, Clone)]
pub struct LossScaler {
    /// Current loss scale
    scale: f32,
    /// Growth factor
    growth_factor: f32,
    /// Backoff factor
    backoff_factor: f32,
    /// Consecutive healthy steps before growth
    growth_interval: usize,
    /// Healthy steps since the last growth or overflow
    steps_since_growth: usize,
    /// Lower clamp for the scale
    min_scale: f32,
    /// Number of overflows observed
    overflow_count: usize,
    /// Number of healthy steps observed
    healthy_steps: usize,
}

impl LossScaler {
    /// Create a scaler with the default policy and a given initial scale
    pub fn new(initial_scale: f32) -> Self {
        Self::from_config(&LossScaleConfig {
            initial_scale,
            ..LossScaleConfig::default()
        })
    }

    /// Create from config
    pub fn from_config(config: &LossScaleConfig) -> Self {
        Self {
            scale: config.initial_scale.max(config.min_scale),
            growth_factor: config.growth_factor,
            backoff_factor: config.backoff_factor,
            growth_interval: config.growth_interval,
            steps_since_growth: 0,
            min_scale: config.min_scale.max(1.0),
            overflow_count: 0,
            healthy_steps: 0,
        }
    }

    /// Current scale
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Observe one step's gradient health and adapt the scale
    ///
    /// Called once per step, before the caller decides whether to commit the
    /// update, so the policy sees every step regardless of skips. Returns
    /// the new scale.
    pub fn update(&mut self, has_nonfinite: bool, max_abs: f32) -> f32 {
        let overflow = has_nonfinite || max_abs.is_infinite();

        if overflow {
            self.overflow_count += 1;
            self.scale = (self.scale * self.backoff_factor).max(self.min_scale);
            self.steps_since_growth = 0;
        } else {
            self.healthy_steps += 1;
            self.steps_since_growth += 1;

            if self.steps_since_growth >= self.growth_interval {
                self.scale = (self.scale * self.growth_factor).min(f32::MAX / 2.0);
                self.steps_since_growth = 0;
            }
        }

        self.scale
    }

    /// Number of overflows observed
    pub fn overflow_count(&self) -> usize {
        self.overflow_count
    }

    /// Number of healthy steps observed
    pub fn healthy_steps(&self) -> usize {
        self.healthy_steps
    }
}

impl Default for LossScaler {
    fn default() -> Self {
        Self::from_config(&LossScaleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaler(initial: f32, interval: usize) -> LossScaler {
        LossScaler::from_config(&LossScaleConfig {
            initial_scale: initial,
            growth_interval: interval,
            ..LossScaleConfig::default()
        })
    }

    #[test]
    fn test_backoff_on_nonfinite() {
        let mut s = scaler(1024.0, 2000);
        let new = s.update(true, 0.5);
        assert_eq!(new, 512.0);
        assert_eq!(s.overflow_count(), 1);
    }

    #[test]
    fn test_backoff_on_infinite_amax() {
        let mut s = scaler(1024.0, 2000);
        let new = s.update(false, f32::INFINITY);
        assert_eq!(new, 512.0);
    }

    #[test]
    fn test_growth_after_interval() {
        let mut s = scaler(100.0, 3);
        s.update(false, 0.1);
        s.update(false, 0.1);
        assert_eq!(s.scale(), 100.0);
        s.update(false, 0.1);
        assert_eq!(s.scale(), 200.0);
        assert_eq!(s.healthy_steps(), 3);
    }

    #[test]
    fn test_overflow_resets_growth_counter() {
        let mut s = scaler(100.0, 3);
        s.update(false, 0.1);
        s.update(false, 0.1);
        s.update(true, 0.1); // overflow, counter resets
        assert_eq!(s.scale(), 50.0);
        s.update(false, 0.1);
        s.update(false, 0.1);
        assert_eq!(s.scale(), 50.0); // two healthy steps are not enough again
    }

    #[test]
    fn test_scale_never_drops_below_min() {
        let mut s = scaler(1.0, 2000);
        for _ in 0..10 {
            s.update(true, 0.0);
        }
        assert_eq!(s.scale(), 1.0);
    }

    #[test]
    fn test_growth_then_backoff_trajectory() {
        // N healthy steps grow the scale, then one overflow halves it
        let mut s = scaler(8.0, 2);
        s.update(false, 0.1);
        s.update(false, 0.1);
        assert_eq!(s.scale(), 16.0);
        s.update(true, 0.1);
        assert_eq!(s.scale(), 8.0);
    }
}
