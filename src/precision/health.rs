//! Gradient health check.

use crate::optim::GradParam;

/// Inspect a step's gradients for non-finite values
///
/// Returns `(has_nonfinite, max_abs)` aggregated across all gradients.
/// Pure: no mutation, no side effects. Pairs without a gradient contribute
/// nothing; sparse gradients are inspected through their value list. The
/// maximum over an empty set is 0.0.
pub fn check_grads(pairs: &[GradParam]) -> (bool, f32) {
    let mut has_nonfinite = false;
    let mut max_abs = 0.0f32;

    for pair in pairs {
        let Some(grad) = &pair.grad else { continue };
        for &v in grad.values() {
            if !v.is_finite() {
                has_nonfinite = true;
            }
            // f32::max ignores a NaN operand, so NaN cannot poison the max
            max_abs = max_abs.max(v.abs());
        }
    }

    (has_nonfinite, max_abs)
}
