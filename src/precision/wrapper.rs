//! Mixed-precision optimizer wrapper.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{check_grads, LossScaler, MixedPrecisionConfig, RegRedirector, RegRegistry};
use crate::autograd::scale as scale_op;
use crate::error::{MpError, Result};
use crate::optim::{Grad, GradParam, Optimizer};
use crate::Tensor;

/// Wraps a base optimizer for mixed-precision training
///
/// The base optimizer is composed, not inherited: this wrapper implements
/// [`Optimizer`] itself and transforms the pair list around the inner
/// optimizer's two operations.
///
/// Per step:
/// - `compute_gradients` scales the loss, delegates to the inner optimizer,
///   promotes every reduced-precision pair onto its lazily created fp32
///   master copy (restoring any redirected regularization against the
///   master), and unscales the result;
/// - `apply_gradients` health-checks the gradients, lets the loss scale
///   adapt on every step, skips the update on overflow, and otherwise
///   applies the inner update to the masters and casts the results back
///   down into the working parameters.
pub struct MixedPrecisionOptimizer<O: Optimizer> {
    inner: O,
    scaler: Option<LossScaler>,
    /// working parameter id → fp32 master
    masters: HashMap<usize, Tensor>,
    /// fp32 master id → working parameter
    master_to_working: HashMap<usize, Tensor>,
    registry: Rc<RefCell<RegRegistry>>,
}

impl<O: Optimizer> MixedPrecisionOptimizer<O> {
    /// Wrap a base optimizer; `scaler: None` disables loss scaling
    pub fn new(inner: O, scaler: Option<LossScaler>) -> Self {
        Self {
            inner,
            scaler,
            masters: HashMap::new(),
            master_to_working: HashMap::new(),
            registry: Rc::new(RefCell::new(RegRegistry::default())),
        }
    }

    /// Wrap a base optimizer according to a config
    pub fn from_config(inner: O, config: &MixedPrecisionConfig) -> Self {
        let scaler = config
            .loss_scaling
            .then(|| LossScaler::from_config(&config.loss_scale));
        Self::new(inner, scaler)
    }

    /// Redirector to hand to loss construction
    ///
    /// Regularization applied through it on reduced-precision parameters is
    /// suppressed there and restored against the master copies during
    /// gradient promotion.
    pub fn redirector(&self) -> RegRedirector {
        RegRedirector::new(Rc::clone(&self.registry))
    }

    /// Current loss scale (1.0 when scaling is disabled)
    pub fn loss_scale(&self) -> f32 {
        self.scaler.as_ref().map_or(1.0, LossScaler::scale)
    }

    /// The loss scale controller, if scaling is active
    pub fn scaler(&self) -> Option<&LossScaler> {
        self.scaler.as_ref()
    }

    /// The fp32 master for a working parameter, if one exists yet
    pub fn master_of(&self, param: &Tensor) -> Option<&Tensor> {
        self.masters.get(&param.id())
    }

    /// Look up or create the fp32 master for a reduced-precision parameter
    ///
    /// Created exactly once, initialized from the current working value
    /// (cast up), non-trainable so ordinary parameter iteration never walks
    /// it, and registered in both directions for promotion and copy-back.
    fn master_for(&mut self, param: &Tensor) -> Tensor {
        if let Some(master) = self.masters.get(&param.id()) {
            return master.clone();
        }

        let name = format!("{}/fp32_master", param.name().unwrap_or("param"));
        let master = Tensor::new(param.data(), false).with_name(&name);
        self.masters.insert(param.id(), master.clone());
        self.master_to_working.insert(master.id(), param.clone());
        master
    }

    /// Replace reduced-precision pairs with fp32 (gradient, master) pairs
    fn promote(&mut self, pairs: Vec<GradParam>) -> Vec<GradParam> {
        let mut promoted = Vec::with_capacity(pairs.len());

        for pair in pairs {
            if !pair.param.precision().is_reduced() {
                promoted.push(pair);
                continue;
            }

            let master = self.master_for(&pair.param);
            let grad = pair.grad.map(|grad| {
                // Stored reduced-precision gradients sit on the 16-bit
                // grid, so the cast up is the identity on the values.
                match self.registry.borrow().get(pair.param.id()) {
                    Some(reg) => {
                        // Restore the redirected penalty against the master
                        let mut dense = grad.to_dense(master.len());
                        dense += &reg.grad(&master.data());
                        Grad::Dense(dense)
                    }
                    None => grad,
                }
            });

            promoted.push(GradParam {
                grad,
                param: master,
            });
        }

        promoted
    }

    /// Delegate the update to the inner optimizer, then cast each updated
    /// master back down into its working parameter
    fn apply_and_copy_back(&mut self, pairs: &[GradParam], step: Option<&mut u64>) -> Result<()> {
        for pair in pairs {
            if pair.param.precision().is_reduced() {
                return Err(MpError::MissingMaster {
                    name: pair.param.name().unwrap_or("<unnamed>").to_string(),
                });
            }
        }

        self.inner.apply_gradients(pairs, step)?;

        for pair in pairs {
            if let Some(working) = self.master_to_working.get(&pair.param.id()) {
                working.set_data(pair.param.data())?;
            }
        }
        Ok(())
    }
}

impl<O: Optimizer> Optimizer for MixedPrecisionOptimizer<O> {
    fn compute_gradients(
        &mut self,
        loss: &mut Tensor,
        params: &[Tensor],
    ) -> Result<Vec<GradParam>> {
        let raw = match &self.scaler {
            Some(scaler) => {
                // Lift gradient magnitudes out of the underflow range
                // before differentiation
                let mut scaled = scale_op(loss, scaler.scale());
                self.inner.compute_gradients(&mut scaled, params)?
            }
            None => self.inner.compute_gradients(loss, params)?,
        };

        let mut promoted = self.promote(raw);

        if let Some(scaler) = &self.scaler {
            let inv_scale = 1.0 / scaler.scale();
            for pair in &mut promoted {
                if let Some(grad) = &mut pair.grad {
                    grad.scale_values(inv_scale);
                }
            }
        }

        Ok(promoted)
    }

    fn apply_gradients(&mut self, pairs: &[GradParam], step: Option<&mut u64>) -> Result<()> {
        if self.scaler.is_none() {
            return self.apply_and_copy_back(pairs, step);
        }

        let (has_nonfinite, max_abs) = check_grads(pairs);
        let should_skip = max_abs.is_infinite() || has_nonfinite;

        // The controller observes every step's health, sequenced before
        // the skip decision; adaptation never depends on the commit.
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.update(has_nonfinite, max_abs);
        }

        if should_skip {
            return Ok(());
        }
        self.apply_and_copy_back(pairs, step)
    }

    fn lr(&self) -> f32 {
        self.inner.lr()
    }

    fn set_lr(&mut self, lr: f32) {
        self.inner.set_lr(lr);
    }
}
