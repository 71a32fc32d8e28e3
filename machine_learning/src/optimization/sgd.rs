use std::collections::HashMap;

use super::Optimizer;
use crate::{MlErr, Result, arch::ParamGroup};

/// Stochastic gradient descent with (optionally nesterov) momentum.
///
/// One velocity buffer is kept per trainable parameter group, keyed by the group's name.
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
    nesterov: bool,
    velocity: HashMap<&'static str, Box<[f32]>>,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `groups` - The parameter groups of the model, only the trainable ones get a buffer.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - The decay of the velocity buffers.
    /// * `nesterov` - Whether to look ahead along the velocity when stepping.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(groups: &[ParamGroup], learning_rate: f32, momentum: f32, nesterov: bool) -> Self {
        let velocity = groups
            .iter()
            .filter(|group| group.trainable())
            .map(|group| (group.name(), vec![0.; group.len()].into_boxed_slice()))
            .collect();

        Self {
            learning_rate,
            momentum,
            nesterov,
            velocity,
        }
    }

    /// Returns how many parameters this optimizer keeps momentum for.
    pub fn tracked_params(&self) -> usize {
        self.velocity.values().map(|v| v.len()).sum()
    }
}

impl Optimizer for Sgd {
    /// Applies `v = μv + g`, then `p -= lr * (g + μv)` with nesterov or `p -= lr * v` without.
    fn step(&mut self, groups: &mut [ParamGroup]) -> Result<()> {
        let lr = self.learning_rate;
        let mu = self.momentum;
        let nesterov = self.nesterov;

        for group in groups.iter_mut().filter(|group| group.trainable()) {
            let name = group.name();
            let velocity = self
                .velocity
                .get_mut(name)
                .ok_or_else(|| MlErr::UnknownParamGroup { name: name.into() })?;

            let (params, grad) = group.params_and_grad();
            if velocity.len() != params.len() {
                return Err(MlErr::SizeMismatch {
                    what: "velocity",
                    got: velocity.len(),
                    expected: params.len(),
                });
            }

            params
                .iter_mut()
                .zip(grad)
                .zip(velocity.iter_mut())
                .for_each(|((p, g), v)| {
                    *v = (mu * *v) + g;
                    let update = if nesterov { g + mu * *v } else { *v };
                    *p -= lr * update;
                });
        }

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
