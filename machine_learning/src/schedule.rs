//! Cosine annealing of the learning rate, driven by optimizer steps.

use std::{f64::consts::PI, num::NonZeroUsize};

use crate::optimization::Optimizer;

/// Computes the learning rate according to a cosine annealing schedule.
///
/// `lr_min + (lr_max - lr_min) * 0.5 * (1 + cos(step / total_steps * π))`, which starts at
/// `lr_max` on step 0 and reaches `lr_min` on step `total_steps`.
pub fn cosine_lr(step: usize, total_steps: usize, lr_max: f64, lr_min: f64) -> f64 {
    lr_min + (lr_max - lr_min) * 0.5 * (1. + (step as f64 / total_steps as f64 * PI).cos())
}

/// A per-step schedule that scales a base learning rate by `cosine_lr`.
///
/// The cosine value acts as a multiplicative factor: the optimizer runs at
/// `base_lr * cosine_lr(step, ..)`. Every call to `step` moves the schedule forward once and
/// sets the rate the *next* optimizer step will use.
#[derive(Debug, Clone)]
pub struct CosineSchedule {
    base_lr: f64,
    total_steps: NonZeroUsize,
    lr_max: f64,
    lr_min: f64,
    step: usize,
}

impl CosineSchedule {
    /// Creates a new `CosineSchedule` and applies its first learning rate to `optimizer`.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer whose learning rate is driven by this schedule.
    /// * `base_lr` - The learning rate the cosine factor multiplies.
    /// * `total_steps` - The amount of optimizer steps the schedule spans.
    /// * `lr_max` - The factor at step 0.
    /// * `lr_min` - The factor at the last step.
    ///
    /// # Returns
    /// A new `CosineSchedule` instance.
    pub fn new<O: Optimizer + ?Sized>(
        optimizer: &mut O,
        base_lr: f64,
        total_steps: NonZeroUsize,
        lr_max: f64,
        lr_min: f64,
    ) -> Self {
        let schedule = Self {
            base_lr,
            total_steps,
            lr_max,
            lr_min,
            step: 0,
        };

        optimizer.set_learning_rate(schedule.lr() as f32);
        schedule
    }

    /// Returns the amount of times the schedule has been stepped.
    pub fn steps_taken(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps.get()
    }

    /// Returns the current multiplicative factor.
    pub fn factor(&self) -> f64 {
        cosine_lr(self.step, self.total_steps.get(), self.lr_max, self.lr_min)
    }

    /// Returns the current learning rate.
    pub fn lr(&self) -> f64 {
        self.base_lr * self.factor()
    }

    /// Advances the schedule by one optimizer step and updates the optimizer's learning rate.
    pub fn step<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) {
        self.step += 1;
        optimizer.set_learning_rate(self.lr() as f32);
    }
}
