use crate::{Result, arch::ParamGroup};

/// An optimization algorithm that steps a model's trainable parameter groups along their
/// gradients.
pub trait Optimizer {
    /// Updates the parameters of every trainable group according to the algorithm's learning
    /// rule. Groups that aren't trainable are left untouched.
    ///
    /// # Arguments
    /// * `groups` - The model's parameter groups, gradients already computed.
    fn step(&mut self, groups: &mut [ParamGroup]) -> Result<()>;

    /// Returns the learning rate the next `step` will use.
    fn learning_rate(&self) -> f32;

    /// Overrides the learning rate, this is how schedules drive the optimizer.
    fn set_learning_rate(&mut self, learning_rate: f32);
}
