use ndarray::{Array2, ArrayView2};

/// A classification loss over a batch of logits and their integer labels.
pub trait LossFn {
    /// Returns the loss averaged over the batch.
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> f32;

    /// Returns the derivative of `loss` with respect to every logit.
    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Array2<f32>;
}
