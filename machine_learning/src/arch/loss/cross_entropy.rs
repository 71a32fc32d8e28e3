use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

/// Softmax cross-entropy, averaged over the batch.
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    /// Row-wise softmax, shifted by each row's maximum to stay finite.
    pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut probs = logits.to_owned();

        for mut row in probs.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
            row.mapv_inplace(|z| (z - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|e| e / sum);
        }

        probs
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> f32 {
        if labels.is_empty() {
            return 0.;
        }

        let total: f32 = logits
            .axis_iter(Axis(0))
            .zip(labels)
            .map(|(row, &label)| {
                let max = row.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
                let log_sum_exp = row.iter().map(|&z| (z - max).exp()).sum::<f32>().ln() + max;
                log_sum_exp - row[label]
            })
            .sum();

        total / labels.len() as f32
    }

    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Array2<f32> {
        let mut d = Self::softmax(logits);
        let n = labels.len().max(1) as f32;

        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(labels) {
            row[label] -= 1.;
            row.mapv_inplace(|g| g / n);
        }

        d
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_logits_cost_log_of_classes() {
        let logits = Array2::<f32>::zeros((4, 10));
        let loss = CrossEntropy.loss(logits.view(), &[0, 3, 9, 5]);
        assert!((loss - 10f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn confident_correct_predictions_cost_little() {
        let logits = array![[20.0, 0.0], [0.0, 20.0]];
        assert!(CrossEntropy.loss(logits.view(), &[0, 1]) < 1e-6);
        assert!(CrossEntropy.loss(logits.view(), &[1, 0]) > 19.0);
    }

    #[test]
    fn large_logits_stay_finite() {
        let logits = array![[1000.0, -1000.0, 0.0]];
        let loss = CrossEntropy.loss(logits.view(), &[0]);
        assert!(loss.is_finite());
        assert!(CrossEntropy.loss_prime(logits.view(), &[1]).iter().all(|g| g.is_finite()));
    }

    #[test]
    fn gradient_rows_sum_to_zero() {
        let logits = array![[0.5, -1.0, 2.0], [0.0, 0.0, 0.0]];
        let d = CrossEntropy.loss_prime(logits.view(), &[2, 0]);

        for row in d.axis_iter(Axis(0)) {
            assert!(row.sum().abs() < 1e-6);
        }
        assert!((d[[1, 0]] - (1. / 3. - 1.) / 2.).abs() < 1e-6);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let logits = array![[0.2, -0.4, 1.1]];
        let labels = [1];
        let d = CrossEntropy.loss_prime(logits.view(), &labels);

        let eps = 1e-3;
        for j in 0..3 {
            let mut plus = logits.clone();
            let mut minus = logits.clone();
            plus[[0, j]] += eps;
            minus[[0, j]] -= eps;
            let numeric = (CrossEntropy.loss(plus.view(), &labels)
                - CrossEntropy.loss(minus.view(), &labels))
                / (2. * eps);
            assert!((numeric - d[[0, j]]).abs() < 1e-2);
        }
    }
}
