//! Class-balanced subsampling of a labeled dataset.

use std::{collections::HashMap, hash::Hash};

/// Selects a class-balanced subset of indices covering roughly `pct` of the dataset.
///
/// Every class gets a cap of `len * pct / num_classes` samples, compared as a real number. The
/// dataset is walked once in order and an index is kept while its label's bucket is under the
/// cap; the first sample of a label is always kept. Buckets are concatenated in the order their
/// labels were first seen.
///
/// # Arguments
/// * `dataset` - The `(item, label)` pairs, in dataset order.
/// * `pct` - The fraction of the dataset to keep.
/// * `num_classes` - The amount of classes the dataset enumerates.
///
/// # Returns
/// The selected indices.
pub fn class_balanced<I, T, L>(dataset: I, pct: f64, num_classes: usize) -> Vec<usize>
where
    I: IntoIterator<Item = (T, L)>,
    I::IntoIter: ExactSizeIterator,
    L: Eq + Hash,
{
    let samples = dataset.into_iter();
    let per_class = (samples.len() as f64 * pct) / num_classes as f64;

    let mut slots: HashMap<L, usize> = HashMap::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();

    for (i, (_, label)) in samples.enumerate() {
        match slots.get(&label) {
            Some(&slot) => {
                if (buckets[slot].len() as f64) < per_class {
                    buckets[slot].push(i);
                }
            }
            None => {
                slots.insert(label, buckets.len());
                buckets.push(vec![i]);
            }
        }
    }

    buckets.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(labels: &[usize]) -> Vec<((), usize)> {
        labels.iter().map(|&l| ((), l)).collect()
    }

    #[test]
    fn twenty_samples_two_classes_keep_one_each() {
        let dataset = labels(&[1, 0, 1, 0, 0, 1, 1, 1, 0, 0, 1, 0, 1, 0, 0, 1, 1, 0, 1, 0]);
        assert_eq!(class_balanced(dataset, 0.5, 10), vec![0, 1]);
    }

    #[test]
    fn caps_every_class_and_keeps_source_order_within_classes() {
        let dataset: Vec<_> = (0..100).map(|i| ((), i % 10)).collect();
        let subset = class_balanced(dataset, 0.5, 10);

        assert_eq!(subset.len(), 50);
        for class in 0..10 {
            let picked: Vec<_> = subset.iter().copied().filter(|i| i % 10 == class).collect();
            assert_eq!(picked.len(), 5);
            assert!(picked.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn buckets_follow_first_seen_label_order() {
        let dataset = labels(&[7, 3, 7, 3, 9, 7]);
        // cap = 6 * 0.5 / 3 = 1
        assert_eq!(class_balanced(dataset, 0.5, 3), vec![0, 1, 4]);

        let dataset = labels(&[7, 3, 7, 3, 9, 7]);
        assert_eq!(class_balanced(dataset, 1.0, 3), vec![0, 2, 1, 3, 4]);
    }

    #[test]
    fn fractional_caps_round_up() {
        let dataset: Vec<_> = (0..30).map(|i| ((), i % 10)).collect();
        // cap = 30 * 0.5 / 10 = 1.5, so buckets reach 2
        let subset = class_balanced(dataset, 0.5, 10);
        assert_eq!(subset.len(), 20);
    }

    #[test]
    fn first_sample_of_a_class_is_always_kept() {
        let dataset: Vec<_> = (0..40).map(|i| ((), i % 4)).collect();
        let subset = class_balanced(dataset, 0.0, 10);
        assert_eq!(subset, vec![0, 1, 2, 3]);
    }

    #[test]
    fn is_deterministic() {
        let dataset: Vec<_> = (0..57).map(|i| ((), (i * 7) % 10)).collect();
        let a = class_balanced(dataset.clone(), 0.3, 10);
        let b = class_balanced(dataset, 0.3, 10);
        assert_eq!(a, b);
        assert!(a.len() <= 57);
    }
}
