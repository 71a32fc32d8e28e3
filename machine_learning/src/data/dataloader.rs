use std::num::NonZeroUsize;

use ndarray::{Array2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Augment, InMemoryDataset};
use crate::Result;

/// An owned batch of samples and their labels.
#[derive(Debug, Clone)]
pub struct Batch {
    pub x: Array2<f32>,
    pub y: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Splits a dataset into batches, once per epoch.
///
/// Shuffling and augmentation draw from the loader's own seeded generator, so two loaders
/// built with the same seed yield the same batches.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: InMemoryDataset,
    batch_size: NonZeroUsize,
    shuffle: bool,
    drop_last: bool,
    augment: Option<Augment>,
    rng: StdRng,
}

impl DataLoader {
    /// Creates a new `DataLoader` that walks the dataset in order, keeping the last partial
    /// batch and applying no augmentation.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to split.
    /// * `batch_size` - The amount of samples per batch.
    /// * `seed` - The seed of the loader's random number generator.
    ///
    /// # Returns
    /// A new `DataLoader` instance.
    pub fn new(dataset: InMemoryDataset, batch_size: NonZeroUsize, seed: u64) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle: false,
            drop_last: false,
            augment: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn augment(mut self, augment: Augment) -> Self {
        self.augment = Some(augment);
        self
    }

    pub fn dataset(&self) -> &InMemoryDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Returns the amount of batches in an epoch.
    pub fn len(&self) -> usize {
        let (n, bs) = (self.dataset.len(), self.batch_size.get());
        if self.drop_last { n / bs } else { n.div_ceil(bs) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new epoch, reshuffling the samples if the loader shuffles.
    pub fn batches(&mut self) -> Batches<'_> {
        let mut order: Vec<_> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }

        Batches {
            dataset: &self.dataset,
            augment: self.augment.as_ref(),
            rng: &mut self.rng,
            order,
            batch_size: self.batch_size.get(),
            drop_last: self.drop_last,
            cursor: 0,
        }
    }
}

/// The batches of a single epoch.
pub struct Batches<'a> {
    dataset: &'a InMemoryDataset,
    augment: Option<&'a Augment>,
    rng: &'a mut StdRng,
    order: Vec<usize>,
    batch_size: usize,
    drop_last: bool,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.order.len() - self.cursor;
        if remaining == 0 || (self.drop_last && remaining < self.batch_size) {
            return None;
        }

        let end = self.cursor + remaining.min(self.batch_size);
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let mut x = self.dataset.x().select(Axis(0), indices);
        let labels = self.dataset.y();
        let y = indices.iter().map(|&i| labels[i]).collect();

        if let Some(augment) = self.augment {
            if let Err(e) = augment.apply(&mut x, &mut *self.rng) {
                return Some(Err(e));
            }
        }

        Some(Ok(Batch { x, y }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> InMemoryDataset {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32);
        InMemoryDataset::new(x, (0..n).map(|i| i % 3).collect(), 3).unwrap()
    }

    fn collect(loader: &mut DataLoader) -> Vec<Vec<usize>> {
        loader
            .batches()
            .map(|batch| {
                let batch = batch.unwrap();
                batch.x.column(0).iter().map(|&v| v as usize / 2).collect()
            })
            .collect()
    }

    #[test]
    fn in_order_keeps_the_partial_batch() {
        let mut loader = DataLoader::new(dataset(7), NonZeroUsize::new(3).unwrap(), 0);
        assert_eq!(loader.len(), 3);
        assert_eq!(collect(&mut loader), [vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn drop_last_skips_the_partial_batch() {
        let mut loader = DataLoader::new(dataset(7), NonZeroUsize::new(3).unwrap(), 0).drop_last(true);
        assert_eq!(loader.len(), 2);
        assert_eq!(collect(&mut loader).len(), 2);
    }

    #[test]
    fn shuffling_is_seeded_and_covers_every_sample_once() {
        let build = || DataLoader::new(dataset(20), NonZeroUsize::new(4).unwrap(), 42).shuffle(true);
        let (mut a, mut b) = (build(), build());

        let first = collect(&mut a);
        assert_eq!(first, collect(&mut b));

        let mut seen: Vec<_> = first.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn labels_follow_their_samples() {
        let mut loader = DataLoader::new(dataset(9), NonZeroUsize::new(4).unwrap(), 7).shuffle(true);
        for batch in loader.batches() {
            let batch = batch.unwrap();
            for (row, &y) in batch.x.rows().into_iter().zip(&batch.y) {
                assert_eq!((row[0] as usize / 2) % 3, y);
            }
        }
    }
}
