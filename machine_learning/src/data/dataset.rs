use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::{MlErr, Result};

/// A labeled dataset held entirely in memory.
///
/// Every row of `x` is one flattened sample and `y` holds its class.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    x: Array2<f32>,
    y: Vec<usize>,
    num_classes: usize,
}

impl InMemoryDataset {
    /// Creates a new `InMemoryDataset`.
    ///
    /// # Arguments
    /// * `x` - The samples, one per row.
    /// * `y` - The label of every sample.
    /// * `num_classes` - The amount of classes, every label must be below it.
    ///
    /// # Returns
    /// A new `InMemoryDataset` or an error if the labels don't fit the samples.
    pub fn new(x: Array2<f32>, y: Vec<usize>, num_classes: usize) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: y.len(),
                expected: x.nrows(),
            });
        }

        if let Some(&label) = y.iter().find(|&&label| label >= num_classes) {
            return Err(MlErr::LabelOutOfRange { label, num_classes });
        }

        Ok(Self { x, y, num_classes })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// The size of a single sample.
    pub fn sample_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> &[usize] {
        &self.y
    }

    /// Iterates over the `(sample, label)` pairs in dataset order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (ArrayView1<'_, f32>, usize)> {
        self.x.axis_iter(Axis(0)).zip(self.y.iter().copied())
    }

    /// Builds a new dataset out of the samples at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let len = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(MlErr::IndexOutOfRange { index, len });
        }

        Ok(Self {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            num_classes: self.num_classes,
        })
    }
}
