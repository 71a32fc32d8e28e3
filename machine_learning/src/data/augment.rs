use ndarray::Array2;
use rand::Rng;

use crate::{MlErr, Result};

/// A random transformation applied to training batches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Augment {
    /// Mirrors a CHW image along its width with probability `p`.
    HorizontalFlip {
        p: f64,
        channels: usize,
        height: usize,
        width: usize,
    },
}

impl Augment {
    pub fn horizontal_flip(p: f64, (channels, height, width): (usize, usize, usize)) -> Self {
        Self::HorizontalFlip {
            p,
            channels,
            height,
            width,
        }
    }

    /// Applies the transformation to every sample of `batch` in place.
    ///
    /// # Arguments
    /// * `batch` - The samples, one flattened image per row.
    /// * `rng` - The random number generator deciding which samples are transformed.
    ///
    /// # Returns
    /// An error if the rows are not images of the expected size.
    pub fn apply<R: Rng + ?Sized>(&self, batch: &mut Array2<f32>, rng: &mut R) -> Result<()> {
        let &Self::HorizontalFlip {
            p,
            channels,
            height,
            width,
        } = self;

        let size = channels * height * width;
        if batch.ncols() != size {
            return Err(MlErr::SizeMismatch {
                what: "image",
                got: batch.ncols(),
                expected: size,
            });
        }

        for mut image in batch.rows_mut() {
            if rng.random::<f64>() >= p {
                continue;
            }

            for lane in 0..channels * height {
                let base = lane * width;
                for col in 0..width / 2 {
                    image.swap(base + col, base + width - 1 - col);
                }
            }
        }

        Ok(())
    }
}
