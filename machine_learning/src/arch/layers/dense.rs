use ndarray::{linalg, prelude::*};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · w + b)`.
///
/// The layer does not own its parameters, it interprets a flat slice of `(n_in + 1) * n_out`
/// floats as the weights matrix `(n_in, n_out)` followed by the bias vector `n_out`.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output sizes of the layer.
    /// * `act_fn` - An optional activation applied after the affine transform.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the input and output sizes of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of parameters that belong to the weights matrix.
    pub fn weights_size(&self) -> usize {
        self.dim.0 * self.dim.1
    }

    /// Fills `params` with values drawn uniformly from `±1 / sqrt(n_in)`.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `params` - This layer's parameter slice.
    ///
    /// # Returns
    /// An error if the slice doesn't fit the layer or the distribution couldn't be built.
    pub fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        self.check_len("dense params", params.len())?;

        let bound = 1. / (self.dim.0.max(1) as f32).sqrt();
        let distribution = Uniform::new_inclusive(-bound, bound)?;
        params
            .iter_mut()
            .for_each(|p| *p = distribution.sample(rng));

        Ok(())
    }

    /// Computes the layer's output without keeping anything for a later backward pass.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The activations of the layer.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (w, b) = self.view_params(params)?;
        self.check_input(&x)?;

        let mut a = x.dot(&w) + &b;
        if let Some(act_fn) = &self.act_fn {
            a.mapv_inplace(|z| act_fn.f(z));
        }

        Ok(a)
    }

    /// Computes the layer's output, remembering the input and the pre-activation for `backward`.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The activations of the layer.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (w, b) = self.view_params(params)?;
        self.check_input(&x)?;

        self.z = x.dot(&w) + &b;
        self.x = x.to_owned();

        let Some(act_fn) = &self.act_fn else {
            return Ok(self.z.clone());
        };

        Ok(self.z.mapv(|z| act_fn.f(z)))
    }

    /// Backpropagates `d`, the loss derivative with respect to this layer's output.
    ///
    /// Gradients are *accumulated* into `grad` when given, a frozen layer passes `None` and
    /// only propagates the delta.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `grad` - This layer's gradient slice, if its parameters are being trained.
    /// * `d` - The delta coming from the next layer.
    ///
    /// # Returns
    /// The delta with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: Option<&mut [f32]>,
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        if let Some(grad) = grad {
            let (mut dw, mut db) = self.view_grad(grad)?;
            linalg::general_mat_mul(1.0, &self.x.t(), &d, 1.0, &mut dw);
            db += &d.sum_axis(Axis(0));
        }

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    fn check_input(&self, x: &ArrayView2<f32>) -> Result<()> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        Ok(())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense grad", grad.len())?;

        let (dw_raw, db_raw) = grad.split_at_mut(self.weights_size());
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.shape_err())?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| self.shape_err())?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense params", params.len())?;

        let (w_raw, b_raw) = params.split_at(self.weights_size());
        let w = ArrayView2::from_shape(self.dim, w_raw).map_err(|_| self.shape_err())?;
        let b = ArrayView1::from_shape(self.dim.1, b_raw).map_err(|_| self.shape_err())?;
        Ok((w, b))
    }

    fn shape_err(&self) -> MlErr {
        MlErr::SizeMismatch {
            what: "dense shape",
            got: 0,
            expected: self.size,
        }
    }
}
