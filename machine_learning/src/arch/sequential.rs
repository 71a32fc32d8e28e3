use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Tensor, layers::Dense};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// Like its layers, a `Sequential` doesn't own parameters, it walks a single flat slice in
/// layer order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Dense::size).sum()
    }

    /// Returns the width of the model's input, `None` if it has no layers.
    pub fn input_dim(&self) -> Option<usize> {
        self.layers.first().map(|layer| layer.dim().0)
    }

    /// Returns the width of the model's output, `None` if it has no layers.
    pub fn output_dim(&self) -> Option<usize> {
        self.layers.last().map(|layer| layer.dim().1)
    }

    /// Initializes every layer's slice of `params`.
    pub fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        for (layer, chunk) in self.layers.iter().zip(self.chunks_mut(params)?) {
            layer.init(rng, chunk)?;
        }

        Ok(())
    }

    /// Makes a forward pass through the network without keeping backward metadata.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut a = x.to_owned();
        for (layer, chunk) in self.layers.iter().zip(self.chunks(params)?) {
            a = layer.infer(chunk, a.view())?;
        }

        Ok(a)
    }

    /// Makes a forward pass through the network, caching what `backward` needs.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let chunks = self.chunks(params)?;

        let mut a = x.to_owned();
        for (layer, chunk) in self.layers.iter_mut().zip(chunks) {
            a = layer.forward(chunk, a.view())?;
        }

        Ok(a)
    }

    /// Backpropagates the delta of the model's output, accumulating every layer's gradient.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - The model's gradient buffer, laid out like `params`.
    /// * `d` - The loss derivative with respect to the model's output.
    ///
    /// # Returns
    /// The delta with respect to the model's input.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<Array2<f32>> {
        let chunks = self.chunks(params)?;
        let grad_chunks = self.chunks_mut(grad)?;

        let mut d = d;
        for ((layer, chunk), grad_chunk) in self
            .layers
            .iter_mut()
            .zip(chunks)
            .zip(grad_chunks)
            .rev()
        {
            d = layer.backward(chunk, Some(grad_chunk), d)?;
        }

        Ok(d)
    }

    /// Exports `params` as one weight and one bias tensor per layer, named
    /// `{prefix}.{i}.weight` and `{prefix}.{i}.bias`.
    pub fn tensors(&self, prefix: &str, params: &[f32]) -> Result<Vec<Tensor>> {
        let mut tensors = Vec::with_capacity(self.layers.len() * 2);

        for (i, (layer, chunk)) in self.layers.iter().zip(self.chunks(params)?).enumerate() {
            let (n_in, n_out) = layer.dim();
            let (w, b) = chunk.split_at(layer.weights_size());
            tensors.push(Tensor::new(format!("{prefix}.{i}.weight"), vec![n_in, n_out], w.to_vec()));
            tensors.push(Tensor::new(format!("{prefix}.{i}.bias"), vec![n_out], b.to_vec()));
        }

        Ok(tensors)
    }

    /// Rebuilds the flat parameter vector from tensors named like the ones `tensors` exports.
    ///
    /// # Arguments
    /// * `prefix` - The name prefix of this model's tensors.
    /// * `lookup` - Finds a tensor by its full name.
    ///
    /// # Returns
    /// The parameters, or an error if a tensor is missing or has an unexpected shape.
    pub fn assemble_params<'t, F>(&self, prefix: &str, mut lookup: F) -> Result<Vec<f32>>
    where
        F: FnMut(&str) -> Option<&'t Tensor>,
    {
        let mut params = Vec::with_capacity(self.size());

        for (i, layer) in self.layers.iter().enumerate() {
            let (n_in, n_out) = layer.dim();

            for (suffix, shape) in [("weight", vec![n_in, n_out]), ("bias", vec![n_out])] {
                let name = format!("{prefix}.{i}.{suffix}");
                let tensor = lookup(&name).ok_or_else(|| MlErr::MissingTensor { name: name.clone() })?;

                if tensor.shape != shape || tensor.data.len() != tensor.numel() {
                    return Err(MlErr::TensorShape {
                        name,
                        got: tensor.shape.clone(),
                        expected: shape,
                    });
                }

                params.extend_from_slice(&tensor.data);
            }
        }

        Ok(params)
    }

    fn chunks<'p>(&self, params: &'p [f32]) -> Result<Vec<&'p [f32]>> {
        self.check_len("sequential params", params.len())?;

        let mut rest = params;
        let mut chunks = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let chunk;
            (chunk, rest) = rest.split_at(layer.size());
            chunks.push(chunk);
        }

        Ok(chunks)
    }

    fn chunks_mut<'p>(&self, params: &'p mut [f32]) -> Result<Vec<&'p mut [f32]>> {
        self.check_len("sequential grad", params.len())?;

        let mut rest = params;
        let mut chunks = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let chunk;
            (chunk, rest) = rest.split_at_mut(layer.size());
            chunks.push(chunk);
        }

        Ok(chunks)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}
