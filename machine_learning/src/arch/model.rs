use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Sequential, Tensor, layers::Dense};
use crate::{MlErr, Result};

/// Name of the encoder's parameter group.
pub const ENC: &str = "enc";
/// Name of the linear head's parameter group.
pub const LIN: &str = "lin";

/// Whether the encoder's parameters are trained along with the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderMode {
    /// Only the linear head is trained.
    Frozen,
    /// The encoder is trained together with the head.
    Finetune,
}

impl EncoderMode {
    pub fn is_trainable(self) -> bool {
        matches!(self, EncoderMode::Finetune)
    }
}

/// A named block of parameters with its gradient buffer.
///
/// Trainability is fixed when the group is created, optimizers only ever touch groups that
/// were tagged as trainable.
#[derive(Debug, Clone)]
pub struct ParamGroup {
    name: &'static str,
    params: Vec<f32>,
    grad: Vec<f32>,
    trainable: bool,
}

impl ParamGroup {
    pub fn new(name: &'static str, params: Vec<f32>, trainable: bool) -> Self {
        Self {
            name,
            grad: vec![0.; params.len()],
            params,
            trainable,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn trainable(&self) -> bool {
        self.trainable
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    pub fn grad_mut(&mut self) -> &mut [f32] {
        &mut self.grad
    }

    /// Splits the group into its mutable parameters and its gradient, the view optimizers need.
    pub fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }
}

/// An encoder composed with a linear classification head.
#[derive(Debug, Clone)]
pub struct LinModel {
    enc: Sequential,
    lin: Dense,
    groups: [ParamGroup; 2],
}

impl LinModel {
    /// Creates a new `LinModel` on top of an already trained encoder. The head is initialized
    /// uniformly in `±1 / sqrt(feature_dim)`.
    ///
    /// # Arguments
    /// * `enc` - The encoder's architecture.
    /// * `enc_params` - The encoder's parameters.
    /// * `n_classes` - The amount of logits the head outputs.
    /// * `mode` - Whether the encoder gets trained too.
    /// * `rng` - A random number generator for the head's initialization.
    ///
    /// # Returns
    /// A new `LinModel` or an error if the encoder and its parameters don't fit.
    pub fn new<R: Rng>(
        enc: Sequential,
        enc_params: Vec<f32>,
        n_classes: usize,
        mode: EncoderMode,
        rng: &mut R,
    ) -> Result<Self> {
        if enc_params.len() != enc.size() {
            return Err(MlErr::SizeMismatch {
                what: "encoder params",
                got: enc_params.len(),
                expected: enc.size(),
            });
        }

        let feature_dim = enc.output_dim().ok_or(MlErr::SizeMismatch {
            what: "encoder layers",
            got: 0,
            expected: 1,
        })?;

        let lin = Dense::new((feature_dim, n_classes), None);
        let mut lin_params = vec![0.; lin.size()];
        lin.init(rng, &mut lin_params)?;

        Ok(Self {
            enc,
            lin,
            groups: [
                ParamGroup::new(ENC, enc_params, mode.is_trainable()),
                ParamGroup::new(LIN, lin_params, true),
            ],
        })
    }

    pub fn feature_dim(&self) -> usize {
        self.lin.dim().0
    }

    pub fn n_classes(&self) -> usize {
        self.lin.dim().1
    }

    pub fn groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    /// Returns the group with the given name.
    pub fn group(&self, name: &str) -> Result<&ParamGroup> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .ok_or_else(|| MlErr::UnknownParamGroup { name: name.into() })
    }

    /// Computes the logits for `x` without touching any training metadata.
    pub fn infer(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let [enc, lin] = &self.groups;
        let features = self.enc.infer(&enc.params, x)?;
        self.lin.infer(&lin.params, features.view())
    }

    /// Computes the logits for `x`, caching what `backward` needs. A frozen encoder is only
    /// evaluated.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let [enc, lin] = &self.groups;

        let features = if enc.trainable {
            self.enc.forward(&enc.params, x)?
        } else {
            self.enc.infer(&enc.params, x)?
        };

        self.lin.forward(&lin.params, features.view())
    }

    /// Backpropagates the loss derivative with respect to the logits, accumulating gradients
    /// into the trainable groups only.
    pub fn backward(&mut self, d: Array2<f32>) -> Result<()> {
        let [enc, lin] = &mut self.groups;

        let grad = lin.trainable.then_some(lin.grad.as_mut_slice());
        let d = self.lin.backward(&lin.params, grad, d)?;

        if enc.trainable {
            self.enc.backward(&enc.params, &mut enc.grad, d)?;
        }

        Ok(())
    }

    /// Zeroes the gradient of every trainable group.
    pub fn zero_grad(&mut self) {
        self.groups
            .iter_mut()
            .filter(|group| group.trainable)
            .for_each(ParamGroup::zero_grad);
    }

    /// Exports the whole model state, the encoder as `enc.{i}.*` and the head as `lin.*`.
    pub fn state(&self) -> Result<Vec<Tensor>> {
        let [enc, lin] = &self.groups;
        let mut tensors = self.enc.tensors(ENC, &enc.params)?;

        let (n_in, n_out) = self.lin.dim();
        let (w, b) = lin.params.split_at(self.lin.weights_size());
        tensors.push(Tensor::new(format!("{LIN}.weight"), vec![n_in, n_out], w.to_vec()));
        tensors.push(Tensor::new(format!("{LIN}.bias"), vec![n_out], b.to_vec()));

        Ok(tensors)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn identity_encoder() -> (Sequential, Vec<f32>) {
        let enc = Sequential::new([Dense::new((2, 2), None)]);
        (enc, vec![1., 0., 0., 1., 0., 0.])
    }

    fn model(mode: EncoderMode) -> LinModel {
        let (enc, params) = identity_encoder();
        LinModel::new(enc, params, 3, mode, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn groups_are_tagged_at_construction() {
        let frozen = model(EncoderMode::Frozen);
        assert!(!frozen.group(ENC).unwrap().trainable());
        assert!(frozen.group(LIN).unwrap().trainable());

        let finetuned = model(EncoderMode::Finetune);
        assert!(finetuned.group(ENC).unwrap().trainable());
        assert!(matches!(finetuned.group("proj"), Err(MlErr::UnknownParamGroup { .. })));
    }

    #[test]
    fn frozen_encoder_never_gets_gradients() {
        let mut model = model(EncoderMode::Frozen);
        let x = array![[1.0, 2.0], [-1.0, 0.5]];

        let logits = model.forward(x.view()).unwrap();
        assert_eq!(logits.dim(), (2, 3));
        model.backward(Array2::ones((2, 3))).unwrap();

        assert!(model.group(ENC).unwrap().grad().iter().all(|&g| g == 0.));
        assert!(model.group(LIN).unwrap().grad().iter().any(|&g| g != 0.));

        model.zero_grad();
        assert!(model.group(LIN).unwrap().grad().iter().all(|&g| g == 0.));
    }

    #[test]
    fn finetuned_encoder_gets_gradients() {
        let mut model = model(EncoderMode::Finetune);
        let x = array![[1.0, 2.0]];

        model.forward(x.view()).unwrap();
        model.backward(Array2::ones((1, 3))).unwrap();

        assert!(model.group(ENC).unwrap().grad().iter().any(|&g| g != 0.));
    }

    #[test]
    fn state_names_every_tensor() {
        let model = model(EncoderMode::Frozen);
        let names: Vec<_> = model.state().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["enc.0.weight", "enc.0.bias", "lin.weight", "lin.bias"]);
    }

    #[test]
    fn mismatched_encoder_params_are_rejected() {
        let (enc, _) = identity_encoder();
        let res = LinModel::new(enc, vec![0.; 3], 3, EncoderMode::Frozen, &mut StdRng::seed_from_u64(0));
        assert!(matches!(res, Err(MlErr::SizeMismatch { what: "encoder params", .. })));
    }
}
