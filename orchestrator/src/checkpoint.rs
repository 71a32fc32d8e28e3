//! Model checkpoints stored as safetensors files of little-endian `f32` tensors.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use machine_learning::arch::{ENC, Tensor};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{configs::Backbone, error::OrchestratorError};

const PROJECTOR: &str = "projector";

/// The checkpoint written by contrastive pretraining.
pub fn pretrained_path(run_dir: &Path, backbone: Backbone, epoch: usize) -> PathBuf {
    run_dir.join(format!("simclr_{backbone}_epoch{epoch}.safetensors"))
}

/// The checkpoint holding the best fine-tuned model.
pub fn best_path(run_dir: &Path, backbone: Backbone) -> PathBuf {
    run_dir.join(format!("simclr_lin_{backbone}_best.safetensors"))
}

/// The checkpoint written whenever the held-out loss improves.
pub fn early_stopping_path(run_dir: &Path) -> PathBuf {
    run_dir.join("checkpoint.safetensors")
}

/// Writes `tensors` to `path`, replacing whatever was there.
pub fn save(path: &Path, tensors: &[Tensor]) -> Result<(), OrchestratorError> {
    let views = tensors
        .iter()
        .map(|tensor| {
            let bytes: &[u8] = bytemuck::cast_slice(&tensor.data);
            TensorView::new(Dtype::F32, tensor.shape.clone(), bytes)
                .map(|view| (tensor.name.as_str(), view))
                .map_err(|e| OrchestratorError::checkpoint(path, format!("{}: {e}", tensor.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    safetensors::serialize_to_file(views, &None, path)
        .map_err(|e| OrchestratorError::checkpoint(path, e))
}

/// Reads every tensor stored in `path`.
pub fn load(path: &Path) -> Result<Vec<Tensor>, OrchestratorError> {
    let bytes = fs::read(path).map_err(|e| OrchestratorError::checkpoint(path, e))?;
    let file = SafeTensors::deserialize(&bytes).map_err(|e| OrchestratorError::checkpoint(path, e))?;

    let mut tensors = file
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            if view.dtype() != Dtype::F32 {
                let msg = format!("{name} holds {:?}, expected F32", view.dtype());
                return Err(OrchestratorError::checkpoint(path, msg));
            }

            let data = view
                .data()
                .chunks_exact(size_of::<f32>())
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect();

            Ok(Tensor::new(name, view.shape().to_vec(), data))
        })
        .collect::<Result<Vec<_>, _>>()?;

    tensors.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tensors)
}

/// Reads a pretrained checkpoint and returns the encoder's flat parameters.
///
/// The checkpoint must hold exactly the encoder of `backbone` and its projection head of
/// width `projection_dim`. The projection head is checked and then dropped.
///
/// # Arguments
/// * `path` - The pretrained checkpoint.
/// * `backbone` - The architecture the checkpoint was trained with.
/// * `projection_dim` - The output width of the projection head.
///
/// # Returns
/// The encoder parameters, in the layout `backbone.encoder()` expects.
pub fn load_encoder(
    path: &Path,
    backbone: Backbone,
    projection_dim: usize,
) -> Result<Vec<f32>, OrchestratorError> {
    let tensors = load(path)?;
    let by_name: HashMap<_, _> = tensors.iter().map(|t| (t.name.as_str(), t)).collect();
    let mut used = HashSet::new();

    let mut lookup = |name: &str| {
        let tensor = by_name.get(name).copied();
        if tensor.is_some() {
            used.insert(name.to_string());
        }
        tensor
    };

    let enc = backbone
        .encoder()
        .assemble_params(ENC, &mut lookup)
        .map_err(|e| OrchestratorError::checkpoint(path, e))?;

    backbone
        .projector(projection_dim)
        .assemble_params(PROJECTOR, &mut lookup)
        .map_err(|e| OrchestratorError::checkpoint(path, e))?;

    let mut unexpected: Vec<_> = by_name.keys().filter(|name| !used.contains(**name)).collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        let msg = format!("unexpected tensors {unexpected:?} for backbone {backbone}");
        return Err(OrchestratorError::checkpoint(path, msg));
    }

    Ok(enc)
}
