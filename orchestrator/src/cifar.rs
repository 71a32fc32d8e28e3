//! Reader for the binary version of CIFAR-10.
//!
//! Every record is one label byte followed by a 32x32 image stored channel by channel, row by
//! row (3072 bytes). Pixels are scaled to `[0, 1]`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use machine_learning::data::InMemoryDataset;
use ndarray::Array2;

use crate::error::OrchestratorError;

pub const CHANNELS: usize = 3;
pub const HEIGHT: usize = 32;
pub const WIDTH: usize = 32;
pub const IMAGE_SIZE: usize = CHANNELS * HEIGHT * WIDTH;
pub const NUM_CLASSES: usize = 10;

const RECORD_SIZE: usize = 1 + IMAGE_SIZE;
const BATCHES_DIR: &str = "cifar-10-batches-bin";
const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILES: [&str; 1] = ["test_batch.bin"];

/// Loads the 50000 training images.
pub fn load_train(data_dir: &Path) -> Result<InMemoryDataset, OrchestratorError> {
    load_files(data_dir, &TRAIN_FILES)
}

/// Loads the 10000 test images.
pub fn load_test(data_dir: &Path) -> Result<InMemoryDataset, OrchestratorError> {
    load_files(data_dir, &TEST_FILES)
}

fn batch_path(data_dir: &Path, file: &str) -> PathBuf {
    data_dir.join(BATCHES_DIR).join(file)
}

fn load_files(data_dir: &Path, files: &[&str]) -> Result<InMemoryDataset, OrchestratorError> {
    let mut pixels = Vec::new();
    let mut labels = Vec::new();

    for file in files {
        let path = batch_path(data_dir, file);
        let bytes = fs::read(&path).map_err(|e| OrchestratorError::dataset(&path, e))?;

        if bytes.is_empty() || bytes.len() % RECORD_SIZE != 0 {
            let msg = format!("{} bytes is not a whole number of {RECORD_SIZE} byte records", bytes.len());
            return Err(OrchestratorError::dataset(&path, msg));
        }

        for record in bytes.chunks_exact(RECORD_SIZE) {
            let label = record[0] as usize;
            if label >= NUM_CLASSES {
                return Err(OrchestratorError::dataset(&path, format!("invalid label {label}")));
            }

            labels.push(label);
            pixels.extend(record[1..].iter().map(|&p| p as f32 / 255.));
        }

        log::debug!("read {} records from {}", bytes.len() / RECORD_SIZE, path.display());
    }

    let x = Array2::from_shape_vec((labels.len(), IMAGE_SIZE), pixels)
        .map_err(|e| OrchestratorError::dataset(data_dir, e))?;

    Ok(InMemoryDataset::new(x, labels, NUM_CLASSES)?)
}
