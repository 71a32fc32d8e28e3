use std::{fs, path::Path};

use machine_learning::{arch::Tensor, data::InMemoryDataset};
use ndarray::Array2;
use orchestrator::{
    OrchestratorError, checkpoint,
    cifar::{IMAGE_SIZE, NUM_CLASSES},
    configs::{Backbone, FinetuneConfig},
    finetune, finetune_with_datasets,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;

const PROJECTION_DIM: usize = 16;
const LOAD_EPOCH: usize = 100;

fn config(data_dir: &Path, run_dir: &Path, finetune: bool, epochs: usize) -> FinetuneConfig {
    serde_json::from_value(json!({
        "data_dir": data_dir,
        "pct": 1.0,
        "batch_size": 8,
        "backbone": "mlp256",
        "projection_dim": PROJECTION_DIM,
        "load_epoch": LOAD_EPOCH,
        "finetune": finetune,
        "momentum": 0.9,
        "learning_rate": 0.6,
        "finetune_epochs": epochs,
        "seed": 7,
        "run_dir": run_dir,
    }))
    .unwrap()
}

/// Writes a randomly initialized encoder and projector where pretraining would leave them.
fn write_pretrained(run_dir: &Path, projection_dim: usize) -> Vec<Tensor> {
    let backbone = Backbone::Mlp256;
    let mut rng = StdRng::seed_from_u64(11);

    let enc = backbone.encoder();
    let mut enc_params = vec![0.; enc.size()];
    enc.init(&mut rng, &mut enc_params).unwrap();

    let projector = backbone.projector(projection_dim);
    let mut proj_params = vec![0.; projector.size()];
    projector.init(&mut rng, &mut proj_params).unwrap();

    let enc_tensors = enc.tensors("enc", &enc_params).unwrap();
    let mut tensors = enc_tensors.clone();
    tensors.extend(projector.tensors("projector", &proj_params).unwrap());

    fs::create_dir_all(run_dir).unwrap();
    let path = checkpoint::pretrained_path(run_dir, backbone, LOAD_EPOCH);
    checkpoint::save(&path, &tensors).unwrap();

    enc_tensors
}

/// Images whose brightness depends on their class, so even a random encoder separates them.
fn images(n: usize, seed: u64) -> InMemoryDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let labels: Vec<_> = (0..n).map(|i| i % NUM_CLASSES).collect();
    let x = Array2::from_shape_fn((n, IMAGE_SIZE), |(i, _)| {
        let base = labels[i] as f32 / NUM_CLASSES as f32;
        (base + rng.random_range(0.0..0.05)).min(1.)
    });

    InMemoryDataset::new(x, labels, NUM_CLASSES).unwrap()
}

fn tensor<'t>(tensors: &'t [Tensor], name: &str) -> &'t Tensor {
    tensors.iter().find(|t| t.name == name).unwrap()
}

#[test]
fn frozen_encoder_run_writes_checkpoints_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let pretrained = write_pretrained(dir.path(), PROJECTION_DIM);
    let config = config(dir.path(), dir.path(), false, 2);

    let report = finetune_with_datasets(&config, images(40, 1), images(20, 2)).unwrap();
    assert!((1..=2).contains(&report.epochs_run));
    assert!((0. ..=1.).contains(&report.best_test_acc));
    assert!(report.best_train_loss.is_finite());

    let best = checkpoint::load(&checkpoint::best_path(dir.path(), Backbone::Mlp256)).unwrap();
    assert_eq!(tensor(&best, "lin.weight").shape, vec![256, NUM_CLASSES]);
    assert_eq!(tensor(&best, "lin.bias").shape, vec![NUM_CLASSES]);
    for name in ["enc.0.weight", "enc.0.bias", "enc.1.weight", "enc.1.bias"] {
        assert_eq!(tensor(&best, name).data, tensor(&pretrained, name).data);
    }

    assert!(checkpoint::early_stopping_path(dir.path()).exists());

    let log = fs::read_to_string(dir.path().join("finetune.log")).unwrap();
    assert!(log.contains("Using 40 of 40 training samples"));
    assert!(log.contains("Best Test Acc: "));
}

#[test]
fn finetuning_updates_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let pretrained = write_pretrained(dir.path(), PROJECTION_DIM);
    let config = config(dir.path(), dir.path(), true, 1);

    finetune_with_datasets(&config, images(40, 3), images(20, 4)).unwrap();

    let best = checkpoint::load(&checkpoint::best_path(dir.path(), Backbone::Mlp256)).unwrap();
    assert_ne!(tensor(&best, "enc.1.weight").data, tensor(&pretrained, "enc.1.weight").data);
}

#[test]
fn missing_pretrained_checkpoint_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), dir.path(), false, 1);

    let err = finetune_with_datasets(&config, images(40, 1), images(20, 2)).unwrap_err();
    assert!(matches!(err, OrchestratorError::Checkpoint { ref path, .. } if path.ends_with("simclr_mlp256_epoch100.safetensors")));
    assert!(!checkpoint::best_path(dir.path(), Backbone::Mlp256).exists());
}

#[test]
fn projection_dim_must_match_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_pretrained(dir.path(), PROJECTION_DIM * 2);
    let config = config(dir.path(), dir.path(), false, 1);

    let err = finetune_with_datasets(&config, images(40, 1), images(20, 2)).unwrap_err();
    assert!(matches!(err, OrchestratorError::Checkpoint { .. }));
}

#[test]
fn subset_smaller_than_a_batch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_pretrained(dir.path(), PROJECTION_DIM);
    let mut config = config(dir.path(), dir.path(), false, 1);
    config.pct = 0.0;

    // Only the first sample of every class is kept, 10 samples don't fill a batch of 16.
    config.batch_size = 16.try_into().unwrap();
    let err = finetune_with_datasets(&config, images(40, 1), images(20, 2)).unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
}

#[test]
fn reads_cifar_batches_from_the_data_dir() {
    let data_dir = tempfile::tempdir().unwrap();
    let run_dir = tempfile::tempdir().unwrap();
    write_pretrained(run_dir.path(), PROJECTION_DIM);

    let batches = data_dir.path().join("cifar-10-batches-bin");
    fs::create_dir_all(&batches).unwrap();

    let record = |label: u8| std::iter::once(label).chain(std::iter::repeat_n(label * 25, IMAGE_SIZE));
    let files = (1..=5).map(|i| format!("data_batch_{i}.bin")).chain(["test_batch.bin".to_string()]);
    for file in files {
        let bytes: Vec<u8> = (0..10).flat_map(record).collect();
        fs::write(batches.join(file), bytes).unwrap();
    }

    let config = config(data_dir.path(), run_dir.path(), false, 1);
    let report = finetune(&config).unwrap();

    assert_eq!(report.epochs_run, 1);
    assert!(checkpoint::best_path(run_dir.path(), Backbone::Mlp256).exists());
}
