pub mod checkpoint;
pub mod cifar;
pub mod configs;
pub mod error;
pub mod finetune;
mod run_log;
mod session;

use machine_learning::{data::InMemoryDataset, early_stopping::EarlyStopping};

pub use error::OrchestratorError;
pub use finetune::{CheckpointPaths, FinetuneReport, Learner, Phase};
pub use run_log::RunLog;
pub use session::Session;

use crate::configs::FinetuneConfig;

/// Fine-tunes a pretrained encoder on CIFAR-10 read from `config.data_dir`.
///
/// # Errors
/// Returns an `OrchestratorError` if the datasets or the pretrained checkpoint can't be read,
/// or if training fails.
pub fn finetune(config: &FinetuneConfig) -> Result<FinetuneReport, OrchestratorError> {
    let mut log = RunLog::create(&config.run_dir)?;
    log.info(format_args!("Reading CIFAR-10 from {}", config.data_dir.display()))?;

    let train = cifar::load_train(&config.data_dir)?;
    let test = cifar::load_test(&config.data_dir)?;

    let report = run(config, train, test, &mut log)?;
    log.finish()?;
    Ok(report)
}

/// Fine-tunes a pretrained encoder on already loaded datasets.
///
/// # Errors
/// Returns an `OrchestratorError` if the pretrained checkpoint can't be read or if training
/// fails.
pub fn finetune_with_datasets(
    config: &FinetuneConfig,
    train: InMemoryDataset,
    test: InMemoryDataset,
) -> Result<FinetuneReport, OrchestratorError> {
    let mut log = RunLog::create(&config.run_dir)?;
    let report = run(config, train, test, &mut log)?;
    log.finish()?;
    Ok(report)
}

fn run(
    config: &FinetuneConfig,
    train: InMemoryDataset,
    test: InMemoryDataset,
    log: &mut RunLog,
) -> Result<FinetuneReport, OrchestratorError> {
    log.info(format_args!(
        "Fine-tuning {} from pretraining epoch {} ({})",
        config.backbone,
        config.load_epoch,
        if config.finetune { "encoder trained" } else { "encoder frozen" }
    ))?;

    let mut session = Session::new(config, train, test, log)?;
    let paths = CheckpointPaths::new(&config.run_dir, config.backbone);
    let stopping = EarlyStopping::new(config.patience, 0.);

    finetune::fit(&mut session, config.finetune_epochs.get(), stopping, &paths, log)
}
