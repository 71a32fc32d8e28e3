use std::path::{Path, PathBuf};

use machine_learning::{
    early_stopping::{EarlyStopping, Signal},
    training::EpochStats,
};

use crate::{checkpoint, configs::Backbone, error::OrchestratorError, run_log::RunLog};

/// Something that can be trained one epoch at a time.
pub trait Learner {
    /// Runs a training pass over the training set.
    fn train_epoch(&mut self, epoch: usize) -> Result<EpochStats, OrchestratorError>;

    /// Runs an evaluation pass over the held-out set.
    fn eval_epoch(&mut self, epoch: usize) -> Result<EpochStats, OrchestratorError>;

    /// Persists the current model state to `path`.
    fn save(&self, path: &Path) -> Result<(), OrchestratorError>;
}

/// The stages a fine-tuning run goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Training,
    BestFound,
    EarlyStopped,
    Done,
}

/// Where a run writes its checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    /// Overwritten whenever the training loss reaches a new low, and when early stopping fires.
    pub best: PathBuf,
    /// Overwritten whenever the held-out loss improves.
    pub early_stopping: PathBuf,
}

impl CheckpointPaths {
    pub fn new(run_dir: &Path, backbone: Backbone) -> Self {
        Self {
            best: checkpoint::best_path(run_dir, backbone),
            early_stopping: checkpoint::early_stopping_path(run_dir),
        }
    }
}

/// The outcome of a fine-tuning run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinetuneReport {
    /// The held-out accuracy of the epoch the best checkpoint was taken at.
    pub best_test_acc: f64,
    /// The training loss of that same epoch.
    pub best_train_loss: f64,
    pub epochs_run: usize,
    pub early_stopped: bool,
    /// `Phase::EarlyStopped` or `Phase::Done`.
    pub phase: Phase,
}

/// Trains `learner` for up to `epochs` epochs.
///
/// After every epoch the best checkpoint is refreshed if the training loss is the lowest
/// seen so far, and the held-out loss is fed to `stopping`. When `stopping` gives up, the
/// model of that epoch becomes the best one and the run ends.
///
/// # Arguments
/// * `learner` - The model to train.
/// * `epochs` - The maximum amount of epochs.
/// * `stopping` - The early stopping policy watching the held-out loss.
/// * `paths` - Where to write checkpoints.
/// * `log` - The run's log.
///
/// # Returns
/// A report of the run or the first error found, runs are never resumed.
pub fn fit<L: Learner + ?Sized>(
    learner: &mut L,
    epochs: usize,
    mut stopping: EarlyStopping,
    paths: &CheckpointPaths,
    log: &mut RunLog,
) -> Result<FinetuneReport, OrchestratorError> {
    let mut phase = Phase::Initializing;
    let mut best_train_loss = f64::INFINITY;
    let mut best_test_acc = 0.;
    let mut epochs_run = 0;

    for epoch in 1..=epochs {
        transition(&mut phase, Phase::Training);
        epochs_run = epoch;

        let train = learner.train_epoch(epoch)?;
        let test = learner.eval_epoch(epoch)?;
        log.info(format_args!(
            "Epoch {epoch}: train loss {:.4}, train acc {:.4}, test loss {:.4}, test acc {:.4}",
            train.loss, train.acc, test.loss, test.acc
        ))?;

        if train.loss < best_train_loss {
            transition(&mut phase, Phase::BestFound);
            best_train_loss = train.loss;
            best_test_acc = test.acc;
            log.info("==> New best results")?;
            learner.save(&paths.best)?;
        }

        let previous = stopping.best();
        let signal = stopping.observe(test.loss);

        if stopping.improved() {
            log.info(format_args!(
                "Test loss decreased ({} --> {:.6}), saving {}",
                previous.map_or("inf".to_string(), |loss| format!("{loss:.6}")),
                test.loss,
                paths.early_stopping.display()
            ))?;
            learner.save(&paths.early_stopping)?;
        }

        if signal == Signal::Stop {
            transition(&mut phase, Phase::EarlyStopped);
            log.warn(format_args!(
                "Early stopping at epoch {epoch}, no improvement for {} epochs",
                stopping.counter()
            ))?;

            best_train_loss = train.loss;
            best_test_acc = test.acc;
            log.info("==> New best results")?;
            learner.save(&paths.best)?;
            break;
        }
    }

    let early_stopped = phase == Phase::EarlyStopped;
    if !early_stopped {
        transition(&mut phase, Phase::Done);
    }

    log.info(format_args!("Best Test Acc: {best_test_acc:.4}"))?;

    Ok(FinetuneReport {
        best_test_acc,
        best_train_loss,
        epochs_run,
        early_stopped,
        phase,
    })
}

fn transition(phase: &mut Phase, next: Phase) {
    if *phase != next {
        log::debug!("{phase:?} -> {next:?}");
        *phase = next;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    /// Replays a fixed list of epoch results. Saving writes the current epoch to the file.
    struct Scripted {
        train: Vec<EpochStats>,
        test: Vec<EpochStats>,
        epoch: usize,
    }

    impl Scripted {
        fn new(train_losses: &[f64], test_losses: &[f64]) -> Self {
            let stats = |losses: &[f64]| {
                losses
                    .iter()
                    .enumerate()
                    .map(|(i, &loss)| EpochStats {
                        loss,
                        acc: 0.1 * (i + 1) as f64,
                    })
                    .collect()
            };

            Self {
                train: stats(train_losses),
                test: stats(test_losses),
                epoch: 0,
            }
        }
    }

    impl Learner for Scripted {
        fn train_epoch(&mut self, epoch: usize) -> Result<EpochStats, OrchestratorError> {
            self.epoch = epoch;
            Ok(self.train[epoch - 1])
        }

        fn eval_epoch(&mut self, epoch: usize) -> Result<EpochStats, OrchestratorError> {
            Ok(self.test[epoch - 1])
        }

        fn save(&self, path: &Path) -> Result<(), OrchestratorError> {
            fs::write(path, self.epoch.to_string())?;
            Ok(())
        }
    }

    fn run(learner: &mut Scripted, epochs: usize) -> (FinetuneReport, tempfile::TempDir, CheckpointPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = CheckpointPaths::new(dir.path(), Backbone::Mlp256);
        let mut log = RunLog::create(dir.path()).unwrap();

        let report = fit(learner, epochs, EarlyStopping::new(2, 0.), &paths, &mut log).unwrap();
        log.finish().unwrap();
        (report, dir, paths)
    }

    #[test]
    fn runs_every_epoch_while_the_test_loss_improves() {
        let mut learner = Scripted::new(&[1.0, 0.8, 0.6, 0.5], &[1.0, 0.9, 0.8, 0.7]);
        let (report, _dir, paths) = run(&mut learner, 4);

        assert_eq!(report.epochs_run, 4);
        assert!(!report.early_stopped);
        assert_eq!(report.phase, Phase::Done);
        assert_eq!(report.best_train_loss, 0.5);
        assert!((report.best_test_acc - 0.4).abs() < 1e-12);
        assert_eq!(fs::read_to_string(paths.best).unwrap(), "4");
        assert_eq!(fs::read_to_string(paths.early_stopping).unwrap(), "4");
    }

    #[test]
    fn stops_at_epoch_three_and_persists_that_epoch() {
        let mut learner = Scripted::new(&[1.0, 0.9, 0.95, 0.7, 0.6], &[0.5, 0.6, 0.7, 0.8, 0.9]);
        let (report, _dir, paths) = run(&mut learner, 5);

        assert_eq!(report.epochs_run, 3);
        assert!(report.early_stopped);
        assert_eq!(report.phase, Phase::EarlyStopped);
        assert_eq!(report.best_train_loss, 0.95);
        assert!((report.best_test_acc - 0.3).abs() < 1e-12);
        assert_eq!(fs::read_to_string(&paths.best).unwrap(), "3");
        assert_eq!(fs::read_to_string(&paths.early_stopping).unwrap(), "1");
    }

    #[test]
    fn best_is_keyed_on_the_training_loss() {
        // The test loss keeps improving, the training loss peaks at epoch 2.
        let mut learner = Scripted::new(&[0.5, 0.9, 0.7], &[0.9, 0.8, 0.7]);
        let (report, _dir, paths) = run(&mut learner, 3);

        assert_eq!(report.best_train_loss, 0.5);
        assert!((report.best_test_acc - 0.1).abs() < 1e-12);
        assert_eq!(fs::read_to_string(paths.best).unwrap(), "1");
    }

    #[test]
    fn the_report_is_logged() {
        let mut learner = Scripted::new(&[1.0], &[1.0]);
        let (_, dir, _) = run(&mut learner, 1);

        let log = fs::read_to_string(dir.path().join("finetune.log")).unwrap();
        assert!(log.contains("==> New best results"));
        assert!(log.lines().last().unwrap().ends_with("Best Test Acc: 0.1000"));
    }
}
