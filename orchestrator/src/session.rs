use std::{num::NonZeroUsize, path::Path};

use machine_learning::{
    arch::{EncoderMode, LinModel, loss::CrossEntropy},
    data::{Augment, DataLoader, InMemoryDataset},
    optimization::{Optimizer, Sgd},
    schedule::CosineSchedule,
    subset,
    training::{EpochStats, run_epoch},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    checkpoint,
    cifar::{CHANNELS, HEIGHT, NUM_CLASSES, WIDTH},
    configs::FinetuneConfig,
    error::OrchestratorError,
    finetune::Learner,
    run_log::RunLog,
};

/// A pretrained encoder with a fresh linear head, ready to be fine-tuned.
pub struct Session {
    model: LinModel,
    train: DataLoader,
    test: DataLoader,
    optimizer: Sgd,
    schedule: CosineSchedule,
    loss_fn: CrossEntropy,
}

impl Session {
    /// Creates a new `Session`.
    ///
    /// # Arguments
    /// * `config` - The options of the run.
    /// * `train_set` - The full training set, it gets subsampled here.
    /// * `test_set` - The held-out set.
    /// * `log` - The run's log.
    ///
    /// # Returns
    /// A new `Session` or an error if the pretrained checkpoint can't be loaded or the
    /// training subset doesn't fill a single batch.
    pub fn new(
        config: &FinetuneConfig,
        train_set: InMemoryDataset,
        test_set: InMemoryDataset,
        log: &mut RunLog,
    ) -> Result<Self, OrchestratorError> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        log.info(format_args!("Seed: {seed}"))?;

        let indices = subset::class_balanced(train_set.iter(), config.pct, NUM_CLASSES);
        log.info(format_args!(
            "Using {} of {} training samples",
            indices.len(),
            train_set.len()
        ))?;
        let train_set = train_set.subset(&indices)?;

        let flip = Augment::horizontal_flip(0.5, (CHANNELS, HEIGHT, WIDTH));
        let train = DataLoader::new(train_set, config.batch_size, rng.random())
            .shuffle(true)
            .drop_last(true)
            .augment(flip);
        let test = DataLoader::new(test_set, config.batch_size, rng.random());

        let total_steps = NonZeroUsize::new(config.schedule_epochs() * train.len()).ok_or_else(|| {
            OrchestratorError::InvalidConfig(format!(
                "{} training samples don't fill a single batch of {}",
                train.dataset().len(),
                config.batch_size
            ))
        })?;
        log.info(format_args!("{} training batches per epoch", train.len()))?;

        let pretrained = checkpoint::pretrained_path(&config.run_dir, config.backbone, config.load_epoch);
        let enc_params = checkpoint::load_encoder(&pretrained, config.backbone, config.projection_dim.get())?;
        log.info(format_args!("Loaded {} encoder from {}", config.backbone, pretrained.display()))?;

        let mode = if config.finetune {
            EncoderMode::Finetune
        } else {
            EncoderMode::Frozen
        };
        let model = LinModel::new(config.backbone.encoder(), enc_params, NUM_CLASSES, mode, &mut rng)?;

        let mut optimizer = Sgd::new(model.groups(), config.base_lr as f32, config.momentum, true);
        log.info(format_args!(
            "Encoder {:?}, optimizing {} parameters",
            mode,
            optimizer.tracked_params()
        ))?;

        let schedule = CosineSchedule::new(
            &mut optimizer,
            config.base_lr,
            total_steps,
            config.learning_rate,
            config.lr_min,
        );

        Ok(Self {
            model,
            train,
            test,
            optimizer,
            schedule,
            loss_fn: CrossEntropy::new(),
        })
    }

    pub fn model(&self) -> &LinModel {
        &self.model
    }

    pub fn schedule(&self) -> &CosineSchedule {
        &self.schedule
    }

    pub fn train_batches(&self) -> usize {
        self.train.len()
    }
}

impl Learner for Session {
    fn train_epoch(&mut self, epoch: usize) -> Result<EpochStats, OrchestratorError> {
        log::debug!("epoch {epoch} starts at lr {:.6}", self.optimizer.learning_rate());

        let stats = run_epoch(
            &mut self.model,
            &mut self.train,
            &self.loss_fn,
            epoch,
            Some(&mut self.optimizer),
            Some(&mut self.schedule),
        )?;

        Ok(stats)
    }

    fn eval_epoch(&mut self, epoch: usize) -> Result<EpochStats, OrchestratorError> {
        Ok(run_epoch(&mut self.model, &mut self.test, &self.loss_fn, epoch, None, None)?)
    }

    fn save(&self, path: &Path) -> Result<(), OrchestratorError> {
        checkpoint::save(path, &self.model.state()?)
    }
}
