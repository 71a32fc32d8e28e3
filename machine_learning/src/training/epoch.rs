use log::{debug, info};

use crate::{
    MlErr, Result,
    arch::{LinModel, loss::LossFn},
    data::DataLoader,
    metrics::{self, AverageMeter},
    optimization::Optimizer,
    schedule::CosineSchedule,
};

/// The averaged results of a pass over a loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub loss: f64,
    pub acc: f64,
}

/// Runs a full pass of `model` over `loader`.
///
/// Passing an optimizer makes this a training pass: activations are cached, gradients of the
/// trainable groups are computed and one optimizer step (followed by one schedule step, if
/// any) is taken per batch. Without an optimizer the model is only evaluated and left as is.
///
/// # Arguments
/// * `model` - The model to run.
/// * `loader` - The batches of the pass.
/// * `loss_fn` - The loss every batch is measured with.
/// * `epoch` - The current epoch, used when reporting.
/// * `optimizer` - The optimizer to train with, `None` for an evaluation pass.
/// * `schedule` - The learning rate schedule to step after every optimizer step.
///
/// # Returns
/// The loss and accuracy of the pass, averaged over its samples, or an error if the loss
/// stops being finite.
pub fn run_epoch<L: LossFn>(
    model: &mut LinModel,
    loader: &mut DataLoader,
    loss_fn: &L,
    epoch: usize,
    mut optimizer: Option<&mut dyn Optimizer>,
    mut schedule: Option<&mut CosineSchedule>,
) -> Result<EpochStats> {
    let num_classes = loader.dataset().num_classes();
    if num_classes > model.n_classes() {
        return Err(MlErr::SizeMismatch {
            what: "classes",
            got: num_classes,
            expected: model.n_classes(),
        });
    }

    let phase = if optimizer.is_some() { "Train" } else { "Test" };
    let mut loss_meter = AverageMeter::new("loss");
    let mut acc_meter = AverageMeter::new("acc");

    for (i, batch) in loader.batches().enumerate() {
        let batch = batch?;

        let logits = match optimizer.as_deref_mut() {
            Some(optimizer) => {
                let logits = model.forward(batch.x.view())?;
                model.zero_grad();
                model.backward(loss_fn.loss_prime(logits.view(), &batch.y))?;
                optimizer.step(model.groups_mut())?;

                if let Some(schedule) = schedule.as_deref_mut() {
                    schedule.step(optimizer);
                }

                logits
            }
            None => model.infer(batch.x.view())?,
        };

        let loss = loss_fn.loss(logits.view(), &batch.y);
        if !loss.is_finite() {
            return Err(MlErr::NonFiniteLoss { epoch, batch: i });
        }

        let acc = metrics::accuracy(logits.view(), &batch.y);
        loss_meter.update(loss as f64, batch.len());
        acc_meter.update(acc, batch.len());

        debug!(
            "{phase} epoch {epoch}, {}: {:.4}, {}: {:.4}",
            loss_meter.name(),
            loss_meter.avg(),
            acc_meter.name(),
            acc_meter.avg()
        );
    }

    let stats = EpochStats {
        loss: loss_meter.avg(),
        acc: acc_meter.avg(),
    };

    info!(
        "{phase} epoch {epoch} done over {} samples, loss: {:.4}, acc: {:.4}",
        loss_meter.count(),
        stats.loss,
        stats.acc
    );

    Ok(stats)
}
