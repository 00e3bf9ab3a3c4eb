use std::time::Instant;

use tracing::{debug, info};

use crate::error::{NetError, Result};
use crate::loss::loss_type::LossType;
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::{validate_batch_size, TrainConfig};

/// One training example: `(input, target)`, shaped `(n0, 1)` and `(nL, 1)`.
pub type Sample = (Matrix, Matrix);

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Trains `network` for `config.epochs` epochs. After every epoch the
/// network is evaluated on `eval_set` (skipped when it is empty) and both
/// losses are logged and returned.
pub fn train_model(
    network: &mut Network,
    train_set: &[Sample],
    eval_set: &[Sample],
    config: &TrainConfig,
) -> Result<Vec<EpochStats>> {
    config.validate(train_set.len())?;

    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        let train_loss = train_epoch(network, train_set, config.batch_size)?;

        let (eval_loss, eval_accuracy) = if eval_set.is_empty() {
            (None, None)
        } else {
            let (loss, accuracy) = evaluate(network, eval_set)?;
            let accuracy = (network.config().loss == LossType::CrossEntropy).then_some(accuracy);
            (Some(loss), accuracy)
        };

        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        info!(
            epoch,
            total_epochs = config.epochs,
            train_loss,
            eval_loss = ?eval_loss,
            eval_accuracy = ?eval_accuracy,
            elapsed_ms,
            "epoch complete"
        );

        history.push(EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            eval_loss,
            eval_accuracy,
            elapsed_ms,
        });
    }

    Ok(history)
}

/// Runs one epoch of mini-batch SGD over `dataset` in order.
///
/// The dataset is cut into `floor(len / batch_size)` full batches; trailing
/// samples that do not fill a batch are skipped. Per batch: reset the
/// accumulators, forward → loss → backprop every sample, average, clip to
/// the configured `max_grad_norm` (if any), update.
///
/// Gradient accumulation is switched on for the epoch and the caller's
/// setting is restored afterwards, also when a batch fails.
///
/// Returns the mean loss over the processed samples.
pub fn train_epoch(network: &mut Network, dataset: &[Sample], batch_size: usize) -> Result<f64> {
    validate_batch_size(batch_size, dataset.len())?;

    let accumulate = network.gradient_accumulation();
    network.set_gradient_accumulation(true);
    let result = run_batches(network, dataset, batch_size);
    network.set_gradient_accumulation(accumulate);
    result
}

fn run_batches(network: &mut Network, dataset: &[Sample], batch_size: usize) -> Result<f64> {
    let num_batches = dataset.len() / batch_size;
    let max_grad_norm = network.config().max_grad_norm;

    let mut total_loss = 0.0;

    for batch in dataset.chunks_exact(batch_size) {
        network.reset_gradients();

        for (input, target) in batch {
            network.forward(input)?;
            total_loss += network.calculate_loss(target)?;
            network.backprop()?;
        }

        network.average_gradients(batch_size)?;
        if let Some(max_norm) = max_grad_norm {
            let norm = network.clip_gradients(max_norm)?;
            if norm > max_norm {
                debug!(norm, max_norm, "batch gradients clipped");
            }
        }
        network.update_weights()?;
    }

    Ok(total_loss / (num_batches * batch_size) as f64)
}

/// Mean loss over `dataset` without touching any gradient buffer.
pub fn run_evaluation(network: &mut Network, dataset: &[Sample]) -> Result<f64> {
    evaluate(network, dataset).map(|(loss, _)| loss)
}

/// Fraction of samples whose output argmax matches the target argmax.
pub fn evaluate_accuracy(network: &mut Network, dataset: &[Sample]) -> Result<f64> {
    evaluate(network, dataset).map(|(_, accuracy)| accuracy)
}

/// Mean loss and argmax accuracy from a single forward pass per sample.
fn evaluate(network: &mut Network, dataset: &[Sample]) -> Result<(f64, f64)> {
    if dataset.is_empty() {
        return Err(NetError::config("evaluation dataset is empty"));
    }
    let loss_type = network.config().loss;
    let mut total = 0.0;
    let mut correct = 0usize;
    for (input, target) in dataset {
        network.forward(input)?;
        total += loss_type.loss(network.output(), target)?;
        if network.output().argmax() == target.argmax() {
            correct += 1;
        }
    }
    let n = dataset.len() as f64;
    Ok((total / n, correct as f64 / n))
}
