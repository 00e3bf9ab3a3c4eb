use serde::{Serialize, Deserialize};

/// Per-epoch statistics produced by `train_model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over all samples processed in this epoch.
    pub train_loss: f64,
    /// Mean evaluation loss; `None` when no evaluation set was given.
    pub eval_loss: Option<f64>,
    /// Evaluation accuracy as a fraction in [0, 1]; only set for
    /// cross-entropy runs with an evaluation set.
    pub eval_accuracy: Option<f64>,
    /// Wall-clock duration of this epoch (training plus evaluation) in milliseconds.
    pub elapsed_ms: u64,
}
