use crate::error::{NetError, Result};

/// Hyperparameters for a `train_model` run.
///
/// - `epochs`     — number of full passes over the training data
/// - `batch_size` — samples per mini-batch; use `1` for online SGD. Samples
///                  past the last full batch are skipped each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        TrainConfig { epochs, batch_size }
    }

    /// Requires `epochs > 0` and `0 < batch_size <= train_len`.
    pub fn validate(&self, train_len: usize) -> Result<()> {
        if self.epochs == 0 {
            return Err(NetError::config("epochs must be at least 1"));
        }
        validate_batch_size(self.batch_size, train_len)
    }
}

pub(crate) fn validate_batch_size(batch_size: usize, dataset_len: usize) -> Result<()> {
    if batch_size == 0 || batch_size > dataset_len {
        return Err(NetError::config(format!(
            "batch size must be in 1..={dataset_len}, got {batch_size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(TrainConfig::new(1, 4).validate(4).is_ok());
        assert!(TrainConfig::new(0, 4).validate(4).is_err());
        assert!(TrainConfig::new(3, 0).validate(4).is_err());
        assert!(TrainConfig::new(3, 5).validate(4).is_err());
        assert!(TrainConfig::new(3, 1).validate(0).is_err());
    }
}
