use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::loss::loss_type::LossType;
use crate::optim::Optimizer;

pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_MAX_GRAD_NORM: f64 = 5.0;

/// Runtime configuration of a `Network`.
///
/// - `optimizer`     — update rule applied by `update_weights`
/// - `loss`          — loss used by `calculate_loss` and evaluation
/// - `learning_rate` — step size, strictly positive and finite
/// - `max_grad_norm` — per-layer clip threshold applied by `train_epoch`;
///                     `None` disables clipping in the training loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub optimizer: Optimizer,
    pub loss: LossType,
    pub learning_rate: f64,
    pub max_grad_norm: Option<f64>,
}

impl NetworkConfig {
    /// Defaults for a network whose last layer uses `output`: cross-entropy
    /// for a softmax output, MSE otherwise.
    pub fn default_for(output: ActivationFunction) -> NetworkConfig {
        let loss = if output == ActivationFunction::Softmax {
            LossType::CrossEntropy
        } else {
            LossType::Mse
        };
        NetworkConfig {
            optimizer: Optimizer::Sgd,
            loss,
            learning_rate: DEFAULT_LEARNING_RATE,
            max_grad_norm: Some(DEFAULT_MAX_GRAD_NORM),
        }
    }

    /// Checks the values on their own and against the output activation.
    pub fn validate(&self, output: ActivationFunction) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NetError::config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if let Some(norm) = self.max_grad_norm {
            if !(norm.is_finite() && norm > 0.0) {
                return Err(NetError::config(format!(
                    "max gradient norm must be positive, got {norm}"
                )));
            }
        }
        if output == ActivationFunction::Softmax && self.loss != LossType::CrossEntropy {
            return Err(NetError::config(format!(
                "softmax output can only be trained with Cross_Entropy, not {}",
                self.loss
            )));
        }
        // ln(p + eps) needs predictions in [0, 1]
        if self.loss == LossType::CrossEntropy
            && !matches!(output, ActivationFunction::Softmax | ActivationFunction::Sigmoid)
        {
            return Err(NetError::config(format!(
                "Cross_Entropy needs a softmax or sigmoid output, not {output}"
            )));
        }
        Ok(())
    }
}
