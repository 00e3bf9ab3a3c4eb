use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::loss::loss_type::LossType;
use crate::network::config::{NetworkConfig, DEFAULT_LEARNING_RATE, DEFAULT_MAX_GRAD_NORM};
use crate::network::network::Network;
use crate::optim::Optimizer;

/// A serializable description of a network architecture and its training
/// configuration. It carries no weights; `build` draws fresh ones.
///
/// ```json
/// {
///   "layer_sizes": [2, 10, 2],
///   "activations": ["ReLU", "linear"],
///   "loss": "MSE",
///   "optimizer": "SGD",
///   "learning_rate": 0.1
/// }
/// ```
///
/// Unknown activation, loss or optimizer names fail at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// `[n0, n1, …, nL]`, input size first.
    pub layer_sizes: Vec<usize>,
    /// One activation per weighted layer.
    pub activations: Vec<ActivationFunction>,
    /// Defaults to cross-entropy for a softmax output, MSE otherwise.
    #[serde(default)]
    pub loss: Option<LossType>,
    #[serde(default)]
    pub optimizer: Optimizer,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_max_grad_norm")]
    pub max_grad_norm: Option<f64>,
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

fn default_max_grad_norm() -> Option<f64> {
    Some(DEFAULT_MAX_GRAD_NORM)
}

impl NetworkSpec {
    pub fn from_json(json: &str) -> Result<NetworkSpec> {
        serde_json::from_str(json)
            .map_err(|e| NetError::config(format!("invalid network spec: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| NetError::config(format!("cannot serialize network spec: {e}")))
    }

    /// Builds and configures a network with weights drawn from `rng`.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        let mut network = Network::with_activations(&self.layer_sizes, &self.activations, rng)?;
        let loss = match self.loss {
            Some(loss) => loss,
            None => network.config().loss,
        };
        network.set_config(NetworkConfig {
            optimizer: self.optimizer,
            loss,
            learning_rate: self.learning_rate,
            max_grad_norm: self.max_grad_norm,
        })?;
        Ok(network)
    }
}
