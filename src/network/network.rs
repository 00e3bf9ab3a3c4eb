use rand::Rng;
use tracing::debug;

use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::layers::dense::Layer;
use crate::loss::{self, CrossEntropyLoss, LossType, MseLoss};
use crate::math::matrix::Matrix;
use crate::network::config::NetworkConfig;
use crate::network::state::NetworkState;
use crate::optim::{Optimizer, Sgd};
use crate::train::{self, EpochStats, Sample, TrainConfig};

/// A stack of dense layers plus everything needed to train it.
///
/// `input` caches `a_0`; each layer caches its own `z`, `a`, error signal
/// and gradients, so the network holds `L + 1` activations for `L` layers.
/// Nothing is resized after construction.
#[derive(Debug, Clone)]
pub struct Network {
    input: Matrix,
    layers: Vec<Layer>,
    diff: Matrix,
    loss_grad: Matrix,
    config: NetworkConfig,
    state: NetworkState,
    accumulate: bool,
}

impl Network {
    /// Builds a network from layer sizes `[n0, n1, …, nL]` and `L`
    /// activation names, drawing initial weights from `rng`.
    pub fn new<S, R>(layer_sizes: &[usize], activations: &[S], rng: &mut R) -> Result<Network>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let activations = activations.iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<ActivationFunction>>>()?;
        Network::with_activations(layer_sizes, &activations, rng)
    }

    pub fn with_activations<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activations: &[ActivationFunction],
        rng: &mut R,
    ) -> Result<Network> {
        if layer_sizes.len() < 2 {
            return Err(NetError::config(format!(
                "need at least an input and an output layer, got {} layer sizes",
                layer_sizes.len()
            )));
        }
        if activations.len() != layer_sizes.len() - 1 {
            return Err(NetError::config(format!(
                "{} layer sizes need {} activations, got {}",
                layer_sizes.len(),
                layer_sizes.len() - 1,
                activations.len()
            )));
        }
        if let Some(i) = layer_sizes.iter().position(|&n| n == 0) {
            return Err(NetError::config(format!("layer {i} has size zero")));
        }

        let layers = layer_sizes.windows(2)
            .zip(activations.iter())
            .map(|(pair, &activation)| Layer::new(pair[1], pair[0], activation, &mut *rng))
            .collect::<Result<Vec<Layer>>>()?;

        let output_size = layer_sizes[layer_sizes.len() - 1];
        let output_activation = activations[activations.len() - 1];

        debug!(
            layer_sizes = ?layer_sizes,
            activations = ?activations,
            "network initialized"
        );

        Ok(Network {
            input: Matrix::zeros(layer_sizes[0], 1)?,
            layers,
            diff: Matrix::zeros(output_size, 1)?,
            loss_grad: Matrix::zeros(output_size, 1)?,
            config: NetworkConfig::default_for(output_activation),
            state: NetworkState::Constructed,
            accumulate: true,
        })
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    /// Sets optimizer, loss and learning rate by name. Accepted optimizers:
    /// `SGD`; losses: `MSE`, `Cross_Entropy`.
    pub fn configure(&mut self, optimizer: &str, loss: &str, learning_rate: f64) -> Result<()> {
        let config = NetworkConfig {
            optimizer: optimizer.parse()?,
            loss: loss.parse()?,
            learning_rate,
            max_grad_norm: self.config.max_grad_norm,
        };
        self.set_config(config)
    }

    pub fn set_config(&mut self, config: NetworkConfig) -> Result<()> {
        config.validate(self.output_activation())?;
        debug!(
            optimizer = %config.optimizer,
            loss = %config.loss,
            learning_rate = config.learning_rate,
            max_grad_norm = ?config.max_grad_norm,
            "network configured"
        );
        self.config = config;
        self.state = NetworkState::Configured;
        Ok(())
    }

    pub fn set_max_grad_norm(&mut self, max_grad_norm: Option<f64>) -> Result<()> {
        let config = NetworkConfig { max_grad_norm, ..self.config };
        config.validate(self.output_activation())?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// When off, `backprop` only fills the per-sample gradient buffers.
    /// With accumulation off, `backprop` still fills the per-sample
    /// gradients but leaves the accumulators alone. `train_epoch` turns it
    /// on for its own duration only.
    pub fn set_gradient_accumulation(&mut self, enabled: bool) {
        self.accumulate = enabled;
    }

    pub fn gradient_accumulation(&self) -> bool {
        self.accumulate
    }

    // ---------------------------------------------------------------------
    // Forward / loss / backward / update
    // ---------------------------------------------------------------------

    /// Forward pass; caches `z` and `a` in every layer for backprop.
    /// `input` must be `(n0, 1)`.
    pub fn forward(&mut self, input: &Matrix) -> Result<()> {
        if input.shape() != self.input.shape() {
            return Err(NetError::DimensionMismatch {
                op: "forward",
                left: self.input.shape(),
                right: input.shape(),
            });
        }
        self.input.copy_from(input)?;

        for i in 0..self.layers.len() {
            let (lower, upper) = self.layers.split_at_mut(i);
            let prev = if i == 0 { &self.input } else { &lower[i - 1].a };
            upper[0].feed_from(prev)?;
        }

        self.state = NetworkState::ForwardComplete;
        Ok(())
    }

    /// Forward pass that hands back a copy of the output.
    pub fn predict(&mut self, input: &Matrix) -> Result<Matrix> {
        self.forward(input)?;
        Ok(self.output().clone())
    }

    /// Computes the loss of the cached output against `target` and seeds the
    /// output layer's error signal.
    ///
    /// Softmax + cross-entropy seeds `delta_L = a_L - target` directly; every
    /// other pairing uses `loss'(a_L) ⊙ f_L'(z_L)`.
    pub fn calculate_loss(&mut self, target: &Matrix) -> Result<f64> {
        if !self.state.has_forward_cache() {
            return Err(NetError::OutOfOrder { op: "calculate_loss", state: self.state });
        }

        let last = self.layers.len() - 1;
        let layer = &mut self.layers[last];
        loss::diff(&layer.a, target, &mut self.diff)?;

        let value = match self.config.loss {
            LossType::Mse => {
                MseLoss::derivative(&self.diff, &mut self.loss_grad)?;
                MseLoss::loss(&self.diff)
            }
            LossType::CrossEntropy => {
                CrossEntropyLoss::derivative(&layer.a, target, &mut self.loss_grad)?;
                CrossEntropyLoss::loss(&layer.a, target)?
            }
        };

        if self.config.loss == LossType::CrossEntropy
            && layer.activation == ActivationFunction::Softmax
        {
            layer.delta.copy_from(&self.diff)?;
        } else {
            layer.activation.backward(
                &layer.z,
                &layer.a,
                &self.loss_grad,
                &mut layer.dz,
                &mut layer.delta,
            )?;
        }

        self.state = NetworkState::LossComputed;
        Ok(value)
    }

    /// Walks the layers from the output down: computes each layer's weight
    /// and bias gradients from its error signal, then pushes the signal to
    /// the layer below through `Wᵀ` and that layer's activation derivative.
    pub fn backprop(&mut self) -> Result<()> {
        if self.state != NetworkState::LossComputed {
            return Err(NetError::OutOfOrder { op: "backprop", state: self.state });
        }

        for i in (0..self.layers.len()).rev() {
            let (lower, upper) = self.layers.split_at_mut(i);
            let layer = &mut upper[0];
            let input = if i == 0 { &self.input } else { &lower[i - 1].a };
            layer.compute_gradients(input, self.accumulate)?;

            if i > 0 {
                let prev = &mut lower[i - 1];
                let upstream = layer.weights.transpose().matmul(&layer.delta)?;
                prev.activation.backward(
                    &prev.z,
                    &prev.a,
                    &upstream,
                    &mut prev.dz,
                    &mut prev.delta,
                )?;
            }
        }

        self.state = NetworkState::BackpropComplete;
        Ok(())
    }

    /// Zeroes every gradient accumulator. Call at the start of each batch.
    pub fn reset_gradients(&mut self) {
        for layer in &mut self.layers {
            layer.reset_gradients();
        }
    }

    pub fn average_gradients(&mut self, batch_size: usize) -> Result<()> {
        for layer in &mut self.layers {
            layer.average_gradients(batch_size)?;
        }
        Ok(())
    }

    /// Per-layer clipping of the combined `dW`/`db` L2 norm to `max_norm`.
    /// Returns the largest norm seen before clipping.
    pub fn clip_gradients(&mut self, max_norm: f64) -> Result<f64> {
        if !(max_norm.is_finite() && max_norm > 0.0) {
            return Err(NetError::config(format!(
                "max gradient norm must be positive, got {max_norm}"
            )));
        }
        Ok(self.layers.iter_mut()
            .map(|layer| layer.clip_gradients(max_norm))
            .fold(0.0, f64::max))
    }

    /// Applies the configured optimizer to every layer using the
    /// accumulated gradients.
    pub fn update_weights(&mut self) -> Result<()> {
        match self.config.optimizer {
            Optimizer::Sgd => {
                let sgd = Sgd::new(self.config.learning_rate);
                for layer in &mut self.layers {
                    sgd.step(layer)?;
                }
            }
        }
        self.state = NetworkState::Updated;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Training entry points
    // ---------------------------------------------------------------------

    pub fn train_epoch(&mut self, dataset: &[Sample], batch_size: usize) -> Result<f64> {
        train::train_epoch(self, dataset, batch_size)
    }

    pub fn run_evaluation(&mut self, dataset: &[Sample]) -> Result<f64> {
        train::run_evaluation(self, dataset)
    }

    pub fn train_model(
        &mut self,
        train_set: &[Sample],
        eval_set: &[Sample],
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<EpochStats>> {
        train::train_model(self, train_set, eval_set, &TrainConfig::new(epochs, batch_size))
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn get_output_value(&self, row: usize, col: usize) -> Result<f64> {
        self.output().get(row, col)
    }

    pub fn output(&self) -> &Matrix {
        &self.layers[self.layers.len() - 1].a
    }

    pub fn output_activation(&self) -> ActivationFunction {
        self.layers[self.layers.len() - 1].activation
    }

    /// `[n0, n1, …, nL]`.
    pub fn layer_sizes(&self) -> Vec<usize> {
        std::iter::once(self.input.rows())
            .chain(self.layers.iter().map(|l| l.size()))
            .collect()
    }

    pub fn input_size(&self) -> usize {
        self.input.rows()
    }

    pub fn output_size(&self) -> usize {
        self.diff.rows()
    }

    /// Number of weighted layers `L`.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Result<&Layer> {
        self.layers.get(index).ok_or_else(|| {
            NetError::config(format!(
                "layer index {index} out of range for {} layers",
                self.layers.len()
            ))
        })
    }

    pub fn weights(&self, index: usize) -> Result<&Matrix> {
        Ok(self.layer(index)?.weights())
    }

    pub fn biases(&self, index: usize) -> Result<&Matrix> {
        Ok(self.layer(index)?.biases())
    }

    pub fn weight_gradients(&self, index: usize) -> Result<&Matrix> {
        Ok(self.layer(index)?.weight_gradients())
    }

    pub fn bias_gradients(&self, index: usize) -> Result<&Matrix> {
        Ok(self.layer(index)?.bias_gradients())
    }

    /// Overwrites layer `index`'s weights. Cached activations become stale.
    pub fn set_weights(&mut self, index: usize, weights: &Matrix) -> Result<()> {
        self.layer(index)?;
        self.layers[index].set_weights(weights)?;
        self.invalidate_cache();
        Ok(())
    }

    pub fn set_biases(&mut self, index: usize, biases: &Matrix) -> Result<()> {
        self.layer(index)?;
        self.layers[index].set_biases(biases)?;
        self.invalidate_cache();
        Ok(())
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter()
            .map(|l| l.weights().len() + l.biases().len())
            .sum()
    }

    fn invalidate_cache(&mut self) {
        if self.state.has_forward_cache() {
            self.state = NetworkState::Updated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn col(values: &[f64]) -> Matrix {
        Matrix::column(values).unwrap()
    }

    fn fixed_2_3_1() -> Network {
        let mut net = Network::new(&[2, 3, 1], &["ReLU", "linear"], &mut rng()).unwrap();
        let w1 = Matrix::from_rows(vec![
            vec![0.1, 0.2],
            vec![0.3, -0.4],
            vec![0.5, 0.6],
        ]).unwrap();
        net.set_weights(0, &w1).unwrap();
        net.set_biases(0, &col(&[0.1, 0.1, 0.1])).unwrap();
        net.set_weights(1, &Matrix::from_rows(vec![vec![1.0, 1.0, 1.0]]).unwrap()).unwrap();
        net.set_biases(1, &col(&[0.0])).unwrap();
        net
    }

    #[test]
    fn construction_allocates_every_buffer() {
        let net = Network::new(&[2, 4, 3], &["tanh", "softmax"], &mut rng()).unwrap();
        assert_eq!(net.num_layers(), 2);
        assert_eq!(net.layer_sizes(), vec![2, 4, 3]);
        assert_eq!(net.weights(0).unwrap().shape(), (4, 2));
        assert_eq!(net.weights(1).unwrap().shape(), (3, 4));
        assert_eq!(net.biases(1).unwrap().shape(), (3, 1));
        assert_eq!(net.parameter_count(), 4 * 2 + 4 + 3 * 4 + 3);
        assert_eq!(net.state(), NetworkState::Constructed);
        assert_eq!(net.config().loss, LossType::CrossEntropy);
    }

    #[test]
    fn construction_rejects_bad_topologies() {
        let err = |sizes: &[usize], acts: &[&str]| Network::new(sizes, acts, &mut rng()).unwrap_err();
        assert!(matches!(err(&[2], &[]), NetError::InvalidConfiguration(_)));
        assert!(matches!(err(&[2, 0, 1], &["ReLU", "linear"]), NetError::InvalidConfiguration(_)));
        assert!(matches!(err(&[2, 3, 1], &["ReLU"]), NetError::InvalidConfiguration(_)));
        assert!(matches!(err(&[2, 3, 1], &["ReLU", "mystery"]), NetError::InvalidConfiguration(_)));
    }

    #[test]
    fn same_seed_gives_same_network() {
        let mut a = Network::new(&[3, 5, 2], &["sigmoid", "linear"], &mut rng()).unwrap();
        let mut b = Network::new(&[3, 5, 2], &["sigmoid", "linear"], &mut rng()).unwrap();
        let x = col(&[0.1, -0.2, 0.3]);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn forward_with_fixed_weights_is_deterministic() {
        let mut net = fixed_2_3_1();
        net.forward(&col(&[1.0, 2.0])).unwrap();
        // z1 = [0.6, -0.4, 1.8] -> relu -> [0.6, 0, 1.8] -> sum
        assert!((net.get_output_value(0, 0).unwrap() - 2.4).abs() < 1e-12);
        assert_eq!(net.state(), NetworkState::ForwardComplete);
        assert!(matches!(net.get_output_value(1, 0), Err(NetError::IndexOutOfBounds { .. })));
    }

    #[test]
    fn forward_rejects_wrong_input_shape() {
        let mut net = fixed_2_3_1();
        assert!(matches!(
            net.forward(&col(&[1.0, 2.0, 3.0])),
            Err(NetError::DimensionMismatch { op: "forward", .. })
        ));
        assert!(matches!(
            net.forward(&Matrix::from_rows(vec![vec![1.0, 2.0]]).unwrap()),
            Err(NetError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn calculate_loss_checks_target_shape_and_order() {
        let mut net = fixed_2_3_1();
        assert!(matches!(
            net.calculate_loss(&col(&[1.0])),
            Err(NetError::OutOfOrder { op: "calculate_loss", .. })
        ));
        net.forward(&col(&[1.0, 2.0])).unwrap();
        assert!(matches!(
            net.calculate_loss(&col(&[1.0, 2.0])),
            Err(NetError::DimensionMismatch { .. })
        ));
        let loss = net.calculate_loss(&col(&[2.0])).unwrap();
        assert!((loss - 0.16).abs() < 1e-12);
        assert_eq!(net.state(), NetworkState::LossComputed);
    }

    #[test]
    fn backprop_requires_seeded_loss() {
        let mut net = fixed_2_3_1();
        net.forward(&col(&[1.0, 2.0])).unwrap();
        assert!(matches!(net.backprop(), Err(NetError::OutOfOrder { op: "backprop", .. })));
    }

    #[test]
    fn hand_computed_gradients() {
        let mut net = fixed_2_3_1();
        net.reset_gradients();
        net.forward(&col(&[1.0, 2.0])).unwrap();
        net.calculate_loss(&col(&[2.0])).unwrap();
        net.backprop().unwrap();

        // delta2 = 2·(2.4 - 2)/1 = 0.8
        let dw2 = net.weight_gradients(1).unwrap();
        let expected_dw2 = [0.8 * 0.6, 0.0, 0.8 * 1.8];
        for (g, e) in dw2.as_slice().iter().zip(expected_dw2) {
            assert!((g - e).abs() < 1e-12);
        }
        assert!((net.bias_gradients(1).unwrap().get(0, 0).unwrap() - 0.8).abs() < 1e-12);

        // delta1 = W2ᵀ·delta2 ⊙ relu'(z1) = [0.8, 0, 0.8]
        let dw1 = net.weight_gradients(0).unwrap();
        let expected_dw1 = [0.8, 1.6, 0.0, 0.0, 0.8, 1.6];
        for (g, e) in dw1.as_slice().iter().zip(expected_dw1) {
            assert!((g - e).abs() < 1e-12);
        }
        assert_eq!(net.state(), NetworkState::BackpropComplete);
    }

    #[test]
    fn accumulation_can_be_disabled() {
        let mut net = fixed_2_3_1();
        net.set_gradient_accumulation(false);
        net.reset_gradients();
        net.forward(&col(&[1.0, 2.0])).unwrap();
        net.calculate_loss(&col(&[2.0])).unwrap();
        net.backprop().unwrap();
        assert!(net.weight_gradients(1).unwrap().as_slice().iter().all(|&g| g == 0.0));
        assert!(net.layer(1).unwrap().sample_weight_gradients().sum() > 0.0);
    }

    #[test]
    fn update_moves_weights_against_gradient() {
        let mut net = fixed_2_3_1();
        net.configure("SGD", "MSE", 0.01).unwrap();
        net.reset_gradients();
        net.forward(&col(&[1.0, 2.0])).unwrap();
        let before = net.calculate_loss(&col(&[2.0])).unwrap();
        net.backprop().unwrap();
        net.update_weights().unwrap();
        assert_eq!(net.state(), NetworkState::Updated);
        assert!(matches!(net.calculate_loss(&col(&[2.0])), Err(NetError::OutOfOrder { .. })));

        net.forward(&col(&[1.0, 2.0])).unwrap();
        let after = net.calculate_loss(&col(&[2.0])).unwrap();
        assert!(after < before);
    }

    #[test]
    fn configure_validates_names_and_pairings() {
        let mut net = fixed_2_3_1();
        assert!(net.configure("SGD", "MSE", 0.05).is_ok());
        assert_eq!(net.state(), NetworkState::Configured);
        assert!(matches!(
            net.configure("SGD", "Cross_Entropy", 0.01),
            Err(NetError::InvalidConfiguration(_))
        ));
        assert_eq!(net.config().loss, LossType::Mse);
        assert!(matches!(net.configure("Adam", "MSE", 0.01), Err(NetError::InvalidConfiguration(_))));
        assert!(matches!(net.configure("SGD", "hinge", 0.01), Err(NetError::InvalidConfiguration(_))));
        assert!(matches!(net.configure("SGD", "MSE", 0.0), Err(NetError::InvalidConfiguration(_))));
        assert!(matches!(net.configure("SGD", "MSE", -1.0), Err(NetError::InvalidConfiguration(_))));

        let mut softmax = Network::new(&[2, 3], &["softmax"], &mut rng()).unwrap();
        assert!(matches!(softmax.configure("SGD", "MSE", 0.1), Err(NetError::InvalidConfiguration(_))));
        assert!(softmax.configure("SGD", "Cross_Entropy", 0.1).is_ok());
    }

    #[test]
    fn softmax_cross_entropy_seeds_diff() {
        let mut net = Network::new(&[2, 3], &["softmax"], &mut rng()).unwrap();
        net.forward(&col(&[0.5, -0.5])).unwrap();
        let target = col(&[0.0, 1.0, 0.0]);
        let loss = net.calculate_loss(&target).unwrap();
        let out = net.output().clone();
        assert!((out.sum() - 1.0).abs() < 1e-12);
        assert!((loss + (out.get(1, 0).unwrap() + 1e-9).ln()).abs() < 1e-12);

        let delta = net.layer(0).unwrap().delta();
        let expected = out.sub(&target).unwrap();
        assert_eq!(delta, &expected);
    }

    #[test]
    fn clip_rejects_non_positive_threshold() {
        let mut net = fixed_2_3_1();
        assert!(matches!(net.clip_gradients(0.0), Err(NetError::InvalidConfiguration(_))));
    }

    #[test]
    fn clip_bounds_every_layer() {
        let mut net = fixed_2_3_1();
        net.reset_gradients();
        net.forward(&col(&[1.0, 2.0])).unwrap();
        net.calculate_loss(&col(&[-10.0])).unwrap();
        net.backprop().unwrap();

        let largest = net.clip_gradients(0.5).unwrap();
        assert!(largest > 0.5);
        for layer in net.layers() {
            assert!(layer.gradient_norm() <= 0.5 + 1e-12);
        }
    }
}
