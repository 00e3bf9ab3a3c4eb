use rand::Rng;
use tracing::trace;

use crate::{
    activation::activation::ActivationFunction,
    error::{NetError, Result},
    math::matrix::Matrix,
};

/// Scale of the constant bias initializer relative to the He std-dev.
const BIAS_SCALE: f64 = 0.1;

/// One dense layer and every buffer it needs for training.
///
/// All matrices are allocated in `Layer::new` and only ever overwritten in
/// place afterwards:
/// - `feed_from` writes `z` and `a`.
/// - the network writes `delta` (output layer from the loss, hidden layers
///   during backprop) and `dz` alongside it.
/// - `compute_gradients` overwrites `dw_tmp`/`db_tmp` and adds them into
///   `dw_acc`/`db_acc` when accumulation is on.
/// - `reset_gradients`, `average_gradients`, `clip_gradients` and
///   `apply_gradients` only touch the accumulators (and the parameters for
///   the last one).
#[derive(Debug, Clone)]
pub struct Layer {
    pub(crate) weights: Matrix,
    pub(crate) biases: Matrix,
    pub(crate) z: Matrix,  // pre-activation values (z = Wx + b)
    pub(crate) dz: Matrix,
    pub(crate) a: Matrix,
    pub(crate) delta: Matrix,
    dw_acc: Matrix,
    db_acc: Matrix,
    dw_tmp: Matrix,
    db_tmp: Matrix,
    pub(crate) activation: ActivationFunction,
}

impl Layer {
    /// `size` neurons fed by `input_size` inputs. Weights are He-uniform,
    /// biases the constant `0.1 * sqrt(2 / input_size)`.
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Result<Layer> {
        let weights = Matrix::he_uniform(size, input_size, rng)?;
        let mut biases = Matrix::zeros(size, 1)?;
        biases.reset_with_val(BIAS_SCALE * (2.0 / input_size as f64).sqrt());

        Ok(Layer {
            weights,
            biases,
            z: Matrix::zeros(size, 1)?,
            dz: Matrix::zeros(size, 1)?,
            a: Matrix::zeros(size, 1)?,
            delta: Matrix::zeros(size, 1)?,
            dw_acc: Matrix::zeros(size, input_size)?,
            db_acc: Matrix::zeros(size, 1)?,
            dw_tmp: Matrix::zeros(size, input_size)?,
            db_tmp: Matrix::zeros(size, 1)?,
            activation,
        })
    }

    pub fn size(&self) -> usize {
        self.weights.rows()
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn biases(&self) -> &Matrix {
        &self.biases
    }

    pub fn pre_activation(&self) -> &Matrix {
        &self.z
    }

    pub fn output(&self) -> &Matrix {
        &self.a
    }

    /// Error signal ∂L/∂z from the last loss / backprop step.
    pub fn delta(&self) -> &Matrix {
        &self.delta
    }

    /// Accumulated weight gradient.
    pub fn weight_gradients(&self) -> &Matrix {
        &self.dw_acc
    }

    pub fn bias_gradients(&self) -> &Matrix {
        &self.db_acc
    }

    /// Weight gradient of the most recent sample only.
    pub fn sample_weight_gradients(&self) -> &Matrix {
        &self.dw_tmp
    }

    pub fn sample_bias_gradients(&self) -> &Matrix {
        &self.db_tmp
    }

    pub fn set_weights(&mut self, weights: &Matrix) -> Result<()> {
        self.weights.copy_from(weights)
    }

    pub fn set_biases(&mut self, biases: &Matrix) -> Result<()> {
        self.biases.copy_from(biases)
    }

    /// Forward step: `z = W·input + b`, `a = f(z)`.
    pub(crate) fn feed_from(&mut self, input: &Matrix) -> Result<()> {
        self.z.matmul_into(&self.weights, input)?;
        self.z.add_assign(&self.biases)?;
        self.activation.activate(&self.z, &mut self.a)
    }

    /// Per-sample gradients from the current `delta`:
    /// `dW = delta · inputᵀ`, `db = delta`.
    pub(crate) fn compute_gradients(&mut self, input: &Matrix, accumulate: bool) -> Result<()> {
        self.dw_tmp.matmul_into(&self.delta, &input.transpose())?;
        self.db_tmp.copy_from(&self.delta)?;

        if accumulate {
            self.dw_acc.add_assign(&self.dw_tmp)?;
            self.db_acc.add_assign(&self.db_tmp)?;
        }
        Ok(())
    }

    pub fn reset_gradients(&mut self) {
        self.dw_acc.reset_with_val(0.0);
        self.db_acc.reset_with_val(0.0);
    }

    pub fn average_gradients(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(NetError::DivisionByZero("average_gradients"));
        }
        self.dw_acc.div_scalar(batch_size as f64)?;
        self.db_acc.div_scalar(batch_size as f64)
    }

    /// Combined L2 norm over `dW_acc` and `db_acc`.
    pub fn gradient_norm(&self) -> f64 {
        (self.dw_acc.sum_of_squares() + self.db_acc.sum_of_squares()).sqrt()
    }

    /// Rescales both accumulators by `max_norm / norm` when the combined norm
    /// exceeds `max_norm`. Returns the norm measured before clipping.
    pub fn clip_gradients(&mut self, max_norm: f64) -> f64 {
        let norm = self.gradient_norm();
        if norm > max_norm {
            let factor = max_norm / norm;
            trace!(norm, max_norm, factor, "clipping layer gradients");
            self.dw_acc.scale(factor);
            self.db_acc.scale(factor);
        }
        norm
    }

    /// `W -= lr·dW_acc`, `b -= lr·db_acc`.
    pub fn apply_gradients(&mut self, lr: f64) -> Result<()> {
        self.weights.scaled_add(-lr, &self.dw_acc)?;
        self.biases.scaled_add(-lr, &self.db_acc)
    }

    #[cfg(test)]
    pub(crate) fn set_accumulated_gradients(&mut self, dw: &Matrix, db: &Matrix) -> Result<()> {
        self.dw_acc.copy_from(dw)?;
        self.db_acc.copy_from(db)
    }
}
