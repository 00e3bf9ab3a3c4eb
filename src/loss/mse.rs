use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE from a precomputed `diff = predicted - expected`:
    /// mean(diff²)
    pub fn loss(diff: &Matrix) -> f64 {
        diff.sum_of_squares() / diff.len() as f64
    }

    /// Per-output gradient: 2·diff / N
    pub fn derivative(diff: &Matrix, out: &mut Matrix) -> Result<()> {
        let n = diff.len() as f64;
        out.copy_from(diff)?;
        out.scale(2.0 / n);
        Ok(())
    }

    /// MSE straight from predictions and targets.
    pub fn loss_between(predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        if predicted.shape() != expected.shape() {
            return Err(NetError::DimensionMismatch {
                op: "mse",
                left: predicted.shape(),
                right: expected.shape(),
            });
        }
        let n = predicted.len() as f64;
        Ok(predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>() / n)
    }
}
