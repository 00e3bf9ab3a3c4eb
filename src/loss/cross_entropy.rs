use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;

/// Categorical cross-entropy loss, normally paired with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
pub const EPS: f64 = 1e-9;

impl CrossEntropyLoss {
    /// Computes the scalar cross-entropy loss:
    ///   L = -sum(expected[i] * ln(predicted[i] + eps))
    ///
    /// `predicted` — probabilities, shape (n_classes, 1)
    /// `expected`  — one-hot (or soft) target distribution, same shape
    pub fn loss(predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        check_shapes(predicted, expected)?;
        Ok(predicted.as_slice().iter().zip(expected.as_slice())
            .filter(|(_, e)| **e != 0.0)
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum())
    }

    /// Gradient w.r.t. the predictions themselves: -expected / (predicted + eps).
    ///
    /// Used when the output activation is not Softmax. With a Softmax output
    /// the network skips this and seeds the error with `predicted - expected`,
    /// which is the combined Softmax + cross-entropy gradient w.r.t. the logits.
    pub fn derivative(predicted: &Matrix, expected: &Matrix, out: &mut Matrix) -> Result<()> {
        check_shapes(predicted, expected)?;
        let grad = predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(p, e)| -e / (p + EPS))
            .collect();
        out.copy_from(&Matrix::from_vec(predicted.rows(), predicted.cols(), grad)?)
    }
}

fn check_shapes(predicted: &Matrix, expected: &Matrix) -> Result<()> {
    if predicted.shape() != expected.shape() {
        return Err(NetError::DimensionMismatch {
            op: "cross_entropy",
            left: predicted.shape(),
            right: expected.shape(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_loss_is_negative_log_of_true_class() {
        let p = Matrix::column(&[0.7, 0.2, 0.1]).unwrap();
        let y = Matrix::column(&[1.0, 0.0, 0.0]).unwrap();
        let loss = CrossEntropyLoss::loss(&p, &y).unwrap();
        assert!((loss - 0.3567).abs() < 1e-4);
        assert!((loss + 0.7_f64.ln()).abs() < 1e-8);
    }

    #[test]
    fn zero_probability_stays_finite() {
        let p = Matrix::column(&[0.0, 1.0]).unwrap();
        let y = Matrix::column(&[1.0, 0.0]).unwrap();
        let loss = CrossEntropyLoss::loss(&p, &y).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 20.0);
    }

    #[test]
    fn derivative_wrt_predictions() {
        let p = Matrix::column(&[0.5, 0.25]).unwrap();
        let y = Matrix::column(&[1.0, 0.0]).unwrap();
        let mut out = Matrix::zeros(2, 1).unwrap();
        CrossEntropyLoss::derivative(&p, &y, &mut out).unwrap();
        assert!((out.get(0, 0).unwrap() + 2.0).abs() < 1e-6);
        assert_eq!(out.get(1, 0).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_shapes_fail() {
        let p = Matrix::column(&[0.5, 0.5]).unwrap();
        let y = Matrix::column(&[1.0]).unwrap();
        assert!(matches!(CrossEntropyLoss::loss(&p, &y), Err(NetError::DimensionMismatch { .. })));
    }
}
