use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{NetError, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;

/// Selects which loss function the network trains against.
///
/// - `Mse`          — Mean-squared error; pair with Linear, Sigmoid, Tanh or ReLU output.
/// - `CrossEntropy` — Categorical cross-entropy; the only loss allowed with a
///   Softmax output, where the error signal collapses to `predicted - expected`.
///
/// Parsed from `MSE` and `Cross_Entropy` (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LossType {
    Mse,
    CrossEntropy,
}

impl LossType {
    pub fn name(&self) -> &'static str {
        match self {
            LossType::Mse => "MSE",
            LossType::CrossEntropy => "Cross_Entropy",
        }
    }

    /// Scalar loss for one sample.
    pub fn loss(&self, predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        match self {
            LossType::Mse => MseLoss::loss_between(predicted, expected),
            LossType::CrossEntropy => CrossEntropyLoss::loss(predicted, expected),
        }
    }
}

impl FromStr for LossType {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mse" => Ok(LossType::Mse),
            "cross_entropy" | "cross-entropy" | "crossentropy" => Ok(LossType::CrossEntropy),
            _ => Err(NetError::config(format!("unknown loss function `{s}`"))),
        }
    }
}

impl TryFrom<String> for LossType {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<LossType> for String {
    fn from(l: LossType) -> String {
        l.name().to_string()
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("MSE".parse::<LossType>(), Ok(LossType::Mse));
        assert_eq!("Cross_Entropy".parse::<LossType>(), Ok(LossType::CrossEntropy));
        assert_eq!("cross-entropy".parse::<LossType>(), Ok(LossType::CrossEntropy));
        assert!(matches!("huber".parse::<LossType>(), Err(NetError::InvalidConfiguration(_))));
    }

    #[test]
    fn dispatches_to_loss() {
        let p = Matrix::column(&[0.7, 0.2, 0.1]).unwrap();
        let y = Matrix::column(&[1.0, 0.0, 0.0]).unwrap();
        let ce = LossType::CrossEntropy.loss(&p, &y).unwrap();
        assert!((ce - 0.3567).abs() < 1e-4);
        let mse = LossType::Mse.loss(&p, &y).unwrap();
        assert!((mse - (0.09 + 0.04 + 0.01) / 3.0).abs() < 1e-12);
    }
}
