pub mod mse;
pub mod cross_entropy;
pub mod loss_type;

pub use mse::MseLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::LossType;

use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;

/// `out = predicted - expected`. Shared by both losses.
pub fn diff(predicted: &Matrix, expected: &Matrix, out: &mut Matrix) -> Result<()> {
    if predicted.shape() != expected.shape() {
        return Err(NetError::DimensionMismatch {
            op: "diff",
            left: predicted.shape(),
            right: expected.shape(),
        });
    }
    out.copy_from(predicted)?;
    out.sub_assign(expected)
}
