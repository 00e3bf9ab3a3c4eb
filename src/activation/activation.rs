use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;

/// Closed set of activations a layer can use.
///
/// Parsed from `ReLU`, `sigmoid`, `tanh`, `softmax` and `linear`
/// (case-insensitive; `identity` is accepted for `linear`). Unknown names are
/// rejected when the network is built instead of falling back to a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActivationFunction {
    ReLU,
    Sigmoid,
    Tanh,
    /// Vector-valued: normalizes over the whole layer output, so it has no
    /// elementwise derivative. See `softmax_jacobian`.
    Softmax,
    Linear,
}

impl ActivationFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::ReLU => "ReLU",
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::Softmax => "softmax",
            ActivationFunction::Linear => "linear",
        }
    }

    pub fn is_elementwise(&self) -> bool {
        !matches!(self, ActivationFunction::Softmax)
    }

    /// Scalar activation for the elementwise variants. `Softmax` has no
    /// scalar form and maps to `None`.
    pub fn function(&self, x: f64) -> Option<f64> {
        match self {
            ActivationFunction::ReLU => Some(if x > 0.0 { x } else { 0.0 }),
            ActivationFunction::Sigmoid => Some(sigmoid(x)),
            ActivationFunction::Tanh => Some(x.tanh()),
            ActivationFunction::Linear => Some(x),
            ActivationFunction::Softmax => None,
        }
    }

    /// Scalar derivative, always evaluated at the pre-activation value `z`.
    pub fn derivative(&self, z: f64) -> Option<f64> {
        match self {
            ActivationFunction::ReLU => Some(if z > 0.0 { 1.0 } else { 0.0 }),
            ActivationFunction::Sigmoid => {
                let s = sigmoid(z);
                Some(s * (1.0 - s))
            }
            ActivationFunction::Tanh => {
                let t = z.tanh();
                Some(1.0 - t * t)
            }
            ActivationFunction::Linear => Some(1.0),
            ActivationFunction::Softmax => None,
        }
    }

    /// Writes `f(z)` into `out`. `out` may not alias `z`; use
    /// `apply_in_place` for that.
    pub fn activate(&self, z: &Matrix, out: &mut Matrix) -> Result<()> {
        out.copy_from(z)?;
        self.apply_in_place(out);
        Ok(())
    }

    pub fn apply_in_place(&self, m: &mut Matrix) {
        match self {
            ActivationFunction::ReLU => m.map_inplace(|x| x.max(0.0)),
            ActivationFunction::Sigmoid => m.map_inplace(sigmoid),
            ActivationFunction::Tanh => m.map_inplace(f64::tanh),
            ActivationFunction::Linear => {}
            ActivationFunction::Softmax => softmax_in_place(m),
        }
    }

    /// Writes `f'(z)` into `out`, evaluated from the pre-activation `z` for
    /// every variant.
    pub fn derivative_into(&self, z: &Matrix, out: &mut Matrix) -> Result<()> {
        out.copy_from(z)?;
        match self {
            ActivationFunction::ReLU => out.map_inplace(|x| if x > 0.0 { 1.0 } else { 0.0 }),
            ActivationFunction::Sigmoid => out.map_inplace(|x| {
                let s = sigmoid(x);
                s * (1.0 - s)
            }),
            ActivationFunction::Tanh => out.map_inplace(|x| {
                let t = x.tanh();
                1.0 - t * t
            }),
            ActivationFunction::Linear => out.reset_with_val(1.0),
            ActivationFunction::Softmax => {
                return Err(NetError::config(
                    "softmax has no elementwise derivative; use its Jacobian",
                ));
            }
        }
        Ok(())
    }

    /// Maps the gradient w.r.t. this layer's output (`upstream`) to the
    /// gradient w.r.t. its pre-activation, written into `out`.
    ///
    /// Elementwise variants fill `dz` with `f'(z)` and compute
    /// `upstream ⊙ dz`. Softmax contracts the full Jacobian of its output `a`
    /// with `upstream` and leaves `dz` untouched.
    pub fn backward(
        &self,
        z: &Matrix,
        a: &Matrix,
        upstream: &Matrix,
        dz: &mut Matrix,
        out: &mut Matrix,
    ) -> Result<()> {
        if self.is_elementwise() {
            self.derivative_into(z, dz)?;
            out.hadamard_into(upstream, dz)
        } else {
            let jacobian = softmax_jacobian(a)?;
            out.matmul_into(&jacobian, upstream)
        }
    }
}

impl FromStr for ActivationFunction {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relu" => Ok(ActivationFunction::ReLU),
            "sigmoid" => Ok(ActivationFunction::Sigmoid),
            "tanh" => Ok(ActivationFunction::Tanh),
            "softmax" => Ok(ActivationFunction::Softmax),
            "linear" | "identity" => Ok(ActivationFunction::Linear),
            _ => Err(NetError::config(format!("unknown activation function `{s}`"))),
        }
    }
}

impl TryFrom<String> for ActivationFunction {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ActivationFunction> for String {
    fn from(f: ActivationFunction) -> String {
        f.name().to_string()
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over every entry of `m`. The maximum is subtracted before
/// exponentiating so large logits cannot overflow.
fn softmax_in_place(m: &mut Matrix) {
    let max = m.max();
    m.map_inplace(|x| (x - max).exp());
    let sum = m.sum();
    // sum >= 1 because the max entry maps to exp(0)
    m.map_inplace(|x| x / sum);
}

/// Jacobian of softmax given its output `s` (n x 1):
/// `J[i][j] = s_i * (1 - s_i)` on the diagonal, `-s_i * s_j` elsewhere.
pub fn softmax_jacobian(s: &Matrix) -> Result<Matrix> {
    let n = s.len();
    let values = s.as_slice();
    let mut data = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let v = if i == j {
                values[i] * (1.0 - values[i])
            } else {
                -values[i] * values[j]
            };
            data.push(v);
        }
    }
    Matrix::from_vec(n, n, data)
}
