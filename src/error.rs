use thiserror::Error;

use crate::network::state::NetworkState;

/// Every failure the crate can report. All of them are raised synchronously
/// at the point of violation; nothing is retried internally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    #[error("dimension mismatch in {op}: left operand is {left:?}, right operand is {right:?}")]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("index ({row}, {col}) is out of bounds for a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("`{op}` cannot run while the network is {state:?}")]
    OutOfOrder {
        op: &'static str,
        state: NetworkState,
    },
}

pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        NetError::InvalidConfiguration(msg.into())
    }
}
