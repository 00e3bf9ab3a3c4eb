pub mod sgd;

pub use sgd::Sgd;

use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{NetError, Result};

/// Optimizers a network can be configured with. Parsed from `"SGD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Optimizer {
    #[default]
    Sgd,
}

impl Optimizer {
    pub fn name(&self) -> &'static str {
        match self {
            Optimizer::Sgd => "SGD",
        }
    }
}

impl FromStr for Optimizer {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sgd" => Ok(Optimizer::Sgd),
            _ => Err(NetError::config(format!("unknown optimizer `{s}`"))),
        }
    }
}

impl TryFrom<String> for Optimizer {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Optimizer> for String {
    fn from(o: Optimizer) -> String {
        o.name().to_string()
    }
}

impl fmt::Display for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sgd_is_known() {
        assert_eq!("SGD".parse::<Optimizer>(), Ok(Optimizer::Sgd));
        assert!(matches!("Adam".parse::<Optimizer>(), Err(NetError::InvalidConfiguration(_))));
    }
}
