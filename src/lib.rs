pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod network;
pub mod train;

// Convenience re-exports
pub use error::{NetError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use loss::loss_type::LossType;
pub use network::{Network, NetworkConfig, NetworkSpec, NetworkState};
pub use optim::{Optimizer, Sgd};
pub use train::{EpochStats, Sample, TrainConfig};
