pub mod config;
pub mod network;
pub mod spec;
pub mod state;

pub use config::NetworkConfig;
pub use network::Network;
pub use spec::NetworkSpec;
pub use state::NetworkState;
