pub mod broadcaster;
pub mod chain;
pub mod config;
pub mod error;

pub use broadcaster::{NullBroadcaster, PeerBroadcaster};
pub use chain::Chain;
pub use config::ChainConfig;
pub use error::ChainError;
