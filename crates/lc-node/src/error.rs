use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("chain error: {0}")]
    Chain(#[from] lc_chain::ChainError),

    #[error("store error: {0}")]
    Store(#[from] lc_store::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer {0} is not connected")]
    PeerNotConnected(String),
}
