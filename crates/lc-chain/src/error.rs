use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transaction rejected: {0}")]
    InvalidTransaction(String),

    #[error("block rejected: {0}")]
    InvalidBlock(String),

    #[error("chain is inconsistent: {0}")]
    ChainInconsistent(String),

    #[error("store error: {0}")]
    Store(#[from] lc_store::StoreError),

    #[error("block error: {0}")]
    Block(#[from] lc_block::BlockError),

    #[error("no peers connected and no genesis block present")]
    NoGenesisAndNoPeers,
}
