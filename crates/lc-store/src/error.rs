use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to decode stored decimal {0:?}: {1}")]
    DecimalDecode(String, rust_decimal::Error),

    #[error("failed to (de)serialize stored json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("merkle error: {0}")]
    Merkle(#[from] lc_merkle::MerkleError),

    #[error("block error: {0}")]
    Block(#[from] lc_block::BlockError),

    #[error("row for block {0} is missing a required column")]
    MalformedRow(String),
}
