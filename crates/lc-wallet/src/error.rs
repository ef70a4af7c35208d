use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet file not found for address {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed wallet file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] lc_crypto::CryptoError),
}
