use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("amount must be a positive decimal with at most 8 fractional digits")]
    InvalidAmount,

    #[error("from_address has an invalid length (must be 24-30 hex chars)")]
    InvalidFromAddress,

    #[error("to_address has an invalid length (must be 24-30 hex chars)")]
    InvalidToAddress,

    #[error("public key is malformed")]
    InvalidPublicKey,

    #[error("transaction is not a reward but has no private key to sign with")]
    MissingSigningKey,

    #[error("signature is invalid")]
    SignatureInvalid,

    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] lc_crypto::CryptoError),
}
