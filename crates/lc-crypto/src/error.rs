use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("invalid private key encoding")]
    InvalidPrivateKey,

    #[error("invalid signature encoding")]
    SignatureInvalid,

    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
}
