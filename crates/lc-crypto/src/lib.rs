pub mod error;

pub use error::CryptoError;

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, SecretKey};
use sha2::{Digest, Sha256};

/// A keypair as produced by [`keypair_gen`]: hex-encoded secret key and
/// compressed hex-encoded public key.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// SHA-256 of `bytes`, hex-encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

/// SHA-256 of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Generate a fresh secp256k1 keypair. The public key is returned in its
/// 33-byte compressed hex form.
pub fn keypair_gen() -> KeyPair {
    let mut rng = rand::thread_rng();
    let (secret_key, public_key) = secp256k1::generate_keypair(&mut rng);
    KeyPair {
        private_key: hex::encode(secret_key.secret_bytes()),
        public_key: hex::encode(public_key.serialize()),
    }
}

/// Derive the compressed hex public key matching a hex-encoded private key.
pub fn public_key_from_private(private_key_hex: &str) -> Result<String, CryptoError> {
    let secret_bytes = hex::decode(private_key_hex)?;
    let secret_key =
        SecretKey::from_slice(&secret_bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let public_key = PublicKey::from_secret_key(secp256k1::SECP256K1, &secret_key);
    Ok(hex::encode(public_key.serialize()))
}

/// Sign a 32-byte digest (hex-encoded) with a hex-encoded secp256k1 private
/// key, returning a DER-encoded hex signature.
pub fn sign(private_key_hex: &str, digest_hex: &str) -> Result<String, CryptoError> {
    let secret_bytes = hex::decode(private_key_hex)?;
    let secret_key =
        SecretKey::from_slice(&secret_bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let message = parse_digest(digest_hex)?;

    let signature = secp256k1::SECP256K1.sign_ecdsa(&message, &secret_key);
    Ok(hex::encode(signature.serialize_der()))
}

/// Verify a DER-encoded hex signature over a 32-byte digest (hex-encoded)
/// under a hex-encoded public key (66 or 130 hex chars). Any malformed input
/// or cryptographic failure simply yields `false` — callers never see a raw
/// library exception.
pub fn verify(public_key_hex: &str, digest_hex: &str, signature_der_hex: &str) -> bool {
    (|| -> Result<bool, CryptoError> {
        let public_key = parse_public_key(public_key_hex)?;
        let message = parse_digest(digest_hex)?;
        let sig_bytes = hex::decode(signature_der_hex)?;
        let signature =
            Signature::from_der(&sig_bytes).map_err(|_| CryptoError::SignatureInvalid)?;

        Ok(secp256k1::SECP256K1
            .verify_ecdsa(&message, &signature, &public_key)
            .is_ok())
    })()
    .unwrap_or(false)
}

/// Derive the canonical 30-hex-character address from a hex-encoded public
/// key: the lower 30 hex digits of `sha256(public_key_bytes)`.
pub fn derive_address(public_key_hex: &str) -> Result<String, CryptoError> {
    let public_key_bytes = hex::decode(public_key_hex)?;
    validate_public_key_length(&public_key_bytes)?;
    let digest_hex = hex::encode(sha256(&public_key_bytes));
    Ok(digest_hex[..30].to_string())
}

/// A public key is well-formed when it parses as a valid secp256k1 point and
/// is supplied in one of the two accepted hex lengths (66 compressed, 130
/// uncompressed).
pub fn is_valid_public_key(public_key_hex: &str) -> bool {
    parse_public_key(public_key_hex).is_ok()
}

/// Addresses accepted at the system boundary have 24–30 hex characters
/// (legacy tolerance); internal derivations always produce exactly 30.
pub fn is_valid_address_length(address: &str) -> bool {
    let len = address.len();
    (24..=30).contains(&len) && address.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_public_key(public_key_hex: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(public_key_hex)?;
    validate_public_key_length(&bytes)?;
    PublicKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

fn validate_public_key_length(bytes: &[u8]) -> Result<(), CryptoError> {
    match bytes.len() {
        33 | 65 => Ok(()),
        _ => Err(CryptoError::InvalidPublicKey),
    }
}

fn parse_digest(digest_hex: &str) -> Result<Message, CryptoError> {
    let bytes = hex::decode(digest_hex)?;
    Message::from_digest_slice(&bytes).map_err(|_| CryptoError::SignatureInvalid)
}
