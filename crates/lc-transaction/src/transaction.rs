use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    amount::{canonicalize, validate_positive},
    error::TransactionError,
};

/// An immutable record of a value transfer (native or token) or a
/// token-creation/reward credit with no sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Absent marks a coinbase / reward / token-creation transaction.
    pub from_address: Option<String>,
    pub to_address: String,
    pub amount: Decimal,
    pub timestamp: i64,

    pub signature: Option<String>,
    pub public_key: Option<String>,

    /// Hash of the previous outgoing transaction from `from_address`.
    pub origin_transaction_hash: Option<String>,

    pub token_id: Option<i64>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_total_supply: Option<Decimal>,

    /// Set once mined; absent while pending.
    pub block_hash: Option<String>,
    pub index_in_block: Option<i64>,

    pub hash: String,
}

/// The ordered field set that is actually hashed. Signature and public key
/// are deliberately excluded — signing never changes the hash. Field order
/// here is the field order serialized into the canonical JSON, and is part
/// of consensus.
#[derive(Serialize)]
struct CanonicalFields<'a> {
    from_address: &'a Option<String>,
    to_address: &'a str,
    amount: String,
    token_id: &'a Option<i64>,
    token_name: &'a Option<String>,
    token_symbol: &'a Option<String>,
    token_total_supply: Option<String>,
    origin_transaction_hash: &'a Option<String>,
    timestamp: i64,
}

impl Transaction {
    /// Build a new unsigned, unmined transfer transaction. `amount` is
    /// rounded to the canonical 8-decimal scale before hashing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        from_address: Option<String>,
        to_address: String,
        amount: Decimal,
        timestamp: i64,
        origin_transaction_hash: Option<String>,
        token_id: Option<i64>,
        token_name: Option<String>,
        token_symbol: Option<String>,
        token_total_supply: Option<Decimal>,
    ) -> Self {
        let mut tx = Self {
            from_address,
            to_address,
            amount: canonicalize(amount),
            timestamp,
            signature: None,
            public_key: None,
            origin_transaction_hash,
            token_id,
            token_name,
            token_symbol,
            token_total_supply: token_total_supply.map(canonicalize),
            block_hash: None,
            index_in_block: None,
            hash: String::new(),
        };
        tx.hash = tx.compute_hash().expect("canonical fields always serialize");
        tx
    }

    /// Build a reward transaction (coinbase, mining reward, or
    /// token-creation credit): `from_address` absent, no signature.
    pub fn new_reward(
        to_address: String,
        amount: Decimal,
        timestamp: i64,
        token_id: Option<i64>,
        token_name: Option<String>,
        token_symbol: Option<String>,
        token_total_supply: Option<Decimal>,
    ) -> Self {
        Self::new(
            None,
            to_address,
            amount,
            timestamp,
            None,
            token_id,
            token_name,
            token_symbol,
            token_total_supply,
        )
    }

    /// True when all of the token-creation fields are set — used by both
    /// block-ordering (creations sort first) and chain validation (a
    /// transfer referencing `token_id` must find one of these earlier).
    pub fn is_token_creation(&self) -> bool {
        self.token_id.is_some()
            && self.token_name.is_some()
            && self.token_symbol.is_some()
            && self.token_total_supply.is_some()
    }

    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Recompute the canonical SHA-256 hash over the ordered field set.
    /// Signature and public key never contribute to it.
    pub fn compute_hash(&self) -> Result<String, TransactionError> {
        let fields = CanonicalFields {
            from_address: &self.from_address,
            to_address: &self.to_address,
            amount: canonicalize(self.amount).to_string(),
            token_id: &self.token_id,
            token_name: &self.token_name,
            token_symbol: &self.token_symbol,
            token_total_supply: self.token_total_supply.map(|d| canonicalize(d).to_string()),
            origin_transaction_hash: &self.origin_transaction_hash,
            timestamp: self.timestamp,
        };
        let bytes = serde_json::to_vec(&fields)?;
        Ok(lc_crypto::sha256_hex(&bytes))
    }

    /// Sign this transaction with a hex-encoded secp256k1 private key.
    /// Recomputes `hash` first (for consistency), then sets `public_key`
    /// and `signature`. The hash itself never changes as a result of
    /// signing.
    pub fn sign(&mut self, private_key_hex: &str) -> Result<(), TransactionError> {
        self.hash = self.compute_hash()?;
        let public_key = lc_crypto::public_key_from_private(private_key_hex)?;
        let signature = lc_crypto::sign(private_key_hex, &self.hash)?;
        self.public_key = Some(public_key);
        self.signature = Some(signature);
        Ok(())
    }

    /// A transaction is valid when it is a reward (no sender) or its
    /// signature verifies under a public key that derives `from_address`.
    pub fn is_valid(&self) -> bool {
        if self.is_reward() {
            return true;
        }

        let (Some(from_address), Some(public_key), Some(signature)) =
            (&self.from_address, &self.public_key, &self.signature)
        else {
            return false;
        };

        if !lc_crypto::is_valid_public_key(public_key) {
            return false;
        }

        match lc_crypto::derive_address(public_key) {
            Ok(derived) if &derived == from_address => {}
            _ => return false,
        }

        lc_crypto::verify(public_key, &self.hash, signature)
    }

    /// Positive-amount admission check; separate from `is_valid` since a
    /// zero/negative amount is an admission-time rejection, not a signature
    /// failure.
    pub fn has_valid_amount(&self) -> bool {
        validate_positive(self.amount).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn addr() -> String {
        "a".repeat(30)
    }

    #[test]
    fn hash_is_invariant_under_sign() {
        let kp = lc_crypto::keypair_gen();
        let from = lc_crypto::derive_address(&kp.public_key).unwrap();
        let mut tx = Transaction::new(
            Some(from),
            addr(),
            dec!(10),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        let hash_before = tx.hash.clone();
        tx.sign(&kp.private_key).unwrap();
        assert_eq!(tx.hash, hash_before);
    }

    #[test]
    fn reward_transaction_is_valid_without_signature() {
        let tx = Transaction::new_reward(addr(), dec!(100), 1000, None, None, None, None);
        assert!(tx.is_valid());
        assert!(tx.signature.is_none());
        assert!(tx.public_key.is_none());
    }

    #[test]
    fn signed_transaction_validates() {
        let kp = lc_crypto::keypair_gen();
        let from = lc_crypto::derive_address(&kp.public_key).unwrap();
        let mut tx = Transaction::new(
            Some(from),
            addr(),
            dec!(10),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        tx.sign(&kp.private_key).unwrap();
        assert!(tx.is_valid());
    }

    #[test]
    fn tampered_amount_invalidates_signature() {
        let kp = lc_crypto::keypair_gen();
        let from = lc_crypto::derive_address(&kp.public_key).unwrap();
        let mut tx = Transaction::new(
            Some(from),
            addr(),
            dec!(10),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        tx.sign(&kp.private_key).unwrap();
        tx.amount = dec!(999);
        tx.hash = tx.compute_hash().unwrap();
        // The signature was made over the old hash; it does not cover the
        // tampered amount's new hash.
        assert!(!tx.is_valid());
    }

    #[test]
    fn wrong_signer_address_is_rejected() {
        let kp = lc_crypto::keypair_gen();
        let mut tx = Transaction::new(
            Some(addr()),
            addr(),
            dec!(10),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        tx.sign(&kp.private_key).unwrap();
        assert!(!tx.is_valid());
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected_at_admission() {
        let tx_zero = Transaction::new(
            Some(addr()),
            addr(),
            dec!(0),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        assert!(!tx_zero.has_valid_amount());

        let tx_negative = Transaction::new(
            Some(addr()),
            addr(),
            dec!(-5),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        assert!(!tx_negative.has_valid_amount());
    }

    #[test]
    fn amount_formats_to_eight_decimals_in_hash_input() {
        let tx = Transaction::new(
            Some(addr()),
            addr(),
            dec!(10),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        let tx2 = Transaction::new(
            Some(addr()),
            addr(),
            dec!(10.00000000),
            1000,
            None,
            None,
            None,
            None,
            None,
        );
        assert_eq!(tx.hash, tx2.hash);
    }

    #[test]
    fn is_token_creation_requires_all_four_fields() {
        let mut tx = Transaction::new_reward(
            addr(),
            dec!(1000),
            1000,
            Some(1),
            Some("MyToken".into()),
            Some("MTK".into()),
            Some(dec!(1000)),
        );
        assert!(tx.is_token_creation());
        tx.token_symbol = None;
        assert!(!tx.is_token_creation());
    }
}
