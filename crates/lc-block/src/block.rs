use serde::{Deserialize, Serialize};
use lc_merkle::MerkleTree;
use lc_transaction::Transaction;

use crate::error::BlockError;

/// Header plus ordered transactions, linked by `previous_hash`, sealed by
/// proof of work. Transaction order is part of consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// `None` for the genesis block. Legacy chains may also represent this
    /// as the literal string `"0"` on load; new genesis blocks always write
    /// `None`.
    pub previous_hash: Option<String>,
    pub timestamp: i64,
    pub difficulty: u32,
    pub nonce: u64,
    pub merkle_root: String,
    pub origin_transaction_hash: Option<String>,
    pub transactions: Vec<Transaction>,
    pub hash: String,
}

/// Treat a legacy `"0"` previous_hash as equivalent to absent, per the
/// accepted-on-load / write-one-form rule in the spec's open questions.
fn is_legacy_genesis_marker(previous_hash: &Option<String>) -> bool {
    matches!(previous_hash.as_deref(), None | Some("0"))
}

fn hash_inputs(
    previous_hash: &Option<String>,
    timestamp: i64,
    merkle_root: &str,
    nonce: u64,
    origin_transaction_hash: &Option<String>,
) -> String {
    let mut s = String::new();
    if !is_legacy_genesis_marker(previous_hash) {
        s.push_str(previous_hash.as_deref().unwrap_or(""));
    }
    s.push_str(&timestamp.to_string());
    s.push_str(merkle_root);
    s.push_str(&nonce.to_string());
    s.push_str(origin_transaction_hash.as_deref().unwrap_or(""));
    s
}

/// Derive a block's `origin_transaction_hash`: the last transaction's own
/// `origin_transaction_hash` if it has one, otherwise the second-to-last
/// transaction's; `None` if neither exists. This is a consensus rule, not
/// an oversight — the last transaction is typically the reward, which has
/// no `origin_transaction_hash` of its own.
pub fn derive_block_origin_transaction_hash(transactions: &[Transaction]) -> Option<String> {
    let last = transactions.last()?;
    if let Some(h) = &last.origin_transaction_hash {
        return Some(h.clone());
    }
    if transactions.len() >= 2 {
        return transactions[transactions.len() - 2]
            .origin_transaction_hash
            .clone();
    }
    None
}

/// `true` iff `hash` begins with `difficulty` hex '0' characters.
/// `difficulty = 0` always accepts, and the check never loops.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let zeros = "0".repeat(difficulty as usize);
    hash.starts_with(&zeros)
}

impl Block {
    /// Construct a new block. Computes the Merkle root, sets `nonce = 0`,
    /// derives `origin_transaction_hash`, and computes `hash` — the block
    /// is *not* mined yet; call [`Block::mine`] to seal it.
    pub fn new(
        index: u64,
        previous_hash: Option<String>,
        timestamp: i64,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Result<Self, BlockError> {
        if transactions.is_empty() {
            return Err(BlockError::NoTransactions);
        }

        let leaves: Vec<String> = transactions.iter().map(|tx| tx.hash.clone()).collect();
        let merkle_root = MerkleTree::build(&leaves).root();
        let origin_transaction_hash = derive_block_origin_transaction_hash(&transactions);
        let nonce = 0u64;

        let hash = lc_crypto::sha256_hex(
            hash_inputs(
                &previous_hash,
                timestamp,
                &merkle_root,
                nonce,
                &origin_transaction_hash,
            )
            .as_bytes(),
        );

        Ok(Self {
            index,
            previous_hash,
            timestamp,
            difficulty,
            nonce,
            merkle_root,
            origin_transaction_hash,
            transactions,
            hash,
        })
    }

    /// Recompute the block hash from its current fields (does not mutate).
    pub fn recompute_hash(&self) -> String {
        lc_crypto::sha256_hex(
            hash_inputs(
                &self.previous_hash,
                self.timestamp,
                &self.merkle_root,
                self.nonce,
                &self.origin_transaction_hash,
            )
            .as_bytes(),
        )
    }

    /// Increment `nonce` until `hash` satisfies `difficulty`. Single
    /// threaded, CPU-bound, runs to completion.
    pub fn mine(&mut self) {
        while !meets_difficulty(&self.hash, self.difficulty) {
            self.nonce += 1;
            self.hash = self.recompute_hash();
        }
    }

    /// Every transaction recomputes to its stored hash, and every
    /// non-reward transaction's signature verifies.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(|tx| {
            matches!(tx.compute_hash(), Ok(h) if h == tx.hash) && (tx.is_reward() || tx.is_valid())
        })
    }

    /// Full structural validation: Merkle root, hash, difficulty, and every
    /// transaction. `skip_hash_recompute` tolerates legacy genesis blocks
    /// (index 0) whose recorded hash predates a hashing detail change.
    pub fn validate(&self, skip_hash_recompute: bool) -> Result<(), BlockError> {
        let leaves: Vec<String> = self.transactions.iter().map(|tx| tx.hash.clone()).collect();
        let recomputed_root = MerkleTree::build(&leaves).root();
        if recomputed_root != self.merkle_root {
            return Err(BlockError::MerkleRootMismatch);
        }

        if !skip_hash_recompute && self.recompute_hash() != self.hash {
            return Err(BlockError::HashMismatch);
        }

        if !meets_difficulty(&self.hash, self.difficulty) {
            return Err(BlockError::DifficultyNotMet(self.difficulty));
        }

        if !self.has_valid_transactions() {
            return Err(BlockError::InvalidTransaction);
        }

        Ok(())
    }
}
