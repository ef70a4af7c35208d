use async_trait::async_trait;
use lc_block::Block;
use lc_merkle::MerkleProof;
use lc_transaction::Transaction;

use crate::{
    error::StoreError,
    types::{AddressBalance, TokenRecord},
};

/// The authoritative on-disk view: blocks, transactions, native and token
/// balances, and Merkle commitment data. Every other component depends on
/// this trait, never on a concrete store — `lc-chain`, `lc-block`'s
/// save/load helpers, and `lc-transaction`'s `get_latest_for_address` query
/// all take `&dyn StateStore`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Create every logical table (and the balance view) if absent.
    async fn init(&self) -> Result<(), StoreError>;

    /// Number of blocks currently persisted.
    async fn block_count(&self) -> Result<u64, StoreError>;

    /// Persist a fully mined block: the block row, its transactions (with
    /// `block_hash`/`index_in_block` set), any token-creation rows, updated
    /// native/token balances, and Merkle nodes/proof paths. All-or-nothing.
    async fn save_block(&self, block: &Block) -> Result<(), StoreError>;

    /// Load every block in ascending index order, transactions ordered by
    /// `index_in_block`. Does not validate — callers validate on load.
    async fn load_chain(&self) -> Result<Vec<Block>, StoreError>;

    async fn load_block_by_index(&self, index: u64) -> Result<Option<Block>, StoreError>;
    async fn load_block_by_hash(&self, hash: &str) -> Result<Option<Block>, StoreError>;

    /// Idempotent upsert keyed on `hash`.
    async fn upsert_pending_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;
    async fn delete_pending_transaction(&self, hash: &str) -> Result<(), StoreError>;
    async fn load_pending_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    /// The most recent outgoing transaction from `address`; if there is
    /// none, the most recent incoming token-creation transaction.
    async fn get_latest_for_address(
        &self,
        address: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn get_balance_of_address(&self, address: &str) -> Result<AddressBalance, StoreError>;

    async fn token_by_symbol(&self, symbol: &str) -> Result<Option<TokenRecord>, StoreError>;
    async fn token_by_id(&self, token_id: i64) -> Result<Option<TokenRecord>, StoreError>;

    async fn get_proof_path(
        &self,
        block_hash: &str,
        transaction_hash: &str,
    ) -> Result<Option<MerkleProof>, StoreError>;

    /// Drop every derived table's contents, keeping the schema. Used by
    /// `replace_chain` before re-persisting the winning chain.
    async fn clear_all(&self) -> Result<(), StoreError>;
}
