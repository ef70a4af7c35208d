use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use lc_block::{derive_block_origin_transaction_hash, meets_difficulty, Block};
use lc_store::{AddressBalance, StateStore};
use lc_transaction::Transaction;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{broadcaster::PeerBroadcaster, config::ChainConfig, error::ChainError};

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_millis() as i64
}

/// Stable-sort a freshly assembled block's transactions so that
/// token-creation transactions precede regular ones, guaranteeing a token
/// row exists before any transfer referencing it within the same block.
/// Only ever applied to transactions *this* node is selecting from its own
/// mempool, never to an already-mined block's transactions — doing so would
/// desynchronize the reordered list from the block's own `merkle_root`.
fn reorder_token_creations_first(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|tx| !tx.is_token_creation());
}

struct ChainState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    pending_hashes: HashSet<String>,
}

/// Singleton-per-process chain state: the in-memory block list, mempool, and
/// the rules that admit transactions, mine blocks, and accept or replace
/// incoming chains. Everything it persists goes through [`StateStore`];
/// everything it broadcasts goes through [`PeerBroadcaster`].
pub struct Chain {
    store: Arc<dyn StateStore>,
    broadcaster: Arc<dyn PeerBroadcaster>,
    config: ChainConfig,
    state: RwLock<ChainState>,
    /// Serializes the interval-driven and pending-count-driven miners.
    mining_lock: Mutex<()>,
    /// Re-entrancy guard for `replace_chain`; a concurrent replace is a no-op.
    replacing_chain: AtomicBool,
}

impl Chain {
    /// Bring up the chain: mint genesis if the store is empty and no peers
    /// are connected, wait (return an empty chain) if the store is empty and
    /// peers are connected, or load and validate everything already
    /// persisted.
    pub async fn bootstrap(
        store: Arc<dyn StateStore>,
        broadcaster: Arc<dyn PeerBroadcaster>,
        config: ChainConfig,
        peers_connected: bool,
    ) -> Result<Self, ChainError> {
        let block_count = store.block_count().await?;

        let chain = if block_count == 0 && !peers_connected {
            info!(genesis_address = %config.genesis_address, "minting genesis block");
            let reward = Transaction::new_reward(
                config.genesis_address.clone(),
                config.genesis_initial_supply,
                now_millis(),
                None,
                None,
                None,
                None,
            );
            let mut genesis = Block::new(0, None, now_millis(), vec![reward], config.difficulty)?;
            genesis.mine();
            store.save_block(&genesis).await?;
            info!(hash = %genesis.hash, "genesis block mined and persisted");
            vec![genesis]
        } else if block_count == 0 && peers_connected {
            info!("no local blocks and peers are connected; waiting for a full chain");
            Vec::new()
        } else {
            let loaded = store.load_chain().await?;
            if !Self::is_valid_chain(&loaded) {
                return Err(ChainError::ChainInconsistent(
                    "persisted chain failed validation on load".to_string(),
                ));
            }
            loaded
        };

        let pending = store.load_pending_transactions().await?;
        let pending_hashes = pending.iter().map(|t| t.hash.clone()).collect();

        Ok(Self {
            store,
            broadcaster,
            config,
            state: RwLock::new(ChainState {
                chain,
                pending,
                pending_hashes,
            }),
            mining_lock: Mutex::new(()),
            replacing_chain: AtomicBool::new(false),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.chain.len()
    }

    pub async fn tip_hash(&self) -> Option<String> {
        self.state.read().await.chain.last().map(|b| b.hash.clone())
    }

    pub async fn snapshot(&self) -> Vec<Block> {
        self.state.read().await.chain.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Validate and admit a transaction into the mempool. No-op if its hash
    /// is already pending.
    pub async fn add_pending_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        if !tx.has_valid_amount() {
            return Err(ChainError::InvalidTransaction(
                "amount must be a positive decimal".to_string(),
            ));
        }
        if !tx.is_valid() {
            return Err(ChainError::InvalidTransaction(
                "signature does not validate".to_string(),
            ));
        }
        if let Some(from) = &tx.from_address {
            if !lc_crypto::is_valid_address_length(from) {
                return Err(ChainError::InvalidTransaction(
                    "from_address is not 24-30 hex characters".to_string(),
                ));
            }
        }
        if !lc_crypto::is_valid_address_length(&tx.to_address) {
            return Err(ChainError::InvalidTransaction(
                "to_address is not 24-30 hex characters".to_string(),
            ));
        }
        if tx.is_token_creation() {
            let symbol = tx
                .token_symbol
                .as_deref()
                .expect("is_token_creation guarantees token_symbol");
            if self.store.token_by_symbol(symbol).await?.is_some() {
                return Err(ChainError::InvalidTransaction(format!(
                    "token symbol {symbol} already exists"
                )));
            }
        } else if let Some(token_id) = tx.token_id {
            if self.store.token_by_id(token_id).await?.is_none() {
                let state = self.state.read().await;
                let pending_creation = state
                    .pending
                    .iter()
                    .any(|p| p.is_token_creation() && p.token_id == Some(token_id));
                drop(state);
                if !pending_creation {
                    return Err(ChainError::InvalidTransaction(format!(
                        "token_id {token_id} does not refer to an existing token"
                    )));
                }
            }
        }

        let mut state = self.state.write().await;
        if state.pending_hashes.contains(&tx.hash) {
            debug!(hash = %tx.hash, "duplicate pending transaction ignored");
            return Ok(());
        }
        if tx.is_token_creation()
            && state
                .pending
                .iter()
                .any(|p| p.is_token_creation() && p.token_symbol == tx.token_symbol)
        {
            return Err(ChainError::InvalidTransaction(format!(
                "token symbol {} already pending",
                tx.token_symbol.as_deref().unwrap_or_default()
            )));
        }

        self.store.upsert_pending_transaction(&tx).await?;
        state.pending_hashes.insert(tx.hash.clone());
        state.pending.push(tx.clone());
        drop(state);

        self.broadcaster.broadcast_new_transaction(&tx).await;
        Ok(())
    }

    /// Assemble, mine, persist, and broadcast a block from the current
    /// mempool. Returns `None` if there is nothing pending. Guarded by
    /// `mining_lock` so the interval timer and the pending-count timer never
    /// run concurrently.
    pub async fn mine_pending_transactions(&self) -> Result<Option<Block>, ChainError> {
        let _mining_guard = self.mining_lock.lock().await;
        let mut state = self.state.write().await;

        if state.pending.is_empty() {
            return Ok(None);
        }

        let previous = state
            .chain
            .last()
            .cloned()
            .ok_or_else(|| ChainError::ChainInconsistent("chain has no blocks".to_string()))?;

        let recomputed_origin = derive_block_origin_transaction_hash(&previous.transactions);
        if recomputed_origin != previous.origin_transaction_hash {
            return Err(ChainError::ChainInconsistent(
                "tip block's origin_transaction_hash does not match its own transaction set"
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for tx in state.pending.iter() {
            if self.hash_already_in_chain(&state.chain, &tx.hash) {
                continue;
            }
            if !seen.insert(tx.hash.clone()) {
                continue;
            }
            selected.push(tx.clone());
        }
        reorder_token_creations_first(&mut selected);

        let reward = Transaction::new_reward(
            self.config.miner_address.clone(),
            self.config.mining_reward,
            now_millis(),
            None,
            None,
            None,
            None,
        );
        selected.push(reward);

        let mut block = Block::new(
            state.chain.len() as u64,
            Some(previous.hash.clone()),
            now_millis(),
            selected.clone(),
            self.config.difficulty,
        )?;
        block.mine();

        self.store.save_block(&block).await?;

        for tx in &selected {
            if tx.is_reward() {
                continue;
            }
            self.store.delete_pending_transaction(&tx.hash).await?;
            state.pending_hashes.remove(&tx.hash);
        }
        let mined_hashes: HashSet<&str> = selected.iter().map(|t| t.hash.as_str()).collect();
        state.pending.retain(|tx| !mined_hashes.contains(tx.hash.as_str()));
        state.chain.push(block.clone());

        info!(hash = %block.hash, index = block.index, transactions = block.transactions.len(), "mined block");
        drop(state);

        self.broadcaster.broadcast_new_block(&block).await;
        Ok(Some(block))
    }

    fn hash_already_in_chain(&self, chain: &[Block], hash: &str) -> bool {
        chain
            .iter()
            .any(|b| b.transactions.iter().any(|t| t.hash == hash))
    }

    /// Accept an already-mined block received from a peer.
    pub async fn add_block(&self, incoming: Block) -> Result<(), ChainError> {
        let mut state = self.state.write().await;

        let tip_hash = state.chain.last().map(|b| b.hash.clone());
        if incoming.previous_hash != tip_hash {
            return Err(ChainError::InvalidBlock(
                "previous_hash does not match current tip".to_string(),
            ));
        }
        if !incoming.has_valid_transactions() {
            return Err(ChainError::InvalidBlock(
                "block contains an invalid transaction".to_string(),
            ));
        }
        if incoming.recompute_hash() != incoming.hash {
            return Err(ChainError::InvalidBlock("hash does not recompute".to_string()));
        }
        if !meets_difficulty(&incoming.hash, incoming.difficulty) {
            return Err(ChainError::InvalidBlock(
                "hash does not satisfy difficulty".to_string(),
            ));
        }

        self.store.save_block(&incoming).await?;

        for tx in &incoming.transactions {
            self.store.delete_pending_transaction(&tx.hash).await.ok();
            state.pending_hashes.remove(&tx.hash);
        }
        let mined_hashes: HashSet<&str> =
            incoming.transactions.iter().map(|t| t.hash.as_str()).collect();
        state.pending.retain(|tx| !mined_hashes.contains(tx.hash.as_str()));
        state.chain.push(incoming.clone());
        drop(state);

        self.broadcaster.broadcast_new_block(&incoming).await;
        Ok(())
    }

    /// Chain-replacement protocol: accept `candidate` only if it is longer,
    /// structurally valid, and has strictly greater cumulative difficulty.
    /// A concurrent call while a replace is already in progress is a no-op.
    pub async fn replace_chain(&self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        if self
            .replacing_chain
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("replace_chain already in progress; ignoring concurrent request");
            return Ok(false);
        }
        let result = self.replace_chain_inner(candidate).await;
        self.replacing_chain.store(false, Ordering::SeqCst);
        result
    }

    async fn replace_chain_inner(&self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        let mut state = self.state.write().await;

        if candidate.len() <= state.chain.len() {
            return Ok(false);
        }
        if !Self::is_valid_chain(&candidate) {
            warn!("rejected candidate chain: failed structural validation");
            return Ok(false);
        }

        let local_work: u32 = state.chain.iter().map(|b| b.difficulty).sum();
        let candidate_work: u32 = candidate.iter().map(|b| b.difficulty).sum();
        if candidate_work <= local_work {
            return Ok(false);
        }

        self.store.clear_all().await?;
        for block in &candidate {
            self.store.save_block(block).await?;
        }

        state.chain = candidate;
        state.pending.clear();
        state.pending_hashes.clear();

        info!(new_length = state.chain.len(), "chain replaced by a longer candidate");
        Ok(true)
    }

    /// Static structural validation of a candidate chain, independent of any
    /// running [`Chain`] instance.
    pub fn is_valid_chain(data: &[Block]) -> bool {
        let Some(first) = data.first() else {
            return false;
        };
        if first.index != 0 {
            return false;
        }
        if !matches!(first.previous_hash.as_deref(), None | Some("0")) {
            return false;
        }
        if first.validate(true).is_err() {
            return false;
        }

        for window in data.windows(2) {
            let prior = &window[0];
            let next = &window[1];
            if next.previous_hash.as_deref() != Some(prior.hash.as_str()) {
                return false;
            }
            if next.validate(false).is_err() {
                return false;
            }
        }

        true
    }

    pub async fn get_balance_of_address(&self, address: &str) -> Result<AddressBalance, ChainError> {
        Ok(self.store.get_balance_of_address(address).await?)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::NullBroadcaster;
    use lc_store::SqliteStore;
    use rust_decimal_macros::dec;

    async fn test_chain(genesis_addr: &str, miner_addr: &str) -> Chain {
        let store: Arc<dyn StateStore> =
            Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let broadcaster: Arc<dyn PeerBroadcaster> = Arc::new(NullBroadcaster);
        let config = ChainConfig {
            difficulty: 1,
            genesis_address: genesis_addr.to_string(),
            miner_address: miner_addr.to_string(),
            ..ChainConfig::default()
        };
        Chain::bootstrap(store, broadcaster, config, false).await.unwrap()
    }

    #[tokio::test]
    async fn bootstrap_without_peers_mints_genesis() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;
        assert_eq!(chain.len().await, 1);
        let balance = chain.get_balance_of_address(&"g".repeat(30)).await.unwrap();
        assert_eq!(balance.native, dec!(1_000_000));
    }

    #[tokio::test]
    async fn bootstrap_with_peers_and_no_blocks_waits() {
        let store: Arc<dyn StateStore> =
            Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let broadcaster: Arc<dyn PeerBroadcaster> = Arc::new(NullBroadcaster);
        let chain = Chain::bootstrap(store, broadcaster, ChainConfig::default(), true)
            .await
            .unwrap();
        assert_eq!(chain.len().await, 0);
    }

    #[tokio::test]
    async fn mine_pending_transactions_mints_a_block_with_reward() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;

        let kp = lc_crypto::keypair_gen();
        let from = lc_crypto::derive_address(&kp.public_key).unwrap();
        let mut tx =
            Transaction::new(Some(from), "1".repeat(30), dec!(1), now_millis(), None, None, None, None, None);
        tx.sign(&kp.private_key).unwrap();

        // Can't actually fund `from` without a prior block, so this exercises
        // admission/mining mechanics, not balance sufficiency (the spec
        // leaves insufficient-funds checking to the caller, §7).
        chain.add_pending_transaction(tx.clone()).await.unwrap();
        assert_eq!(chain.pending_count().await, 1);

        let mined = chain.mine_pending_transactions().await.unwrap().unwrap();
        assert_eq!(mined.index, 1);
        assert_eq!(mined.transactions.len(), 2);
        assert_eq!(chain.pending_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_pending_transaction_is_a_no_op() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;
        let tx = Transaction::new_reward("1".repeat(30), dec!(1), now_millis(), None, None, None, None);
        chain.add_pending_transaction(tx.clone()).await.unwrap();
        chain.add_pending_transaction(tx).await.unwrap();
        assert_eq!(chain.pending_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_token_symbol_is_rejected_at_admission() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;
        let first = Transaction::new_reward(
            "1".repeat(30),
            dec!(1000),
            now_millis(),
            Some(1),
            Some("MyToken".to_string()),
            Some("MTK".to_string()),
            Some(dec!(1000)),
        );
        chain.add_pending_transaction(first).await.unwrap();

        let second = Transaction::new_reward(
            "2".repeat(30),
            dec!(500),
            now_millis(),
            Some(2),
            Some("Other".to_string()),
            Some("MTK".to_string()),
            Some(dec!(500)),
        );
        assert!(chain.add_pending_transaction(second).await.is_err());
        assert_eq!(chain.pending_count().await, 1);
    }

    #[tokio::test]
    async fn transfer_referencing_unknown_token_id_is_rejected() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;
        let kp = lc_crypto::keypair_gen();
        let from = lc_crypto::derive_address(&kp.public_key).unwrap();
        let mut tx = Transaction::new(
            Some(from),
            "1".repeat(30),
            dec!(10),
            now_millis(),
            None,
            Some(99),
            None,
            None,
            None,
        );
        tx.sign(&kp.private_key).unwrap();
        assert!(chain.add_pending_transaction(tx).await.is_err());
        assert_eq!(chain.pending_count().await, 0);
    }

    #[tokio::test]
    async fn creation_and_transfer_pending_together_mine_with_creation_first() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;

        let creation = Transaction::new_reward(
            "1".repeat(30),
            dec!(0),
            now_millis(),
            Some(1),
            Some("Widget".to_string()),
            Some("WDG".to_string()),
            Some(dec!(1000)),
        );
        chain.add_pending_transaction(creation.clone()).await.unwrap();

        let kp = lc_crypto::keypair_gen();
        let creator = lc_crypto::derive_address(&kp.public_key).unwrap();
        let mut transfer = Transaction::new(
            Some(creator),
            "2".repeat(30),
            dec!(250),
            now_millis(),
            None,
            Some(1),
            None,
            None,
            None,
        );
        transfer.sign(&kp.private_key).unwrap();
        chain.add_pending_transaction(transfer.clone()).await.unwrap();

        let mined = chain.mine_pending_transactions().await.unwrap().unwrap();
        assert_eq!(mined.transactions[0].hash, creation.hash);
        assert_eq!(mined.transactions[1].hash, transfer.hash);
    }

    #[tokio::test]
    async fn add_block_rejects_wrong_previous_hash() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;
        let reward = Transaction::new_reward("1".repeat(30), dec!(1), now_millis(), None, None, None, None);
        let mut bogus = Block::new(1, Some("not-the-tip".to_string()), now_millis(), vec![reward], 1).unwrap();
        bogus.mine();
        assert!(chain.add_block(bogus).await.is_err());
    }

    #[tokio::test]
    async fn replace_chain_rejects_shorter_or_equal_candidates() {
        let chain = test_chain(&"g".repeat(30), &"m".repeat(30)).await;
        let candidate = chain.snapshot().await;
        assert!(!chain.replace_chain(candidate).await.unwrap());
    }

    #[tokio::test]
    async fn is_valid_chain_rejects_broken_previous_hash_link() {
        let r1 = Transaction::new_reward("a".repeat(30), dec!(1_000_000), 1, None, None, None, None);
        let mut genesis = Block::new(0, None, 1, vec![r1], 1).unwrap();
        genesis.mine();

        let r2 = Transaction::new_reward("b".repeat(30), dec!(100), 2, None, None, None, None);
        let mut second = Block::new(1, Some("wrong".to_string()), 2, vec![r2], 1).unwrap();
        second.mine();

        assert!(!Chain::is_valid_chain(&[genesis, second]));
    }
}
