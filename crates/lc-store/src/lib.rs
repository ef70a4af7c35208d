pub mod error;
pub mod sqlite_store;
pub mod state_store;
pub mod types;

pub use error::StoreError;
pub use sqlite_store::SqliteStore;
pub use state_store::StateStore;
pub use types::{AddressBalance, TokenBalanceRow, TokenRecord};

#[cfg(test)]
mod tests {
    use super::*;
    use lc_block::Block;
    use lc_transaction::Transaction;
    use rust_decimal_macros::dec;

    async fn open() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn reward(to: &str, amount: rust_decimal::Decimal, ts: i64) -> Transaction {
        Transaction::new_reward(to.to_string(), amount, ts, None, None, None, None)
    }

    #[tokio::test]
    async fn fresh_store_has_no_blocks() {
        let store = open().await;
        assert_eq!(store.block_count().await.unwrap(), 0);
        assert!(store.load_chain().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_and_reload_genesis_block() {
        let store = open().await;
        let mut genesis = Block::new(0, None, 1000, vec![reward(&"a".repeat(30), dec!(1000000), 1000)], 1)
            .unwrap();
        genesis.mine();
        store.save_block(&genesis).await.unwrap();

        assert_eq!(store.block_count().await.unwrap(), 1);
        let loaded = store.load_chain().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].hash, genesis.hash);
        assert_eq!(loaded[0].transactions.len(), 1);

        let balance = store.get_balance_of_address(&"a".repeat(30)).await.unwrap();
        assert_eq!(balance.native, dec!(1000000));
    }

    #[tokio::test]
    async fn token_creation_credits_token_balance() {
        let store = open().await;
        let creator = "c".repeat(30);
        let creation = Transaction::new_reward(
            creator.clone(),
            dec!(0),
            1000,
            Some(1),
            Some("Widget".into()),
            Some("WDG".into()),
            Some(dec!(5000)),
        );
        let mut block = Block::new(0, None, 1000, vec![creation], 1).unwrap();
        block.mine();
        store.save_block(&block).await.unwrap();

        let balance = store.get_balance_of_address(&creator).await.unwrap();
        assert_eq!(balance.tokens.len(), 1);
        assert_eq!(balance.tokens[0].symbol, "WDG");
        assert_eq!(balance.tokens[0].balance, dec!(5000));

        let token = store.token_by_symbol("WDG").await.unwrap().unwrap();
        assert_eq!(token.name, "Widget");
    }

    #[tokio::test]
    async fn pending_transaction_round_trips_and_deletes() {
        let store = open().await;
        let tx = reward(&"p".repeat(30), dec!(5), 2000);
        store.upsert_pending_transaction(&tx).await.unwrap();

        let pending = store.load_pending_transactions().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].hash, tx.hash);

        store.delete_pending_transaction(&tx.hash).await.unwrap();
        assert!(store.load_pending_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_proof_path_round_trips() {
        let store = open().await;
        let mut block = Block::new(
            0,
            None,
            1000,
            vec![
                reward(&"a".repeat(30), dec!(10), 1000),
                reward(&"b".repeat(30), dec!(20), 1001),
            ],
            1,
        )
        .unwrap();
        block.mine();
        store.save_block(&block).await.unwrap();

        let tx_hash = block.transactions[0].hash.clone();
        let proof = store
            .get_proof_path(&block.hash, &tx_hash)
            .await
            .unwrap()
            .expect("proof path was persisted at save time");
        assert!(proof.verify(&block.merkle_root));
    }

    #[tokio::test]
    async fn clear_all_empties_every_table() {
        let store = open().await;
        let mut block = Block::new(0, None, 1000, vec![reward(&"a".repeat(30), dec!(100), 1000)], 1)
            .unwrap();
        block.mine();
        store.save_block(&block).await.unwrap();

        store.clear_all().await.unwrap();
        assert_eq!(store.block_count().await.unwrap(), 0);
        let balance = store.get_balance_of_address(&"a".repeat(30)).await.unwrap();
        assert_eq!(balance.native, dec!(0));
    }
}
