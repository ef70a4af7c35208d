use std::str::FromStr;

use async_trait::async_trait;
use lc_block::Block;
use lc_merkle::{MerkleProof, MerkleTree};
use lc_transaction::Transaction;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool, Transaction as SqlTx};
use tracing::debug;

use crate::{
    error::StoreError,
    state_store::StateStore,
    types::{AddressBalance, TokenBalanceRow, TokenRecord},
};

/// `sqlx`-backed implementation of [`StateStore`] against a SQLite database.
/// Amounts are stored as their canonical 8-decimal string form rather than a
/// native numeric column, since SQLite has no fixed-point decimal type.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn parse_decimal(raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::DecimalDecode(raw.to_string(), e))
}

impl SqliteStore {
    /// Connect to (and if needed create) the sqlite database at `database_url`,
    /// e.g. `sqlite://ledger.db?mode=rwc`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn native_balance(
        tx: &mut SqlTx<'_, Sqlite>,
        address: &str,
    ) -> Result<Decimal, StoreError> {
        let row = sqlx::query("SELECT balance FROM address_balances WHERE address = ?1")
            .bind(address)
            .fetch_optional(&mut **tx)
            .await?;
        match row {
            Some(row) => parse_decimal(row.try_get::<String, _>("balance")?.as_str()),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn set_native_balance(
        tx: &mut SqlTx<'_, Sqlite>,
        address: &str,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO address_balances (address, balance) VALUES (?1, ?2)
             ON CONFLICT(address) DO UPDATE SET balance = excluded.balance",
        )
        .bind(address)
        .bind(balance.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn token_balance(
        tx: &mut SqlTx<'_, Sqlite>,
        address: &str,
        token_id: i64,
    ) -> Result<Decimal, StoreError> {
        let row = sqlx::query(
            "SELECT balance FROM token_balances WHERE address = ?1 AND token_id = ?2",
        )
        .bind(address)
        .bind(token_id)
        .fetch_optional(&mut **tx)
        .await?;
        match row {
            Some(row) => parse_decimal(row.try_get::<String, _>("balance")?.as_str()),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn set_token_balance(
        tx: &mut SqlTx<'_, Sqlite>,
        address: &str,
        token_id: i64,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO token_balances (address, token_id, balance) VALUES (?1, ?2, ?3)
             ON CONFLICT(address, token_id) DO UPDATE SET balance = excluded.balance",
        )
        .bind(address)
        .bind(token_id)
        .bind(balance.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction, StoreError> {
        let amount: String = row.try_get("amount")?;
        let token_total_supply: Option<String> = row.try_get("token_total_supply")?;
        Ok(Transaction {
            from_address: row.try_get("from_address")?,
            to_address: row.try_get("to_address")?,
            amount: parse_decimal(&amount)?,
            timestamp: row.try_get("timestamp")?,
            signature: row.try_get("signature")?,
            public_key: row.try_get("public_key")?,
            origin_transaction_hash: row.try_get("origin_transaction_hash")?,
            token_id: row.try_get("token_id")?,
            token_name: row.try_get("token_name")?,
            token_symbol: row.try_get("token_symbol")?,
            token_total_supply: token_total_supply.map(|s| parse_decimal(&s)).transpose()?,
            block_hash: row.try_get("block_hash")?,
            index_in_block: row.try_get("index_in_block")?,
            hash: row.try_get("hash")?,
        })
    }

    async fn transactions_for_block(
        &self,
        block_hash: &str,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE block_hash = ?1 ORDER BY index_in_block ASC",
        )
        .bind(block_hash)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_block_header(row: &sqlx::sqlite::SqliteRow) -> Result<Block, StoreError> {
        Ok(Block {
            index: row.try_get::<i64, _>("block_index")? as u64,
            previous_hash: row.try_get("previous_hash")?,
            timestamp: row.try_get("timestamp")?,
            difficulty: row.try_get::<i64, _>("difficulty")? as u32,
            nonce: row.try_get::<i64, _>("nonce")? as u64,
            merkle_root: row.try_get("merkle_root")?,
            origin_transaction_hash: row.try_get("origin_transaction_hash")?,
            transactions: Vec::new(),
            hash: row.try_get("hash")?,
        })
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                hash TEXT PRIMARY KEY,
                block_index INTEGER NOT NULL UNIQUE,
                previous_hash TEXT,
                timestamp INTEGER NOT NULL,
                nonce INTEGER NOT NULL,
                difficulty INTEGER NOT NULL,
                merkle_root TEXT NOT NULL,
                origin_transaction_hash TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                hash TEXT PRIMARY KEY,
                from_address TEXT,
                to_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                signature TEXT,
                public_key TEXT,
                block_hash TEXT REFERENCES blocks(hash),
                origin_transaction_hash TEXT,
                index_in_block INTEGER,
                token_id INTEGER,
                token_name TEXT,
                token_symbol TEXT,
                token_total_supply TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pending_transactions (
                hash TEXT PRIMARY KEY,
                from_address TEXT,
                to_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                signature TEXT,
                public_key TEXT,
                origin_transaction_hash TEXT,
                token_id INTEGER,
                token_name TEXT,
                token_symbol TEXT,
                token_total_supply TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS address_balances (
                address TEXT PRIMARY KEY,
                balance TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tokens (
                token_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                symbol TEXT NOT NULL UNIQUE,
                total_supply TEXT NOT NULL,
                creator_address TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS token_balances (
                address TEXT NOT NULL,
                token_id INTEGER NOT NULL,
                balance TEXT NOT NULL,
                PRIMARY KEY (address, token_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS merkle_nodes (
                block_hash TEXT NOT NULL,
                level INTEGER NOT NULL,
                node_index INTEGER NOT NULL,
                hash TEXT NOT NULL,
                left_child_hash TEXT,
                right_child_hash TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS merkle_proof_paths (
                block_hash TEXT NOT NULL,
                transaction_hash TEXT NOT NULL,
                proof_path_json TEXT NOT NULL,
                PRIMARY KEY (block_hash, transaction_hash)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE VIEW IF NOT EXISTS balances_view AS
             SELECT address, NULL AS token_id, NULL AS token_symbol, balance FROM address_balances
             UNION ALL
             SELECT tb.address, tb.token_id, t.symbol AS token_symbol, tb.balance
             FROM token_balances tb JOIN tokens t ON tb.token_id = t.token_id",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn block_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("c")? as u64)
    }

    async fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO blocks
             (hash, block_index, previous_hash, timestamp, nonce, difficulty, merkle_root, origin_transaction_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&block.hash)
        .bind(block.index as i64)
        .bind(&block.previous_hash)
        .bind(block.timestamp)
        .bind(block.nonce as i64)
        .bind(block.difficulty as i64)
        .bind(&block.merkle_root)
        .bind(&block.origin_transaction_hash)
        .execute(&mut *tx)
        .await?;

        for (i, txn) in block.transactions.iter().enumerate() {
            let mut token_id = txn.token_id;

            if txn.is_token_creation() {
                let total_supply = txn
                    .token_total_supply
                    .expect("is_token_creation guarantees total_supply");
                let inserted = sqlx::query(
                    "INSERT INTO tokens (name, symbol, total_supply, creator_address, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(txn.token_name.as_deref().unwrap_or_default())
                .bind(txn.token_symbol.as_deref().unwrap_or_default())
                .bind(total_supply.to_string())
                .bind(&txn.to_address)
                .bind(txn.timestamp)
                .execute(&mut *tx)
                .await?;
                let new_token_id = inserted.last_insert_rowid();
                token_id = Some(new_token_id);

                let current = Self::token_balance(&mut tx, &txn.to_address, new_token_id).await?;
                Self::set_token_balance(&mut tx, &txn.to_address, new_token_id, current + total_supply)
                    .await?;
            } else if let Some(id) = token_id {
                if let Some(from) = &txn.from_address {
                    let current = Self::token_balance(&mut tx, from, id).await?;
                    Self::set_token_balance(&mut tx, from, id, current - txn.amount).await?;
                }
                let current_to = Self::token_balance(&mut tx, &txn.to_address, id).await?;
                Self::set_token_balance(&mut tx, &txn.to_address, id, current_to + txn.amount)
                    .await?;
            } else {
                if let Some(from) = &txn.from_address {
                    let current = Self::native_balance(&mut tx, from).await?;
                    Self::set_native_balance(&mut tx, from, current - txn.amount).await?;
                }
                let current_to = Self::native_balance(&mut tx, &txn.to_address).await?;
                Self::set_native_balance(&mut tx, &txn.to_address, current_to + txn.amount).await?;
            }

            sqlx::query(
                "INSERT INTO transactions
                 (hash, from_address, to_address, amount, timestamp, signature, public_key,
                  block_hash, origin_transaction_hash, index_in_block, token_id, token_name,
                  token_symbol, token_total_supply)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )
            .bind(&txn.hash)
            .bind(&txn.from_address)
            .bind(&txn.to_address)
            .bind(txn.amount.to_string())
            .bind(txn.timestamp)
            .bind(&txn.signature)
            .bind(&txn.public_key)
            .bind(&block.hash)
            .bind(&txn.origin_transaction_hash)
            .bind(i as i64)
            .bind(token_id)
            .bind(&txn.token_name)
            .bind(&txn.token_symbol)
            .bind(txn.token_total_supply.map(|d| d.to_string()))
            .execute(&mut *tx)
            .await?;
        }

        let leaves: Vec<String> = block.transactions.iter().map(|t| t.hash.clone()).collect();
        let tree = MerkleTree::build(&leaves);
        for node in tree.nodes() {
            sqlx::query(
                "INSERT INTO merkle_nodes
                 (block_hash, level, node_index, hash, left_child_hash, right_child_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&block.hash)
            .bind(node.level)
            .bind(node.index)
            .bind(&node.hash)
            .bind(&node.left_child_hash)
            .bind(&node.right_child_hash)
            .execute(&mut *tx)
            .await?;
        }
        for (i, txn) in block.transactions.iter().enumerate() {
            let proof = tree.proof(i)?;
            let proof_json = serde_json::to_string(&proof)?;
            sqlx::query(
                "INSERT INTO merkle_proof_paths (block_hash, transaction_hash, proof_path_json)
                 VALUES (?1, ?2, ?3)",
            )
            .bind(&block.hash)
            .bind(&txn.hash)
            .bind(proof_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(block_hash = %block.hash, index = block.index, "block persisted");
        Ok(())
    }

    async fn load_chain(&self) -> Result<Vec<Block>, StoreError> {
        let rows = sqlx::query("SELECT * FROM blocks ORDER BY block_index ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut blocks = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut block = Self::row_to_block_header(row)?;
            block.transactions = self.transactions_for_block(&block.hash).await?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    async fn load_block_by_index(&self, index: u64) -> Result<Option<Block>, StoreError> {
        let row = sqlx::query("SELECT * FROM blocks WHERE block_index = ?1")
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let mut block = Self::row_to_block_header(&row)?;
                block.transactions = self.transactions_for_block(&block.hash).await?;
                Ok(Some(block))
            }
        }
    }

    async fn load_block_by_hash(&self, hash: &str) -> Result<Option<Block>, StoreError> {
        let row = sqlx::query("SELECT * FROM blocks WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let mut block = Self::row_to_block_header(&row)?;
                block.transactions = self.transactions_for_block(&block.hash).await?;
                Ok(Some(block))
            }
        }
    }

    async fn upsert_pending_transaction(&self, txn: &Transaction) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pending_transactions
             (hash, from_address, to_address, amount, timestamp, signature, public_key,
              origin_transaction_hash, token_id, token_name, token_symbol, token_total_supply)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(hash) DO UPDATE SET
               signature = excluded.signature,
               public_key = excluded.public_key",
        )
        .bind(&txn.hash)
        .bind(&txn.from_address)
        .bind(&txn.to_address)
        .bind(txn.amount.to_string())
        .bind(txn.timestamp)
        .bind(&txn.signature)
        .bind(&txn.public_key)
        .bind(&txn.origin_transaction_hash)
        .bind(txn.token_id)
        .bind(&txn.token_name)
        .bind(&txn.token_symbol)
        .bind(txn.token_total_supply.map(|d| d.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_pending_transaction(&self, hash: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM pending_transactions WHERE hash = ?1")
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_pending_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query("SELECT * FROM pending_transactions ORDER BY timestamp ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn get_latest_for_address(
        &self,
        address: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let outgoing = sqlx::query(
            "SELECT * FROM transactions WHERE from_address = ?1
             ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = outgoing {
            return Ok(Some(Self::row_to_transaction(&row)?));
        }

        let incoming_creation = sqlx::query(
            "SELECT * FROM transactions WHERE to_address = ?1
             AND token_id IS NOT NULL AND token_name IS NOT NULL
             AND token_symbol IS NOT NULL AND token_total_supply IS NOT NULL
             ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        incoming_creation
            .as_ref()
            .map(Self::row_to_transaction)
            .transpose()
    }

    async fn get_balance_of_address(&self, address: &str) -> Result<AddressBalance, StoreError> {
        let native_row = sqlx::query("SELECT balance FROM address_balances WHERE address = ?1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        let native = match native_row {
            Some(row) => parse_decimal(row.try_get::<String, _>("balance")?.as_str())?,
            None => Decimal::ZERO,
        };

        let token_rows = sqlx::query(
            "SELECT tb.token_id AS token_id, t.symbol AS symbol, tb.balance AS balance
             FROM token_balances tb JOIN tokens t ON tb.token_id = t.token_id
             WHERE tb.address = ?1",
        )
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        let mut tokens = Vec::with_capacity(token_rows.len());
        for row in &token_rows {
            tokens.push(TokenBalanceRow {
                token_id: row.try_get("token_id")?,
                symbol: row.try_get("symbol")?,
                balance: parse_decimal(row.try_get::<String, _>("balance")?.as_str())?,
            });
        }

        Ok(AddressBalance { native, tokens })
    }

    async fn token_by_symbol(&self, symbol: &str) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM tokens WHERE symbol = ?1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(TokenRecord {
                token_id: row.try_get("token_id")?,
                name: row.try_get("name")?,
                symbol: row.try_get("symbol")?,
                total_supply: parse_decimal(row.try_get::<String, _>("total_supply")?.as_str())?,
                creator_address: row.try_get("creator_address")?,
                timestamp: row.try_get("timestamp")?,
            })
        })
        .transpose()
    }

    async fn token_by_id(&self, token_id: i64) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM tokens WHERE token_id = ?1")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(TokenRecord {
                token_id: row.try_get("token_id")?,
                name: row.try_get("name")?,
                symbol: row.try_get("symbol")?,
                total_supply: parse_decimal(row.try_get::<String, _>("total_supply")?.as_str())?,
                creator_address: row.try_get("creator_address")?,
                timestamp: row.try_get("timestamp")?,
            })
        })
        .transpose()
    }

    async fn get_proof_path(
        &self,
        block_hash: &str,
        transaction_hash: &str,
    ) -> Result<Option<MerkleProof>, StoreError> {
        let row = sqlx::query(
            "SELECT proof_path_json FROM merkle_proof_paths
             WHERE block_hash = ?1 AND transaction_hash = ?2",
        )
        .bind(block_hash)
        .bind(transaction_hash)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let json: String = row.try_get("proof_path_json")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
        }
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "merkle_proof_paths",
            "merkle_nodes",
            "transactions",
            "pending_transactions",
            "token_balances",
            "tokens",
            "address_balances",
            "blocks",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
