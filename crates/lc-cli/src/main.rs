use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lc_chain::Chain;
use lc_store::{SqliteStore, StateStore};
use lc_transaction::Transaction;
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Non-interactive ledger-core command runner. Exercises the core public
/// API (`create_wallet`, `add_pending_transaction`, `get_balance_of_address`,
/// `is_chain_valid`) against a node's datastore; it is not a network peer
/// and does not mine.
#[derive(Parser, Debug)]
#[command(name = "lc-cli", version, about = "ledger-core command runner")]
struct Cli {
    /// Path to the sqlite database file shared with a running node.
    #[arg(long, default_value = "ledger.db", env = "LC_DATASTORE")]
    datastore: String,

    /// Directory wallet key files are read from / written to.
    #[arg(long, default_value = "wallets", env = "LC_WALLET_DIR")]
    wallet_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new keypair and write its wallet file.
    CreateWallet,
    /// Sign and submit a native transfer to the mempool.
    Send {
        from: String,
        to: String,
        amount: Decimal,
    },
    /// Print an address's native and token balances.
    Balance { address: String },
    /// Validate the persisted chain structurally.
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "lc-cli failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::CreateWallet => {
            let wallet = lc_wallet::create_wallet(&cli.wallet_dir)?;
            println!("address: {}", wallet.address);
            println!("public_key: {}", wallet.public_key);
        }
        Command::Send { from, to, amount } => {
            let store = SqliteStore::connect(&cli.datastore).await?;
            let wallet = lc_wallet::load_wallet(&cli.wallet_dir, &from)?;

            let balance = store.get_balance_of_address(&from).await?;
            if amount > balance.native {
                anyhow::bail!(
                    "insufficient funds: {from} has {}, tried to send {amount}",
                    balance.native
                );
            }

            let origin_transaction_hash = store
                .get_latest_for_address(&from)
                .await?
                .map(|tx| tx.hash);

            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_millis() as i64;

            let mut tx = Transaction::new(
                Some(from.clone()),
                to,
                amount,
                timestamp,
                origin_transaction_hash,
                None,
                None,
                None,
                None,
            );
            tx.sign(&wallet.private_key)?;

            if !tx.has_valid_amount() {
                anyhow::bail!("amount must be a positive decimal");
            }
            if !tx.is_valid() {
                anyhow::bail!("transaction failed to validate after signing");
            }

            store.upsert_pending_transaction(&tx).await?;
            info!(hash = %tx.hash, "transaction submitted to mempool");
            println!("submitted: {}", tx.hash);
        }
        Command::Balance { address } => {
            let store = SqliteStore::connect(&cli.datastore).await?;
            let balance = store.get_balance_of_address(&address).await?;
            println!("native: {}", balance.native);
            for token in &balance.tokens {
                println!("{}: {}", token.symbol, token.balance);
            }
        }
        Command::Validate => {
            let store = SqliteStore::connect(&cli.datastore).await?;
            let blocks = store.load_chain().await?;
            let valid = Chain::is_valid_chain(&blocks);
            println!("valid: {valid}");
            if !valid {
                anyhow::bail!("chain failed validation");
            }
        }
    }

    Ok(())
}
