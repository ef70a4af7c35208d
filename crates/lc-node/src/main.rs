use std::sync::Arc;

use clap::Parser;
use lc_chain::{Chain, ChainConfig};
use lc_node::{Node, NodeConfig, PeerRegistry};
use lc_store::{SqliteStore, StateStore};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::parse();

    let log_filter = if config.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env().add_directive("lc_node=info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::connect(&config.datastore).await?);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(PeerRegistry::new(event_tx));

    let peers = config.peer_list();
    let chain_config = ChainConfig {
        difficulty: config.difficulty,
        mining_reward: config.mining_reward,
        genesis_initial_supply: config.genesis_initial_supply,
        miner_address: config.miner_address.clone(),
        genesis_address: config.genesis_address.clone(),
        mining_interval_seconds: config.mining_interval_seconds,
        pending_poll_seconds: config.pending_poll_seconds,
    };

    let chain = Arc::new(
        Chain::bootstrap(store, registry.clone(), chain_config, !peers.is_empty()).await?,
    );

    info!(port = config.port, chain_length = chain.len().await, "starting ledger-core node");

    let node = Node::new(config.clone(), chain, registry);
    node.listen().await?;

    for peer in &peers {
        info!(peer = %peer, "dialing configured peer");
        if let Err(e) = node.connect_to_peer(peer).await {
            tracing::warn!(peer = %peer, error = %e, "failed to connect to peer");
        }
    }

    node.spawn_background_tasks();

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(?event, "node event");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
