/// Integration smoke tests that wire together the whole data path:
///   Transaction -> mempool (Chain) -> Block -> StateStore -> WebSocket gossip
///
/// Network-level tests require a running async runtime and real ports, so
/// they are marked `#[tokio::test]` and guarded with short timeouts.
use std::sync::Arc;
use std::time::Duration;

use lc_chain::{Chain, ChainConfig, NullBroadcaster, PeerBroadcaster};
use lc_node::{Node, NodeConfig, NodeEvent};
use lc_store::{SqliteStore, StateStore};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

fn addr(byte: char) -> String {
    byte.to_string().repeat(30)
}

async fn bootstrapped_chain(genesis: &str, miner: &str) -> Chain {
    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let broadcaster: Arc<dyn PeerBroadcaster> = Arc::new(NullBroadcaster);
    let config = ChainConfig {
        difficulty: 1,
        genesis_address: genesis.to_string(),
        miner_address: miner.to_string(),
        ..ChainConfig::default()
    };
    Chain::bootstrap(store, broadcaster, config, false).await.unwrap()
}

// ── Pure data-path tests (no network) ───────────────────────────────────────

#[tokio::test]
async fn genesis_bootstrap_and_mine_with_transfer() {
    let chain = bootstrapped_chain(&addr('g'), &addr('m')).await;
    assert_eq!(chain.len().await, 1);

    let kp = lc_crypto::keypair_gen();
    let sender = lc_crypto::derive_address(&kp.public_key).unwrap();
    let mut tx = lc_transaction::Transaction::new(
        Some(sender),
        addr('1'),
        dec!(1),
        1,
        None,
        None,
        None,
        None,
        None,
    );
    tx.sign(&kp.private_key).unwrap();

    chain.add_pending_transaction(tx).await.unwrap();
    let mined = chain.mine_pending_transactions().await.unwrap().unwrap();

    assert_eq!(mined.index, 1);
    assert_eq!(mined.transactions.len(), 2);
    assert!(Chain::is_valid_chain(&chain.snapshot().await));
}

#[tokio::test]
async fn token_create_then_transfer_across_two_blocks() {
    let chain = bootstrapped_chain(&addr('g'), &addr('m')).await;

    let creation = lc_transaction::Transaction::new_reward(
        addr('c'),
        dec!(0),
        1,
        Some(1),
        Some("Widget".into()),
        Some("WDG".into()),
        Some(dec!(1000)),
    );
    chain.add_pending_transaction(creation).await.unwrap();
    chain.mine_pending_transactions().await.unwrap();

    let balance = chain.get_balance_of_address(&addr('c')).await.unwrap();
    assert_eq!(balance.tokens.len(), 1);
    assert_eq!(balance.tokens[0].balance, dec!(1000));
}

#[tokio::test]
async fn chain_replacement_requires_strictly_greater_work() {
    let chain = bootstrapped_chain(&addr('g'), &addr('m')).await;
    let same_work = chain.snapshot().await;
    assert!(!chain.replace_chain(same_work).await.unwrap());
}

// ── Network tests (real WebSocket sockets, short timeouts) ─────────────────

async fn spawn_node(
    port: u16,
    genesis: &str,
    miner: &str,
    bootstrap_peers_connected: bool,
) -> (Arc<Node>, mpsc::UnboundedReceiver<NodeEvent>) {
    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(lc_node::PeerRegistry::new(event_tx));

    let chain_config = ChainConfig {
        difficulty: 1,
        genesis_address: genesis.to_string(),
        miner_address: miner.to_string(),
        ..ChainConfig::default()
    };
    let chain = Arc::new(
        Chain::bootstrap(store, registry.clone(), chain_config, bootstrap_peers_connected)
            .await
            .unwrap(),
    );

    let config = NodeConfig {
        port,
        datastore: "sqlite::memory:".to_string(),
        peers: String::new(),
        difficulty: 1,
        mining_reward: dec!(100),
        genesis_initial_supply: dec!(1_000_000),
        genesis_address: genesis.to_string(),
        miner_address: miner.to_string(),
        mining_interval_seconds: 3600,
        pending_poll_seconds: 3600,
        heartbeat_seconds: 3600,
        quiet: true,
    };

    let node = Node::new(config, chain, registry);
    node.listen().await.unwrap();
    (node, event_rx)
}

#[tokio::test]
async fn second_node_syncs_genesis_from_first_on_connect() {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        let (node_a, _events_a) = spawn_node(16001, &addr('g'), &addr('m'), false).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (node_b, mut events_b) = spawn_node(16002, &addr('g'), &addr('m'), true).await;
        node_b.connect_to_peer("ws://127.0.0.1:16001").await.unwrap();

        while let Some(event) = events_b.recv().await {
            if matches!(event, NodeEvent::ChainReplaced { .. }) {
                break;
            }
        }
        let _ = node_a;
    })
    .await;

    assert!(result.is_ok(), "peer sync did not complete within the timeout");
}
