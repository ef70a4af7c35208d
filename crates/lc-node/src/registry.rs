use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lc_block::Block;
use lc_chain::PeerBroadcaster;
use lc_transaction::Transaction;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::{event::NodeEvent, protocol::PeerMessage};

/// One connected peer: a channel into its dedicated write task, and whether
/// it has answered the most recent heartbeat ping.
struct PeerHandle {
    outbound: mpsc::UnboundedSender<WsMessage>,
    responded_to_last_ping: Arc<AtomicBool>,
}

/// Shared peer set plus anti-replay bookkeeping. Implements
/// [`PeerBroadcaster`] so `lc-chain` can push new blocks/transactions out
/// without knowing anything about WebSockets.
pub struct PeerRegistry {
    peers: RwLock<std::collections::HashMap<String, PeerHandle>>,
    processed_transactions: Mutex<HashSet<String>>,
    last_processed_block_hash: Mutex<Option<String>>,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
}

impl PeerRegistry {
    pub fn new(event_tx: mpsc::UnboundedSender<NodeEvent>) -> Self {
        Self {
            peers: RwLock::new(std::collections::HashMap::new()),
            processed_transactions: Mutex::new(HashSet::new()),
            last_processed_block_hash: Mutex::new(None),
            event_tx,
        }
    }

    pub async fn register(&self, addr: String, outbound: mpsc::UnboundedSender<WsMessage>) {
        let handle = PeerHandle {
            outbound,
            responded_to_last_ping: Arc::new(AtomicBool::new(true)),
        };
        self.peers.write().await.insert(addr.clone(), handle);
        let _ = self.event_tx.send(NodeEvent::PeerConnected(addr.clone()));
        info!(peer = %addr, "peer connected");
    }

    pub async fn remove(&self, addr: &str) {
        if self.peers.write().await.remove(addr).is_some() {
            let _ = self.event_tx.send(NodeEvent::PeerDisconnected(addr.to_string()));
            info!(peer = %addr, "peer disconnected");
        }
    }

    pub async fn send_to(&self, addr: &str, msg: &PeerMessage) -> Result<(), crate::error::NodeError> {
        let peers = self.peers.read().await;
        let handle = peers
            .get(addr)
            .ok_or_else(|| crate::error::NodeError::PeerNotConnected(addr.to_string()))?;
        let text = serde_json::to_string(msg)?;
        let _ = handle.outbound.send(WsMessage::Text(text));
        Ok(())
    }

    pub async fn send_raw(&self, addr: &str, msg: WsMessage) {
        if let Some(handle) = self.peers.read().await.get(addr) {
            let _ = handle.outbound.send(msg);
        }
    }

    async fn broadcast(&self, msg: &PeerMessage, exclude: Option<&str>) {
        let text = match serde_json::to_string(msg) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound peer message");
                return;
            }
        };
        let peers = self.peers.read().await;
        for (addr, handle) in peers.iter() {
            if Some(addr.as_str()) == exclude {
                continue;
            }
            let _ = handle.outbound.send(WsMessage::Text(text.clone()));
        }
    }

    /// Broadcast to every peer except `exclude` (used for transaction gossip
    /// so the originating peer doesn't receive its own message back).
    pub async fn broadcast_except(&self, msg: &PeerMessage, exclude: &str) {
        self.broadcast(msg, Some(exclude)).await;
    }

    pub fn events(&self) -> mpsc::UnboundedSender<NodeEvent> {
        self.event_tx.clone()
    }

    pub async fn already_processed_transaction(&self, hash: &str) -> bool {
        !self.processed_transactions.lock().await.insert(hash.to_string())
    }

    pub async fn already_processed_block(&self, hash: &str) -> bool {
        let mut last = self.last_processed_block_hash.lock().await;
        if last.as_deref() == Some(hash) {
            return true;
        }
        *last = Some(hash.to_string());
        false
    }

    /// Every `interval`, ping each peer and drop any that didn't respond to
    /// the previous ping.
    pub async fn run_heartbeat(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let stale: Vec<String> = {
                let peers = self.peers.read().await;
                peers
                    .iter()
                    .filter(|(_, handle)| !handle.responded_to_last_ping.load(Ordering::SeqCst))
                    .map(|(addr, _)| addr.clone())
                    .collect()
            };
            for addr in &stale {
                warn!(peer = %addr, "peer did not answer heartbeat; dropping");
                self.remove(addr).await;
            }

            let peers = self.peers.read().await;
            for handle in peers.values() {
                handle.responded_to_last_ping.store(false, Ordering::SeqCst);
                let _ = handle.outbound.send(WsMessage::Ping(Vec::new()));
            }
            debug!(connected = peers.len(), "heartbeat ping sent");
        }
    }

    pub async fn mark_pong(&self, addr: &str) {
        if let Some(handle) = self.peers.read().await.get(addr) {
            handle.responded_to_last_ping.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl PeerBroadcaster for PeerRegistry {
    async fn broadcast_new_block(&self, block: &Block) {
        self.broadcast(&PeerMessage::NewBlock(block.clone()), None).await;
    }

    async fn broadcast_new_transaction(&self, tx: &Transaction) {
        self.broadcast(&PeerMessage::NewTransaction(tx.clone()), None).await;
    }
}
