use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lc_chain::Chain;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    error::NodeError,
    event::NodeEvent,
    protocol::PeerMessage,
    registry::PeerRegistry,
};

/// The ledger-core P2P node: a `Chain` driven over a WebSocket peer
/// protocol. Every connected peer gets its own read loop and a dedicated
/// write task, bridged through [`PeerRegistry`].
pub struct Node {
    config: NodeConfig,
    chain: Arc<Chain>,
    registry: Arc<PeerRegistry>,
}

impl Node {
    pub fn new(config: NodeConfig, chain: Arc<Chain>, registry: Arc<PeerRegistry>) -> Arc<Self> {
        Arc::new(Self {
            config,
            chain,
            registry,
        })
    }

    pub fn events(&self) -> mpsc::UnboundedSender<NodeEvent> {
        self.registry.events()
    }

    /// Bind the listening socket and spawn the accept loop. Returns once
    /// bound; connections are handled on spawned tasks.
    pub async fn listen(self: &Arc<Self>) -> Result<(), NodeError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        info!(port = self.config.port, "listening for peer connections");
        let _ = self
            .registry
            .events()
            .send(NodeEvent::Listening(format!("0.0.0.0:{}", self.config.port)));

        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let this = Arc::clone(&this);
                        tokio::spawn(async move {
                            match tokio_tungstenite::accept_async(stream).await {
                                Ok(ws) => this.handle_connection(ws, addr.to_string()).await,
                                Err(e) => warn!(error = %e, "websocket handshake failed"),
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        });

        Ok(())
    }

    /// Dial an outbound peer and hand its connection to the same read/write
    /// machinery used for inbound connections.
    pub async fn connect_to_peer(self: &Arc<Self>, url: &str) -> Result<(), NodeError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        let this = Arc::clone(self);
        let addr = url.to_string();
        tokio::spawn(async move { this.handle_connection(ws, addr).await });
        Ok(())
    }

    /// Start the interval-driven miner, the pending-count-driven miner, and
    /// the peer heartbeat. Runs until the process exits.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let chain = Arc::clone(&self.chain);
        let mining_interval = Duration::from_secs(self.config.mining_interval_seconds);
        let miner_address = self.config.miner_address.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(mining_interval);
            loop {
                ticker.tick().await;
                debug!(miner = %miner_address, "interval miner tick");
                if let Err(e) = chain.mine_pending_transactions().await {
                    warn!(error = %e, "interval mining attempt failed");
                }
            }
        });

        let chain = Arc::clone(&self.chain);
        let pending_poll = Duration::from_secs(self.config.pending_poll_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pending_poll);
            loop {
                ticker.tick().await;
                if chain.pending_count().await > 0 {
                    if let Err(e) = chain.mine_pending_transactions().await {
                        warn!(error = %e, "pending-triggered mining attempt failed");
                    }
                }
            }
        });

        let registry = Arc::clone(&self.registry);
        let heartbeat = Duration::from_secs(self.config.heartbeat_seconds);
        tokio::spawn(async move { registry.run_heartbeat(heartbeat).await });
    }

    async fn handle_connection<S>(self: Arc<Self>, ws: WebSocketStream<S>, addr: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
        self.registry.register(addr.clone(), outbound_tx).await;

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        self.registry
            .send_to(&addr, &PeerMessage::RequestFullChain)
            .await
            .ok();

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => self.handle_text(&addr, &text).await,
                Ok(WsMessage::Pong(_)) => self.registry.mark_pong(&addr).await,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(peer = %addr, error = %e, "peer socket error");
                    break;
                }
            }
        }

        self.registry.remove(&addr).await;
        writer.abort();
    }

    async fn handle_text(&self, addr: &str, text: &str) {
        let message: PeerMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(peer = %addr, error = %e, "failed to decode peer message; ignoring");
                return;
            }
        };

        match message {
            PeerMessage::RequestFullChain => {
                debug!(peer = %addr, "peer requested full chain");
                let chain = self.chain.snapshot().await;
                let _ = self
                    .registry
                    .send_to(addr, &PeerMessage::FullChain(chain))
                    .await;
            }
            PeerMessage::FullChain(blocks) => {
                debug!(peer = %addr, blocks = blocks.len(), "received full chain");
                match self.chain.replace_chain(blocks).await {
                    Ok(true) => {
                        let new_length = self.chain.len().await;
                        let _ = self
                            .registry
                            .events()
                            .send(NodeEvent::ChainReplaced { new_length });
                    }
                    Ok(false) => {}
                    Err(e) => warn!(peer = %addr, error = %e, "failed to validate candidate chain"),
                }
            }
            PeerMessage::NewBlock(block) => {
                if self.registry.already_processed_block(&block.hash).await {
                    return;
                }
                let _ = self
                    .registry
                    .events()
                    .send(NodeEvent::BlockReceived(block.clone()));
                if let Err(e) = self.chain.add_block(block).await {
                    warn!(peer = %addr, error = %e, "rejected incoming block; requesting full chain");
                    let _ = self
                        .registry
                        .send_to(addr, &PeerMessage::RequestFullChain)
                        .await;
                }
            }
            PeerMessage::NewTransaction(tx) => {
                if self.registry.already_processed_transaction(&tx.hash).await {
                    return;
                }
                let _ = self
                    .registry
                    .events()
                    .send(NodeEvent::TransactionReceived(tx.clone()));
                if let Err(e) = self.chain.add_pending_transaction(tx).await {
                    warn!(peer = %addr, error = %e, "rejected incoming transaction");
                }
            }
        }
    }
}
