use lc_block::Block;
use lc_transaction::Transaction;

/// High-level events emitted by a running [`crate::Node`] that callers
/// (the CLI, tests) can subscribe to via a channel.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    PeerConnected(String),
    PeerDisconnected(String),
    TransactionReceived(Transaction),
    BlockReceived(Block),
    ChainReplaced { new_length: usize },
    Listening(String),
}
