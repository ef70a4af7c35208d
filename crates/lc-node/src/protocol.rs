use lc_block::Block;
use lc_transaction::Transaction;
use serde::{Deserialize, Serialize};

/// The full consensus-relevant message set, carried as a single JSON frame
/// `{"type": ..., "data": ...}` over a WebSocket connection. `data` is
/// entirely absent for `REQUEST_FULL_CHAIN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PeerMessage {
    #[serde(rename = "REQUEST_FULL_CHAIN")]
    RequestFullChain,

    #[serde(rename = "FULL_CHAIN")]
    FullChain(Vec<Block>),

    #[serde(rename = "NEW_BLOCK")]
    NewBlock(Block),

    #[serde(rename = "NEW_TRANSACTION")]
    NewTransaction(Transaction),
}
