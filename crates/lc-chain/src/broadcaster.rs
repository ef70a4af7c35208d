use async_trait::async_trait;
use lc_block::Block;
use lc_transaction::Transaction;

/// Outbound peer-broadcast hook. `lc-chain` depends only on this trait, not
/// on the concrete peer protocol — the node binary wires in its own
/// implementation, mirroring how the teacher's higher crates depend on
/// `SyncStrategy`/`NodeMode` traits rather than concrete peer types.
#[async_trait]
pub trait PeerBroadcaster: Send + Sync {
    async fn broadcast_new_block(&self, block: &Block);
    async fn broadcast_new_transaction(&self, tx: &Transaction);
}

/// A broadcaster that does nothing. Used for standalone chains (tests,
/// single-node bootstrapping) that have no peer set yet.
pub struct NullBroadcaster;

#[async_trait]
impl PeerBroadcaster for NullBroadcaster {
    async fn broadcast_new_block(&self, _block: &Block) {}
    async fn broadcast_new_transaction(&self, _tx: &Transaction) {}
}
