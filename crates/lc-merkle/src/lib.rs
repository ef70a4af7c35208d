pub mod error;
pub mod proof;
pub mod tree;

pub use error::MerkleError;
pub use proof::{Direction, MerkleProof, ProofStep};
pub use tree::{MerkleNodeRecord, MerkleTree, EMPTY_ROOT};
