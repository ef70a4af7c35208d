pub mod block;
pub mod error;

pub use block::{derive_block_origin_transaction_hash, meets_difficulty, Block};
pub use error::BlockError;
