use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("a block must contain at least one transaction")]
    NoTransactions,

    #[error("block contains an invalid transaction")]
    InvalidTransaction,

    #[error("recomputed block hash does not match the stored hash")]
    HashMismatch,

    #[error("recomputed merkle root does not match the stored merkle root")]
    MerkleRootMismatch,

    #[error("block hash does not satisfy difficulty {0}")]
    DifficultyNotMet(u32),
}
