use thiserror::Error;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("leaf index {0} out of range")]
    NotFound(usize),
}
