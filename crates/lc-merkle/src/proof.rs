use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which side the current running hash sits on when combined with a
/// sibling during proof verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

/// A single step in a Merkle inclusion proof: the sibling hash at this
/// level and which side the proof's running hash is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling_hash: String,
    pub direction: Direction,
}

/// An ordered inclusion proof from a leaf up to the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_hash: String,
    pub steps: Vec<ProofStep>,
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

impl MerkleProof {
    /// Fold the proof's steps and check the result against `expected_root`.
    pub fn verify(&self, expected_root: &str) -> bool {
        let mut current = self.leaf_hash.clone();
        for step in &self.steps {
            current = match step.direction {
                Direction::Left => hash_pair(&current, &step.sibling_hash),
                Direction::Right => hash_pair(&step.sibling_hash, &current),
            };
        }
        current == expected_root
    }
}
