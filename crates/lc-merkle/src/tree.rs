use sha2::{Digest, Sha256};

use crate::{
    error::MerkleError,
    proof::{Direction, MerkleProof, ProofStep},
};

/// The all-zero root hash of an empty tree, per spec: 64 hex zero chars.
pub const EMPTY_ROOT: &str = "0000000000000000000000000000000000000000000000000000000000000000";

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// A node materialized from the tree, ready for persistence. `block_hash`
/// is attached by the caller (the store layer), since the tree itself does
/// not know which block it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNodeRecord {
    pub level: u32,
    pub index: u32,
    pub hash: String,
    pub left_child_hash: Option<String>,
    pub right_child_hash: Option<String>,
}

/// A binary Merkle tree built over an ordered list of hex-encoded leaf
/// hashes. Odd leaves at any level are promoted unchanged to the next
/// level rather than duplicated.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build a tree from `leaves`. An empty input yields a single-level tree
    /// whose root is [`EMPTY_ROOT`] — this never loops and never panics.
    pub fn build(leaves: &[String]) -> Self {
        let leaves_owned = leaves.to_vec();

        if leaves_owned.is_empty() {
            return Self {
                levels: vec![vec![EMPTY_ROOT.to_string()]],
            };
        }

        let mut levels = vec![leaves_owned.clone()];
        let mut current = leaves_owned;

        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                if i + 1 < current.len() {
                    next.push(hash_pair(&current[i], &current[i + 1]));
                    i += 2;
                } else {
                    // Odd one out: promoted unchanged, not duplicated.
                    next.push(current[i].clone());
                    i += 1;
                }
            }
            levels.push(next.clone());
            current = next;
        }

        Self { levels }
    }

    /// The root hash.
    pub fn root(&self) -> String {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_else(|| EMPTY_ROOT.to_string())
    }

    /// Number of leaves the tree was built from.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Build an inclusion proof for the leaf at `leaf_index`.
    pub fn proof(&self, leaf_index: usize) -> Result<MerkleProof, MerkleError> {
        if leaf_index >= self.levels[0].len() {
            return Err(MerkleError::NotFound(leaf_index));
        }

        let leaf_hash = self.levels[0][leaf_index].clone();
        let mut index = leaf_index;
        let mut steps = Vec::new();

        for level in &self.levels[..self.levels.len() - 1] {
            let len = level.len();
            if index % 2 == 0 {
                if index + 1 < len {
                    steps.push(ProofStep {
                        sibling_hash: level[index + 1].clone(),
                        direction: Direction::Left,
                    });
                }
                // else: this leaf was promoted unchanged — no step at this level.
            } else {
                steps.push(ProofStep {
                    sibling_hash: level[index - 1].clone(),
                    direction: Direction::Right,
                });
            }
            index /= 2;
        }

        Ok(MerkleProof { leaf_hash, steps })
    }

    /// Every node in the tree, level by level, for persistence. The genesis
    /// (empty-input) tree yields no nodes since it has no real leaves.
    pub fn nodes(&self) -> Vec<MerkleNodeRecord> {
        let mut records = Vec::new();
        for (level_idx, level) in self.levels.iter().enumerate() {
            for (node_idx, hash) in level.iter().enumerate() {
                let (left, right) = if level_idx == 0 {
                    (None, None)
                } else {
                    let prev = &self.levels[level_idx - 1];
                    let left_index = node_idx * 2;
                    let right_index = left_index + 1;
                    let left = prev.get(left_index).cloned();
                    let right = prev.get(right_index).cloned();
                    // A promoted node has no "right" sibling distinct from itself.
                    if right == left {
                        (left, None)
                    } else {
                        (left, right)
                    }
                };
                records.push(MerkleNodeRecord {
                    level: level_idx as u32,
                    index: node_idx as u32,
                    hash: hash.clone(),
                    left_child_hash: left,
                    right_child_hash: right,
                });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn leaf(data: &str) -> String {
        hex::encode(Sha256::digest(data.as_bytes()))
    }

    #[test]
    fn empty_input_yields_all_zero_root() {
        let tree = MerkleTree::build(&[]);
        assert_eq!(tree.root(), EMPTY_ROOT);
    }

    #[test]
    fn single_leaf_root_equals_leaf() {
        let l = leaf("only");
        let tree = MerkleTree::build(&[l.clone()]);
        assert_eq!(tree.root(), l);
    }

    #[test]
    fn proof_round_trips_for_even_leaf_count() {
        let leaves: Vec<String> = (0..4).map(|i| leaf(&format!("tx-{i}"))).collect();
        let tree = MerkleTree::build(&leaves);
        let root = tree.root();
        for i in 0..leaves.len() {
            let proof = tree.proof(i).unwrap();
            assert!(proof.verify(&root), "proof failed for leaf {i}");
        }
    }

    #[test]
    fn odd_leaf_count_promotes_last_leaf_unchanged() {
        let leaves: Vec<String> = (0..5).map(|i| leaf(&format!("tx-{i}"))).collect();
        let tree = MerkleTree::build(&leaves);
        let root = tree.root();

        for i in 0..leaves.len() {
            let proof = tree.proof(i).unwrap();
            assert!(proof.verify(&root), "proof failed for leaf {i}");
        }

        // The last leaf of an odd level is promoted unchanged, so it has one
        // fewer step at that level than its sibling-having neighbours.
        let promoted_proof = tree.proof(4).unwrap();
        let paired_proof = tree.proof(0).unwrap();
        assert!(promoted_proof.steps.len() < paired_proof.steps.len());
    }

    #[test]
    fn tampered_proof_fails_verification() {
        let leaves: Vec<String> = (0..4).map(|i| leaf(&format!("tx-{i}"))).collect();
        let tree = MerkleTree::build(&leaves);
        let root = tree.root();
        let mut proof = tree.proof(0).unwrap();
        proof.steps[0].sibling_hash = leaf("tampered");
        assert!(!proof.verify(&root));

        let mut proof2 = tree.proof(0).unwrap();
        proof2.steps[0].direction = match proof2.steps[0].direction {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        };
        assert!(!proof2.verify(&root));
    }

    #[test]
    fn out_of_range_index_errors() {
        let tree = MerkleTree::build(&[leaf("a")]);
        assert!(tree.proof(5).is_err());
    }
}
