//! Binary Merkle tree over leaf strings, with inclusion proofs.
//!
//! Grounded on `original_source/blockchain/core/merkle.py`: leaves are
//! hashed individually, odd levels duplicate their last node rather than
//! padding to a power of two, and a proof is a path of (sibling hash,
//! side) pairs where `side` names where the sibling sits relative to the
//! node being proved.

use std::fmt;

use sha2::{Digest, Sha256};

#[derive(Debug)]
pub enum MerkleError {
    EmptyInput,
    IndexOutOfRange,
}

impl fmt::Display for MerkleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MerkleError::EmptyInput => write!(f, "cannot build a merkle tree from an empty list"),
            MerkleError::IndexOutOfRange => write!(f, "leaf index out of range"),
        }
    }
}

impl std::error::Error for MerkleError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

fn leaf_hash(leaf: &str) -> String {
    hex::encode(Sha256::digest(leaf.as_bytes()))
}

fn node_hash(left: &str, right: &str) -> String {
    let mut combined = String::with_capacity(left.len() + right.len());
    combined.push_str(left);
    combined.push_str(right);
    hex::encode(Sha256::digest(combined.as_bytes()))
}

/// Root hash of the empty tree: `SHA256("")`.
pub fn empty_root() -> String {
    hex::encode(Sha256::digest(b""))
}

/// A Merkle tree built from an ordered list of leaf strings (transaction
/// digests, for block use).
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    pub fn new(leaves: &[String]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyInput);
        }
        let mut levels = Vec::new();
        let mut current: Vec<String> = leaves.iter().map(|leaf| leaf_hash(leaf)).collect();
        levels.push(current.clone());
        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = if i + 1 < current.len() {
                    &current[i + 1]
                } else {
                    left
                };
                next.push(node_hash(left, right));
                i += 2;
            }
            levels.push(next.clone());
            current = next;
        }
        Ok(MerkleTree { levels })
    }

    pub fn root(&self) -> &str {
        &self.levels.last().expect("at least one level")[0]
    }

    pub fn proof(&self, index: usize) -> Result<Vec<(String, Side)>, MerkleError> {
        if index >= self.levels[0].len() {
            return Err(MerkleError::IndexOutOfRange);
        }
        let mut proof = Vec::new();
        let mut current_index = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let pair_start = current_index - (current_index % 2);
            let left = &level[pair_start];
            let right = if pair_start + 1 < level.len() {
                &level[pair_start + 1]
            } else {
                left
            };
            if current_index == pair_start {
                proof.push((right.clone(), Side::Right));
            } else {
                proof.push((left.clone(), Side::Left));
            }
            current_index /= 2;
        }
        Ok(proof)
    }

    /// Static verification: rehash `leaf`, fold the proof path, and compare
    /// against `root`.
    pub fn verify(leaf: &str, proof: &[(String, Side)], root: &str) -> bool {
        let mut current = leaf_hash(leaf);
        for (sibling, side) in proof {
            current = match side {
                Side::Left => node_hash(sibling, &current),
                Side::Right => node_hash(&current, sibling),
            };
        }
        current == root
    }
}

/// Convenience wrapper over an already non-empty list of pre-hashed leaves
/// (e.g. transaction digests), falling back to the canonical empty root
/// when the list is empty rather than erroring — matching
/// `build_merkle_tree_from_hashes`'s behavior in the source.
pub fn root_of(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return empty_root();
    }
    MerkleTree::new(leaves)
        .expect("non-empty checked above")
        .root()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_is_sha256_of_empty_string() {
        assert_eq!(root_of(&[]), empty_root());
    }

    #[test]
    fn single_leaf_root_is_its_own_hash() {
        let leaves = vec!["a".to_string()];
        let tree = MerkleTree::new(&leaves).unwrap();
        assert_eq!(tree.root(), leaf_hash("a"));
    }

    #[test]
    fn every_leaf_proof_verifies_against_root() {
        let leaves: Vec<String> = (0..5).map(|i| format!("leaf-{i}")).collect();
        let tree = MerkleTree::new(&leaves).unwrap();
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(MerkleTree::verify(leaf, &proof, tree.root()));
        }
    }

    #[test]
    fn proof_rejects_wrong_leaf() {
        let leaves: Vec<String> = (0..4).map(|i| format!("leaf-{i}")).collect();
        let tree = MerkleTree::new(&leaves).unwrap();
        let proof = tree.proof(1).unwrap();
        assert!(!MerkleTree::verify("not-a-leaf", &proof, tree.root()));
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let leaves: Vec<String> = (0..3).map(|i| format!("leaf-{i}")).collect();
        let tree = MerkleTree::new(&leaves).unwrap();
        let h0 = leaf_hash("leaf-0");
        let h1 = leaf_hash("leaf-1");
        let h2 = leaf_hash("leaf-2");
        let expected_root = node_hash(&node_hash(&h0, &h1), &node_hash(&h2, &h2));
        assert_eq!(tree.root(), expected_root);
    }

    #[test]
    fn out_of_range_index_errors() {
        let leaves = vec!["a".to_string()];
        let tree = MerkleTree::new(&leaves).unwrap();
        assert!(matches!(tree.proof(1), Err(MerkleError::IndexOutOfRange)));
    }

    #[test]
    fn empty_input_errors() {
        assert!(matches!(MerkleTree::new(&[]), Err(MerkleError::EmptyInput)));
    }
}
