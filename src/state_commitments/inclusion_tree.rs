// src/state_commitments/inclusion_tree.rs
//! Padded Merkle tree for single-leaf inclusion proofs
//!
//! Items are hashed into leaves, the leaf level is padded with zero leaves up
//! to the next power of two, and every level is kept so that proofs can be
//! read straight out of the tree. Used wherever a commitment to a leaf range
//! has to prove one specific state at one specific height.

use borsh::{BorshDeserialize, BorshSerialize};
use log::warn;
use thiserror::Error;

use super::digest::{hash_leaf, hash_pair, Digest};

/// Longest inclusion proof accepted
pub const MAX_PROOF_LEN: usize = 256;

/// Inclusion tree errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InclusionProofError {
    /// Tree has no levels, or an empty top level
    #[error("invalid merkle tree")]
    InvalidTree,

    /// Leaf index outside the leaf level
    #[error("invalid leaves: index {index} out of {len}")]
    InvalidLeaves { index: u64, len: usize },

    /// Proof longer than the accepted maximum
    #[error("merkle proof too long: {0} entries")]
    ProofTooLong(usize),

    /// Recomputed root differs from the expected one
    #[error("inclusion root mismatch: expected {expected}, got {actual}")]
    RootMismatch { expected: Digest, actual: Digest },
}

/// All levels of a padded tree, leaves first, root last
pub type TreeLevels = Vec<Vec<Digest>>;

/// Build every level of the padded tree over `items`.
///
/// Returns no levels at all for an empty input.
pub fn compute_merkle_tree(items: &[Digest]) -> TreeLevels {
    if items.is_empty() {
        return Vec::new();
    }
    let width = items.len().next_power_of_two();
    let mut leaves: Vec<Digest> = items.iter().map(hash_leaf).collect();
    leaves.resize(width, Digest::ZERO);

    let mut levels = vec![leaves];
    while let Some(current) = levels.last() {
        if current.len() <= 1 {
            break;
        }
        let next: Vec<Digest> = current
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        levels.push(next);
    }
    levels
}

/// Sibling path from leaf `index` up to, but excluding, the root
pub fn generate_merkle_proof(index: u64, levels: &[Vec<Digest>]) -> Result<Vec<Digest>, InclusionProofError> {
    let leaves = levels.first().ok_or(InclusionProofError::InvalidTree)?;
    if index >= leaves.len() as u64 {
        return Err(InclusionProofError::InvalidLeaves {
            index,
            len: leaves.len(),
        });
    }
    let mut proof = Vec::with_capacity(levels.len().saturating_sub(1));
    for (i, level) in levels.iter().enumerate().take(levels.len() - 1) {
        let sibling = ((index >> i) ^ 1) as usize;
        let entry = level.get(sibling).ok_or(InclusionProofError::InvalidTree)?;
        proof.push(*entry);
    }
    Ok(proof)
}

/// Root implied by a proof for `leaf` sitting at `index`
pub fn calculate_root_from_proof(proof: &[Digest], index: u64, leaf: &Digest) -> Result<Digest, InclusionProofError> {
    if proof.len() > MAX_PROOF_LEN {
        return Err(InclusionProofError::ProofTooLong(proof.len()));
    }
    let mut h = hash_leaf(leaf);
    for (i, entry) in proof.iter().enumerate() {
        // indices never exceed 64 bits, so higher positions always go left
        let bit = if i < 64 { (index >> i) & 1 } else { 0 };
        h = if bit == 0 {
            hash_pair(&h, entry)
        } else {
            hash_pair(entry, &h)
        };
    }
    Ok(h)
}

/// Single element of the top level
pub fn merkle_root(levels: &[Vec<Digest>]) -> Result<Digest, InclusionProofError> {
    levels
        .last()
        .and_then(|top| top.first())
        .copied()
        .ok_or(InclusionProofError::InvalidTree)
}

/// Check that `leaf` sits at `index` under `root`
pub fn verify_inclusion(root: &Digest, proof: &[Digest], index: u64, leaf: &Digest) -> Result<(), InclusionProofError> {
    let actual = calculate_root_from_proof(proof, index, leaf)?;
    if actual != *root {
        warn!(
            "inclusion proof rejected at index {}: expected {} got {}",
            index,
            root.short(),
            actual.short()
        );
        return Err(InclusionProofError::RootMismatch {
            expected: *root,
            actual,
        });
    }
    Ok(())
}

/// Owned padded tree over a list of items
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct InclusionTree {
    /// Original, unhashed items
    items: Vec<Digest>,

    /// Levels as produced by [`compute_merkle_tree`]
    levels: TreeLevels,
}

impl InclusionTree {
    /// Build the tree over `items`
    pub fn new(items: Vec<Digest>) -> Self {
        let levels = compute_merkle_tree(&items);
        Self { items, levels }
    }

    /// Root of the tree
    pub fn root(&self) -> Result<Digest, InclusionProofError> {
        merkle_root(&self.levels)
    }

    /// Number of levels including leaves and root
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Proof for the item at `index`
    pub fn generate_proof(&self, index: u64) -> Result<Vec<Digest>, InclusionProofError> {
        if index >= self.items.len() as u64 {
            return Err(InclusionProofError::InvalidLeaves {
                index,
                len: self.items.len(),
            });
        }
        generate_merkle_proof(index, &self.levels)
    }

    /// Number of real items, padding excluded
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the tree holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`
    pub fn get_item(&self, index: usize) -> Option<Digest> {
        self.items.get(index).copied()
    }

    /// All levels
    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }
}
