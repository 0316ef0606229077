// src/state_commitments/history.rs
//! History commitments
//!
//! A history commitment pins down a prefix of an execution history: the
//! height of its last state and the expansion root over every state up to
//! and including that height. Heights are 0-indexed, so a commitment at
//! height `h` covers `h + 1` states and is never empty.
//!
//! The expansion root is the root of a left-packed binary tree whose empty
//! subtrees are the zero digest, so single states can also be proven against
//! it with ordinary sibling paths (see [`HistoryCommitment::inclusion_proof`]).

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::digest::{hash_leaf, hash_pair, Digest};
use super::inclusion_tree::{self, InclusionProofError};
use super::merkle_expansion::MerkleExpansion;
use super::prefix_proof::{
    expansion_root_fetcher, generate_prefix_proof, PrefixProofError, PrefixProofPayload, RootFetcher,
};

/// Height and root of a history prefix
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct HistoryCommitment {
    /// Height of the last committed state
    pub height: u64,

    /// Expansion root over states `0..=height`
    pub merkle: Digest,
}

impl HistoryCommitment {
    /// Wrap a known height and root
    pub fn new(height: u64, merkle: Digest) -> Self {
        Self { height, merkle }
    }

    /// Commit to all of `leaves`
    pub fn from_leaves(leaves: &[Digest]) -> Result<Self, PrefixProofError> {
        if leaves.is_empty() {
            return Err(PrefixProofError::RootForEmpty);
        }
        let merkle = MerkleExpansion::from_leaves(leaves)?.root()?;
        Ok(Self {
            height: leaves.len() as u64 - 1,
            merkle,
        })
    }

    /// Commit to `leaves[..=height]`
    pub fn at_height(leaves: &[Digest], height: u64) -> Result<Self, PrefixProofError> {
        let end = checked_end(leaves, height)?;
        Self::from_leaves(&leaves[..end])
    }

    /// Encoded prefix proof showing that the commitment at height `from` is a
    /// prefix of the commitment at height `to`, both over `leaves`
    pub fn prefix_proof(leaves: &[Digest], from: u64, to: u64) -> Result<Vec<u8>, PrefixProofError> {
        Self::prefix_proof_with(leaves, from, to, &expansion_root_fetcher)
    }

    /// Same as [`HistoryCommitment::prefix_proof`] with subtree roots taken from
    /// `root_fetcher`
    pub fn prefix_proof_with<R: RootFetcher>(
        leaves: &[Digest],
        from: u64,
        to: u64,
        root_fetcher: &R,
    ) -> Result<Vec<u8>, PrefixProofError> {
        if from >= to {
            return Err(PrefixProofError::StartNotLessThanEnd { start: from, end: to });
        }
        let pre_end = checked_end(leaves, from)?;
        let post_end = checked_end(leaves, to)?;
        let pre_expansion = MerkleExpansion::from_leaves(&leaves[..pre_end])?;
        let proof = generate_prefix_proof(
            pre_end as u64,
            &pre_expansion,
            &leaves[pre_end..post_end],
            root_fetcher,
        )?;
        Ok(PrefixProofPayload { pre_expansion, proof }.encode())
    }

    /// Sibling path proving `leaves[index]` against the commitment over all of `leaves`
    pub fn inclusion_proof(leaves: &[Digest], index: u64) -> Result<Vec<Digest>, InclusionProofError> {
        let levels = history_tree_levels(leaves);
        inclusion_tree::generate_merkle_proof(index, &levels)
    }

    /// Check that `leaf` is the state at `index` in this commitment
    pub fn verify_inclusion(&self, index: u64, leaf: &Digest, proof: &[Digest]) -> Result<(), InclusionProofError> {
        if index > self.height {
            return Err(InclusionProofError::InvalidLeaves {
                index,
                len: (self.height + 1) as usize,
            });
        }
        inclusion_tree::verify_inclusion(&self.merkle, proof, index, leaf)
    }
}

/// A history commitment together with its endpoint states.
///
/// `last_leaf_proof` proves `last_leaf` at `commitment.height`, which is what
/// ties a commitment to the state it claims to end in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub commitment: HistoryCommitment,
    pub first_leaf: Digest,
    pub last_leaf: Digest,
    pub last_leaf_proof: Vec<Digest>,
}

impl History {
    /// Commit to `leaves` padded to `virtual_len` states; see [`virtual_leaves`]
    pub fn new(leaves: &[Digest], virtual_len: u64) -> Result<Self, PrefixProofError> {
        let padded = virtual_leaves(leaves, virtual_len)?;
        let commitment = HistoryCommitment::from_leaves(&padded)?;
        let last_leaf_proof = HistoryCommitment::inclusion_proof(&padded, commitment.height)
            .map_err(|_| PrefixProofError::IndexOutOfRange)?;
        Ok(Self {
            commitment,
            first_leaf: padded[0],
            last_leaf: padded[padded.len() - 1],
            last_leaf_proof,
        })
    }
}

/// Extend `leaves` to `virtual_len` states by repeating the last one.
///
/// A history that stopped early is treated as having stayed in its final
/// state, so every participant commits at the full layer-zero height.
pub fn virtual_leaves(leaves: &[Digest], virtual_len: u64) -> Result<Vec<Digest>, PrefixProofError> {
    let last = *leaves.last().ok_or(PrefixProofError::RootForEmpty)?;
    if virtual_len < leaves.len() as u64 {
        return Err(PrefixProofError::VirtualTooShort {
            leaves: leaves.len() as u64,
            virtual_len,
        });
    }
    let mut padded = leaves.to_vec();
    padded.resize(virtual_len as usize, last);
    Ok(padded)
}

impl fmt::Display for HistoryCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "height={} merkle={}", self.height, self.merkle.short())
    }
}

fn checked_end(leaves: &[Digest], height: u64) -> Result<usize, PrefixProofError> {
    if height >= leaves.len() as u64 {
        return Err(PrefixProofError::IndexOutOfRange);
    }
    Ok(height as usize + 1)
}

/// Levels of the left-packed tree whose root is the expansion root.
///
/// Same shape as the padded inclusion tree, except that a node covering no
/// states is the zero digest itself rather than a hash of zeros.
fn history_tree_levels(leaves: &[Digest]) -> Vec<Vec<Digest>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let width = leaves.len().next_power_of_two();
    let mut bottom: Vec<Digest> = leaves.iter().map(hash_leaf).collect();
    bottom.resize(width, Digest::ZERO);

    let mut levels = vec![bottom];
    while let Some(current) = levels.last() {
        if current.len() <= 1 {
            break;
        }
        let next: Vec<Digest> = current
            .chunks_exact(2)
            .map(|pair| {
                if pair[0].is_zero() && pair[1].is_zero() {
                    Digest::ZERO
                } else {
                    hash_pair(&pair[0], &pair[1])
                }
            })
            .collect();
        levels.push(next);
    }
    levels
}
