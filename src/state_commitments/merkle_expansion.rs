// src/state_commitments/merkle_expansion.rs
//! Merkle expansion (append-only accumulator)
//!
//! A tree of any size is a collection of complete subtrees, at most one per
//! level, exactly like the set bits of a binary number. A Merkle expansion
//! keeps only the root of each of those subtrees, indexed by level:
//!
//! ```text
//!    AB
//!   /  \
//!  A    B    C        expansion = [C, AB], size = 3
//! ```
//!
//! Appending a complete subtree works like binary addition: the new root is
//! carried upwards, merging with every occupied level it meets, until it
//! lands on an empty level. Subtrees may only be appended at or below the
//! lowest occupied level, otherwise the tree would get holes.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use super::digest::{hash_leaf, hash_pair, Digest};
use super::prefix_proof::PrefixProofError;

/// Number of levels an expansion may use
pub const MAX_LEVEL: u64 = 64;

/// Roots of complete subtrees, indexed by level
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct MerkleExpansion(Vec<Digest>);

impl MerkleExpansion {
    /// An expansion of the empty tree
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Wrap raw levels without validation
    pub fn from_levels(levels: Vec<Digest>) -> Self {
        Self(levels)
    }

    /// Build the expansion of a sequence of leaves
    pub fn from_leaves(leaves: &[Digest]) -> Result<Self, PrefixProofError> {
        leaves
            .iter()
            .try_fold(Self::new(), |exp, leaf| exp.append_leaf(leaf))
    }

    /// Raw levels, lowest first
    pub fn levels(&self) -> &[Digest] {
        &self.0
    }

    /// Number of level slots, occupied or not
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the expansion has no level slots at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// See [`root`]
    pub fn root(&self) -> Result<Digest, PrefixProofError> {
        root(&self.0)
    }

    /// See [`tree_size`]
    pub fn tree_size(&self) -> u64 {
        tree_size(&self.0)
    }

    /// See [`append_complete_subtree`]
    pub fn append_complete_subtree(
        &self,
        level: u64,
        subtree_root: &Digest,
    ) -> Result<Self, PrefixProofError> {
        append_complete_subtree(&self.0, level, subtree_root).map(Self)
    }

    /// See [`append_leaf`]
    pub fn append_leaf(&self, leaf: &Digest) -> Result<Self, PrefixProofError> {
        append_leaf(&self.0, leaf).map(Self)
    }

    /// Occupied levels only, lowest first, together with the tree size they encode
    pub fn compact(&self) -> (Vec<Digest>, u64) {
        let mut entries = Vec::new();
        let mut size = 0u64;
        for (level, hash) in self.0.iter().enumerate().take(MAX_LEVEL as usize) {
            if !hash.is_zero() {
                entries.push(*hash);
                size += 1u64 << level;
            }
        }
        (entries, size)
    }

    /// Rebuild an expansion from its compact form.
    ///
    /// Returns the expansion and how many entries of `compact` were consumed;
    /// extra trailing entries are left for the caller.
    pub fn from_compact(compact: &[Digest], size: u64) -> Result<(Self, usize), PrefixProofError> {
        let mut levels = Vec::new();
        let mut consumed = 0usize;
        for level in 0..MAX_LEVEL {
            if (size >> level) == 0 {
                break;
            }
            if size & (1u64 << level) != 0 {
                let entry = compact
                    .get(consumed)
                    .ok_or(PrefixProofError::IndexOutOfRange)?;
                levels.push(*entry);
                consumed += 1;
            } else {
                levels.push(Digest::ZERO);
            }
        }
        Ok((Self(levels), consumed))
    }
}

/// Root of a tree given its expansion.
///
/// Levels are folded from the bottom up. The first occupied level is padded
/// with a zero sibling unless it is the top level, empty levels above it are
/// padded with zero on the right, and larger subtrees hash on the left.
pub fn root(me: &[Digest]) -> Result<Digest, PrefixProofError> {
    if me.len() as u64 >= MAX_LEVEL {
        return Err(PrefixProofError::LevelTooHigh);
    }
    let mut accum = Digest::ZERO;
    for (i, val) in me.iter().enumerate() {
        if accum.is_zero() {
            if !val.is_zero() {
                accum = *val;
                if i != me.len() - 1 {
                    accum = hash_pair(&accum, &Digest::ZERO);
                }
            }
        } else if !val.is_zero() {
            accum = hash_pair(val, &accum);
        } else {
            accum = hash_pair(&accum, &Digest::ZERO);
        }
    }
    if accum.is_zero() {
        return Err(PrefixProofError::RootForEmpty);
    }
    Ok(accum)
}

/// Number of leaves represented by an expansion
pub fn tree_size(me: &[Digest]) -> u64 {
    me.iter()
        .take(MAX_LEVEL as usize)
        .enumerate()
        .filter(|(_, hash)| !hash.is_zero())
        .fold(0u64, |sum, (level, _)| sum.wrapping_add(1u64 << level))
}

/// Append a complete subtree of `2^level` leaves whose root is `subtree_root`.
pub fn append_complete_subtree(
    me: &[Digest],
    level: u64,
    subtree_root: &Digest,
) -> Result<Vec<Digest>, PrefixProofError> {
    if level >= MAX_LEVEL {
        return Err(PrefixProofError::LevelTooHigh);
    }
    if subtree_root.is_zero() {
        return Err(PrefixProofError::CannotAppendEmpty);
    }
    if me.len() as u64 > MAX_LEVEL {
        return Err(PrefixProofError::ExpansionTooLarge);
    }

    if me.is_empty() {
        let mut empty = vec![Digest::ZERO; level as usize + 1];
        empty[level as usize] = *subtree_root;
        return Ok(empty);
    }

    // a subtree may only land inside the current expansion width
    if level >= me.len() as u64 {
        return Err(PrefixProofError::LevelTooHigh);
    }

    let level = level as usize;
    if me[..level].iter().any(|hash| !hash.is_zero()) {
        return Err(PrefixProofError::CannotAppendAboveLeastSignificant);
    }

    let mut next = me.to_vec();
    let mut carry = *subtree_root;
    for slot in next.iter_mut().skip(level) {
        if slot.is_zero() {
            *slot = carry;
            carry = Digest::ZERO;
            break;
        }
        carry = hash_pair(slot, &carry);
        *slot = Digest::ZERO;
    }

    if !carry.is_zero() {
        next.push(carry);
    }
    if next.len() as u64 >= MAX_LEVEL + 1 {
        return Err(PrefixProofError::LevelTooHigh);
    }
    Ok(next)
}

/// Append a single leaf; the leaf is hashed first.
pub fn append_leaf(me: &[Digest], leaf: &Digest) -> Result<Vec<Digest>, PrefixProofError> {
    append_complete_subtree(me, 0, &hash_leaf(leaf))
}
