// src/state_commitments/prefix_proof.rs
//! Prefix proofs between history commitments
//!
//! A prefix proof shows that the leaves committed by a smaller root are an
//! exact prefix of the leaves committed by a larger root. The verifier starts
//! from the expansion of the smaller tree and appends complete subtrees until
//! it reaches the larger size; the proof is just the roots of those subtrees.
//! Generation walks through the very same `maximum_append_between` decisions,
//! so a proof has exactly one entry per appended subtree.

use log::debug;
use thiserror::Error;

use super::bit_math::maximum_append_between;
use super::digest::Digest;
use super::merkle_expansion::{self, MerkleExpansion};

/// Errors raised while building, appending to or verifying Merkle expansions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixProofError {
    /// Expansion uses too many levels
    #[error("level too high")]
    LevelTooHigh,

    /// Expansion handed to an append already exceeds the level limit
    #[error("merkle expansion too large")]
    ExpansionTooLarge,

    /// Root requested for a tree with no leaves
    #[error("cannot calculate root for empty")]
    RootForEmpty,

    /// Claimed size does not match the expansion
    #[error("tree size incorrect: expected {expected}, got {actual}")]
    TreeSize { expected: u64, actual: u64 },

    /// Zero sentinel cannot be appended
    #[error("cannot append empty")]
    CannotAppendEmpty,

    /// Append would leave a hole below the appended level
    #[error("cannot append above least significant")]
    CannotAppendAboveLeastSignificant,

    /// Range is empty or reversed
    #[error("start {start} not less than end {end}")]
    StartNotLessThanEnd { start: u64, end: u64 },

    /// Bit query on zero
    #[error("cannot be zero")]
    CannotBeZero,

    /// Range too small to split
    #[error("unable to bisect range {pre}..{post}")]
    UnableToBisect { pre: u64, post: u64 },

    /// Recomputed root differs from the claimed one
    #[error("root mismatch: expected {expected}, got {actual}")]
    RootMismatch { expected: Digest, actual: Digest },

    /// Proof entries left over after reaching the post size
    #[error("incomplete proof usage: used {used} of {len} entries")]
    IncompleteProof { used: usize, len: usize },

    /// Appending overshot the post size
    #[error("size {size} not <= post size {post_size}")]
    SizeNotLeqPostSize { size: u64, post_size: u64 },

    /// Proof ran out of entries
    #[error("index out of range")]
    IndexOutOfRange,

    /// Proof bytes are not a whole number of digests
    #[error("malformed proof bytes: length {0} is not a multiple of 32")]
    MalformedProofBytes(usize),

    /// Root fetcher failed while generating a proof
    #[error("root fetcher failed: {0}")]
    RootFetcher(String),

    /// Virtual history length shorter than the real one
    #[error("virtual length {virtual_len} below {leaves} leaves")]
    VirtualTooShort { leaves: u64, virtual_len: u64 },
}

/// Ordered roots of the complete subtrees appended between two sizes
pub type PrefixProof = Vec<Digest>;

/// Source of subtree roots used while generating a prefix proof.
///
/// `leaves` is the not-yet-consumed tail of the leaves being appended; the
/// fetcher must return the root of the first `count` of them.
pub trait RootFetcher {
    /// Error reported by the fetcher
    type Error: std::fmt::Display;

    /// Root of the complete subtree over the first `count` remaining leaves
    fn fetch_root(&self, leaves: &[Digest], count: u64) -> Result<Digest, Self::Error>;
}

impl<F, E> RootFetcher for F
where
    F: Fn(&[Digest], u64) -> Result<Digest, E>,
    E: std::fmt::Display,
{
    type Error = E;

    fn fetch_root(&self, leaves: &[Digest], count: u64) -> Result<Digest, E> {
        self(leaves, count)
    }
}

/// Computes subtree roots locally by building their expansions
pub fn expansion_root_fetcher(leaves: &[Digest], count: u64) -> Result<Digest, PrefixProofError> {
    let chunk = leaves
        .get(..count as usize)
        .ok_or(PrefixProofError::IndexOutOfRange)?;
    MerkleExpansion::from_leaves(chunk)?.root()
}

/// Generate the proof that a tree of `prefix_height` leaves is a prefix of the
/// tree obtained after appending `leaves` to it.
pub fn generate_prefix_proof<R: RootFetcher>(
    prefix_height: u64,
    prefix_expansion: &MerkleExpansion,
    leaves: &[Digest],
    root_fetcher: &R,
) -> Result<PrefixProof, PrefixProofError> {
    let actual = prefix_expansion.tree_size();
    if actual != prefix_height {
        return Err(PrefixProofError::TreeSize {
            expected: prefix_height,
            actual,
        });
    }
    let post_height = prefix_height + leaves.len() as u64;
    if prefix_height >= post_height {
        return Err(PrefixProofError::StartNotLessThanEnd {
            start: prefix_height,
            end: post_height,
        });
    }

    let mut proof = Vec::new();
    let mut remaining = leaves;
    let mut height = prefix_height;
    while height < post_height {
        let level = maximum_append_between(height, post_height)?;
        let num_leaves = 1u64 << level;
        let root = root_fetcher
            .fetch_root(remaining, num_leaves)
            .map_err(|e| PrefixProofError::RootFetcher(e.to_string()))?;
        proof.push(root);
        remaining = &remaining[num_leaves as usize..];
        height += num_leaves;
    }
    debug!(
        "generated prefix proof {}..{} with {} entries",
        prefix_height,
        post_height,
        proof.len()
    );
    Ok(proof)
}

/// Inputs of a prefix proof verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyPrefixProofConfig {
    pub pre_root: Digest,
    pub pre_size: u64,
    pub post_root: Digest,
    pub post_size: u64,
    pub pre_expansion: MerkleExpansion,
    pub prefix_proof: PrefixProof,
}

/// Verify that `pre_root` commits to a prefix of the leaves under `post_root`.
pub fn verify_prefix_proof(cfg: &VerifyPrefixProofConfig) -> Result<(), PrefixProofError> {
    if cfg.pre_size == 0 {
        return Err(PrefixProofError::CannotBeZero);
    }
    let root = cfg.pre_expansion.root()?;
    if root != cfg.pre_root {
        return Err(PrefixProofError::RootMismatch {
            expected: cfg.pre_root,
            actual: root,
        });
    }
    let actual = cfg.pre_expansion.tree_size();
    if cfg.pre_size != actual {
        return Err(PrefixProofError::TreeSize {
            expected: cfg.pre_size,
            actual,
        });
    }
    if cfg.pre_size >= cfg.post_size {
        return Err(PrefixProofError::StartNotLessThanEnd {
            start: cfg.pre_size,
            end: cfg.post_size,
        });
    }

    let mut expansion = cfg.pre_expansion.levels().to_vec();
    let mut size = cfg.pre_size;
    let mut proof_index = 0usize;
    while size < cfg.post_size {
        let level = maximum_append_between(size, cfg.post_size)?;
        let entry = cfg
            .prefix_proof
            .get(proof_index)
            .ok_or(PrefixProofError::IndexOutOfRange)?;
        expansion = merkle_expansion::append_complete_subtree(&expansion, level, entry)?;
        size += 1u64 << level;
        if size > cfg.post_size {
            return Err(PrefixProofError::SizeNotLeqPostSize {
                size,
                post_size: cfg.post_size,
            });
        }
        proof_index += 1;
    }

    let post_root = merkle_expansion::root(&expansion)?;
    if post_root != cfg.post_root {
        return Err(PrefixProofError::RootMismatch {
            expected: cfg.post_root,
            actual: post_root,
        });
    }
    if proof_index != cfg.prefix_proof.len() {
        return Err(PrefixProofError::IncompleteProof {
            used: proof_index,
            len: cfg.prefix_proof.len(),
        });
    }
    Ok(())
}

/// Prefix proof as submitted to the ledger: the compact pre-expansion
/// followed by the appended subtree roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixProofPayload {
    pub pre_expansion: MerkleExpansion,
    pub proof: PrefixProof,
}

impl PrefixProofPayload {
    /// Flat concatenation of 32-byte digests, no length prefix
    pub fn encode(&self) -> Vec<u8> {
        let (compact, _) = self.pre_expansion.compact();
        encode_digests(compact.iter().chain(self.proof.iter()))
    }

    /// Split encoded bytes back into the pre-expansion of `pre_size` leaves
    /// and the proof entries
    pub fn decode(bytes: &[u8], pre_size: u64) -> Result<Self, PrefixProofError> {
        let digests = decode_digests(bytes)?;
        let (pre_expansion, consumed) = MerkleExpansion::from_compact(&digests, pre_size)?;
        Ok(Self {
            pre_expansion,
            proof: digests[consumed..].to_vec(),
        })
    }
}

/// Decode an encoded payload and verify it between two committed trees
pub fn verify_prefix_proof_bytes(
    pre_root: Digest,
    pre_size: u64,
    post_root: Digest,
    post_size: u64,
    bytes: &[u8],
) -> Result<(), PrefixProofError> {
    let payload = PrefixProofPayload::decode(bytes, pre_size)?;
    verify_prefix_proof(&VerifyPrefixProofConfig {
        pre_root,
        pre_size,
        post_root,
        post_size,
        pre_expansion: payload.pre_expansion,
        prefix_proof: payload.proof,
    })
}

/// Serialize digests as raw concatenated bytes
pub fn encode_digests<'a, I>(digests: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Digest>,
{
    let mut out = Vec::new();
    for digest in digests {
        out.extend_from_slice(digest.as_bytes());
    }
    out
}

/// Parse raw concatenated digests
pub fn decode_digests(bytes: &[u8]) -> Result<Vec<Digest>, PrefixProofError> {
    if bytes.len() % Digest::LEN != 0 {
        return Err(PrefixProofError::MalformedProofBytes(bytes.len()));
    }
    bytes
        .chunks_exact(Digest::LEN)
        .map(|chunk| Digest::from_slice(chunk).map_err(|_| PrefixProofError::MalformedProofBytes(bytes.len())))
        .collect()
}
