// src/state_commitments/mod.rs
//! State commitments for the dispute protocol
//!
//! This module holds everything needed to commit to an execution history and
//! to prove facts about those commitments:
//! - Digest primitive and Keccak-256 helpers
//! - Merkle expansions (append-only accumulator)
//! - Bisection arithmetic
//! - Prefix proof generation and verification
//! - Padded inclusion trees
//! - History commitments
//!
//! Everything here is pure: functions take their inputs by reference and
//! return fresh values, so they can be called from any thread.

pub mod bit_math;
pub mod digest;
pub mod history;
pub mod inclusion_tree;
pub mod merkle_expansion;
pub mod prefix_proof;

pub use bit_math::{bisect, least_significant_bit, maximum_append_between, most_significant_bit};
pub use digest::{hash_for_u64, hash_leaf, hash_pair, keccak256, keccak256_concat, Digest, DigestParseError};
pub use history::{virtual_leaves, History, HistoryCommitment};
pub use inclusion_tree::{
    calculate_root_from_proof, compute_merkle_tree, generate_merkle_proof, merkle_root, verify_inclusion,
    InclusionProofError, InclusionTree, MAX_PROOF_LEN,
};
pub use merkle_expansion::{MerkleExpansion, MAX_LEVEL};
pub use prefix_proof::{
    expansion_root_fetcher, generate_prefix_proof, verify_prefix_proof, verify_prefix_proof_bytes, PrefixProof,
    PrefixProofError, PrefixProofPayload, RootFetcher, VerifyPrefixProofConfig,
};
