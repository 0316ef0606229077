// src/state_commitments/digest.rs
//! Digest primitive for the dispute core
//!
//! Every commitment, proof entry and identifier in the protocol is a 32-byte
//! Keccak-256 output. The all-zero digest is reserved as the "empty" sentinel
//! and never appears as a real commitment value.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha3::{Digest as _, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing digests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestParseError {
    /// Input was not valid hex
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),

    /// Input had the wrong number of bytes
    #[error("digest must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte hash output
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// The reserved empty sentinel
    pub const ZERO: Digest = Digest([0; 32]);

    /// Length of a digest in bytes
    pub const LEN: usize = 32;

    /// Wrap raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Copy a digest out of a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestParseError> {
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| DigestParseError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// Whether this is the empty sentinel
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes in hex, used in log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(0x{})", hex::encode(self.0))
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| DigestParseError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Digest {
    let out = Keccak256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    Digest(hash)
}

/// Keccak-256 over the concatenation of several byte strings
pub fn keccak256_concat(parts: &[&[u8]]) -> Digest {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let out = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    Digest(hash)
}

/// Hash two nodes together, left then right
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    keccak256_concat(&[left.as_bytes(), right.as_bytes()])
}

/// Pre-hash a leaf before it enters a tree.
///
/// Leaves are 32-byte preimages while internal nodes always hash 64 bytes,
/// so a hashed leaf can never collide with an internal node.
pub fn hash_leaf(leaf: &Digest) -> Digest {
    keccak256(leaf.as_bytes())
}

/// Hash of a big-endian u64, handy for building deterministic test states
pub fn hash_for_u64(x: u64) -> Digest {
    keccak256(&x.to_be_bytes())
}
