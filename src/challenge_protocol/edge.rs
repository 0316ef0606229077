// src/challenge_protocol/edge.rs
//! Edges of the dispute graph
//!
//! An edge claims that the history between its start and end commitments is
//! correct. Rival edges share a mutual id (same level, origin and start) and
//! differ in their end commitment; at most one of them ever gets confirmed.
//! Edges are values: every move builds new edges and returns them, the
//! caller decides where they are stored.

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::state_commitments::{
    bisect, keccak256_concat, verify_prefix_proof_bytes, Digest, HistoryCommitment, InclusionProofError,
    PrefixProofError,
};
use crate::ProtocolConfig;

use super::one_step::OneStepError;

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            BorshSerialize, BorshDeserialize, Serialize, Deserialize,
        )]
        pub struct $name(pub Digest);

        impl $name {
            /// Underlying digest
            pub fn digest(&self) -> Digest {
                self.0
            }
        }

        impl From<Digest> for $name {
            fn from(d: Digest) -> Self {
                Self(d)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.short())
            }
        }
    };
}

digest_id!(
    /// Unique id of an edge
    EdgeId
);
digest_id!(
    /// Id shared by rival edges
    MutualId
);
digest_id!(
    /// What an edge disputes: a parent assertion, or the mutual id of a
    /// one-step fork one level up
    OriginId
);
digest_id!(
    /// What a level-zero edge vouches for: an assertion, or an edge one level up
    ClaimId
);
digest_id!(
    /// Id of an assertion
    AssertionId
);

impl From<MutualId> for OriginId {
    fn from(id: MutualId) -> Self {
        Self(id.0)
    }
}

impl From<AssertionId> for OriginId {
    fn from(id: AssertionId) -> Self {
        Self(id.0)
    }
}

impl From<AssertionId> for ClaimId {
    fn from(id: AssertionId) -> Self {
        Self(id.0)
    }
}

impl From<EdgeId> for ClaimId {
    fn from(id: EdgeId) -> Self {
        Self(id.0)
    }
}

/// Challenge level, from coarsest to finest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum ChallengeLevel {
    /// Disputes over blocks between two assertions
    Block,
    /// Disputes over large chunks of execution inside one block
    BigStep,
    /// Disputes over single machine steps
    SmallStep,
}

impl ChallengeLevel {
    /// Level a one-step fork at this level opens, if any
    pub fn next(self) -> Option<ChallengeLevel> {
        match self {
            ChallengeLevel::Block => Some(ChallengeLevel::BigStep),
            ChallengeLevel::BigStep => Some(ChallengeLevel::SmallStep),
            ChallengeLevel::SmallStep => None,
        }
    }

    /// Level whose one-step forks open this one
    pub fn prev(self) -> Option<ChallengeLevel> {
        match self {
            ChallengeLevel::Block => None,
            ChallengeLevel::BigStep => Some(ChallengeLevel::Block),
            ChallengeLevel::SmallStep => Some(ChallengeLevel::BigStep),
        }
    }

    /// Byte used when hashing ids
    pub fn as_u8(self) -> u8 {
        match self {
            ChallengeLevel::Block => 0,
            ChallengeLevel::BigStep => 1,
            ChallengeLevel::SmallStep => 2,
        }
    }
}

impl fmt::Display for ChallengeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeLevel::Block => "block",
            ChallengeLevel::BigStep => "big_step",
            ChallengeLevel::SmallStep => "small_step",
        };
        write!(f, "{}", name)
    }
}

/// Edge status
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum EdgeStatus {
    Pending,
    Confirmed,
}

/// Edge errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EdgeError {
    /// Prefix proof or bisection arithmetic failure
    #[error(transparent)]
    PrefixProof(#[from] PrefixProofError),

    /// Inclusion proof failure
    #[error(transparent)]
    InclusionProof(#[from] InclusionProofError),

    /// One-step prover failure
    #[error(transparent)]
    OneStep(#[from] OneStepError),

    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("assertion {0} not found")]
    AssertionNotFound(AssertionId),

    #[error("edge {0} already exists")]
    EdgeExists(EdgeId),

    #[error("edge {0} is not pending")]
    NotPending(EdgeId),

    #[error("edge {0} already has children")]
    AlreadyBisected(EdgeId),

    #[error("edge {0} has no children")]
    NoChildren(EdgeId),

    #[error("children of edge {0} are not both confirmed")]
    ChildrenNotConfirmed(EdgeId),

    #[error("edge {edge} cannot be confirmed, rival {rival} is already confirmed")]
    RivalAlreadyConfirmed { edge: EdgeId, rival: EdgeId },

    #[error("edge {0} is not a level-zero edge")]
    NotLevelZero(EdgeId),

    #[error("claim {claim} does not match edge {edge}")]
    ClaimMismatch { edge: EdgeId, claim: ClaimId },

    #[error("claim {0} is not confirmed")]
    ClaimNotConfirmed(ClaimId),

    #[error("claiming edge {0} is not confirmed")]
    ClaimingEdgeNotConfirmed(EdgeId),

    #[error("claim {0} is not a one-step fork")]
    ClaimNotOneStepFork(ClaimId),

    #[error("origin {origin} does not match claim {claim}")]
    OriginMismatch { origin: OriginId, claim: ClaimId },

    #[error("{level} level cannot be used here")]
    InvalidLevel { level: ChallengeLevel },

    #[error("invalid heights: start {start}, end {end}, expected end {expected}")]
    InvalidHeights { start: u64, end: u64, expected: u64 },

    #[error("edge {0} is not a single small step")]
    NotOneStepEdge(EdgeId),

    #[error("one-step post state root mismatch: expected {expected}, got {actual}")]
    PostStateMismatch { expected: Digest, actual: Digest },

    #[error("{ancestor} is neither parent nor claim of {child}")]
    InvalidAncestor { child: EdgeId, ancestor: EdgeId },

    #[error("edge {edge} timer {timer} below challenge period {required}")]
    TimerNotExpired { edge: EdgeId, timer: u64, required: u64 },

    #[error("start state mismatch: expected {expected}, got {actual}")]
    StartStateMismatch { expected: Digest, actual: Digest },

    #[error("end state mismatch: expected {expected}, got {actual}")]
    EndStateMismatch { expected: Digest, actual: Digest },
}

/// Hash of the fields identifying an edge
pub fn calculate_edge_id(
    level: ChallengeLevel,
    origin_id: &OriginId,
    start: &HistoryCommitment,
    end: &HistoryCommitment,
) -> EdgeId {
    EdgeId(keccak256_concat(&[
        &[level.as_u8()],
        origin_id.0.as_bytes(),
        &height_word(start.height),
        start.merkle.as_bytes(),
        &height_word(end.height),
        end.merkle.as_bytes(),
    ]))
}

/// Hash shared by every rival of an edge
pub fn calculate_mutual_id(level: ChallengeLevel, origin_id: &OriginId, start: &HistoryCommitment) -> MutualId {
    MutualId(keccak256_concat(&[
        &[level.as_u8()],
        origin_id.0.as_bytes(),
        &height_word(start.height),
        start.merkle.as_bytes(),
    ]))
}

/// Height as a 32-byte big-endian word
fn height_word(height: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&height.to_be_bytes());
    word
}

/// An edge of the dispute graph
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub level: ChallengeLevel,
    pub origin_id: OriginId,
    pub mutual_id: MutualId,
    pub start: HistoryCommitment,
    pub end: HistoryCommitment,
    /// Set on level-zero edges only
    pub claim_id: Option<ClaimId>,
    pub lower_child_id: Option<EdgeId>,
    pub upper_child_id: Option<EdgeId>,
    pub created_at_block: u64,
    /// Set on level-zero edges only
    pub mini_staker: Option<[u8; 20]>,
    pub status: EdgeStatus,
}

/// Result of bisecting an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bisection {
    /// The bisected edge, with its child ids recorded
    pub parent: Edge,
    pub lower: Edge,
    pub upper: Edge,
}

impl Edge {
    fn build(
        level: ChallengeLevel,
        origin_id: OriginId,
        start: HistoryCommitment,
        end: HistoryCommitment,
        claim_id: Option<ClaimId>,
        created_at_block: u64,
        mini_staker: Option<[u8; 20]>,
    ) -> Self {
        Self {
            id: calculate_edge_id(level, &origin_id, &start, &end),
            level,
            origin_id,
            mutual_id: calculate_mutual_id(level, &origin_id, &start),
            start,
            end,
            claim_id,
            lower_child_id: None,
            upper_child_id: None,
            created_at_block,
            mini_staker,
            status: EdgeStatus::Pending,
        }
    }

    /// Level-zero edge of a block challenge.
    ///
    /// `origin` is the parent assertion both rivals build on, `claim` the
    /// assertion this edge vouches for. `prefix_proof` must show that `start`
    /// is a prefix of `end`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_block_level_zero(
        config: &ProtocolConfig,
        origin: AssertionId,
        claim: AssertionId,
        start: HistoryCommitment,
        end: HistoryCommitment,
        prefix_proof: &[u8],
        created_at_block: u64,
        mini_staker: Option<[u8; 20]>,
    ) -> Result<Self, EdgeError> {
        Self::new_level_zero(
            config,
            ChallengeLevel::Block,
            origin.into(),
            claim.into(),
            start,
            end,
            prefix_proof,
            created_at_block,
            mini_staker,
        )
    }

    /// Level-zero edge of a subchallenge opened by a one-step fork.
    ///
    /// `origin` is the mutual id of the fork, `claim` the id of the edge one
    /// level up this edge vouches for.
    #[allow(clippy::too_many_arguments)]
    pub fn new_subchallenge_level_zero(
        config: &ProtocolConfig,
        level: ChallengeLevel,
        origin: MutualId,
        claim: EdgeId,
        start: HistoryCommitment,
        end: HistoryCommitment,
        prefix_proof: &[u8],
        created_at_block: u64,
        mini_staker: Option<[u8; 20]>,
    ) -> Result<Self, EdgeError> {
        if level == ChallengeLevel::Block {
            return Err(EdgeError::InvalidLevel { level });
        }
        Self::new_level_zero(
            config,
            level,
            origin.into(),
            claim.into(),
            start,
            end,
            prefix_proof,
            created_at_block,
            mini_staker,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new_level_zero(
        config: &ProtocolConfig,
        level: ChallengeLevel,
        origin_id: OriginId,
        claim_id: ClaimId,
        start: HistoryCommitment,
        end: HistoryCommitment,
        prefix_proof: &[u8],
        created_at_block: u64,
        mini_staker: Option<[u8; 20]>,
    ) -> Result<Self, EdgeError> {
        let expected = config.layer_zero_heights.for_level(level);
        if start.height != 0 || end.height != expected {
            return Err(EdgeError::InvalidHeights {
                start: start.height,
                end: end.height,
                expected,
            });
        }
        verify_prefix_proof_bytes(start.merkle, start.height + 1, end.merkle, end.height + 1, prefix_proof)?;

        let edge = Self::build(
            level,
            origin_id,
            start,
            end,
            Some(claim_id),
            created_at_block,
            mini_staker,
        );
        debug!("built {} level-zero edge {:?} claiming {:?}", level, edge.id, claim_id);
        Ok(edge)
    }

    /// Number of steps between start and end
    pub fn length(&self) -> u64 {
        self.end.height.saturating_sub(self.start.height)
    }

    /// Whether this edge spans a single step
    pub fn has_length_one(&self) -> bool {
        self.length() == 1
    }

    /// Whether the edge is a level-zero edge
    pub fn is_level_zero(&self) -> bool {
        self.claim_id.is_some()
    }

    /// Whether the edge can open a subchallenge once it is rivaled
    pub fn is_one_step_fork_source(&self) -> bool {
        self.has_length_one() && self.level.next().is_some()
    }

    /// Whether the edge was bisected
    pub fn has_children(&self) -> bool {
        self.lower_child_id.is_some() || self.upper_child_id.is_some()
    }

    /// Whether the edge is confirmed
    pub fn is_confirmed(&self) -> bool {
        self.status == EdgeStatus::Confirmed
    }

    /// Split the edge at its bisection point.
    ///
    /// `prefix_history_root` commits to the history up to the split point and
    /// `prefix_proof` is the encoded proof that it is a prefix of the end
    /// commitment. Children inherit level and origin; they carry no claim.
    pub fn bisect(
        &self,
        prefix_history_root: Digest,
        prefix_proof: &[u8],
        created_at_block: u64,
    ) -> Result<Bisection, EdgeError> {
        if self.status != EdgeStatus::Pending {
            return Err(EdgeError::NotPending(self.id));
        }
        if self.has_children() {
            return Err(EdgeError::AlreadyBisected(self.id));
        }
        let mid = bisect(self.start.height, self.end.height)?;
        verify_prefix_proof_bytes(
            prefix_history_root,
            mid + 1,
            self.end.merkle,
            self.end.height + 1,
            prefix_proof,
        )?;

        let mid_commit = HistoryCommitment::new(mid, prefix_history_root);
        let lower = Self::build(self.level, self.origin_id, self.start, mid_commit, None, created_at_block, None);
        let upper = Self::build(self.level, self.origin_id, mid_commit, self.end, None, created_at_block, None);

        let mut parent = self.clone();
        parent.lower_child_id = Some(lower.id);
        parent.upper_child_id = Some(upper.id);
        Ok(Bisection { parent, lower, upper })
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} edge {} [{} -> {}] {:?}",
            self.level,
            self.id.0.short(),
            self.start,
            self.end,
            self.status
        )
    }
}
