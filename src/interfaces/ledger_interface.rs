// src/interfaces/ledger_interface.rs
//! Standard interface for the on-chain challenge manager
//!
//! Reads return mirrored ledger values; writes submit a move and may revert.
//! A revert is an ordinary error: the caller logs it and carries on.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Cancellation;
use crate::challenge_protocol::{
    calculate_edge_id, Assertion, AssertionId, ChallengeLevel, ClaimId, Edge, EdgeError, EdgeId, OneStepData,
    OriginId,
};
use crate::state_commitments::{Digest, HistoryCommitment};

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Move rejected by the challenge manager
    #[error("move reverted: {0}")]
    Reverted(String),

    /// Submission interrupted by the cancellation signal
    #[error("ledger call cancelled")]
    Cancelled,

    /// Unknown edge or assertion
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection or transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<EdgeError> for LedgerError {
    fn from(err: EdgeError) -> Self {
        match err {
            EdgeError::EdgeNotFound(_) | EdgeError::AssertionNotFound(_) => LedgerError::NotFound(err.to_string()),
            other => LedgerError::Reverted(other.to_string()),
        }
    }
}

/// Level-zero edge submission
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct LevelZeroEdgeRequest {
    pub level: ChallengeLevel,
    pub origin_id: OriginId,
    pub claim_id: ClaimId,
    pub start: HistoryCommitment,
    pub end: HistoryCommitment,
    /// Encoded prefix proof from `start` to `end`
    pub prefix_proof: Vec<u8>,
    /// The single state committed by `start`
    pub start_state: Digest,
    /// Last state committed by `end`
    pub end_state: Digest,
    /// Proves `end_state` at the height of `end`
    pub end_inclusion: Vec<Digest>,
    /// Proves `start_state` at the start height of the claimed edge; empty at block level
    pub start_parent_inclusion: Vec<Digest>,
    /// Proves `end_state` at the end height of the claimed edge; empty at block level
    pub end_parent_inclusion: Vec<Digest>,
    pub mini_staker: Option<[u8; 20]>,
}

/// Standard interface for the challenge manager
pub trait ChallengeLedger {
    /// Edge by id
    fn get_edge(&self, id: &EdgeId) -> Result<Edge, LedgerError>;

    /// Assertion by id
    fn get_assertion(&self, id: &AssertionId) -> Result<Assertion, LedgerError>;

    /// Id an edge with these fields would get
    fn calculate_edge_id(
        &self,
        level: ChallengeLevel,
        origin_id: &OriginId,
        start: &HistoryCommitment,
        end: &HistoryCommitment,
    ) -> EdgeId {
        calculate_edge_id(level, origin_id, start, end)
    }

    /// Blocks an edge path must stay unrivaled before it confirms by timer
    fn challenge_period_blocks(&self) -> u64;

    /// Blocks the edge spent without a rival
    fn time_unrivaled(&self, id: &EdgeId) -> Result<u64, LedgerError>;

    /// Ancestor chain of an edge up to its block-level root, child first
    fn compute_ancestors(&self, id: &EdgeId) -> Result<Vec<EdgeId>, LedgerError>;

    /// Submit a level-zero edge
    fn add_level_zero_edge(
        &mut self,
        request: LevelZeroEdgeRequest,
        cancel: &Cancellation,
    ) -> Result<EdgeId, LedgerError>;

    /// Bisect an edge, returning the ids of its lower and upper children
    fn bisect(
        &mut self,
        edge_id: &EdgeId,
        prefix_history_root: Digest,
        prefix_proof: &[u8],
        cancel: &Cancellation,
    ) -> Result<(EdgeId, EdgeId), LedgerError>;

    /// Confirm an edge whose path has been unrivaled for a challenge period
    fn confirm_by_timer(
        &mut self,
        edge_id: &EdgeId,
        ancestors: &[EdgeId],
        cancel: &Cancellation,
    ) -> Result<(), LedgerError>;

    /// Confirm an edge whose children are both confirmed
    fn confirm_by_children(&mut self, edge_id: &EdgeId, cancel: &Cancellation) -> Result<(), LedgerError>;

    /// Confirm a level-zero edge whose claim is confirmed
    fn confirm_by_claim(
        &mut self,
        edge_id: &EdgeId,
        claim_id: &ClaimId,
        cancel: &Cancellation,
    ) -> Result<(), LedgerError>;

    /// Confirm a one-step-fork edge whose claiming subchallenge edge is confirmed
    fn confirm_by_claiming_edge(
        &mut self,
        edge_id: &EdgeId,
        claiming_edge_id: &EdgeId,
        cancel: &Cancellation,
    ) -> Result<(), LedgerError>;

    /// Confirm a single small step by executing it
    fn confirm_by_one_step_proof(
        &mut self,
        edge_id: &EdgeId,
        data: &OneStepData,
        cancel: &Cancellation,
    ) -> Result<(), LedgerError>;
}
