// src/error_handling/error_types.rs
//! Error types for the dispute core
//!
//! Each module reports its own typed error; `DisputeError` wraps all of them
//! so callers driving moves can handle one type, classify it and map it to a
//! stable numeric code.

use thiserror::Error;

use crate::challenge_protocol::{EdgeError, EdgeId};
use crate::interfaces::{LedgerError, StateManagerError};
use crate::state_commitments::{DigestParseError, InclusionProofError, PrefixProofError};

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Malformed or oversized input, rejected before any hashing
    Validation,
    /// A proof does not match the commitments it claims to link
    Consistency,
    /// Degenerate range or bit arithmetic on zero
    Arithmetic,
    /// Ledger or state-manager failure
    External,
}

/// Base error type for the dispute core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisputeError {
    /// Digest parsing error
    #[error("digest error: {0}")]
    Digest(#[from] DigestParseError),

    /// Prefix proof error
    #[error("prefix proof error: {0}")]
    PrefixProof(#[from] PrefixProofError),

    /// Inclusion proof error
    #[error("inclusion proof error: {0}")]
    InclusionProof(#[from] InclusionProofError),

    /// Edge or dispute graph error
    #[error("edge error: {0}")]
    Edge(#[from] EdgeError),

    /// State manager error
    #[error("state manager error: {0}")]
    StateManager(#[from] StateManagerError),

    /// Ledger error
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failure while performing a move on an edge
    #[error("{action} on edge {edge} failed: {source}")]
    Move {
        action: &'static str,
        edge: EdgeId,
        #[source]
        source: Box<DisputeError>,
    },
}

impl DisputeError {
    /// Wrap an error with the move and edge it happened on
    pub fn in_move(action: &'static str, edge: EdgeId, source: impl Into<DisputeError>) -> Self {
        DisputeError::Move {
            action,
            edge,
            source: Box::new(source.into()),
        }
    }

    /// The innermost error, with every move context removed
    pub fn root_cause(&self) -> &DisputeError {
        match self {
            DisputeError::Move { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Broad class of the failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            DisputeError::Digest(_) | DisputeError::Config(_) => ErrorKind::Validation,
            DisputeError::PrefixProof(e) => prefix_proof_kind(e),
            DisputeError::InclusionProof(e) => inclusion_kind(e),
            DisputeError::Edge(e) => edge_kind(e),
            DisputeError::StateManager(_) | DisputeError::Ledger(_) => ErrorKind::External,
            DisputeError::Move { source, .. } => source.kind(),
        }
    }

    /// Whether the failure came from a cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.root_cause(),
            DisputeError::StateManager(StateManagerError::Cancelled) | DisputeError::Ledger(LedgerError::Cancelled)
        )
    }

    /// Convert to error code
    pub fn to_error_code(&self) -> u32 {
        match self {
            DisputeError::Digest(_) => 1000,
            DisputeError::Config(_) => 1001,
            DisputeError::PrefixProof(e) => 2000 + prefix_proof_code(e),
            DisputeError::InclusionProof(e) => 2100 + inclusion_code(e),
            DisputeError::Edge(e) => edge_code(e),
            DisputeError::StateManager(e) => match e {
                StateManagerError::Cancelled => 4000,
                StateManagerError::HeightOutOfRange { .. } => 4001,
                StateManagerError::Backend(_) => 4002,
            },
            DisputeError::Ledger(e) => match e {
                LedgerError::Reverted(_) => 4100,
                LedgerError::Cancelled => 4101,
                LedgerError::NotFound(_) => 4102,
                LedgerError::Transport(_) => 4103,
            },
            DisputeError::Move { source, .. } => source.to_error_code(),
        }
    }
}

fn prefix_proof_kind(e: &PrefixProofError) -> ErrorKind {
    match e {
        PrefixProofError::LevelTooHigh
        | PrefixProofError::ExpansionTooLarge
        | PrefixProofError::MalformedProofBytes(_)
        | PrefixProofError::VirtualTooShort { .. } => ErrorKind::Validation,
        PrefixProofError::RootMismatch { .. }
        | PrefixProofError::TreeSize { .. }
        | PrefixProofError::IncompleteProof { .. }
        | PrefixProofError::SizeNotLeqPostSize { .. }
        | PrefixProofError::IndexOutOfRange
        | PrefixProofError::RootForEmpty => ErrorKind::Consistency,
        PrefixProofError::CannotBeZero
        | PrefixProofError::StartNotLessThanEnd { .. }
        | PrefixProofError::UnableToBisect { .. }
        | PrefixProofError::CannotAppendEmpty
        | PrefixProofError::CannotAppendAboveLeastSignificant => ErrorKind::Arithmetic,
        PrefixProofError::RootFetcher(_) => ErrorKind::External,
    }
}

fn prefix_proof_code(e: &PrefixProofError) -> u32 {
    match e {
        PrefixProofError::LevelTooHigh => 0,
        PrefixProofError::ExpansionTooLarge => 1,
        PrefixProofError::RootForEmpty => 2,
        PrefixProofError::TreeSize { .. } => 3,
        PrefixProofError::CannotAppendEmpty => 4,
        PrefixProofError::CannotAppendAboveLeastSignificant => 5,
        PrefixProofError::StartNotLessThanEnd { .. } => 6,
        PrefixProofError::CannotBeZero => 7,
        PrefixProofError::UnableToBisect { .. } => 8,
        PrefixProofError::RootMismatch { .. } => 9,
        PrefixProofError::IncompleteProof { .. } => 10,
        PrefixProofError::SizeNotLeqPostSize { .. } => 11,
        PrefixProofError::IndexOutOfRange => 12,
        PrefixProofError::MalformedProofBytes(_) => 13,
        PrefixProofError::RootFetcher(_) => 14,
        PrefixProofError::VirtualTooShort { .. } => 15,
    }
}

fn inclusion_kind(e: &InclusionProofError) -> ErrorKind {
    match e {
        InclusionProofError::RootMismatch { .. } => ErrorKind::Consistency,
        _ => ErrorKind::Validation,
    }
}

fn inclusion_code(e: &InclusionProofError) -> u32 {
    match e {
        InclusionProofError::InvalidTree => 0,
        InclusionProofError::InvalidLeaves { .. } => 1,
        InclusionProofError::ProofTooLong(_) => 2,
        InclusionProofError::RootMismatch { .. } => 3,
    }
}

fn edge_kind(e: &EdgeError) -> ErrorKind {
    match e {
        EdgeError::PrefixProof(inner) => prefix_proof_kind(inner),
        EdgeError::InclusionProof(inner) => inclusion_kind(inner),
        EdgeError::OneStep(_)
        | EdgeError::PostStateMismatch { .. }
        | EdgeError::ClaimMismatch { .. }
        | EdgeError::OriginMismatch { .. }
        | EdgeError::InvalidAncestor { .. }
        | EdgeError::StartStateMismatch { .. }
        | EdgeError::EndStateMismatch { .. } => ErrorKind::Consistency,
        _ => ErrorKind::Validation,
    }
}

fn edge_code(e: &EdgeError) -> u32 {
    match e {
        EdgeError::PrefixProof(inner) => 2000 + prefix_proof_code(inner),
        EdgeError::InclusionProof(inner) => 2100 + inclusion_code(inner),
        EdgeError::OneStep(_) => 3000,
        EdgeError::EdgeNotFound(_) => 3001,
        EdgeError::AssertionNotFound(_) => 3002,
        EdgeError::EdgeExists(_) => 3003,
        EdgeError::NotPending(_) => 3004,
        EdgeError::AlreadyBisected(_) => 3005,
        EdgeError::NoChildren(_) => 3006,
        EdgeError::ChildrenNotConfirmed(_) => 3007,
        EdgeError::RivalAlreadyConfirmed { .. } => 3008,
        EdgeError::NotLevelZero(_) => 3009,
        EdgeError::ClaimMismatch { .. } => 3010,
        EdgeError::ClaimNotConfirmed(_) => 3011,
        EdgeError::ClaimingEdgeNotConfirmed(_) => 3012,
        EdgeError::ClaimNotOneStepFork(_) => 3013,
        EdgeError::OriginMismatch { .. } => 3014,
        EdgeError::InvalidLevel { .. } => 3015,
        EdgeError::InvalidHeights { .. } => 3016,
        EdgeError::NotOneStepEdge(_) => 3017,
        EdgeError::PostStateMismatch { .. } => 3018,
        EdgeError::InvalidAncestor { .. } => 3019,
        EdgeError::TimerNotExpired { .. } => 3020,
        EdgeError::StartStateMismatch { .. } => 3021,
        EdgeError::EndStateMismatch { .. } => 3022,
    }
}
