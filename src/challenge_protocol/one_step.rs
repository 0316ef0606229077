// src/challenge_protocol/one_step.rs
//! One-step proofs
//!
//! A small-step edge of length one is settled by executing the single
//! disputed step directly. The pre-state must be the last state of the start
//! commitment and the computed post-state the last state of the end
//! commitment; both are shown with inclusion proofs.

use borsh::{BorshDeserialize, BorshSerialize};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state_commitments::{Digest, InclusionProofError};

use super::edge::{ChallengeLevel, Edge, EdgeError};

/// Errors raised by a one-step prover
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OneStepError {
    /// Proof bytes could not be executed
    #[error("invalid one-step proof: {0}")]
    InvalidProof(String),
}

/// Data submitted to confirm an edge by one-step proof
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct OneStepData {
    /// State before the step
    pub before_hash: Digest,

    /// Prover-specific data needed to execute the step
    pub proof: Vec<u8>,

    /// Inclusion of `before_hash` at the start height of the start commitment
    pub pre_inclusion: Vec<Digest>,

    /// Inclusion of the computed post state at the end height of the end commitment
    pub post_inclusion: Vec<Digest>,
}

/// Executes a single step
pub trait OneStepProver {
    /// State after executing the step described by `proof` from `before`
    fn compute_post_state(&self, before: &Digest, proof: &[u8]) -> Result<Digest, OneStepError>;
}

/// Check `data` against a small-step edge of length one
pub fn verify_one_step(
    edge: &Edge,
    data: &OneStepData,
    prover: &dyn OneStepProver,
    max_proof_len: usize,
) -> Result<(), EdgeError> {
    if edge.level != ChallengeLevel::SmallStep || !edge.has_length_one() {
        return Err(EdgeError::NotOneStepEdge(edge.id));
    }
    for proof in [&data.pre_inclusion, &data.post_inclusion] {
        if proof.len() > max_proof_len {
            return Err(InclusionProofError::ProofTooLong(proof.len()).into());
        }
    }

    edge.start
        .verify_inclusion(edge.start.height, &data.before_hash, &data.pre_inclusion)?;

    let after = prover.compute_post_state(&data.before_hash, &data.proof)?;
    if let Err(e) = edge.end.verify_inclusion(edge.end.height, &after, &data.post_inclusion) {
        warn!("one-step proof for {:?} executed to {} which is not committed", edge.id, after.short());
        return Err(match e {
            InclusionProofError::RootMismatch { expected, actual } => {
                EdgeError::PostStateMismatch { expected, actual }
            }
            other => other.into(),
        });
    }
    debug!("one-step proof accepted for {:?}", edge.id);
    Ok(())
}
