// src/lib.rs
//! Layer-2 dispute core
//!
//! Off-chain core of the edge-based bisection game an optimistic rollup uses
//! to settle disagreements about claimed state:
//! - State commitments: Merkle expansions, prefix proofs, inclusion proofs
//! - Challenge protocol: edges, bisection, confirmation rules, one-step proofs
//! - Interfaces to the on-chain challenge manager and the state manager
//! - Error handling and developer tools

pub mod challenge_protocol;
pub mod developer_tools;
pub mod error_handling;
pub mod interfaces;
pub mod state_commitments;

pub use challenge_protocol::{
    ChallengeGraph, ChallengeLevel, Edge, EdgeId, EdgeTracker, MutualId, OneStepData, OneStepProver, OriginId,
};
pub use error_handling::{DisputeError, ErrorHandler, ErrorKind};
pub use interfaces::{Cancellation, ChallengeLedger, StateManager};
pub use state_commitments::{Digest, HistoryCommitment, MerkleExpansion};

use serde::{Deserialize, Serialize};
use std::path::Path;

use state_commitments::MAX_PROOF_LEN;

/// Height of level-zero edges at each challenge level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerZeroHeights {
    pub block: u64,
    pub big_step: u64,
    pub small_step: u64,
}

impl LayerZeroHeights {
    /// Layer-zero height of `level`
    pub fn for_level(&self, level: ChallengeLevel) -> u64 {
        match level {
            ChallengeLevel::Block => self.block,
            ChallengeLevel::BigStep => self.big_step,
            ChallengeLevel::SmallStep => self.small_step,
        }
    }
}

impl Default for LayerZeroHeights {
    fn default() -> Self {
        Self {
            block: 32,
            big_step: 32,
            small_step: 32,
        }
    }
}

/// Dispute protocol configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Blocks an edge path must stay unrivaled to confirm by timer
    pub challenge_period_blocks: u64,

    /// End height of level-zero edges per level
    pub layer_zero_heights: LayerZeroHeights,

    /// Longest inclusion proof accepted in one-step proofs
    pub max_inclusion_proof_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            challenge_period_blocks: 50_400,
            layer_zero_heights: LayerZeroHeights::default(),
            max_inclusion_proof_len: MAX_PROOF_LEN,
        }
    }
}

impl ProtocolConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, DisputeError> {
        let config: ProtocolConfig =
            serde_json::from_str(json).map_err(|e| DisputeError::Config(format!("cannot parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DisputeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DisputeError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reject unusable parameters
    pub fn validate(&self) -> Result<(), DisputeError> {
        if self.challenge_period_blocks == 0 {
            return Err(DisputeError::Config("challenge period must be positive".to_string()));
        }
        for level in [ChallengeLevel::Block, ChallengeLevel::BigStep, ChallengeLevel::SmallStep] {
            let height = self.layer_zero_heights.for_level(level);
            if height == 0 || !height.is_power_of_two() {
                return Err(DisputeError::Config(format!(
                    "{} layer-zero height {} must be a positive power of two",
                    level, height
                )));
            }
        }
        if self.max_inclusion_proof_len == 0 || self.max_inclusion_proof_len > MAX_PROOF_LEN {
            return Err(DisputeError::Config(format!(
                "max inclusion proof length must be within 1..={}",
                MAX_PROOF_LEN
            )));
        }
        Ok(())
    }
}
