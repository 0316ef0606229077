// src/developer_tools/testing.rs
//! Testing utilities for the dispute core
//!
//! In-memory collaborators for exercising disputes without a chain:
//! - `MockStateManager`, a state manager over a fixed list of states
//! - `HashChainProver`, a one-step prover over a Keccak hash chain
//! - Logging setup for tests

use crate::challenge_protocol::{OneStepError, OneStepProver};
use crate::interfaces::{Cancellation, StateManager, StateManagerError};
use crate::state_commitments::{keccak256_concat, Digest, MerkleExpansion};

/// Initialise `env_logger` for tests; repeated calls are ignored
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic prover: the state after a step is `keccak(before ‖ proof)`
#[derive(Debug, Clone, Copy, Default)]
pub struct HashChainProver;

impl HashChainProver {
    /// Proof bytes of step `index` in chains built by [`MockStateManager::hash_chain`]
    pub fn step_proof(index: u64) -> Vec<u8> {
        index.to_be_bytes().to_vec()
    }

    /// State reached from `before` by executing `proof`
    pub fn next_state(before: &Digest, proof: &[u8]) -> Digest {
        keccak256_concat(&[before.as_bytes(), proof])
    }
}

impl OneStepProver for HashChainProver {
    fn compute_post_state(&self, before: &Digest, proof: &[u8]) -> Result<Digest, OneStepError> {
        if proof.is_empty() {
            return Err(OneStepError::InvalidProof("empty proof".to_string()));
        }
        Ok(Self::next_state(before, proof))
    }
}

/// State manager over an in-memory list of states
#[derive(Debug, Clone, Default)]
pub struct MockStateManager {
    /// State roots by height
    states: Vec<Digest>,

    /// Error returned by every call when set
    failure: Option<StateManagerError>,
}

impl MockStateManager {
    /// Manager over the given states
    pub fn new(states: Vec<Digest>) -> Self {
        Self { states, failure: None }
    }

    /// `steps + 1` states of a hash chain starting at `seed`
    pub fn hash_chain(seed: Digest, steps: u64) -> Self {
        let mut states = Vec::with_capacity(steps as usize + 1);
        states.push(seed);
        for index in 0..steps {
            let next = HashChainProver::next_state(&states[index as usize], &HashChainProver::step_proof(index));
            states.push(next);
        }
        Self::new(states)
    }

    /// Same history up to `height - 1`, different from `height` on
    pub fn diverging_at(&self, height: u64) -> Self {
        let states = self
            .states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                if i as u64 >= height {
                    keccak256_concat(&[b"divergent", state.as_bytes()])
                } else {
                    *state
                }
            })
            .collect();
        Self::new(states)
    }

    /// Every `stride`-th state from `start`, at most `steps + 1` of them.
    ///
    /// Turns a fine-grained trace into the coarser history one challenge
    /// level up, or picks out the steps of a single coarse step. Stops early
    /// at the end of the trace.
    pub fn sub_history(&self, start: u64, stride: u64, steps: u64) -> Self {
        let states = self
            .states
            .iter()
            .skip(start as usize)
            .step_by(stride.max(1) as usize)
            .take(steps as usize + 1)
            .copied()
            .collect();
        Self::new(states)
    }

    /// Make every call fail with `failure`
    pub fn with_failure(mut self, failure: StateManagerError) -> Self {
        self.failure = Some(failure);
        self
    }

    /// All states
    pub fn states(&self) -> &[Digest] {
        &self.states
    }

    fn check(&self, cancel: &Cancellation) -> Result<(), StateManagerError> {
        if cancel.is_cancelled() {
            return Err(StateManagerError::Cancelled);
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(())
    }

    fn latest(&self) -> Result<u64, StateManagerError> {
        match self.states.len() {
            0 => Err(StateManagerError::Backend("no states".to_string())),
            n => Ok(n as u64 - 1),
        }
    }
}

impl StateManager for MockStateManager {
    fn get_merkle_root(&self, start: u64, end: u64, cancel: &Cancellation) -> Result<Digest, StateManagerError> {
        self.check(cancel)?;
        let latest = self.latest()?;
        if end > latest {
            return Err(StateManagerError::HeightOutOfRange { height: end, latest });
        }
        if start > end {
            return Err(StateManagerError::Backend(format!("start {} after end {}", start, end)));
        }
        MerkleExpansion::from_leaves(&self.states[start as usize..=end as usize])
            .and_then(|expansion| expansion.root())
            .map_err(|e| StateManagerError::Backend(e.to_string()))
    }

    fn get_state_root(&self, height: u64, cancel: &Cancellation) -> Result<Digest, StateManagerError> {
        self.check(cancel)?;
        let latest = self.latest()?;
        self.states
            .get(height as usize)
            .copied()
            .ok_or(StateManagerError::HeightOutOfRange { height, latest })
    }

    fn get_latest_state_height(&self, cancel: &Cancellation) -> Result<u64, StateManagerError> {
        self.check(cancel)?;
        self.latest()
    }
}
