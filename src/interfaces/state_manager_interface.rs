// src/interfaces/state_manager_interface.rs
//! Standard interface for the state-manager backend
//!
//! The state manager knows the execution history a participant believes in
//! and serves the roots needed to commit to it and to prove prefixes of it.

use thiserror::Error;

use super::Cancellation;
use crate::state_commitments::Digest;

/// State manager errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateManagerError {
    /// Call interrupted by the cancellation signal
    #[error("state manager call cancelled")]
    Cancelled,

    /// Requested height is past the latest known state
    #[error("height {height} out of range, latest is {latest}")]
    HeightOutOfRange { height: u64, latest: u64 },

    /// Backend failure
    #[error("state manager backend error: {0}")]
    Backend(String),
}

/// Source of historical state roots
pub trait StateManager {
    /// Root over the states `start..=end`
    fn get_merkle_root(&self, start: u64, end: u64, cancel: &Cancellation) -> Result<Digest, StateManagerError>;

    /// State root at `height`
    fn get_state_root(&self, height: u64, cancel: &Cancellation) -> Result<Digest, StateManagerError>;

    /// Height of the latest known state
    fn get_latest_state_height(&self, cancel: &Cancellation) -> Result<u64, StateManagerError>;

    /// State roots `start..=end`, checking for cancellation between calls
    fn get_state_roots(&self, start: u64, end: u64, cancel: &Cancellation) -> Result<Vec<Digest>, StateManagerError> {
        let mut roots = Vec::with_capacity(end.saturating_sub(start) as usize + 1);
        for height in start..=end {
            if cancel.is_cancelled() {
                return Err(StateManagerError::Cancelled);
            }
            roots.push(self.get_state_root(height, cancel)?);
        }
        Ok(roots)
    }
}
