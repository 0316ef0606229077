// src/interfaces/mod.rs
//! Interfaces to the collaborators of the dispute core
//!
//! The on-chain challenge manager (ledger) and the state-manager backend are
//! owned by the surrounding node. This module defines the traits the core
//! consumes from them and the cancellation signal every blocking call takes.

mod ledger_interface;
mod state_manager_interface;

pub use ledger_interface::*;
pub use state_manager_interface::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation signal shared between a caller and the backend
/// calls it starts
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    /// A signal that has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
