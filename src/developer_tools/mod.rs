// src/developer_tools/mod.rs
//! Developer tools for the dispute core
//!
//! In-memory collaborators and helpers used to test and simulate disputes
//! without a chain or an execution engine behind them.

pub mod testing;

pub use testing::{init_test_logging, HashChainProver, MockStateManager};
