// src/error_handling/mod.rs
//! Error handling for the dispute core
//!
//! This module provides the crate-wide error type and a handler that lets a
//! participant log a failed move and continue with the next one.

pub mod error_handler;
pub mod error_types;

// Re-export common types
pub use error_types::{DisputeError, ErrorKind};

pub use error_handler::{ErrorContext, ErrorHandler, ErrorHandlerConfig, ErrorHandlerStats, ErrorSeverity, HandledError};
